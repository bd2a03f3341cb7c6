use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use mona::config::{Sensor, MAX_MEDIATOR_LEVEL};
use mona::observer::MonaAdapter;
use mona::{Mona, MonaConfig, MonaError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_usage(&args[0]);
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MONA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut template = MonaConfig::default();
    let mut timeout: Option<Duration> = None;
    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        if arg == "--config" {
            let Some(path) = rest.next() else {
                print_usage(&args[0]);
                process::exit(1);
            };
            template = match std::fs::read_to_string(path)
                .map_err(MonaError::from)
                .and_then(|text| MonaConfig::from_json(&text))
            {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Cannot read config {path}: {e}");
                    process::exit(1);
                }
            };
        } else {
            match arg.parse::<u64>() {
                Ok(secs) if secs > 0 && timeout.is_none() => {
                    timeout = Some(Duration::from_secs(secs));
                }
                _ => {
                    print_usage(&args[0]);
                    process::exit(1);
                }
            }
        }
    }

    let mut session = Session::new(template, Tokens::from_stdin(timeout));
    session.run();
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [--config <file.json>] [<input timeout (secs)>]");
    eprintln!("Type 'help' at the prompt for commands.");
}

fn print_help() {
    println!("Commands:");
    println!("  parameters <sensors> <responses> <needs>");
    println!("  add_sensor_mode <mask values> <resolution>|default");
    println!("  set_intervals <level> <count>");
    println!("  interval <level> <index> <value> <weight>");
    println!("  max_learn_interval <level> <value>");
    println!("  need <index> <value>");
    println!("  goal [modal] <need> <sensor values> [<mode>] <response>|null <value>");
    println!("  cycle <sensor values>");
    println!("  response <override>|null");
    println!("  erase stm|ltm");
    println!("  file load|save <path>");
    println!("  logging on|off");
    println!("  dump [json]");
    println!("  help");
    println!("  quit");
}

/// Whitespace tokens from stdin, read on a helper thread so command reads can time out.
struct Tokens {
    lines: Receiver<String>,
    line: VecDeque<String>,
    timeout: Option<Duration>,
}

impl Tokens {
    fn from_stdin(timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: rx,
            line: VecDeque::new(),
            timeout,
        }
    }

    fn fill(&mut self, timed: bool) -> Option<()> {
        while self.line.is_empty() {
            let line = match (timed, self.timeout) {
                (true, Some(t)) => match self.lines.recv_timeout(t) {
                    Ok(line) => line,
                    Err(RecvTimeoutError::Timeout) => {
                        eprintln!("Input timeout");
                        process::exit(1);
                    }
                    Err(RecvTimeoutError::Disconnected) => return None,
                },
                _ => self.lines.recv().ok()?,
            };
            self.line = line.split_whitespace().map(str::to_string).collect();
        }
        Some(())
    }

    /// Next command word; this is the read the timeout applies to.
    fn command(&mut self) -> Option<String> {
        self.fill(true)?;
        self.line.pop_front()
    }

    fn next(&mut self) -> Option<String> {
        self.fill(false)?;
        self.line.pop_front()
    }

    /// Take the next token only if it is on the current line.
    fn optional(&mut self) -> Option<String> {
        self.line.pop_front()
    }
}

struct Session {
    template: MonaConfig,
    mona: Option<Mona>,
    tokens: Tokens,
    log: Option<File>,
}

impl Session {
    fn new(template: MonaConfig, tokens: Tokens) -> Self {
        Self {
            template,
            mona: None,
            tokens,
            log: None,
        }
    }

    fn input_error(&mut self, msg: &str) -> ! {
        eprintln!("{msg}");
        self.echo(msg);
        process::exit(1);
    }

    fn echo(&mut self, line: &str) {
        if let Some(log) = &mut self.log {
            let _ = writeln!(log, "{line}");
            let _ = log.flush();
        }
    }

    fn word(&mut self, what: &str) -> String {
        match self.tokens.next() {
            Some(w) => w,
            None => self.input_error(&format!("Error reading {what}")),
        }
    }

    fn parse<T: FromStr>(&mut self, what: &str) -> T {
        let w = self.word(what);
        match w.parse() {
            Ok(v) => v,
            Err(_) => self.input_error(&format!("Error reading {what}")),
        }
    }

    fn parse_optional_index(&mut self, what: &str) -> Option<usize> {
        let w = self.word(what);
        if w == "null" {
            return None;
        }
        match w.parse() {
            Ok(v) => Some(v),
            Err(_) => self.input_error(&format!("Error reading {what}")),
        }
    }

    fn sensors(&mut self, n: usize, what: &str) -> Vec<Sensor> {
        (0..n).map(|_| self.parse::<Sensor>(what)).collect()
    }

    fn num_sensors(&self) -> Option<usize> {
        self.mona.as_ref().map(|m| m.config().num_sensors)
    }

    // Rejected operations are reported and the loop continues.
    fn report(&mut self, result: Result<(), MonaError>) {
        if let Err(e) = result {
            warn!(error = %e, "command rejected");
            eprintln!("{e}");
            self.echo(&format!("error: {e}"));
        }
    }

    fn run(&mut self) {
        loop {
            let Some(command) = self.tokens.command() else {
                self.input_error("Error reading command");
            };
            let first = command.chars().next().map(|c| c.to_ascii_lowercase());
            match first {
                Some('p') => self.parameters(),
                Some('a') => self.add_sensor_mode(),
                Some('s') => {
                    let level: usize = self.parse("interval level");
                    let count: usize = self.parse("interval count");
                    self.echo(&format!("set_intervals: {level} {count}"));
                    if let Some(m) = &mut self.mona {
                        let r = m.set_effect_event_intervals(level, count);
                        self.report(r);
                    }
                }
                Some('i') => {
                    let level: usize = self.parse("effect event intervals");
                    let index: usize = self.parse("effect event intervals");
                    let value: u64 = self.parse("effect event intervals");
                    let weight: f64 = self.parse("effect event intervals");
                    self.echo(&format!("interval: {level} {index} {value} {weight}"));
                    if let Some(m) = &mut self.mona {
                        let r = m.set_effect_event_interval(level, index, value, weight);
                        self.report(r);
                    }
                }
                Some('m') => {
                    let level: usize = self.parse("maximum learning effect event interval");
                    let value: u64 = self.parse("maximum learning effect event interval");
                    self.echo(&format!("max_learn_interval: {level} {value}"));
                    if let Some(m) = &mut self.mona {
                        let r = m.set_max_learning_effect_event_interval(level, value);
                        self.report(r);
                    }
                }
                Some('n') => {
                    let index: usize = self.parse("set need command");
                    let value: f64 = self.parse("set need command");
                    self.echo(&format!("need: {index} {value}"));
                    if let Some(m) = &mut self.mona {
                        let r = m.set_need(index, value);
                        self.report(r);
                    }
                }
                Some('g') => self.goal(),
                Some('c') => self.cycle(),
                Some('r') => {
                    let response = self.parse_optional_index("override response");
                    self.echo(&format!("response: {response:?}"));
                    if let Some(m) = &mut self.mona {
                        let r = m.override_response(response);
                        self.report(r);
                    }
                }
                Some('e') => {
                    let which = self.word("erase command");
                    self.echo(&format!("erase: {which}"));
                    if let Some(m) = &mut self.mona {
                        if which == "ltm" {
                            m.clear_long_term_memory();
                        } else {
                            m.clear_working_memory();
                        }
                    }
                }
                Some('f') => self.file(),
                Some('l') => self.logging(),
                Some('d') => self.dump(),
                Some('h') => print_help(),
                Some('q') => {
                    self.echo("quit");
                    return;
                }
                _ => {
                    warn!(command = %command, "unknown command");
                    eprintln!("Unknown command: {command}");
                }
            }
        }
    }

    fn parameters(&mut self) {
        let sensors: usize = self.parse("parameters");
        let responses: usize = self.parse("parameters");
        let needs: usize = self.parse("parameters");
        self.echo(&format!("parameters: {sensors} {responses} {needs}"));
        let cfg = MonaConfig {
            num_sensors: sensors,
            num_responses: responses,
            num_needs: needs,
            ..self.template
        };
        match Mona::new(cfg) {
            Ok(m) => {
                info!(sensors, responses, needs, "network created");
                self.mona = Some(m);
                println!("MAX_MEDIATOR_LEVEL={MAX_MEDIATOR_LEVEL}");
                let _ = io::stdout().flush();
            }
            Err(e) => self.input_error(&e.to_string()),
        }
    }

    fn add_sensor_mode(&mut self) {
        let Some(n) = self.num_sensors() else {
            warn!("add_sensor_mode before parameters");
            return;
        };
        let mut mask = Vec::with_capacity(n);
        for _ in 0..n {
            let v: i32 = self.parse("sensor mask");
            mask.push(v == 1);
        }
        let w = self.word("sensor resolution");
        let resolution = if w.starts_with("default") {
            None
        } else {
            match w.parse::<Sensor>() {
                Ok(v) => Some(v),
                Err(_) => self.input_error("Error reading sensor resolution"),
            }
        };
        self.echo(&format!("add_sensor_mode: mask={mask:?} resolution={resolution:?}"));
        if let Some(m) = &mut self.mona {
            let r = m.add_sensor_mode(mask, resolution).map(|mode| {
                println!("{mode}");
            });
            self.report(r);
        }
    }

    fn goal(&mut self) {
        let Some(n) = self.num_sensors() else {
            warn!("goal before parameters");
            return;
        };
        let first = self.word("set goal command");
        let modal = first.to_ascii_lowercase().starts_with('m');
        let need: usize = if modal {
            self.parse("goal number")
        } else {
            match first.parse() {
                Ok(v) => v,
                Err(_) => self.input_error("Error reading goal number"),
            }
        };
        let sensors = self.sensors(n, "goal sensor value");
        let mode: usize = if modal { self.parse("goal sensor mode") } else { 0 };
        let response = self.parse_optional_index("goal response");
        let value: f64 = self.parse("goal value");
        self.echo(&format!(
            "goal: need={need} sensors={sensors:?} mode={mode} response={response:?} value={value}"
        ));
        if let Some(m) = &mut self.mona {
            let r = m.add_goal(need, &sensors, mode, response, value).map(|id| {
                info!(goal = id, "goal added");
            });
            self.report(r);
        }
    }

    fn cycle(&mut self) {
        let Some(n) = self.num_sensors() else {
            warn!("cycle before parameters");
            return;
        };
        let sensors = self.sensors(n, "cycle sensor value");
        self.echo(&format!("cycle: {sensors:?}"));
        let Some(m) = &mut self.mona else { return };
        match m.cycle(&sensors) {
            Ok(Some(r)) => println!("{r}"),
            Ok(None) => println!("null"),
            Err(e) => {
                self.report(Err(e));
                return;
            }
        }
        let _ = io::stdout().flush();
    }

    fn file(&mut self) {
        let op = self.word("file command");
        let path = PathBuf::from(self.word("file name"));
        self.echo(&format!("file: {op} {}", path.display()));
        match op.as_str() {
            "load" => {
                let mona = self.mona.get_or_insert_with(|| {
                    // Placeholder until the image replaces it.
                    Mona::new(MonaConfig::default()).unwrap_or_else(|e| {
                        eprintln!("Cannot create mona: {e}");
                        process::exit(1);
                    })
                });
                let r = mona.load(&path);
                self.report(r);
            }
            "save" => {
                if let Some(m) = &self.mona {
                    let r = m.save(&path);
                    self.report(r);
                }
            }
            _ => self.input_error("Invalid file command"),
        }
    }

    fn logging(&mut self) {
        let switch = self.word("log command");
        if switch == "on" {
            if self.log.is_none() {
                let path = std::env::temp_dir().join(format!("mona{}.log", process::id()));
                match File::create(&path) {
                    Ok(f) => {
                        info!(path = %path.display(), "logging on");
                        self.log = Some(f);
                    }
                    Err(e) => eprintln!("Cannot open log file {}: {e}", path.display()),
                }
            }
        } else {
            self.log = None;
        }
    }

    fn dump(&mut self) {
        let json = matches!(self.tokens.optional().as_deref(), Some("json"));
        let Some(m) = &self.mona else { return };
        if json {
            match serde_json::to_string_pretty(&MonaAdapter::new(m).snapshot()) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("Cannot serialize snapshot: {e}"),
            }
            return;
        }
        let result = match &mut self.log {
            Some(log) => m.print_to(log),
            None => m.print_to(&mut io::stdout().lock()),
        };
        if let Err(e) = result {
            self.report(Err(e.into()));
        }
    }
}
