//! Human-readable network dump.

use std::io::{self, Write};

use crate::enabling::EnablingSet;
use crate::mona::Mona;
use crate::neuron::{Neuron, NeuronKind};

fn print_set<W: Write>(w: &mut W, name: &str, set: &EnablingSet) -> io::Result<()> {
    if set.is_empty() {
        return Ok(());
    }
    writeln!(w, "    {name}:")?;
    for e in set.iter() {
        let trail: Vec<String> = e.events.iter().map(|ev| format!("{}@{}", ev.id, ev.timestamp)).collect();
        writeln!(
            w,
            "      value={:.6} motive={:.6} age={} timer={} begin={} trail=[{}]",
            e.value,
            e.motive,
            e.age,
            e.timer_index,
            e.cause_begin,
            trail.join(" ")
        )?;
    }
    Ok(())
}

impl Mona {
    /// Write the whole network: parameters, needs, timers and every neuron.
    pub fn print_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let cfg = &self.cfg;
        writeln!(w, "<mona>")?;
        writeln!(
            w,
            "  sensors={} responses={} needs={} max_mediators={} clock={}",
            cfg.num_sensors, cfg.num_responses, cfg.num_needs, cfg.max_mediators, self.event_clock
        )?;
        writeln!(w, "  needs={:?}", self.needs.as_slice())?;
        for (level, timers) in self.effect_event_intervals.iter().enumerate() {
            writeln!(
                w,
                "  level {level}: intervals={timers:?} weights={:?}",
                self.effect_event_interval_weights[level]
            )?;
        }
        for (i, mode) in self.sensor_modes.iter().enumerate() {
            writeln!(w, "  mode {i}: mask={:?} resolution={}", mode.mask, mode.resolution)?;
        }

        writeln!(w, "  <receptors>")?;
        for &r in &self.receptors {
            self.print_neuron(w, self.neuron(r))?;
        }
        writeln!(w, "  <motors>")?;
        for &m in &self.motors {
            self.print_neuron(w, self.neuron(m))?;
        }
        writeln!(w, "  <mediators>")?;
        for &m in &self.mediators {
            self.print_neuron(w, self.neuron(m))?;
        }
        writeln!(w, "</mona>")
    }

    fn print_neuron<W: Write>(&self, w: &mut W, n: &Neuron) -> io::Result<()> {
        writeln!(
            w,
            "  {} {} \"{}\" firing={:.6} motive={:.6} goal={} visits={}",
            n.neuron_type().as_str(),
            n.id,
            n.description,
            n.firing_strength,
            n.motive,
            n.goals.value(),
            n.drive_visits
        )?;
        match &n.kind {
            NeuronKind::Receptor(_) => {}
            NeuronKind::Motor(motor) => {
                if !motor.drivers.is_empty() {
                    let drivers: Vec<String> =
                        motor.drivers.iter().map(|&d| self.neuron(d).id.to_string()).collect();
                    writeln!(w, "    drivers: {}", drivers.join(" "))?;
                }
            }
            NeuronKind::Mediator(med) => {
                writeln!(
                    w,
                    "    level={} {} instinct={} base={:.6} total={:.6} utility={:.6}",
                    med.level,
                    if med.enabler { "enabler" } else { "disabler" },
                    med.instinct,
                    med.base_enablement,
                    med.total_enablement(),
                    med.utility
                )?;
                for (slot, pending) in med.pending_enablings.iter().enumerate() {
                    for p in pending {
                        writeln!(
                            w,
                            "    pending[{slot}]: strength={:.6} age={} begin={}",
                            p.strength, p.age, p.cause_begin
                        )?;
                    }
                }
                for (i, set) in med.intermediate_enablings.iter().enumerate() {
                    print_set(w, &format!("intermediate[{i}]"), set)?;
                }
                print_set(w, "effect", &med.effect_enablings)?;
                print_set(w, "wagered", &med.wagered_enablings)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MonaConfig;
    use crate::mona::Mona;

    #[test]
    fn dump_lists_every_neuron() {
        let mut mona = Mona::new(MonaConfig::new(1, 2, 1).without_learning()).unwrap();
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m1 = mona.motor(1).unwrap();
        mona.add_mediator(&[r], &[], m1, true, 0.5).unwrap();
        mona.override_response(Some(1)).unwrap();
        mona.cycle(&[1.0]).unwrap();

        let mut out = Vec::new();
        mona.print_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("<mona>"));
        assert!(text.contains("receptor 2 \"[1]/0\""));
        assert!(text.contains("motor 1 \"Response 1\""));
        assert!(text.contains("(2) -> 1"));
        assert!(text.contains("wagered:"));
        assert!(text.trim_end().ends_with("</mona>"));
    }
}
