//! Network image: a versioned chunk stream holding the whole graph.
//!
//! Neurons are written in creation order with their stable ids; every
//! cross-reference is an id and is resolved again on load. The arena is
//! compacted on load, so handles are not preserved but ids and creation
//! order are. Loading checks every value the cycle indexes with.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use hashbrown::HashMap;
use tracing::info;

use crate::config::{MonaConfig, Time, MAX_EFFECT_EVENT_INTERVAL, MAX_MEDIATOR_LEVEL};
use crate::enabling::{ElemEvent, Enabling, EnablingSet, PendingEnabling};
use crate::error::{MonaError, Result};
use crate::learn::LearningEvent;
use crate::mona::Mona;
use crate::neuron::{EventType, Mediator, Motor, Neuron, NeuronId, NeuronKind, Notify, Receptor};
use crate::prng::Prng;
use crate::sensor::SensorMode;
use crate::storage;
use crate::value_set::{GoalValue, ValueSet};

const KIND_RECEPTOR: u8 = 0;
const KIND_MOTOR: u8 = 1;
const KIND_MEDIATOR: u8 = 2;

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn write_usize<W: Write>(w: &mut W, v: usize) -> io::Result<()> {
    storage::write_u64_le(w, v as u64)
}

fn read_usize<R: Read>(r: &mut R) -> io::Result<usize> {
    usize::try_from(storage::read_u64_le(r)?).map_err(|_| invalid("count out of range"))
}

fn write_opt_usize<W: Write>(w: &mut W, v: Option<usize>) -> io::Result<()> {
    storage::write_opt_u64(w, v.map(|v| v as u64))
}

fn read_opt_usize<R: Read>(r: &mut R) -> io::Result<Option<usize>> {
    match storage::read_opt_u64(r)? {
        Some(v) => Ok(Some(usize::try_from(v).map_err(|_| invalid("index out of range"))?)),
        None => Ok(None),
    }
}

impl Mona {
    /// Serialize the network as a chunked image.
    pub fn save_image_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(storage::MAGIC)?;
        storage::write_u32_le(w, storage::VERSION_CURRENT)?;

        let mut payload = Vec::new();
        self.write_cfg_payload(&mut payload)?;
        storage::write_chunk(w, *b"CFG0", &payload)?;

        payload.clear();
        storage::write_u64_le(&mut payload, self.rng.state())?;
        storage::write_chunk(w, *b"PRNG", &payload)?;

        payload.clear();
        storage::write_u64_le(&mut payload, self.event_clock)?;
        storage::write_u64_le(&mut payload, self.id_dispenser)?;
        storage::write_chunk(w, *b"CLCK", &payload)?;

        payload.clear();
        self.write_io_payload(&mut payload)?;
        storage::write_chunk(w, *b"IO00", &payload)?;

        payload.clear();
        self.write_mode_payload(&mut payload)?;
        storage::write_chunk(w, *b"MODE", &payload)?;

        payload.clear();
        self.write_timer_payload(&mut payload)?;
        storage::write_chunk(w, *b"TIMR", &payload)?;

        payload.clear();
        self.write_neuron_payload(&mut payload)?;
        storage::write_chunk_lz4(w, *b"NEUR", &payload)?;

        payload.clear();
        self.write_learning_payload(&mut payload)?;
        storage::write_chunk(w, *b"LRNE", &payload)?;

        Ok(())
    }

    /// Load a chunked image. Unknown chunks are skipped.
    pub fn load_image_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic = storage::read_exact::<8, _>(r)?;
        if &magic != storage::MAGIC {
            return Err(invalid("bad network image magic"));
        }
        let version = storage::read_u32_le(r)?;
        if version != storage::VERSION_V1 {
            return Err(invalid("unsupported network image version"));
        }

        let mut cfg: Option<MonaConfig> = None;
        let mut rng_state: Option<u64> = None;
        let mut clock: Option<(Time, u64)> = None;
        let mut io_state: Option<IoState> = None;
        let mut modes: Option<Vec<SensorMode>> = None;
        let mut timers: Option<Timers> = None;
        let mut neurons: Option<Vec<Neuron>> = None;
        let mut learning: Option<Vec<Vec<LearningEvent>>> = None;

        loop {
            let (tag, len) = match storage::read_chunk_header(r) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };

            let mut take = r.take(len as u64);
            match &tag {
                b"CFG0" => cfg = Some(Self::read_cfg_payload(&mut take)?),
                b"PRNG" => rng_state = Some(storage::read_u64_le(&mut take)?),
                b"CLCK" => {
                    let event_clock = storage::read_u64_le(&mut take)?;
                    let dispenser = storage::read_u64_le(&mut take)?;
                    clock = Some((event_clock, dispenser));
                }
                b"IO00" => io_state = Some(read_io_payload(&mut take)?),
                b"MODE" => modes = Some(read_mode_payload(&mut take)?),
                b"TIMR" => timers = Some(read_timer_payload(&mut take)?),
                b"NEUR" => {
                    let body = storage::read_lz4_body(&mut take)?;
                    neurons = Some(read_neuron_payload(&mut body.as_slice())?);
                }
                b"LRNE" => learning = Some(read_learning_payload(&mut take)?),
                _ => {}
            }

            io::copy(&mut take, &mut io::sink())?;
        }

        let cfg = cfg.ok_or_else(|| invalid("missing CFG0"))?;
        let rng_state = rng_state.ok_or_else(|| invalid("missing PRNG"))?;
        let (event_clock, id_dispenser) = clock.ok_or_else(|| invalid("missing CLCK"))?;
        let io_state = io_state.ok_or_else(|| invalid("missing IO00"))?;
        let sensor_modes = modes.ok_or_else(|| invalid("missing MODE"))?;
        let timers = timers.ok_or_else(|| invalid("missing TIMR"))?;
        let neurons = neurons.ok_or_else(|| invalid("missing NEUR"))?;
        let learning = learning.ok_or_else(|| invalid("missing LRNE"))?;

        if io_state.sensors.len() != cfg.num_sensors
            || io_state.needs.len() != cfg.num_needs
            || io_state.old_needs.len() != cfg.num_needs
        {
            return Err(invalid("IO00 length mismatch"));
        }
        if sensor_modes.is_empty() || sensor_modes.iter().any(|m| m.mask.len() != cfg.num_sensors) {
            return Err(invalid("MODE mask mismatch"));
        }
        if timers.intervals.len() != MAX_MEDIATOR_LEVEL + 1
            || timers.weights.len() != timers.intervals.len()
            || timers.max_learning.len() != timers.intervals.len()
            || timers.intervals.iter().any(Vec::is_empty)
        {
            return Err(invalid("TIMR level mismatch"));
        }
        let count = timers.intervals[0].len();
        if timers.intervals.iter().any(|t| {
            t.len() != count || t.iter().any(|v| !(1..=MAX_EFFECT_EVENT_INTERVAL).contains(v))
        }) || timers
            .max_learning
            .iter()
            .flatten()
            .any(|&v| v > MAX_EFFECT_EVENT_INTERVAL)
        {
            return Err(invalid("TIMR interval out of range"));
        }
        let valid_response = |r: Option<usize>| r.map_or(true, |r| r < cfg.num_responses);
        if !valid_response(io_state.response) || !valid_response(io_state.response_override) {
            return Err(invalid("IO00 response out of range"));
        }
        if learning.len() != MAX_MEDIATOR_LEVEL + 2 {
            return Err(invalid("LRNE level mismatch"));
        }

        let mut mona = Self {
            cfg,
            neurons: Vec::with_capacity(neurons.len()),
            generations: Vec::with_capacity(neurons.len()),
            free_slots: Vec::new(),
            receptors: Vec::new(),
            motors: Vec::new(),
            mediators: Vec::new(),
            id_index: HashMap::with_capacity(neurons.len()),
            id_dispenser,
            sensors: io_state.sensors,
            sensor_modes,
            response: io_state.response,
            response_override: io_state.response_override,
            needs: ValueSet::from_vec(io_state.needs),
            old_needs: ValueSet::from_vec(io_state.old_needs),
            effect_event_intervals: timers.intervals,
            effect_event_interval_weights: timers.weights,
            max_learning_effect_event_intervals: timers.max_learning,
            event_clock,
            learning_events: learning,
            rng: Prng::from_state(rng_state),
        };
        mona.adopt_neurons(neurons)?;
        if mona.motors.len() != cfg.num_responses {
            return Err(invalid("motor count mismatch"));
        }
        Ok(mona)
    }

    /// Exact serialized size in bytes for the current image.
    pub fn image_size_bytes(&self) -> io::Result<usize> {
        let mut cw = storage::CountingWriter::new();
        self.save_image_to(&mut cw)?;
        Ok(cw.written())
    }

    /// Save to `path` through a temp file; the old file survives a failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        storage::write_atomic(path, |w| self.save_image_to(w))?;
        info!(path = %path.display(), neurons = self.id_index.len(), "network saved");
        Ok(())
    }

    /// Replace this network with the image at `path`. Unchanged on failure.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let loaded = Self::load_image_from(&mut BufReader::new(file))?;
        *self = loaded;
        info!(path = %path.display(), neurons = self.id_index.len(), "network loaded");
        Ok(())
    }

    /// Load from a stream into `self`, mapping format errors to [`MonaError`].
    pub fn load_from<R: Read>(&mut self, r: &mut R) -> Result<()> {
        *self = Self::load_image_from(r).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => MonaError::Image(e.to_string()),
            _ => MonaError::Io(e),
        })?;
        Ok(())
    }

    fn write_cfg_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_usize(w, self.cfg.num_sensors)?;
        write_usize(w, self.cfg.num_responses)?;
        write_usize(w, self.cfg.num_needs)?;
        storage::write_opt_u64(w, self.cfg.seed)?;
        write_usize(w, self.cfg.max_mediators)?;
        storage::write_f64_le(w, self.cfg.response_randomness)?;
        storage::write_bool(w, self.cfg.learning_enabled)
    }

    fn read_cfg_payload<R: Read>(r: &mut R) -> io::Result<MonaConfig> {
        let cfg = MonaConfig {
            num_sensors: read_usize(r)?,
            num_responses: read_usize(r)?,
            num_needs: read_usize(r)?,
            seed: storage::read_opt_u64(r)?,
            max_mediators: read_usize(r)?,
            response_randomness: storage::read_f64_le(r)?,
            learning_enabled: storage::read_bool(r)?,
        };
        cfg.validate().map_err(|e| invalid(&e.to_string()))?;
        Ok(cfg)
    }

    fn write_io_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        storage::write_len(w, self.sensors.len())?;
        for &s in &self.sensors {
            storage::write_f32_le(w, s)?;
        }
        write_opt_usize(w, self.response)?;
        write_opt_usize(w, self.response_override)?;
        storage::write_f64_slice(w, self.needs.as_slice())?;
        storage::write_f64_slice(w, self.old_needs.as_slice())
    }

    fn write_mode_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        storage::write_len(w, self.sensor_modes.len())?;
        for mode in &self.sensor_modes {
            storage::write_len(w, mode.mask.len())?;
            for &on in &mode.mask {
                storage::write_bool(w, on)?;
            }
            storage::write_f32_le(w, mode.resolution)?;
        }
        Ok(())
    }

    fn write_timer_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        storage::write_len(w, self.effect_event_intervals.len())?;
        for level in 0..self.effect_event_intervals.len() {
            let intervals = &self.effect_event_intervals[level];
            storage::write_len(w, intervals.len())?;
            for &t in intervals {
                storage::write_u64_le(w, t)?;
            }
            storage::write_f64_slice(w, &self.effect_event_interval_weights[level])?;
            storage::write_opt_u64(w, self.max_learning_effect_event_intervals[level])?;
        }
        Ok(())
    }

    fn write_neuron_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let live: Vec<&Neuron> = self
            .receptors
            .iter()
            .chain(&self.motors)
            .chain(&self.mediators)
            .map(|&h| self.neuron(h))
            .collect();
        storage::write_len(w, live.len())?;
        let id_of = |n: NeuronId| self.neuron(n).id;
        for n in live {
            storage::write_u64_le(w, n.id)?;
            storage::write_string(w, &n.description)?;
            storage::write_f64_le(w, n.firing_strength)?;
            storage::write_f64_le(w, n.motive)?;
            storage::write_f64_slice(w, n.goals.goals.as_slice())?;
            storage::write_f64_le(w, n.goals.weight)?;
            storage::write_len(w, n.notify_list.len())?;
            for notify in &n.notify_list {
                storage::write_u64_le(w, id_of(notify.mediator))?;
                storage::write_u8(w, notify.event_type.code())?;
                write_usize(w, notify.event_index)?;
            }
            match &n.kind {
                NeuronKind::Receptor(rec) => {
                    storage::write_u8(w, KIND_RECEPTOR)?;
                    write_usize(w, rec.sensor_mode)?;
                    storage::write_len(w, rec.pattern.len())?;
                    for s in &rec.pattern {
                        storage::write_bool(w, s.is_some())?;
                        storage::write_f32_le(w, s.unwrap_or(0.0))?;
                    }
                }
                NeuronKind::Motor(motor) => {
                    storage::write_u8(w, KIND_MOTOR)?;
                    write_usize(w, motor.response)?;
                }
                NeuronKind::Mediator(med) => {
                    storage::write_u8(w, KIND_MEDIATOR)?;
                    write_mediator(w, med, &id_of)?;
                }
            }
        }
        Ok(())
    }

    fn write_learning_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        storage::write_len(w, self.learning_events.len())?;
        for list in &self.learning_events {
            storage::write_len(w, list.len())?;
            for e in list {
                storage::write_u64_le(w, self.neuron(e.neuron).id)?;
                storage::write_f64_le(w, e.strength)?;
                storage::write_f64_le(w, e.enablement)?;
                storage::write_f64_le(w, e.motive)?;
                storage::write_u64_le(w, e.begin)?;
                storage::write_u64_le(w, e.timestamp)?;
            }
        }
        Ok(())
    }

    fn check_neuron(&self, n: &Neuron) -> io::Result<()> {
        if n.goals.goals.len() != self.cfg.num_needs {
            return Err(invalid("goal vector length mismatch"));
        }
        match &n.kind {
            NeuronKind::Receptor(rec) => {
                if rec.sensor_mode >= self.sensor_modes.len() {
                    return Err(invalid("receptor sensor mode out of range"));
                }
                if rec.pattern.len() != self.cfg.num_sensors {
                    return Err(invalid("receptor pattern length mismatch"));
                }
            }
            NeuronKind::Motor(motor) => {
                if motor.response >= self.cfg.num_responses {
                    return Err(invalid("motor response out of range"));
                }
            }
            NeuronKind::Mediator(med) => {
                let timers = self.effect_event_intervals[med.level].len();
                if med.timed_wager_weights.len() != timers {
                    return Err(invalid("wager weight count mismatch"));
                }
                let sets = med
                    .intermediate_enablings
                    .iter()
                    .chain([&med.effect_enablings, &med.wagered_enablings]);
                for set in sets {
                    if set.iter().any(|e| e.timer_index >= timers) {
                        return Err(invalid("enabling timer index out of range"));
                    }
                }
            }
        }
        Ok(())
    }

    // Neurons arrive carrying stable ids in their handle fields.
    fn adopt_neurons(&mut self, neurons: Vec<Neuron>) -> io::Result<()> {
        for (i, n) in neurons.iter().enumerate() {
            self.check_neuron(n)?;
            if self.id_index.insert(n.id, NeuronId::new(i, 0)).is_some() {
                return Err(invalid("duplicate neuron id"));
            }
            if n.id >= self.id_dispenser {
                return Err(invalid("neuron id beyond dispenser"));
            }
        }
        let index = &self.id_index;
        let resolve = |h: NeuronId| -> io::Result<NeuronId> {
            index
                .get(&(h.index as u64))
                .copied()
                .ok_or_else(|| invalid("dangling neuron reference"))
        };

        let mut adopted = Vec::with_capacity(neurons.len());
        for mut n in neurons {
            for notify in &mut n.notify_list {
                notify.mediator = resolve(notify.mediator)?;
            }
            if let NeuronKind::Mediator(med) = &mut n.kind {
                for c in med.causes.iter_mut().chain(med.intermediates.iter_mut()) {
                    *c = resolve(*c)?;
                }
                if let Some(e) = med.effect {
                    med.effect = Some(resolve(e)?);
                }
            }
            adopted.push(n);
        }

        for (i, n) in adopted.into_iter().enumerate() {
            let handle = NeuronId::new(i, 0);
            match n.kind {
                NeuronKind::Receptor(_) => self.receptors.push(handle),
                NeuronKind::Motor(_) => self.motors.push(handle),
                NeuronKind::Mediator(_) => self.mediators.push(handle),
            }
            self.neurons.push(Some(n));
            self.generations.push(0);
        }

        for &h in &self.mediators {
            let med = self.mediator(h);
            for (event_type, index, component) in med.components() {
                let linked = self.neuron(component).notify_list.iter().any(|n| {
                    n.mediator == h && n.event_type == event_type && n.event_index == index
                });
                if !linked {
                    return Err(invalid("mediator component missing its notify entry"));
                }
            }
        }
        for n in self.neurons.iter().flatten() {
            for notify in &n.notify_list {
                let Some(med) = self.neuron(notify.mediator).as_mediator() else {
                    return Err(invalid("notify target is not a mediator"));
                };
                let slots = match notify.event_type {
                    EventType::Cause => med.causes.len(),
                    EventType::Intermediate => med.intermediates.len(),
                    EventType::Effect | EventType::Wager => 1,
                };
                if notify.event_index >= slots {
                    return Err(invalid("notify slot out of range"));
                }
            }
        }

        for list in &mut self.learning_events {
            for e in list.iter_mut() {
                e.neuron = self
                    .id_index
                    .get(&(e.neuron.index as u64))
                    .copied()
                    .ok_or_else(|| invalid("learning event for unknown neuron"))?;
            }
        }
        Ok(())
    }
}

fn write_events<W: Write>(w: &mut W, events: &[ElemEvent]) -> io::Result<()> {
    storage::write_len(w, events.len())?;
    for e in events {
        storage::write_u64_le(w, e.id)?;
        storage::write_u64_le(w, e.timestamp)?;
    }
    Ok(())
}

fn read_events<R: Read>(r: &mut R) -> io::Result<Vec<ElemEvent>> {
    let n = storage::read_len(r)?;
    let mut out = Vec::with_capacity(n.min(1 << 12));
    for _ in 0..n {
        let id = storage::read_u64_le(r)?;
        let timestamp = storage::read_u64_le(r)?;
        out.push(ElemEvent::new(id, timestamp));
    }
    Ok(out)
}

fn write_set<W: Write>(w: &mut W, set: &EnablingSet) -> io::Result<()> {
    storage::write_len(w, set.len())?;
    for e in set.iter() {
        storage::write_f64_le(w, e.value)?;
        storage::write_f64_le(w, e.motive)?;
        storage::write_f64_slice(w, e.need_save.as_slice())?;
        storage::write_u64_le(w, e.age)?;
        write_usize(w, e.timer_index)?;
        storage::write_u64_le(w, e.cause_begin)?;
        storage::write_opt_u64(w, e.effect_begin)?;
        write_events(w, &e.events)?;
        storage::write_bool(w, e.new_in_set)?;
        storage::write_bool(w, e.effect_wager)?;
        storage::write_bool(w, e.parasite)?;
    }
    Ok(())
}

fn read_set<R: Read>(r: &mut R) -> io::Result<EnablingSet> {
    let n = storage::read_len(r)?;
    let mut set = EnablingSet::new();
    for _ in 0..n {
        let value = storage::read_f64_le(r)?;
        let motive = storage::read_f64_le(r)?;
        let need_save = ValueSet::from_vec(storage::read_f64_vec(r)?);
        let age = storage::read_u64_le(r)?;
        let timer_index = read_usize(r)?;
        let cause_begin = storage::read_u64_le(r)?;
        let mut e = Enabling::new(value, motive, &need_save, age, timer_index, cause_begin);
        e.effect_begin = storage::read_opt_u64(r)?;
        e.events = read_events(r)?;
        e.new_in_set = storage::read_bool(r)?;
        e.effect_wager = storage::read_bool(r)?;
        e.parasite = storage::read_bool(r)?;
        set.enablings.push(e);
    }
    Ok(set)
}

fn write_mediator<W: Write, F: Fn(NeuronId) -> u64>(w: &mut W, med: &Mediator, id_of: &F) -> io::Result<()> {
    storage::write_bool(w, med.enabler)?;
    storage::write_bool(w, med.instinct)?;
    write_usize(w, med.level)?;
    storage::write_f64_le(w, med.base_enablement)?;
    storage::write_f64_slice(w, &med.intermediate_enablements)?;
    storage::write_f64_le(w, med.effect_enablement)?;

    storage::write_len(w, med.causes.len())?;
    for &c in &med.causes {
        storage::write_u64_le(w, id_of(c))?;
    }
    storage::write_len(w, med.intermediates.len())?;
    for &i in &med.intermediates {
        storage::write_u64_le(w, id_of(i))?;
    }
    storage::write_opt_u64(w, med.effect.map(id_of))?;

    for slot in &med.pending_enablings {
        storage::write_len(w, slot.len())?;
        for p in slot {
            storage::write_f64_le(w, p.strength)?;
            storage::write_u64_le(w, p.age)?;
            storage::write_u64_le(w, p.cause_begin)?;
            write_events(w, &p.events)?;
        }
    }
    for set in &med.intermediate_enablings {
        write_set(w, set)?;
    }
    write_set(w, &med.effect_enablings)?;
    write_set(w, &med.wagered_enablings)?;

    storage::write_f64_slice(w, &med.timed_wager_weights)?;
    storage::write_f64_le(w, med.utility)?;
    storage::write_u64_le(w, med.cause_begin)
}

// Handles read here hold stable ids until `adopt_neurons` resolves them.
fn read_handle<R: Read>(r: &mut R) -> io::Result<NeuronId> {
    let id = storage::read_u64_le(r)?;
    usize::try_from(id)
        .map(|index| NeuronId::new(index, 0))
        .map_err(|_| invalid("neuron id out of range"))
}

fn read_handles<R: Read>(r: &mut R) -> io::Result<Vec<NeuronId>> {
    let n = storage::read_len(r)?;
    (0..n).map(|_| read_handle(r)).collect()
}

fn read_mediator<R: Read>(r: &mut R) -> io::Result<Mediator> {
    let enabler = storage::read_bool(r)?;
    let instinct = storage::read_bool(r)?;
    let level = read_usize(r)?;
    if level > MAX_MEDIATOR_LEVEL {
        return Err(invalid("mediator level out of range"));
    }
    let base_enablement = storage::read_f64_le(r)?;
    let intermediate_enablements = storage::read_f64_vec(r)?;
    let effect_enablement = storage::read_f64_le(r)?;

    let causes = read_handles(r)?;
    let intermediates = read_handles(r)?;
    let effect = match storage::read_opt_u64(r)? {
        Some(id) => Some(NeuronId::new(
            usize::try_from(id).map_err(|_| invalid("neuron id out of range"))?,
            0,
        )),
        None => None,
    };
    if causes.is_empty() || intermediate_enablements.len() != intermediates.len() {
        return Err(invalid("mediator shape mismatch"));
    }

    let mut pending_enablings = Vec::with_capacity(causes.len());
    for _ in 0..causes.len() {
        let n = storage::read_len(r)?;
        let mut slot = Vec::with_capacity(n.min(1 << 12));
        for _ in 0..n {
            slot.push(PendingEnabling {
                strength: storage::read_f64_le(r)?,
                age: storage::read_u64_le(r)?,
                cause_begin: storage::read_u64_le(r)?,
                events: read_events(r)?,
            });
        }
        pending_enablings.push(slot);
    }
    let mut intermediate_enablings = Vec::with_capacity(intermediates.len());
    for _ in 0..intermediates.len() {
        intermediate_enablings.push(read_set(r)?);
    }
    let effect_enablings = read_set(r)?;
    let wagered_enablings = read_set(r)?;
    let timed_wager_weights = storage::read_f64_vec(r)?;
    let utility = storage::read_f64_le(r)?;
    let cause_begin = storage::read_u64_le(r)?;

    Ok(Mediator {
        causes,
        intermediates,
        effect,
        enabler,
        instinct,
        level,
        base_enablement,
        intermediate_enablements,
        effect_enablement,
        pending_enablings,
        intermediate_enablings,
        effect_enablings,
        wagered_enablings,
        timed_wager_weights,
        utility,
        cause_begin,
    })
}

fn read_neuron_payload<R: Read>(r: &mut R) -> io::Result<Vec<Neuron>> {
    let count = storage::read_len(r)?;
    let mut neurons = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        let id = storage::read_u64_le(r)?;
        let description = storage::read_string(r)?;
        let firing_strength = storage::read_f64_le(r)?;
        let motive = storage::read_f64_le(r)?;
        let goals = ValueSet::from_vec(storage::read_f64_vec(r)?);
        let weight = storage::read_f64_le(r)?;

        let notifies = storage::read_len(r)?;
        let mut notify_list = Vec::with_capacity(notifies.min(1 << 12));
        for _ in 0..notifies {
            let mediator = read_handle(r)?;
            let event_type = EventType::from_code(storage::read_u8(r)?)
                .ok_or_else(|| invalid("bad event type"))?;
            let event_index = read_usize(r)?;
            notify_list.push(Notify {
                mediator,
                event_type,
                event_index,
            });
        }

        let kind = match storage::read_u8(r)? {
            KIND_RECEPTOR => {
                let sensor_mode = read_usize(r)?;
                let n = storage::read_len(r)?;
                let mut pattern = Vec::with_capacity(n.min(1 << 12));
                for _ in 0..n {
                    let defined = storage::read_bool(r)?;
                    let v = storage::read_f32_le(r)?;
                    pattern.push(defined.then_some(v));
                }
                NeuronKind::Receptor(Receptor {
                    pattern,
                    sensor_mode,
                })
            }
            KIND_MOTOR => NeuronKind::Motor(Motor::new(read_usize(r)?)),
            KIND_MEDIATOR => NeuronKind::Mediator(Box::new(read_mediator(r)?)),
            _ => return Err(invalid("bad neuron kind")),
        };

        let num_needs = goals.len();
        let mut neuron = Neuron::new(id, description, num_needs, kind);
        neuron.firing_strength = firing_strength;
        neuron.motive = motive;
        neuron.goals = GoalValue { goals, weight };
        neuron.notify_list = notify_list;
        neurons.push(neuron);
    }
    Ok(neurons)
}

struct IoState {
    sensors: Vec<f32>,
    response: Option<usize>,
    response_override: Option<usize>,
    needs: Vec<f64>,
    old_needs: Vec<f64>,
}

fn read_io_payload<R: Read>(r: &mut R) -> io::Result<IoState> {
    let n = storage::read_len(r)?;
    let mut sensors = Vec::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        sensors.push(storage::read_f32_le(r)?);
    }
    Ok(IoState {
        sensors,
        response: read_opt_usize(r)?,
        response_override: read_opt_usize(r)?,
        needs: storage::read_f64_vec(r)?,
        old_needs: storage::read_f64_vec(r)?,
    })
}

fn read_mode_payload<R: Read>(r: &mut R) -> io::Result<Vec<SensorMode>> {
    let n = storage::read_len(r)?;
    let mut modes = Vec::with_capacity(n.min(1 << 10));
    for _ in 0..n {
        let len = storage::read_len(r)?;
        let mut mask = Vec::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            mask.push(storage::read_bool(r)?);
        }
        let resolution = storage::read_f32_le(r)?;
        modes.push(SensorMode::new(mask, Some(resolution), len).map_err(|e| invalid(&e.to_string()))?);
    }
    Ok(modes)
}

struct Timers {
    intervals: Vec<Vec<Time>>,
    weights: Vec<Vec<f64>>,
    max_learning: Vec<Option<Time>>,
}

fn read_timer_payload<R: Read>(r: &mut R) -> io::Result<Timers> {
    let levels = storage::read_len(r)?;
    let mut timers = Timers {
        intervals: Vec::with_capacity(levels.min(16)),
        weights: Vec::with_capacity(levels.min(16)),
        max_learning: Vec::with_capacity(levels.min(16)),
    };
    for _ in 0..levels {
        let n = storage::read_len(r)?;
        let mut intervals = Vec::with_capacity(n.min(1 << 10));
        for _ in 0..n {
            intervals.push(storage::read_u64_le(r)?);
        }
        let weights = storage::read_f64_vec(r)?;
        if weights.len() != intervals.len() {
            return Err(invalid("TIMR weight count mismatch"));
        }
        timers.intervals.push(intervals);
        timers.weights.push(weights);
        timers.max_learning.push(storage::read_opt_u64(r)?);
    }
    Ok(timers)
}

fn read_learning_payload<R: Read>(r: &mut R) -> io::Result<Vec<Vec<LearningEvent>>> {
    let lists = storage::read_len(r)?;
    let mut out = Vec::with_capacity(lists.min(16));
    for _ in 0..lists {
        let n = storage::read_len(r)?;
        let mut list = Vec::with_capacity(n.min(1 << 12));
        for _ in 0..n {
            list.push(LearningEvent {
                neuron: read_handle(r)?,
                strength: storage::read_f64_le(r)?,
                enablement: storage::read_f64_le(r)?,
                motive: storage::read_f64_le(r)?,
                begin: storage::read_u64_le(r)?,
                timestamp: storage::read_u64_le(r)?,
            });
        }
        out.push(list);
    }
    Ok(out)
}
