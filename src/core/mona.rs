//! The network: neuron arena, needs, clock and the per-cycle pipeline.
//!
//! A cycle runs sense → enable → learn → drive → respond. Enable, drive
//! and learn live in their own modules as further `impl Mona` blocks.

use hashbrown::HashMap;
#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::debug;

use crate::config::{
    Enablement, MonaConfig, Need, Sensor, Time, Weight, MAX_EFFECT_EVENT_INTERVAL, MAX_ENABLEMENT,
    MAX_INTERVALS, MAX_MEDIATOR_CAUSES, MAX_MEDIATOR_LEVEL, MAX_NEED, MIN_MOTIVE,
};
use crate::error::{MonaError, Result};
use crate::learn::LearningEvent;
use crate::neuron::{
    EventType, Mediator, Motor, Neuron, NeuronId, NeuronKind, Notify, Receptor,
};
use crate::prng::Prng;
use crate::sensor::{describe_pattern, SensorMode};
use crate::value_set::ValueSet;

/// Snapshot of network size and budget, for logging and dumps.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Diagnostics {
    pub receptors: usize,
    pub motors: usize,
    pub mediators: usize,
    pub enablings: usize,
    pub base_enablement: Enablement,
    pub event_clock: Time,
}

pub struct Mona {
    pub(crate) cfg: MonaConfig,

    // Arena. Freed slots are reused; `generations[i]` tags the occupant.
    pub(crate) neurons: Vec<Option<Neuron>>,
    pub(crate) generations: Vec<u32>,
    pub(crate) free_slots: Vec<usize>,
    // Live handles by type, in creation order.
    pub(crate) receptors: Vec<NeuronId>,
    pub(crate) motors: Vec<NeuronId>,
    pub(crate) mediators: Vec<NeuronId>,
    pub(crate) id_index: HashMap<u64, NeuronId>,
    pub(crate) id_dispenser: u64,

    pub(crate) sensors: Vec<Sensor>,
    pub(crate) sensor_modes: Vec<SensorMode>,
    pub(crate) response: Option<usize>,
    pub(crate) response_override: Option<usize>,
    pub(crate) needs: ValueSet,
    pub(crate) old_needs: ValueSet,

    // Per level: timer bounds and their weights.
    pub(crate) effect_event_intervals: Vec<Vec<Time>>,
    pub(crate) effect_event_interval_weights: Vec<Vec<Weight>>,
    pub(crate) max_learning_effect_event_intervals: Vec<Option<Time>>,

    pub(crate) event_clock: Time,
    // Index k holds events of level k; mediators of level l record at l+1.
    pub(crate) learning_events: Vec<Vec<LearningEvent>>,
    pub(crate) rng: Prng,
}

impl Mona {
    pub fn new(cfg: MonaConfig) -> Result<Self> {
        cfg.validate()?;
        let levels = MAX_MEDIATOR_LEVEL + 1;
        let mut mona = Self {
            cfg,
            neurons: Vec::new(),
            generations: Vec::new(),
            free_slots: Vec::new(),
            receptors: Vec::new(),
            motors: Vec::new(),
            mediators: Vec::new(),
            id_index: HashMap::new(),
            id_dispenser: 0,
            sensors: vec![0.0; cfg.num_sensors],
            sensor_modes: vec![SensorMode::all(cfg.num_sensors)],
            response: None,
            response_override: None,
            needs: ValueSet::zeros(cfg.num_needs),
            old_needs: ValueSet::zeros(cfg.num_needs),
            effect_event_intervals: (0..levels).map(|l| vec![1 << l]).collect(),
            effect_event_interval_weights: vec![vec![1.0]; levels],
            max_learning_effect_event_intervals: vec![None; levels],
            event_clock: 0,
            learning_events: vec![Vec::new(); MAX_MEDIATOR_LEVEL + 2],
            rng: Prng::new(cfg.effective_seed()),
        };
        for response in 0..cfg.num_responses {
            mona.insert_neuron(
                format!("Response {response}"),
                NeuronKind::Motor(Motor::new(response)),
            );
        }
        Ok(mona)
    }

    // ---- accessors -------------------------------------------------------

    pub fn config(&self) -> &MonaConfig {
        &self.cfg
    }

    pub fn event_clock(&self) -> Time {
        self.event_clock
    }

    pub fn needs(&self) -> &[Need] {
        self.needs.as_slice()
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn response(&self) -> Option<usize> {
        self.response
    }

    pub fn response_override(&self) -> Option<usize> {
        self.response_override
    }

    pub fn sensor_modes(&self) -> &[SensorMode] {
        &self.sensor_modes
    }

    pub fn receptors(&self) -> &[NeuronId] {
        &self.receptors
    }

    pub fn motors(&self) -> &[NeuronId] {
        &self.motors
    }

    pub fn mediators(&self) -> &[NeuronId] {
        &self.mediators
    }

    pub fn effect_event_intervals(&self, level: usize) -> &[Time] {
        &self.effect_event_intervals[level]
    }

    pub fn effect_event_interval_weights(&self, level: usize) -> &[Weight] {
        &self.effect_event_interval_weights[level]
    }

    pub fn learning_events(&self, level: usize) -> &[LearningEvent] {
        &self.learning_events[level]
    }

    /// Look up a live neuron.
    pub fn get(&self, id: NeuronId) -> Option<&Neuron> {
        if self.generations.get(id.index) != Some(&id.generation) {
            return None;
        }
        self.neurons.get(id.index).and_then(Option::as_ref)
    }

    /// Number of arena slots, live or free.
    pub fn arena_len(&self) -> usize {
        self.neurons.len()
    }

    /// Resolve a stable neuron id to its handle.
    pub fn find(&self, id: u64) -> Option<NeuronId> {
        self.id_index.get(&id).copied()
    }

    pub fn motor(&self, response: usize) -> Option<NeuronId> {
        self.motors.iter().copied().find(|&m| {
            self.neuron(m)
                .as_motor()
                .is_some_and(|motor| motor.response == response)
        })
    }

    pub fn drive_visits(&self, id: NeuronId) -> u32 {
        self.get(id).map_or(0, |n| n.drive_visits)
    }

    pub fn max_motive(&self) -> f64 {
        self.cfg.num_needs as f64 * MAX_NEED
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut enablings = 0;
        let mut base_enablement = 0.0;
        for &m in &self.mediators {
            let med = self.mediator(m);
            enablings += med.enabling_count();
            base_enablement += med.base_enablement;
        }
        Diagnostics {
            receptors: self.receptors.len(),
            motors: self.motors.len(),
            mediators: self.mediators.len(),
            enablings,
            base_enablement,
            event_clock: self.event_clock,
        }
    }

    // ---- arena -----------------------------------------------------------

    pub(crate) fn neuron(&self, id: NeuronId) -> &Neuron {
        match self.get(id) {
            Some(n) => n,
            None => panic!("dangling neuron handle {id:?}"),
        }
    }

    pub(crate) fn neuron_mut(&mut self, id: NeuronId) -> &mut Neuron {
        let live = self.generations.get(id.index) == Some(&id.generation);
        match self.neurons.get_mut(id.index).and_then(Option::as_mut) {
            Some(n) if live => n,
            _ => panic!("dangling neuron handle {id:?}"),
        }
    }

    pub(crate) fn mediator(&self, id: NeuronId) -> &Mediator {
        match self.neuron(id).as_mediator() {
            Some(m) => m,
            None => panic!("neuron {id:?} is not a mediator"),
        }
    }

    pub(crate) fn mediator_mut(&mut self, id: NeuronId) -> &mut Mediator {
        match self.neuron_mut(id).as_mediator_mut() {
            Some(m) => m,
            None => panic!("neuron {id:?} is not a mediator"),
        }
    }

    pub(crate) fn is_live(&self, id: NeuronId) -> bool {
        self.get(id).is_some()
    }

    fn insert_neuron(&mut self, description: String, kind: NeuronKind) -> NeuronId {
        let handle = match self.free_slots.pop() {
            Some(index) => NeuronId::new(index, self.generations[index]),
            None => {
                self.neurons.push(None);
                self.generations.push(0);
                NeuronId::new(self.neurons.len() - 1, 0)
            }
        };
        let id = self.id_dispenser;
        self.id_dispenser += 1;
        let neuron = Neuron::new(id, description, self.cfg.num_needs, kind);
        match neuron.kind {
            NeuronKind::Receptor(_) => self.receptors.push(handle),
            NeuronKind::Motor(_) => self.motors.push(handle),
            NeuronKind::Mediator(_) => self.mediators.push(handle),
        }
        self.neurons[handle.index] = Some(neuron);
        self.id_index.insert(id, handle);
        handle
    }

    pub(crate) fn find_receptor(&self, pattern: &[Option<Sensor>], mode: usize) -> Option<NeuronId> {
        self.receptors.iter().copied().find(|&r| {
            self.neuron(r)
                .as_receptor()
                .is_some_and(|rec| rec.is_duplicate(pattern, mode))
        })
    }

    pub(crate) fn create_receptor(&mut self, pattern: Vec<Option<Sensor>>, mode: usize) -> NeuronId {
        let description = format!("[{}]/{mode}", describe_pattern(&pattern));
        let id = self.insert_neuron(
            description,
            NeuronKind::Receptor(Receptor {
                pattern,
                sensor_mode: mode,
            }),
        );
        debug!(receptor = self.neuron(id).id, "receptor created");
        id
    }

    /// Assemble an unlinked mediator over the given components.
    pub(crate) fn build_mediator(
        &self,
        causes: &[NeuronId],
        intermediates: &[NeuronId],
        effect: NeuronId,
        enabler: bool,
        enablement: Enablement,
        utility: Weight,
    ) -> Mediator {
        let level = causes
            .iter()
            .chain(intermediates)
            .chain(std::iter::once(&effect))
            .filter_map(|&c| self.neuron(c).level())
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        let weights = &self.effect_event_interval_weights[level.min(MAX_MEDIATOR_LEVEL)];
        let mut med = Mediator::new(enablement, enabler, utility, weights.len());
        med.level = level;
        let sum: Weight = weights.iter().sum();
        if sum > 0.0 {
            med.timed_wager_weights = weights.iter().map(|w| w / sum).collect();
        }
        med.causes = causes.to_vec();
        med.pending_enablings = vec![Vec::new(); causes.len()];
        med.intermediates = intermediates.to_vec();
        med.intermediate_enablements = vec![enablement; intermediates.len()];
        med.intermediate_enablings = vec![Default::default(); intermediates.len()];
        med.effect = Some(effect);
        med
    }

    pub(crate) fn find_duplicate_mediator(&self, candidate: &Mediator) -> Option<NeuronId> {
        self.mediators
            .iter()
            .copied()
            .find(|&m| self.mediator(m).is_duplicate(candidate))
    }

    /// Put a built mediator into the arena and register it with its components.
    pub(crate) fn link_mediator(&mut self, med: Mediator) -> NeuronId {
        let components: Vec<(EventType, usize, NeuronId)> = med.components().collect();
        let description = {
            let name = |n: NeuronId| self.neuron(n).id.to_string();
            let causes: Vec<String> = med.causes.iter().map(|&c| name(c)).collect();
            let mut d = format!("({})", causes.join(" "));
            for &i in &med.intermediates {
                d.push_str(&format!(" > {}", name(i)));
            }
            if let Some(e) = med.effect {
                d.push_str(&format!(" -> {}", name(e)));
            }
            if !med.enabler {
                d.push_str(" (disabler)");
            }
            d
        };
        let id = self.insert_neuron(description, NeuronKind::Mediator(Box::new(med)));
        for (event_type, event_index, component) in components {
            self.neuron_mut(component).add_notify(Notify {
                mediator: id,
                event_type,
                event_index,
            });
        }
        id
    }

    /// Delete a neuron: parents first, then unlink from components.
    pub(crate) fn delete_neuron(&mut self, id: NeuronId) {
        if !self.is_live(id) {
            return;
        }
        assert!(!self.neuron(id).is_motor(), "motors cannot be deleted");

        let mut parents: Vec<NeuronId> =
            self.neuron(id).notify_list.iter().map(|n| n.mediator).collect();
        parents.dedup();
        for parent in parents {
            self.delete_neuron(parent);
        }

        let components: Vec<NeuronId> = match self.neuron(id).as_mediator() {
            Some(m) => m.components().map(|(_, _, c)| c).collect(),
            None => Vec::new(),
        };
        for c in components {
            if self.is_live(c) {
                self.neuron_mut(c).remove_notify(id);
            }
        }

        for list in &mut self.learning_events {
            list.retain(|e| e.neuron != id);
        }
        let stable = self.neuron(id).id;
        self.receptors.retain(|&n| n != id);
        self.mediators.retain(|&n| n != id);
        self.id_index.remove(&stable);
        self.neurons[id.index] = None;
        self.generations[id.index] = self.generations[id.index].wrapping_add(1);
        self.free_slots.push(id.index);
        debug!(neuron = stable, "neuron deleted");
    }

    // ---- configuration -----------------------------------------------------

    pub fn set_need(&mut self, index: usize, value: Need) -> Result<()> {
        self.check_need(index)?;
        self.needs.set(index, value);
        Ok(())
    }

    pub fn need(&self, index: usize) -> Result<Need> {
        self.check_need(index)?;
        Ok(self.needs.get(index))
    }

    fn check_need(&self, index: usize) -> Result<()> {
        if index >= self.cfg.num_needs {
            return Err(MonaError::InvalidNeed {
                index,
                num_needs: self.cfg.num_needs,
            });
        }
        Ok(())
    }

    fn check_level(level: usize) -> Result<()> {
        if level > MAX_MEDIATOR_LEVEL {
            return Err(MonaError::InvalidLevel {
                level,
                max: MAX_MEDIATOR_LEVEL,
            });
        }
        Ok(())
    }

    fn check_mode(&self, mode: usize) -> Result<()> {
        if mode >= self.sensor_modes.len() {
            return Err(MonaError::InvalidSensorMode {
                mode,
                count: self.sensor_modes.len(),
            });
        }
        Ok(())
    }

    fn check_sensors(&self, sensors: &[Sensor]) -> Result<()> {
        if sensors.len() != self.cfg.num_sensors {
            return Err(MonaError::SensorCount {
                expected: self.cfg.num_sensors,
                got: sensors.len(),
            });
        }
        if let Some(index) = sensors.iter().position(|s| !s.is_finite()) {
            return Err(MonaError::NonFiniteSensor { index });
        }
        Ok(())
    }

    fn check_response(&self, response: usize) -> Result<()> {
        if response >= self.cfg.num_responses {
            return Err(MonaError::InvalidResponse {
                response,
                num_responses: self.cfg.num_responses,
            });
        }
        Ok(())
    }

    /// Add a sensor mode and return its index.
    pub fn add_sensor_mode(&mut self, mask: Vec<bool>, resolution: Option<Sensor>) -> Result<usize> {
        let mode = SensorMode::new(mask, resolution, self.cfg.num_sensors)?;
        if let Some(i) = self.sensor_modes.iter().position(|m| *m == mode) {
            return Ok(i);
        }
        self.sensor_modes.push(mode);
        Ok(self.sensor_modes.len() - 1)
    }

    /// Resize the timer count. All levels share it; weights reset to uniform.
    pub fn set_effect_event_intervals(&mut self, level: usize, count: usize) -> Result<()> {
        Self::check_level(level)?;
        if count == 0 || count > MAX_INTERVALS {
            return Err(MonaError::InvalidIntervalCount(count));
        }
        for (l, intervals) in self.effect_event_intervals.iter_mut().enumerate() {
            if l == level {
                *intervals = vec![1 << l; count];
            } else {
                intervals.resize(count, 1 << l);
            }
        }
        self.init_effect_event_interval_weights();
        Ok(())
    }

    pub fn set_effect_event_interval(
        &mut self,
        level: usize,
        index: usize,
        value: Time,
        weight: Weight,
    ) -> Result<()> {
        Self::check_level(level)?;
        let count = self.effect_event_intervals[level].len();
        if index >= count {
            return Err(MonaError::InvalidIntervalIndex { level, index, count });
        }
        if !(1..=MAX_EFFECT_EVENT_INTERVAL).contains(&value) {
            return Err(MonaError::InvalidInterval(format!(
                "interval {value} not in 1..={MAX_EFFECT_EVENT_INTERVAL}"
            )));
        }
        if !(weight >= 0.0) {
            return Err(MonaError::InvalidInterval(format!(
                "weight {weight} must be >= 0"
            )));
        }
        self.effect_event_intervals[level][index] = value;
        self.effect_event_interval_weights[level][index] = weight;
        Ok(())
    }

    pub fn set_max_learning_effect_event_interval(&mut self, level: usize, value: Time) -> Result<()> {
        Self::check_level(level)?;
        if value > MAX_EFFECT_EVENT_INTERVAL {
            return Err(MonaError::InvalidInterval(format!(
                "maximum learning interval {value} exceeds {MAX_EFFECT_EVENT_INTERVAL}"
            )));
        }
        self.max_learning_effect_event_intervals[level] = Some(value);
        Ok(())
    }

    fn init_effect_event_interval_weights(&mut self) {
        let count = self.effect_event_intervals[0].len();
        for weights in &mut self.effect_event_interval_weights {
            *weights = vec![1.0 / count as Weight; count];
        }
        for i in 0..self.mediators.len() {
            let m = self.mediators[i];
            let med = self.mediator_mut(m);
            med.timed_wager_weights = vec![1.0 / count as Weight; count];
            med.for_each_enabling_mut(|e| e.timer_index = e.timer_index.min(count - 1));
        }
    }

    /// Find or create the receptor for `sensors` seen through `mode`.
    pub fn add_receptor(&mut self, sensors: &[Sensor], mode: usize) -> Result<NeuronId> {
        self.check_sensors(sensors)?;
        self.check_mode(mode)?;
        let pattern = self.sensor_modes[mode].quantize(sensors);
        Ok(match self.find_receptor(&pattern, mode) {
            Some(r) => r,
            None => self.create_receptor(pattern, mode),
        })
    }

    /// Attach a goal value for `need`.
    ///
    /// Without a response the goal sits on the receptor for the sensed
    /// pattern. With a response it sits on an instinct mediator linking that
    /// receptor to the response's motor. Returns the goal neuron's id.
    pub fn add_goal(
        &mut self,
        need: usize,
        sensors: &[Sensor],
        mode: usize,
        response: Option<usize>,
        value: Need,
    ) -> Result<u64> {
        self.check_need(need)?;
        self.check_sensors(sensors)?;
        self.check_mode(mode)?;
        if let Some(r) = response {
            self.check_response(r)?;
        }

        let receptor = self.add_receptor(sensors, mode)?;
        let target = match response {
            None => receptor,
            Some(r) => {
                let motor = self.motor(r).ok_or(MonaError::InvalidResponse {
                    response: r,
                    num_responses: self.cfg.num_responses,
                })?;
                let candidate =
                    self.build_mediator(&[receptor], &[], motor, true, MAX_ENABLEMENT, MAX_ENABLEMENT);
                let m = match self.find_duplicate_mediator(&candidate) {
                    Some(m) => m,
                    None => self.link_mediator(candidate),
                };
                self.mediator_mut(m).instinct = true;
                m
            }
        };
        self.neuron_mut(target).goals.set_goal(need, value);
        Ok(self.neuron(target).id)
    }

    /// Add an instinct mediator over existing neurons.
    pub fn add_mediator(
        &mut self,
        causes: &[NeuronId],
        intermediates: &[NeuronId],
        effect: NeuronId,
        enabler: bool,
        enablement: Enablement,
    ) -> Result<NeuronId> {
        if causes.is_empty() || causes.len() > MAX_MEDIATOR_CAUSES {
            return Err(MonaError::InvalidMediator(format!(
                "{} causes (expected 1..={MAX_MEDIATOR_CAUSES})",
                causes.len()
            )));
        }
        for &n in causes.iter().chain(intermediates).chain(std::iter::once(&effect)) {
            if !self.is_live(n) {
                return Err(MonaError::InvalidMediator(format!("unknown neuron handle {}", n.index)));
            }
        }
        if !(0.0..=MAX_ENABLEMENT).contains(&enablement) {
            return Err(MonaError::InvalidMediator(format!(
                "enablement {enablement} not in [0,{MAX_ENABLEMENT}]"
            )));
        }
        let mut med = self.build_mediator(causes, intermediates, effect, enabler, enablement, enablement);
        Self::check_level(med.level)?;
        if self.find_duplicate_mediator(&med).is_some() {
            return Err(MonaError::InvalidMediator("duplicate mediator".into()));
        }
        med.instinct = true;
        Ok(self.link_mediator(med))
    }

    /// Force the next response. Cleared after one cycle.
    pub fn override_response(&mut self, response: Option<usize>) -> Result<()> {
        if let Some(r) = response {
            self.check_response(r)?;
        }
        self.response_override = response;
        Ok(())
    }

    // ---- cycle -----------------------------------------------------------

    /// Run one sense/enable/learn/drive/respond cycle.
    pub fn cycle(&mut self, sensors: &[Sensor]) -> Result<Option<usize>> {
        self.check_sensors(sensors)?;
        self.sensors.copy_from_slice(sensors);

        self.sense();
        self.enable();
        self.learn();
        self.drive();
        self.respond();

        self.old_needs.load(&self.needs);
        self.response_override = None;
        Ok(self.response)
    }

    pub(crate) fn sense(&mut self) {
        let num_sensors = self.cfg.num_sensors as f64;
        for i in 0..self.receptors.len() {
            let r = self.receptors[i];
            let strength = {
                let Some(rec) = self.neuron(r).as_receptor() else {
                    continue;
                };
                let sensed = self.sensor_modes[rec.sensor_mode].quantize(&self.sensors);
                let mismatch = rec
                    .pattern
                    .iter()
                    .zip(&sensed)
                    .any(|(want, got)| want.is_some() && want != got);
                if mismatch {
                    0.0
                } else {
                    rec.defined_sensors() as f64 / num_sensors
                }
            };
            self.neuron_mut(r).firing_strength = strength;
        }
    }

    pub(crate) fn respond(&mut self) {
        let mut potentials = vec![0.0; self.cfg.num_responses];
        for &m in &self.motors {
            let n = self.neuron(m);
            if let Some(motor) = n.as_motor() {
                potentials[motor.response] += n.motive;
            }
        }

        let min = potentials.iter().copied().fold(f64::INFINITY, f64::min);
        potentials.iter_mut().for_each(|p| *p -= min);
        let sum: f64 = potentials.iter().sum();
        if sum > 0.0 {
            potentials.iter_mut().for_each(|p| *p /= sum);
        }
        let randomness = self.cfg.response_randomness;
        for p in &mut potentials {
            *p = *p * (1.0 - randomness) + self.rng.next_f64_01() * randomness;
        }

        let mut chosen = 0;
        for (i, &p) in potentials.iter().enumerate() {
            if p > potentials[chosen] {
                chosen = i;
            }
        }
        if let Some(o) = self.response_override {
            chosen = o;
        }

        for i in 0..self.motors.len() {
            let m = self.motors[i];
            let selected = self
                .neuron(m)
                .as_motor()
                .is_some_and(|motor| motor.response == chosen);
            if selected {
                self.neuron_mut(m).firing_strength = 1.0;
            } else {
                self.neuron_mut(m).firing_strength = 0.0;
                self.expire_motor_enabling(m);
            }
        }
        self.response = Some(chosen);
    }

    // ---- memory ----------------------------------------------------------

    /// Drop all in-flight state; learned structure is kept.
    pub fn clear_working_memory(&mut self) {
        for n in self.neurons.iter_mut().flatten() {
            n.firing_strength = 0.0;
            n.motive = MIN_MOTIVE;
        }
        for i in 0..self.mediators.len() {
            let m = self.mediators[i];
            self.expire_enablings(m, true);
        }
        for list in &mut self.learning_events {
            list.clear();
        }
        self.event_clock = 0;
    }

    /// Drop learned mediators and unreferenced goal-less receptors.
    pub fn clear_long_term_memory(&mut self) {
        let learned: Vec<NeuronId> = self
            .mediators
            .iter()
            .copied()
            .filter(|&m| !self.is_instinct(m))
            .collect();
        for m in learned {
            self.delete_neuron(m);
        }
        let idle: Vec<NeuronId> = self
            .receptors
            .iter()
            .copied()
            .filter(|&r| {
                let n = self.neuron(r);
                n.notify_list.is_empty() && !n.goals.is_active()
            })
            .collect();
        for r in idle {
            self.delete_neuron(r);
        }
        self.clear_working_memory();
    }
}

pub(crate) fn timer_at(timers: &[Time], index: usize) -> Time {
    match timers.get(index) {
        Some(&t) => t,
        None => timers.last().copied().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NEARLY_ZERO;

    fn quiet(sensors: usize, responses: usize, needs: usize) -> Mona {
        Mona::new(
            MonaConfig::new(sensors, responses, needs)
                .with_seed(7)
                .with_response_randomness(0.0)
                .without_learning(),
        )
        .unwrap()
    }

    fn budget(mona: &Mona, m: NeuronId) -> f64 {
        mona.mediator(m).total_enablement()
    }

    #[test]
    fn construction_creates_motors() {
        let mona = quiet(2, 3, 1);
        assert_eq!(mona.motors().len(), 3);
        assert!(mona.receptors().is_empty());
        assert!(mona.motor(2).is_some());
        assert!(mona.motor(3).is_none());
        assert_eq!(mona.effect_event_intervals(0), &[1]);
        assert_eq!(mona.effect_event_intervals(1), &[2]);
        assert!(Mona::new(MonaConfig::new(0, 1, 1)).is_err());
    }

    #[test]
    fn setters_validate_before_mutating() {
        let mut mona = quiet(1, 1, 2);
        assert!(matches!(
            mona.set_need(2, 1.0),
            Err(MonaError::InvalidNeed { index: 2, num_needs: 2 })
        ));
        mona.set_need(1, 3.0).unwrap();
        assert_eq!(mona.needs(), &[0.0, 3.0]);

        assert!(mona.set_effect_event_intervals(2, 1).is_err());
        assert!(mona.set_effect_event_intervals(0, 0).is_err());
        assert!(mona.set_effect_event_intervals(0, 101).is_err());
        mona.set_effect_event_intervals(0, 3).unwrap();
        assert_eq!(mona.effect_event_intervals(0), &[1, 1, 1]);
        assert_eq!(mona.effect_event_intervals(1).len(), 3);
        assert!((mona.effect_event_interval_weights(1)[0] - 1.0 / 3.0).abs() < 1e-12);

        assert!(mona.set_effect_event_interval(0, 3, 4, 0.5).is_err());
        assert!(mona.set_effect_event_interval(0, 1, 4, -0.5).is_err());
        mona.set_effect_event_interval(0, 1, 4, 0.5).unwrap();
        assert_eq!(mona.effect_event_intervals(0), &[1, 4, 1]);

        assert!(mona.override_response(Some(1)).is_err());
        assert!(mona.cycle(&[0.0, 1.0]).is_err());
        assert!(mona.add_goal(0, &[1.0], 1, None, 1.0).is_err());
        assert!(mona.add_sensor_mode(vec![true, false], None).is_err());
    }

    #[test]
    fn single_cause_wager_appears_after_firing() {
        let mut mona = quiet(1, 2, 1);
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m1 = mona.motor(1).unwrap();
        let med = mona.add_mediator(&[r], &[], m1, true, MAX_ENABLEMENT).unwrap();

        mona.cycle(&[1.0]).unwrap();
        assert!(!mona.mediator(med).wagered_enablings.is_empty());
        let e = &mona.mediator(med).wagered_enablings.enablings[0];
        assert_eq!(e.effect_begin, Some(0));
        assert_eq!(e.events.len(), 1);
        assert_eq!(e.events[0].id, mona.neuron(r).id);
    }

    #[test]
    fn goal_drives_linked_motor() {
        let mut mona = quiet(1, 2, 1);
        mona.set_need(0, 5.0).unwrap();
        // Instinct: sensing [1] then responding 1 satisfies need 0.
        let goal = mona.add_goal(0, &[1.0], 0, Some(1), 1.0).unwrap();
        let goal = mona.find(goal).unwrap();
        assert!(mona.mediator(goal).instinct);

        assert_eq!(mona.cycle(&[1.0]).unwrap(), Some(1));
        let m1 = mona.motor(1).unwrap();
        let m0 = mona.motor(0).unwrap();
        assert!(mona.neuron(m1).motive > mona.neuron(m0).motive);
    }

    #[test]
    fn goal_on_effect_drives_intermediate_response() {
        let mut mona = quiet(1, 2, 1);
        mona.set_need(0, 5.0).unwrap();
        let s = mona.add_receptor(&[1.0], 0).unwrap();
        let g = mona.add_goal(0, &[2.0], 0, None, 1.0).unwrap();
        let g = mona.find(g).unwrap();
        let m1 = mona.motor(1).unwrap();
        mona.add_mediator(&[s], &[m1], g, true, MAX_ENABLEMENT).unwrap();

        assert_eq!(mona.cycle(&[1.0]).unwrap(), Some(1));
        assert!(mona.neuron(m1).drive_visits > 0);
    }

    #[test]
    fn motor_drive_is_terminal() {
        let mut mona = quiet(1, 1, 1);
        mona.set_need(0, 5.0).unwrap();
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let med = mona.add_mediator(&[r], &[], m0, true, MAX_ENABLEMENT).unwrap();
        // Goal on the motor itself.
        mona.neuron_mut(m0).goals.set_goal(0, 1.0);

        mona.cycle(&[1.0]).unwrap();
        assert_eq!(mona.drive_visits(m0), 1);
        assert_eq!(mona.drive_visits(med), 0);
        assert_eq!(mona.drive_visits(r), 0);
    }

    #[test]
    fn override_is_single_use() {
        let mut mona = quiet(1, 3, 1);
        mona.override_response(Some(2)).unwrap();
        assert_eq!(mona.response_override(), Some(2));
        assert_eq!(mona.cycle(&[0.0]).unwrap(), Some(2));
        assert_eq!(mona.response_override(), None);
        assert_eq!(mona.cycle(&[0.0]).unwrap(), Some(0));

        for _ in 0..3 {
            mona.override_response(Some(1)).unwrap();
            assert_eq!(mona.cycle(&[0.0]).unwrap(), Some(1));
        }
    }

    #[test]
    fn enablement_is_conserved_between_payouts() {
        let mut mona = Mona::new(MonaConfig::new(1, 2, 1).with_seed(3)).unwrap();
        mona.set_need(0, 4.0).unwrap();
        mona.add_goal(0, &[1.0], 0, Some(0), 1.0).unwrap();
        let inputs = [1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        for (step, &s) in inputs.iter().cycle().take(40).enumerate() {
            let before: Vec<(NeuronId, f64)> = mona
                .mediators()
                .iter()
                .map(|&m| (m, budget(&mona, m)))
                .collect();
            mona.sensors[0] = s;
            mona.sense();
            mona.enable();
            for (m, total) in before {
                let now = budget(&mona, m);
                assert!(
                    (now - total).abs() < 1e-9 + NEARLY_ZERO,
                    "step {step}: {total} -> {now}"
                );
            }
            mona.learn();
            mona.drive();
            mona.respond();
        }
    }

    #[test]
    fn clear_working_memory_restores_base() {
        let mut mona = quiet(1, 2, 1);
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m1 = mona.motor(1).unwrap();
        let med = mona.add_mediator(&[r], &[], m1, true, 0.8).unwrap();
        mona.cycle(&[1.0]).unwrap();
        let total = mona.mediator(med).total_enablement();
        mona.clear_working_memory();
        let m = mona.mediator(med);
        assert_eq!(m.enabling_count(), 0);
        assert!((m.base_enablement - total).abs() < 1e-12);
        assert_eq!(mona.event_clock(), 0);
    }

    #[test]
    fn delete_removes_parents_and_links() {
        let mut mona = quiet(1, 1, 1);
        let a = mona.add_receptor(&[1.0], 0).unwrap();
        let b = mona.add_receptor(&[2.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let low = mona.add_mediator(&[a], &[], b, true, 0.5).unwrap();
        let high = mona.add_mediator(&[low], &[], m0, true, 0.5).unwrap();
        assert_eq!(mona.mediator(high).level, 1);
        assert!(mona.add_mediator(&[a], &[], b, true, 0.5).is_err());

        mona.delete_neuron(a);
        assert!(!mona.is_live(low));
        assert!(!mona.is_live(high));
        assert!(mona.neuron(b).notify_list.is_empty());
        assert!(mona.neuron(m0).notify_list.is_empty());
        assert!(mona.mediators().is_empty());
        assert_eq!(mona.receptors(), &[b]);
    }

    #[test]
    fn clear_long_term_memory_keeps_goals_and_instincts() {
        let mut mona = Mona::new(MonaConfig::new(1, 2, 1).with_seed(11)).unwrap();
        mona.set_need(0, 2.0).unwrap();
        mona.add_goal(0, &[1.0], 0, Some(1), 1.0).unwrap();
        for i in 0..30 {
            mona.cycle(&[(i % 3) as f32]).unwrap();
        }
        mona.clear_long_term_memory();
        assert!(mona
            .mediators()
            .iter()
            .all(|&m| mona.mediator(m).instinct));
        assert_eq!(mona.mediators().len(), 1);
        assert_eq!(mona.receptors().len(), 1);
        assert_eq!(mona.event_clock(), 0);
    }

    #[test]
    fn sensing_honours_modes() {
        let mut mona = quiet(2, 1, 1);
        let partial = mona.add_sensor_mode(vec![true, false], None).unwrap();
        let exact = mona.add_receptor(&[1.0, 0.0], 0).unwrap();
        let loose = mona.add_receptor(&[1.0, 0.0], partial).unwrap();
        mona.sensors.copy_from_slice(&[1.0, 5.0]);
        mona.sense();
        assert_eq!(mona.neuron(exact).firing_strength, 0.0);
        assert_eq!(mona.neuron(loose).firing_strength, 0.5);
        mona.sensors.copy_from_slice(&[1.0, 0.0]);
        mona.sense();
        assert_eq!(mona.neuron(exact).firing_strength, 1.0);
    }

    #[test]
    fn deleted_slots_are_reused_with_a_new_generation() {
        let mut mona = quiet(1, 1, 1);
        let a = mona.add_receptor(&[1.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let med = mona.add_mediator(&[a], &[], m0, true, 0.5).unwrap();
        let slots = mona.arena_len();

        mona.delete_neuron(med);
        assert!(mona.get(med).is_none());
        let b = mona.add_receptor(&[2.0], 0).unwrap();
        assert_eq!(b.index(), med.index());
        assert_ne!(b, med);
        assert!(mona.get(med).is_none());
        assert!(mona.get(b).is_some());
        assert_eq!(mona.arena_len(), slots);
    }

    #[test]
    fn intervals_out_of_range_are_rejected() {
        let mut mona = Mona::new(MonaConfig::new(1, 1, 1).with_seed(3)).unwrap();
        assert!(matches!(
            mona.set_effect_event_interval(0, 0, Time::MAX, 1.0),
            Err(MonaError::InvalidInterval(_))
        ));
        assert!(mona.set_effect_event_interval(0, 0, 0, 1.0).is_err());
        assert!(mona
            .set_max_learning_effect_event_interval(0, MAX_EFFECT_EVENT_INTERVAL + 1)
            .is_err());
        assert_eq!(mona.effect_event_intervals(0), &[1]);

        // The largest accepted interval still cycles.
        mona.set_effect_event_interval(0, 0, MAX_EFFECT_EVENT_INTERVAL, 1.0).unwrap();
        for i in 0..5 {
            mona.cycle(&[(i % 2) as f32]).unwrap();
        }
    }

    #[test]
    fn non_finite_sensors_are_rejected() {
        let mut mona = Mona::new(MonaConfig::new(2, 1, 1).with_seed(3)).unwrap();
        mona.cycle(&[1.0, 0.0]).unwrap();
        let receptors = mona.receptors().len();
        let clock = mona.event_clock();
        assert!(matches!(
            mona.cycle(&[f32::NAN, 0.0]),
            Err(MonaError::NonFiniteSensor { index: 0 })
        ));
        assert!(matches!(
            mona.cycle(&[0.0, f32::INFINITY]),
            Err(MonaError::NonFiniteSensor { index: 1 })
        ));
        assert!(mona.add_receptor(&[f32::NAN, 0.0], 0).is_err());
        assert_eq!(mona.receptors().len(), receptors);
        assert_eq!(mona.event_clock(), clock);
    }
}
