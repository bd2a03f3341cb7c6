//! Learn phase: mediator creation, wager settlement, expiry and pruning.

use tracing::debug;

use crate::config::{
    Enablement, Motive, Time, Weight, ENABLEMENT_LEARNING_DAMPER, EXPIRATION_WEIGHT,
    MAX_ENABLEMENT, MAX_MEDIATOR_EVENTS, MAX_MEDIATOR_LEVEL, MIN_ENABLEMENT, MIN_MOTIVE,
    MIN_WAGER_WEIGHT, MOTIVE_LEARNING_DAMPER, NEARLY_ZERO, NEW_ENABLEMENT,
    RESPONSE_EXPIRATION_WEIGHT, STRENGTH_LEARNING_DAMPER, WAGER_HISTORY_UPDATE_VELOCITY,
};
use crate::enabling::EnablingSet;
use crate::mona::{timer_at, Mona};
use crate::neuron::{EventType, Mediator, NeuronId, NeuronKind};

/// A significant firing (or motive) remembered for mediator creation.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningEvent {
    pub neuron: NeuronId,
    pub strength: Weight,
    // Wagered enablement of mediators predicting this neuron.
    pub enablement: Enablement,
    pub motive: Motive,
    pub begin: Time,
    pub timestamp: Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WagerOutcome {
    Fire,
    Expire,
}

/// Move `enablement` toward the outcome's target in proportion to `weight`.
pub fn wager_enablement(outcome: WagerOutcome, enablement: Enablement, weight: Weight) -> Enablement {
    let target = match outcome {
        WagerOutcome::Fire => MAX_ENABLEMENT,
        WagerOutcome::Expire => MIN_ENABLEMENT,
    };
    enablement + (target - enablement) * (weight / MAX_ENABLEMENT) * WAGER_HISTORY_UPDATE_VELOCITY
}

fn motive_factor(motive: Motive, max_motive: Motive) -> Weight {
    if motive < max_motive {
        motive / max_motive
    } else {
        1.0
    }
}

// Rescale the budget after a payout; every slot enablement follows.
fn rebase(med: &mut Mediator, outcome: WagerOutcome, weight: Weight) {
    let update = wager_enablement(outcome, med.total_enablement(), weight);
    med.base_enablement = update - med.enablement_out();
    med.set_slot_enablements(update);
}

// Fraction of effect wagers the current firing pays.
fn wager_transfer(med: &Mediator, firing: Weight) -> Weight {
    let wagered: Enablement = med
        .wagered_enablings
        .iter()
        .filter(|e| !e.new_in_set && e.effect_wager)
        .map(|e| e.value)
        .sum();
    if firing >= wagered {
        1.0
    } else if wagered > 0.0 {
        firing / wagered
    } else {
        0.0
    }
}

impl Mona {
    pub(crate) fn learn(&mut self) {
        self.purge_learning_events();

        if self.cfg.learning_enabled {
            self.create_receptors();
            self.record_learning_events();

            let clock = self.event_clock;
            for level in 0..self.learning_events.len() - 1 {
                let effects: Vec<LearningEvent> = self.learning_events[level]
                    .iter()
                    .filter(|e| e.timestamp == clock && e.motive > 0.0)
                    .cloned()
                    .collect();
                for effect in effects {
                    if self.is_live(effect.neuron) && !self.neuron(effect.neuron).is_motor() {
                        self.create_mediator(&effect);
                    }
                }
            }
        }

        for i in 0..self.mediators.len() {
            let m = self.mediators[i];
            self.mark_parasitic_wagers(m);
        }
        for i in 0..self.mediators.len() {
            let m = self.mediators[i];
            self.pay_wagers(m);
        }
        for i in 0..self.mediators.len() {
            let m = self.mediators[i];
            self.expire_enablings(m, false);
        }

        while self.mediators.len() > self.cfg.max_mediators {
            match self.worst_mediator() {
                Some(m) => self.delete_neuron(m),
                None => break,
            }
        }

        self.event_clock += 1;
    }

    fn purge_learning_events(&mut self) {
        let clock = self.event_clock;
        for (level, events) in self.learning_events.iter_mut().enumerate() {
            let timers = &self.effect_event_intervals[level.min(MAX_MEDIATOR_LEVEL)];
            let horizon = timers
                .last()
                .copied()
                .unwrap_or(0)
                .saturating_mul(MAX_MEDIATOR_EVENTS as Time - 1);
            events.retain(|e| e.strength > 0.0 && clock.saturating_sub(e.timestamp) <= horizon);
        }
    }

    fn create_receptors(&mut self) {
        let num_sensors = self.cfg.num_sensors as f64;
        for mode in 0..self.sensor_modes.len() {
            let pattern = self.sensor_modes[mode].quantize(&self.sensors);
            let defined = pattern.iter().filter(|s| s.is_some()).count();
            if defined == 0 || self.find_receptor(&pattern, mode).is_some() {
                continue;
            }
            let r = self.create_receptor(pattern, mode);
            let n = self.neuron_mut(r);
            n.motive = MIN_MOTIVE;
            n.firing_strength = defined as f64 / num_sensors;
        }
    }

    pub(crate) fn learning_event(&self, id: NeuronId) -> LearningEvent {
        let n = self.neuron(id);
        let mut enablement = 0.0;
        for notify in &n.notify_list {
            if notify.event_type != EventType::Effect {
                continue;
            }
            let parent = self.mediator(notify.mediator);
            let wagered = parent.wagered_enablings.value();
            if parent.enabler {
                enablement += wagered;
            } else {
                enablement -= wagered;
            }
        }
        let mut enablement = enablement.clamp(-MAX_ENABLEMENT, MAX_ENABLEMENT);
        if enablement.abs() < NEARLY_ZERO {
            enablement = 0.0;
        }
        LearningEvent {
            neuron: id,
            strength: n.firing_strength,
            enablement,
            motive: n.motive,
            begin: n.as_mediator().map_or(self.event_clock, |m| m.cause_begin),
            timestamp: self.event_clock,
        }
    }

    fn record_learning_events(&mut self) {
        let ids: Vec<NeuronId> = self
            .receptors
            .iter()
            .chain(&self.motors)
            .chain(&self.mediators)
            .copied()
            .collect();
        for id in ids {
            let n = self.neuron(id);
            if n.motive <= 0.0 && n.firing_strength <= 0.0 {
                continue;
            }
            let level = n.level().map_or(0, |l| l + 1);
            let event = self.learning_event(id);
            self.learning_events[level].push(event);
        }
    }

    fn max_learning_interval(&self, level: usize) -> Time {
        let level = level.min(MAX_MEDIATOR_LEVEL);
        self.max_learning_effect_event_intervals[level]
            .unwrap_or_else(|| self.effect_event_intervals[level].last().copied().unwrap_or(0))
    }

    /// Try to learn a mediator predicting `effect` from an earlier event.
    fn create_mediator(&mut self, effect: &LearningEvent) {
        let max_motive = self.max_motive();
        let motive_term = (effect.motive / max_motive).powf(MOTIVE_LEARNING_DAMPER);
        let enabler = if effect.strength > 0.0 {
            let p = motive_term * (effect.strength / MAX_ENABLEMENT).powf(STRENGTH_LEARNING_DAMPER);
            if !self.rng.chance(p) {
                return;
            }
            true
        } else {
            // A misfire only teaches a disabler if something predicted it.
            if effect.enablement <= 0.0 {
                return;
            }
            let p = motive_term * (effect.enablement / MAX_ENABLEMENT).powf(ENABLEMENT_LEARNING_DAMPER);
            if !self.rng.chance(p) {
                return;
            }
            false
        };

        let effect_neuron = self.neuron(effect.neuron);
        let level = effect_neuron.level().map_or(0, |l| l + 1);
        let effect_is_receptor = matches!(effect_neuron.kind, NeuronKind::Receptor(_));
        if level >= self.learning_events.len() {
            return;
        }

        let causes = self.learning_events[level].clone();
        for cause in &causes {
            if cause.strength <= 0.0 || !self.is_live(cause.neuron) {
                continue;
            }
            let cause_neuron = self.neuron(cause.neuron);
            if cause_neuron.is_motor() || cause.timestamp >= effect.begin {
                continue;
            }
            let k = cause_neuron.level().map_or(0, |l| l + 1).max(level);
            if effect.begin - cause.timestamp > self.max_learning_interval(k) {
                continue;
            }

            // A receptor effect is learned through the response taken with it.
            let mut intermediates = Vec::new();
            if effect_is_receptor {
                let responses: Vec<NeuronId> = self.learning_events[0]
                    .iter()
                    .filter(|e| {
                        e.strength > 0.0
                            && e.timestamp == effect.timestamp
                            && self.is_live(e.neuron)
                            && self.neuron(e.neuron).is_motor()
                    })
                    .map(|e| e.neuron)
                    .collect();
                if responses.is_empty() {
                    continue;
                }
                let pick = self.rng.gen_range_usize(0, responses.len());
                intermediates.push(responses[pick]);
            }

            let med = self.build_mediator(
                &[cause.neuron],
                &intermediates,
                effect.neuron,
                enabler,
                NEW_ENABLEMENT,
                NEW_ENABLEMENT,
            );
            if med.level > MAX_MEDIATOR_LEVEL || self.find_duplicate_mediator(&med).is_some() {
                continue;
            }
            let new_level = med.level;
            let id = self.link_mediator(med);
            debug!(
                mediator = self.neuron(id).id,
                level = new_level,
                enabler,
                "mediator created"
            );

            if enabler && new_level < MAX_MEDIATOR_LEVEL {
                self.mediator_mut(id).cause_begin = cause.begin;
                self.neuron_mut(id).firing_strength = cause.strength * effect.strength;
                let event = self.learning_event(id);
                self.learning_events[new_level + 1].push(event);
            }
            return;
        }
    }

    /// Flag paying wagers that a stronger, earlier-starting mediator over the
    /// same effect already accounts for.
    fn mark_parasitic_wagers(&mut self, id: NeuronId) {
        let med = self.mediator(id);
        if !med.enabler {
            return;
        }
        let Some(effect) = med.effect else {
            return;
        };
        let transfer = wager_transfer(med, self.neuron(id).firing_strength);
        let flags: Vec<(usize, bool)> = med
            .wagered_enablings
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.new_in_set && e.effect_wager && e.value * transfer > 0.0)
            .map(|(i, e)| (i, self.is_overarched(id, effect, e.value, e.cause_begin)))
            .collect();
        let med = self.mediator_mut(id);
        for (i, parasite) in flags {
            med.wagered_enablings.enablings[i].parasite = parasite;
        }
    }

    fn is_overarched(&self, id: NeuronId, effect: NeuronId, value: Enablement, begin: Time) -> bool {
        for notify in &self.neuron(effect).notify_list {
            if notify.mediator == id {
                continue;
            }
            let other = self.mediator(notify.mediator);
            if !other.enabler {
                continue;
            }
            let sets: Vec<&EnablingSet> = match notify.event_type {
                EventType::Intermediate => vec![&other.intermediate_enablings[notify.event_index]],
                EventType::Effect => vec![&other.effect_enablings, &other.wagered_enablings],
                _ => continue,
            };
            let mut enablement = 0.0;
            let mut earliest: Option<Time> = None;
            for e in sets.into_iter().flat_map(|s| s.iter()) {
                enablement += e.value;
                earliest = Some(earliest.map_or(e.cause_begin, |b| b.min(e.cause_begin)));
            }
            if enablement > value && earliest.is_some_and(|b| b < begin) {
                return true;
            }
        }
        false
    }

    /// Settle effect wagers and punish timed-out enablings.
    pub(crate) fn pay_wagers(&mut self, id: NeuronId) {
        let max_motive = self.max_motive();
        let firing = self.neuron(id).firing_strength;
        let level = self.mediator(id).level;
        let timers = self.effect_event_intervals[level].clone();
        let motor_slots: Vec<bool> = self
            .mediator(id)
            .intermediates
            .iter()
            .map(|&n| self.neuron(n).is_motor())
            .collect();

        let med = self.mediator_mut(id);
        let transfer = wager_transfer(med, firing);
        let mut earliest: Option<(usize, Enablement)> = None;

        for i in 0..med.wagered_enablings.len() {
            let e = &med.wagered_enablings.enablings[i];
            if e.new_in_set || !e.effect_wager || e.motive <= 0.0 {
                continue;
            }
            let mut factor = motive_factor(e.motive, max_motive);
            let timer_index = e.timer_index;
            let expired = e.age >= timer_at(&timers, timer_index);
            let paid = e.value * transfer;
            let parasite = e.parasite;

            if med.enabler {
                if paid > 0.0 && !parasite {
                    med.wagered_enablings.enablings[i].value -= paid;
                    med.base_enablement += paid;
                    if earliest.map_or(true, |(t, _)| timer_index < t) {
                        earliest = Some((timer_index, paid));
                    }
                    rebase(med, WagerOutcome::Fire, paid);
                }
                let rest = med.wagered_enablings.enablings[i].value;
                if rest > 0.0 && expired {
                    med.wagered_enablings.enablings[i].value = 0.0;
                    med.base_enablement += rest;
                    rebase(med, WagerOutcome::Expire, rest * factor * EXPIRATION_WEIGHT);
                }
            } else {
                if factor <= MIN_MOTIVE {
                    factor = 0.0;
                }
                if paid > 0.0 {
                    med.wagered_enablings.enablings[i].value -= paid;
                    med.base_enablement += paid;
                    rebase(med, WagerOutcome::Expire, paid * EXPIRATION_WEIGHT);
                }
                let rest = med.wagered_enablings.enablings[i].value;
                if rest > 0.0 && expired {
                    if earliest.map_or(true, |(t, _)| timer_index < t) {
                        earliest = Some((timer_index, rest));
                    }
                    med.wagered_enablings.enablings[i].value = 0.0;
                    med.base_enablement += rest;
                    rebase(med, WagerOutcome::Fire, rest * factor);
                }
            }
        }

        for slot in 0..med.intermediate_enablings.len() {
            let weight = if motor_slots[slot] {
                RESPONSE_EXPIRATION_WEIGHT
            } else {
                EXPIRATION_WEIGHT
            };
            for i in 0..med.intermediate_enablings[slot].len() {
                let e = &med.intermediate_enablings[slot].enablings[i];
                if e.new_in_set || e.motive <= 0.0 || e.value <= 0.0 {
                    continue;
                }
                if e.age < timer_at(&timers, e.timer_index) {
                    continue;
                }
                let value = e.value;
                let factor = motive_factor(e.motive, max_motive);
                med.intermediate_enablings[slot].enablings[i].value = 0.0;
                med.base_enablement += value;
                let update = wager_enablement(
                    WagerOutcome::Expire,
                    med.total_enablement(),
                    value * factor * weight,
                );
                med.base_enablement = update - med.enablement_out();
                for k in 0..=slot {
                    med.intermediate_enablements[k] = update;
                }
            }
        }

        for i in 0..med.effect_enablings.len() {
            let e = &med.effect_enablings.enablings[i];
            if e.new_in_set || e.motive <= 0.0 || e.value <= 0.0 {
                continue;
            }
            if e.age < timer_at(&timers, e.timer_index) {
                continue;
            }
            let value = e.value;
            let factor = motive_factor(e.motive, max_motive);
            med.effect_enablings.enablings[i].value = 0.0;
            med.base_enablement += value;
            rebase(med, WagerOutcome::Expire, value * factor * EXPIRATION_WEIGHT);
        }

        med.utility = med.total_enablement();

        if let Some((index, amount)) = earliest {
            let weights = &mut med.timed_wager_weights;
            weights[index] += amount;
            for w in weights.iter_mut() {
                if *w < MIN_WAGER_WEIGHT {
                    *w = MIN_WAGER_WEIGHT;
                }
            }
            let sum: Weight = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= sum);
        }
    }

    /// Age enablings and drop those past their timer, returning their value.
    pub(crate) fn expire_enablings(&mut self, id: NeuronId, force: bool) {
        let level = self.mediator(id).level;
        let timers = self.effect_event_intervals[level].clone();
        let last = timers.last().copied().unwrap_or(0);
        let med = self.mediator_mut(id);

        let mut returned = 0.0;
        let mut age_out = |set: &mut EnablingSet| {
            set.enablings.retain_mut(|e| {
                e.age += 1;
                if force || e.age > timer_at(&timers, e.timer_index) {
                    returned += e.value;
                    false
                } else {
                    true
                }
            });
        };
        for set in &mut med.intermediate_enablings {
            age_out(set);
        }
        age_out(&mut med.effect_enablings);
        age_out(&mut med.wagered_enablings);
        med.base_enablement += returned;

        for slot in &mut med.pending_enablings {
            slot.retain_mut(|p| {
                p.age += 1;
                !(force || p.age > last)
            });
        }
    }

    /// A response was not taken: enablings waiting on it expire.
    pub(crate) fn expire_motor_enabling(&mut self, motor: NeuronId) {
        let max_motive = self.max_motive();
        let waiting: Vec<(NeuronId, usize)> = self
            .neuron(motor)
            .notify_list
            .iter()
            .filter(|n| n.event_type == EventType::Intermediate)
            .map(|n| (n.mediator, n.event_index))
            .collect();

        for (mediator, k) in waiting {
            let strength = {
                let med = self.mediator_mut(mediator);
                let enablement = med.intermediate_enablings[k].value();
                let strength = if enablement > 0.0 {
                    enablement / med.total_enablement()
                } else {
                    0.0
                };
                for i in 0..med.intermediate_enablings[k].len() {
                    let e = &med.intermediate_enablings[k].enablings[i];
                    if e.value <= 0.0 {
                        continue;
                    }
                    let value = e.value;
                    let factor = motive_factor(e.motive, max_motive);
                    med.intermediate_enablings[k].enablings[i].value = 0.0;
                    med.base_enablement += value;
                    let update = wager_enablement(
                        WagerOutcome::Expire,
                        med.total_enablement(),
                        value * factor * RESPONSE_EXPIRATION_WEIGHT,
                    );
                    med.base_enablement = update - med.enablement_out();
                    for p in 0..=k {
                        med.intermediate_enablements[p] = update;
                    }
                    med.utility = med.total_enablement();
                }
                med.intermediate_enablings[k].clear();
                strength
            };
            if strength > 0.0 {
                self.expire_response_wagers(mediator, strength);
            }
        }
    }

    fn expire_response_wagers(&mut self, id: NeuronId, strength: Weight) {
        let max_motive = self.max_motive();
        let parents: Vec<NeuronId> = self
            .neuron(id)
            .notify_list
            .iter()
            .filter(|n| n.event_type == EventType::Effect)
            .map(|n| n.mediator)
            .collect();

        for parent in parents {
            let next = {
                let med = self.mediator_mut(parent);
                let enablement = med.wagered_enablings.value() * strength;
                let next = if enablement > 0.0 {
                    enablement / med.total_enablement()
                } else {
                    0.0
                };
                for i in 0..med.wagered_enablings.len() {
                    let e = &med.wagered_enablings.enablings[i];
                    if e.value <= 0.0 {
                        continue;
                    }
                    let amount = e.value * strength;
                    let factor = motive_factor(e.motive, max_motive);
                    med.wagered_enablings.enablings[i].value -= amount;
                    med.base_enablement += amount;
                    rebase(
                        med,
                        WagerOutcome::Expire,
                        amount * factor * RESPONSE_EXPIRATION_WEIGHT,
                    );
                    med.utility = med.total_enablement();
                }
                next
            };
            if next > 0.0 {
                self.expire_response_wagers(parent, next);
            }
        }
    }

    /// Protected from pruning: an instinct, or part of one.
    pub(crate) fn is_instinct(&self, id: NeuronId) -> bool {
        let n = self.neuron(id);
        n.as_mediator().is_some_and(|m| m.instinct)
            || n.notify_list.iter().any(|p| self.is_instinct(p.mediator))
    }

    /// Best utility of this mediator and everything built on it.
    pub(crate) fn mediator_utility(&self, id: NeuronId) -> Weight {
        let n = self.neuron(id);
        let own = n.as_mediator().map_or(0.0, |m| m.utility);
        n.notify_list
            .iter()
            .map(|p| self.mediator_utility(p.mediator))
            .fold(own, Weight::max)
    }

    fn worst_mediator(&mut self) -> Option<NeuronId> {
        let mut worst: Vec<NeuronId> = Vec::new();
        let mut worst_utility = 0.0;
        for &m in &self.mediators {
            if self.is_instinct(m) {
                continue;
            }
            let utility = self.mediator_utility(m);
            if worst.is_empty() || utility < worst_utility {
                worst.clear();
                worst.push(m);
                worst_utility = utility;
            } else if (utility - worst_utility).abs() <= NEARLY_ZERO {
                worst.push(m);
            }
        }
        if worst.is_empty() {
            return None;
        }
        let pick = self.rng.gen_range_usize(0, worst.len());
        Some(worst[pick])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonaConfig;

    fn quiet(sensors: usize, responses: usize) -> Mona {
        Mona::new(
            MonaConfig::new(sensors, responses, 1)
                .with_seed(21)
                .with_response_randomness(0.0)
                .without_learning(),
        )
        .unwrap()
    }

    #[test]
    fn wager_history_moves_toward_target() {
        let up = wager_enablement(WagerOutcome::Fire, 0.5, 1.0);
        assert!((up - 0.625).abs() < 1e-12);
        let down = wager_enablement(WagerOutcome::Expire, 0.5, 1.0);
        assert!((down - (0.5 + (MIN_ENABLEMENT - 0.5) * 0.25)).abs() < 1e-12);
        assert_eq!(wager_enablement(WagerOutcome::Fire, 0.5, 0.0), 0.5);
    }

    #[test]
    fn expire_returns_value_to_base() {
        let mut mona = quiet(1, 2);
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m1 = mona.motor(1).unwrap();
        let med = mona.add_mediator(&[r], &[], m1, true, 0.6).unwrap();
        mona.sensors[0] = 1.0;
        mona.sense();
        mona.enable();
        assert!(mona.mediator(med).base_enablement.abs() < 1e-12);

        // Level 0 timer is 1: survives one aging, not two.
        mona.expire_enablings(med, false);
        assert_eq!(mona.mediator(med).wagered_enablings.len(), 1);
        mona.expire_enablings(med, false);
        let m = mona.mediator(med);
        assert!(m.wagered_enablings.is_empty());
        assert!((m.base_enablement - 0.6).abs() < 1e-12);
    }

    #[test]
    fn fired_wager_is_paid_and_raises_enablement() {
        let mut mona = quiet(1, 2);
        mona.set_need(0, 5.0).unwrap();
        let goal = mona.add_goal(0, &[1.0], 0, Some(1), 1.0).unwrap();
        let med = mona.find(goal).unwrap();
        mona.mediator_mut(med).base_enablement = 0.5;
        mona.mediator_mut(med).set_slot_enablements(0.5);

        // Cycle 1: wager placed and response 1 selected.
        assert_eq!(mona.cycle(&[1.0]).unwrap(), Some(1));
        // Cycle 2: the response fires the effect and the wager pays.
        mona.cycle(&[0.0]).unwrap();
        let m = mona.mediator(med);
        assert!(m.total_enablement() > 0.5);
        assert!((m.utility - m.total_enablement()).abs() < 1e-12);
    }

    #[test]
    fn unselected_response_expires_waiting_enablings() {
        let mut mona = quiet(1, 2);
        let s = mona.add_receptor(&[1.0], 0).unwrap();
        let g = mona.add_receptor(&[2.0], 0).unwrap();
        let m1 = mona.motor(1).unwrap();
        let med = mona.add_mediator(&[s], &[m1], g, true, MAX_ENABLEMENT).unwrap();

        mona.override_response(Some(0)).unwrap();
        mona.cycle(&[1.0]).unwrap();
        let m = mona.mediator(med);
        assert!(m.intermediate_enablings[0].is_empty());
        assert!(m.enabling_count() == 0);
        // Expiry pulls the budget toward MIN_ENABLEMENT.
        assert!(m.total_enablement() < MAX_ENABLEMENT);
    }

    #[test]
    fn learning_creates_receptors_and_mediators() {
        let mut mona = Mona::new(MonaConfig::new(1, 2, 1).with_seed(2)).unwrap();
        mona.set_need(0, 1.0).unwrap();
        for i in 0..40 {
            mona.cycle(&[(i % 2) as f32]).unwrap();
        }
        assert_eq!(mona.receptors().len(), 2);
        assert!(!mona.mediators().is_empty());
        for &m in mona.mediators() {
            let med = mona.mediator(m);
            assert!(med.level <= MAX_MEDIATOR_LEVEL);
            assert!(!med.instinct);
        }
    }

    #[test]
    fn pruning_respects_limit_and_instincts() {
        let mut mona = Mona::new(MonaConfig::new(2, 3, 1).with_seed(8).with_max_mediators(3)).unwrap();
        mona.set_need(0, 1.0).unwrap();
        mona.add_goal(0, &[1.0, 1.0], 0, Some(2), 1.0).unwrap();
        for i in 0..60 {
            let a = (i % 3 == 0) as u8 as f32;
            let b = (i % 2) as f32;
            mona.cycle(&[a, b]).unwrap();
            assert!(mona.mediators().len() <= 3);
        }
        assert!(mona.mediators().iter().any(|&m| mona.mediator(m).instinct));
    }

    #[test]
    fn arena_stays_bounded_under_pruning() {
        let mut mona = Mona::new(MonaConfig::new(2, 3, 1).with_seed(8).with_max_mediators(5)).unwrap();
        mona.set_need(0, 1.0).unwrap();
        mona.add_goal(0, &[1.0, 1.0], 0, Some(2), 1.0).unwrap();
        let mut slots_at_warmup = 0;
        for i in 0..3000 {
            let a = (i % 3 == 0) as u8 as f32;
            let b = (i % 2) as f32;
            mona.cycle(&[a, b]).unwrap();
            if i == 499 {
                slots_at_warmup = mona.arena_len();
            }
        }
        let live = mona.receptors().len() + mona.motors().len() + mona.mediators().len();
        assert!(mona.mediators().len() <= 5);
        assert!(mona.arena_len() < live + 32, "arena {} live {live}", mona.arena_len());
        assert!(mona.arena_len() <= slots_at_warmup + 32);
    }

    #[test]
    fn worst_mediator_skips_instincts() {
        let mut mona = quiet(1, 1);
        let a = mona.add_receptor(&[1.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        mona.add_mediator(&[a], &[], m0, true, 0.2).unwrap();
        assert!(mona.worst_mediator().is_none());
    }

    #[test]
    fn old_learning_events_are_purged() {
        let mut mona = quiet(1, 1);
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        mona.learning_events[0].push(LearningEvent {
            neuron: r,
            strength: 1.0,
            enablement: 0.0,
            motive: 0.0,
            begin: 0,
            timestamp: 0,
        });
        mona.event_clock = 39;
        mona.purge_learning_events();
        assert_eq!(mona.learning_events(0).len(), 1);
        mona.event_clock = 40;
        mona.purge_learning_events();
        assert!(mona.learning_events(0).is_empty());
    }
}
