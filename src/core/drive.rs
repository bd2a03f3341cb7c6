//! Drive phase: top-down propagation of motive from goal-bearing neurons.

use crate::config::{Motive, Weight, DRIVE_ATTENUATION, MAX_ENABLEMENT, MIN_MOTIVE};
use crate::mona::Mona;
use crate::motive::MotiveAccum;
use crate::neuron::{EventType, Neuron, NeuronId, NeuronKind};

impl Mona {
    pub(crate) fn drive(&mut self) {
        let needs = self.needs.clone();
        for n in self.neurons.iter_mut().flatten() {
            n.motive = 0.0;
            n.motive_valid = false;
            n.accum[0].init(&needs);
            n.accum[1].init(&needs);
            n.drive_visits = 0;
            if let NeuronKind::Motor(m) = &mut n.kind {
                m.drivers.clear();
                m.driver_work.clear();
            }
        }

        let seeds: Vec<NeuronId> = self
            .receptors
            .iter()
            .chain(&self.motors)
            .chain(&self.mediators)
            .copied()
            .filter(|&id| self.neuron(id).goals.is_active())
            .collect();
        for seed in seeds {
            let mut accum = MotiveAccum::new(needs.len());
            accum.init(&needs);
            for n in self.neurons.iter_mut().flatten() {
                n.accum[0].init(&needs);
                n.accum[1].init(&needs);
            }
            self.drive_neuron(seed, &accum, &[]);
            self.set_motive();
        }

        for n in self.neurons.iter_mut().flatten() {
            if n.is_motor() {
                continue;
            }
            if n.motive < MIN_MOTIVE {
                n.motive = MIN_MOTIVE;
            }
            let motive = n.motive;
            if let Some(med) = n.as_mediator_mut() {
                med.for_each_enabling_mut(|e| {
                    if e.motive < motive {
                        e.motive = motive;
                    }
                });
            }
        }
    }

    // Keep the best motive seen across seeds.
    fn set_motive(&mut self) {
        for n in self.neurons.iter_mut().flatten() {
            let motive = n.accum[0].value() - n.accum[1].value();
            if !n.motive_valid || motive > n.motive {
                n.motive = motive;
                n.motive_valid = true;
                if let NeuronKind::Motor(m) = &mut n.kind {
                    m.drivers = m.driver_work.clone();
                }
            }
        }
    }

    fn drive_neuron(&mut self, id: NeuronId, accum: &MotiveAccum, drivers: &[NeuronId]) {
        let mut accum = accum.clone();
        {
            let n = self.neuron_mut(id);
            if let Some(med) = n.as_mediator() {
                if med.enabler != accum.enabler {
                    return;
                }
            }
            if accum.enabler {
                accum.accum_goals(&n.goals);
            }
            if !store_best_motive(n, &accum) {
                return;
            }
            if let NeuronKind::Motor(m) = &mut n.kind {
                m.driver_work = drivers.to_vec();
                return;
            }
        }

        let mut path = drivers.to_vec();
        path.push(id);

        let mut sum = 0.0;
        if self.neuron(id).as_mediator().is_some() {
            sum += self.drive_causes(id, &accum, &path);
            sum += self.drive_intermediates(id, &accum, &path);

            let w = self.drive_weight(id, EventType::Effect, 0);
            if w > 0.0 {
                sum += w;
                let mut a = MotiveAccum::default();
                a.config(&accum, w * DRIVE_ATTENUATION);
                a.enabler = accum.enabler;
                if let Some(effect) = self.mediator(id).effect {
                    self.drive_neuron(effect, &a, &path);
                }
            }
        }
        self.drive_super_mediators(id, &accum, 1.0 - sum, &path);
    }

    /// Drive a mediator from below, through its effect.
    fn drive_cause(&mut self, id: NeuronId, accum: &MotiveAccum, drivers: &[NeuronId]) {
        if !store_best_motive(self.neuron_mut(id), accum) {
            return;
        }
        let mut path = drivers.to_vec();
        path.push(id);

        let super_weight = if accum.enabler {
            let mut sum = self.drive_causes(id, accum, &path);
            sum += self.drive_intermediates(id, accum, &path);
            1.0 - sum
        } else {
            1.0
        };
        self.drive_super_mediators(id, accum, super_weight, &path);
    }

    fn drive_causes(&mut self, id: NeuronId, accum: &MotiveAccum, path: &[NeuronId]) -> Weight {
        let w = self.drive_weight(id, EventType::Cause, 0);
        if w <= 0.0 {
            return 0.0;
        }
        let mut a = MotiveAccum::default();
        a.config(accum, w * DRIVE_ATTENUATION);
        a.enabler = accum.enabler;
        // Only causes still waiting to fire.
        let unfired: Vec<NeuronId> = {
            let med = self.mediator(id);
            med.causes
                .iter()
                .zip(&med.pending_enablings)
                .filter(|(_, pending)| pending.is_empty())
                .map(|(c, _)| *c)
                .collect()
        };
        for cause in unfired {
            self.drive_neuron(cause, &a, path);
        }
        w
    }

    fn drive_intermediates(&mut self, id: NeuronId, accum: &MotiveAccum, path: &[NeuronId]) -> Weight {
        let mut sum = 0.0;
        let intermediates = self.mediator(id).intermediates.clone();
        for (i, intermediate) in intermediates.into_iter().enumerate() {
            let w = self.drive_weight(id, EventType::Intermediate, i);
            if w <= 0.0 {
                continue;
            }
            sum += w;
            let mut a = MotiveAccum::default();
            a.config(accum, w * DRIVE_ATTENUATION);
            a.enabler = accum.enabler;
            self.drive_neuron(intermediate, &a, path);
        }
        sum
    }

    // Residual weight goes up to mediators whose effect is `id`.
    fn drive_super_mediators(
        &mut self,
        id: NeuronId,
        accum: &MotiveAccum,
        weight: Weight,
        path: &[NeuronId],
    ) {
        if weight <= 0.0 {
            return;
        }
        let parents: Vec<NeuronId> = self
            .neuron(id)
            .notify_list
            .iter()
            .filter(|n| n.event_type == EventType::Effect)
            .map(|n| n.mediator)
            .collect();
        for parent in parents {
            let mut a = MotiveAccum::default();
            a.config(accum, weight * DRIVE_ATTENUATION);
            a.enabler = if self.mediator(parent).enabler {
                accum.enabler
            } else {
                !accum.enabler
            };
            self.drive_cause(parent, &a, path);
        }
    }

    /// Share of drive a mediator passes to one of its events.
    pub(crate) fn drive_weight(&self, id: NeuronId, event_type: EventType, index: usize) -> Weight {
        let med = self.mediator(id);
        let total = med.total_enablement();
        if total <= 0.0 {
            return 0.0;
        }

        let (event_enablement, use_wagered) = match event_type {
            EventType::Cause => (med.base_enablement, false),
            EventType::Intermediate => (
                med.intermediate_enablings[index].value() * med.intermediate_enablements[index]
                    / total,
                true,
            ),
            EventType::Effect | EventType::Wager => {
                // A leaf effect has no staging set; its enablings wait as wagers.
                let leaf = med
                    .effect
                    .is_some_and(|e| self.neuron(e).as_mediator().is_none());
                let staged = if leaf {
                    med.wagered_enablings.value()
                } else {
                    med.effect_enablings.value()
                };
                (staged * med.effect_enablement / total, true)
            }
        };
        let fraction = event_enablement / total;

        let mut pos_prob = 1.0 - event_enablement / MAX_ENABLEMENT;
        let mut neg_prob: Option<Weight> = None;
        for notify in &self.neuron(id).notify_list {
            if notify.event_type != EventType::Effect {
                continue;
            }
            let parent = self.mediator(notify.mediator);
            let parent_total = parent.total_enablement();
            if parent_total <= 0.0 {
                continue;
            }
            let set = if use_wagered {
                &parent.wagered_enablings
            } else {
                &parent.effect_enablings
            };
            let e = set.value() * parent.effect_enablement / parent_total;
            let e = 1.0 - (e / MAX_ENABLEMENT).clamp(0.0, 1.0);
            if parent.enabler {
                pos_prob *= e;
            } else {
                neg_prob = Some(neg_prob.unwrap_or(1.0) * e);
            }
        }

        let weight = (1.0 - pos_prob) * fraction;
        match neg_prob {
            Some(n) => weight * n,
            None => weight,
        }
    }
}

// Running extremum per polarity; false if `accum` doesn't improve it.
fn store_best_motive(n: &mut Neuron, accum: &MotiveAccum) -> bool {
    let m: Motive = accum.value();
    if m.abs() < MIN_MOTIVE {
        return false;
    }
    let slot = if accum.enabler { 0 } else { 1 };
    let stored = n.accum[slot].value();
    let improves = if m >= 0.0 { stored < m } else { stored > m };
    if !improves {
        return false;
    }
    n.accum[slot].load_needs(accum);
    n.drive_visits += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonaConfig;
    use crate::neuron::Motor;
    use crate::value_set::{GoalValue, ValueSet};

    fn quiet(responses: usize) -> Mona {
        Mona::new(
            MonaConfig::new(1, responses, 1)
                .with_seed(1)
                .with_response_randomness(0.0)
                .without_learning(),
        )
        .unwrap()
    }

    #[test]
    fn effect_weight_follows_wagered_share() {
        let mut mona = quiet(1);
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let med = mona.add_mediator(&[r], &[], m0, true, MAX_ENABLEMENT).unwrap();
        assert_eq!(mona.drive_weight(med, EventType::Effect, 0), 0.0);

        mona.sensors[0] = 1.0;
        mona.sense();
        mona.enable();
        assert!((mona.drive_weight(med, EventType::Effect, 0) - 1.0).abs() < 1e-12);
        // Base is spent, so the cause gets nothing.
        assert_eq!(mona.drive_weight(med, EventType::Cause, 0), 0.0);
    }

    #[test]
    fn motive_extremum_never_shrinks() {
        let needs = ValueSet::from_vec(vec![5.0]);
        let mut n = Neuron::new(0, "m".into(), 1, NeuronKind::Motor(Motor::new(0)));
        n.accum[0].init(&needs);

        let mut best: f64 = 0.0;
        for goal in [0.5, 0.2, 0.8, 0.8, 0.0005, 0.3] {
            let mut a = MotiveAccum::new(1);
            a.init(&needs);
            let mut g = GoalValue::new(1);
            g.set_goal(0, goal);
            a.accum_goals(&g);
            store_best_motive(&mut n, &a);
            best = best.max(if goal >= MIN_MOTIVE { goal } else { 0.0 });
            assert!((n.accum[0].value() - best).abs() < 1e-12);
        }
        // Accepted only on strict improvement.
        assert_eq!(n.drive_visits, 2);
    }

    #[test]
    fn unreached_neurons_floor_at_min_motive() {
        let mut mona = quiet(1);
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        mona.drive();
        assert_eq!(mona.neuron(r).motive, MIN_MOTIVE);
        let m0 = mona.motor(0).unwrap();
        assert_eq!(mona.neuron(m0).motive, 0.0);
    }

    #[test]
    fn disabler_rejects_enabling_drive() {
        let mut mona = quiet(1);
        mona.set_need(0, 5.0).unwrap();
        let r = mona.add_receptor(&[1.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let med = mona.add_mediator(&[r], &[], m0, false, MAX_ENABLEMENT).unwrap();
        mona.neuron_mut(med).goals.set_goal(0, 1.0);
        mona.drive();
        assert_eq!(mona.drive_visits(med), 0);
        assert_eq!(mona.drive_visits(m0), 0);
    }
}
