//! Enable phase: bottom-up propagation of firing events into enablings.
//!
//! Each handler works on one mediator under a short borrow, collects the
//! notifications it owes its parents, then dispatches them. Nothing here
//! changes a mediator's total enablement; values only move between base
//! and slots.

use tracing::trace;

use crate::config::{Time, Weight, MAX_ENABLEMENT};
use crate::enabling::{merge_event_trails, transfer_fraction, ElemEvent, Enabling, PendingEnabling};
use crate::mona::{timer_at, Mona};
use crate::neuron::{EventType, NeuronId};

struct Outgoing {
    mediator: NeuronId,
    event_type: EventType,
    event_index: usize,
    strength: Weight,
    begin: Time,
    events: Vec<ElemEvent>,
}

impl Mona {
    pub(crate) fn enable(&mut self) {
        for i in 0..self.mediators.len() {
            let m = self.mediators[i];
            let n = self.neuron_mut(m);
            n.firing_strength = 0.0;
            if let Some(med) = n.as_mediator_mut() {
                med.clear_flags();
            }
        }

        let clock = self.event_clock;
        for i in 0..self.motors.len() {
            let m = self.motors[i];
            let n = self.neuron(m);
            let strength = n.firing_strength;
            if strength <= 0.0 {
                continue;
            }
            let events = [ElemEvent::new(n.id, clock)];
            for notify in n.notify_list.clone() {
                self.event_firing(
                    notify.mediator,
                    notify.event_type,
                    notify.event_index,
                    strength,
                    clock,
                    &events,
                );
            }
        }

        // Receptors report effects even when silent.
        for i in 0..self.receptors.len() {
            let r = self.receptors[i];
            let n = self.neuron(r);
            let strength = n.firing_strength;
            let events: Vec<ElemEvent> = if strength > 0.0 {
                vec![ElemEvent::new(n.id, clock)]
            } else {
                Vec::new()
            };
            for notify in n.notify_list.clone() {
                if notify.event_type == EventType::Effect || strength > 0.0 {
                    self.event_firing(
                        notify.mediator,
                        notify.event_type,
                        notify.event_index,
                        strength,
                        clock,
                        &events,
                    );
                }
            }
        }
    }

    fn event_firing(
        &mut self,
        mediator: NeuronId,
        event_type: EventType,
        event_index: usize,
        strength: Weight,
        begin: Time,
        events: &[ElemEvent],
    ) {
        match event_type {
            EventType::Cause => self.enable_event(mediator, event_index, strength, begin, events),
            EventType::Intermediate => {
                self.intermediate_event(mediator, event_index, strength, events)
            }
            EventType::Wager => self.wager_event(mediator, strength, begin),
            EventType::Effect => self.effect_event(mediator, strength, events),
        }
    }

    fn effect_is_mediator(&self, mediator: NeuronId) -> bool {
        self.mediator(mediator)
            .effect
            .is_some_and(|e| self.neuron(e).as_mediator().is_some())
    }

    fn dispatch(&mut self, outgoing: Vec<Outgoing>) {
        for o in outgoing {
            if self.is_live(o.mediator) {
                self.event_firing(
                    o.mediator,
                    o.event_type,
                    o.event_index,
                    o.strength,
                    o.begin,
                    &o.events,
                );
            }
        }
    }

    /// A cause fired: queue it, and once every cause slot has something
    /// pending, attach every combination.
    fn enable_event(
        &mut self,
        mediator: NeuronId,
        cause_index: usize,
        strength: Weight,
        cause_begin: Time,
        events: &[ElemEvent],
    ) {
        {
            let med = self.mediator_mut(mediator);
            assert!(cause_index < med.causes.len(), "cause slot out of range");
            med.pending_enablings[cause_index].push(PendingEnabling {
                strength,
                age: 0,
                cause_begin,
                events: events.to_vec(),
            });
            if med.pending_enablings.iter().any(Vec::is_empty) {
                return;
            }
        }

        let mut combo = Vec::new();
        self.accum_enabling(mediator, 0, &mut combo);

        let med = self.mediator_mut(mediator);
        for slot in &mut med.pending_enablings {
            slot.retain(|p| p.strength > 0.0);
        }
    }

    // One pending entry per cause slot, in slot order.
    fn accum_enabling(&mut self, mediator: NeuronId, slot: usize, combo: &mut Vec<usize>) {
        let slots = self.mediator(mediator).pending_enablings.len();
        if slot == slots {
            self.attach_enabling(mediator, combo);
            return;
        }
        let entries = self.mediator(mediator).pending_enablings[slot].len();
        for i in 0..entries {
            combo.push(i);
            self.accum_enabling(mediator, slot + 1, combo);
            combo.pop();
        }
    }

    fn attach_enabling(&mut self, mediator: NeuronId, combo: &[usize]) {
        let clock = self.event_clock;
        let motive = self.neuron(mediator).motive;
        let needs = self.needs.clone();
        let effect_is_mediator = self.effect_is_mediator(mediator);
        let level = self.mediator(mediator).level;
        let timers = self.effect_event_intervals[level].clone();

        let (notify_strength, cause_begin) = {
            let med = self.mediator_mut(mediator);

            let mut strength = 0.0;
            let mut age: Time = 0;
            let mut cause_begin = clock;
            for (slot, &i) in combo.iter().enumerate() {
                let p = &med.pending_enablings[slot][i];
                if p.strength <= 0.0 {
                    return;
                }
                strength += p.strength;
                age = age.max(p.age);
                cause_begin = cause_begin.min(p.cause_begin);
            }
            strength /= combo.len() as Weight;
            for (slot, &i) in combo.iter().enumerate() {
                let p = &mut med.pending_enablings[slot][i];
                p.strength = (p.strength - strength).max(0.0);
            }

            let delta = if strength >= med.base_enablement / MAX_ENABLEMENT {
                med.base_enablement
            } else {
                MAX_ENABLEMENT * strength
            };
            let total = med.total_enablement();
            let notify_strength = if total > 0.0 { delta / total } else { 0.0 };
            med.base_enablement -= delta;

            let trail = merge_event_trails(
                combo
                    .iter()
                    .enumerate()
                    .map(|(slot, &i)| med.pending_enablings[slot][i].events.as_slice()),
            );

            if delta > 0.0 {
                for i in 0..med.timed_wager_weights.len() {
                    let share = delta * med.timed_wager_weights[i];
                    if age >= timer_at(&timers, i) {
                        med.base_enablement += share;
                        continue;
                    }
                    let mut e = Enabling::new(share, motive, &needs, age, i, cause_begin);
                    e.events = trail.clone();
                    if !med.intermediates.is_empty() {
                        med.intermediate_enablings[0].insert(e);
                    } else if effect_is_mediator {
                        med.effect_enablings.insert(e);
                    } else {
                        e.effect_begin = Some(clock);
                        med.wagered_enablings.insert(e);
                    }
                }
            }
            trace!(mediator = mediator.index(), delta, "enabling attached");
            (notify_strength, cause_begin)
        };

        if notify_strength > 0.0 {
            let outgoing = self
                .neuron(mediator)
                .notify_list
                .iter()
                .filter(|n| n.event_type == EventType::Effect)
                .map(|n| Outgoing {
                    mediator: n.mediator,
                    event_type: EventType::Wager,
                    event_index: 0,
                    strength: notify_strength,
                    begin: cause_begin,
                    events: Vec::new(),
                })
                .collect();
            self.dispatch(outgoing);
        }
    }

    /// Move a share of a slot's settled enablings one slot forward.
    fn intermediate_event(
        &mut self,
        mediator: NeuronId,
        index: usize,
        strength: Weight,
        events: &[ElemEvent],
    ) {
        let clock = self.event_clock;
        let effect_is_mediator = self.effect_is_mediator(mediator);
        let intermediate = self.mediator(mediator).intermediates[index];
        let from_motor = self.neuron(intermediate).is_motor();

        let med = self.mediator_mut(mediator);
        let enablement = med.intermediate_enablings[index].settled_value();
        let transfer = transfer_fraction(strength, enablement);
        if transfer <= 0.0 || enablement <= 0.0 {
            return;
        }

        let mut moved = Vec::new();
        for e in med.intermediate_enablings[index].iter_mut() {
            if e.new_in_set || e.value == 0.0 {
                continue;
            }
            let mut part = e.split(transfer);
            part.append_events(events);
            // A response lands one tick after its intermediate.
            part.age = if from_motor { 1 } else { 0 };
            moved.push(part);
        }

        let last = index + 1 == med.intermediate_enablings.len();
        for mut part in moved {
            let target = if !last {
                &mut med.intermediate_enablings[index + 1]
            } else if effect_is_mediator {
                &mut med.effect_enablings
            } else {
                part.effect_begin = Some(clock);
                &mut med.wagered_enablings
            };
            if from_motor {
                target.insert_settled(part);
            } else {
                target.insert(part);
            }
        }
    }

    /// The effect (a mediator) was itself enabled: age existing wagers to
    /// their bound and promote staged effect enablings to wagers.
    fn wager_event(&mut self, mediator: NeuronId, strength: Weight, begin: Time) {
        let level = self.mediator(mediator).level;
        let timers = self.effect_event_intervals[level].clone();
        let med = self.mediator_mut(mediator);

        let enablement = med.wagered_enablings.settled_value();
        let transfer = transfer_fraction(strength, enablement);
        if transfer > 0.0 && enablement > 0.0 {
            let mut parts = Vec::new();
            for e in med.wagered_enablings.iter_mut() {
                if e.new_in_set || e.value == 0.0 {
                    continue;
                }
                let mut part = e.split(transfer);
                part.age = timer_at(&timers, part.timer_index);
                parts.push(part);
            }
            for part in parts {
                med.wagered_enablings.insert_settled(part);
            }
        }

        let enablement = med.effect_enablings.settled_value();
        let transfer = transfer_fraction(strength, enablement);
        if transfer > 0.0 && enablement > 0.0 {
            let mut parts = Vec::new();
            for e in med.effect_enablings.iter_mut() {
                if e.new_in_set || e.value == 0.0 {
                    continue;
                }
                let mut part = e.split(transfer);
                part.effect_begin = Some(begin);
                parts.push(part);
            }
            for part in parts {
                med.wagered_enablings.insert(part);
            }
        }
    }

    /// The effect fired (or, for receptors, reported in): settle wagers and
    /// fire this mediator.
    fn effect_event(&mut self, mediator: NeuronId, strength: Weight, events: &[ElemEvent]) {
        let level = self.mediator(mediator).level;
        let timers = self.effect_event_intervals[level].clone();

        let (firing, notify_strength, cause_begin, trail) = {
            let med = self.mediator_mut(mediator);
            let mut cause_begin: Time = 0;
            let mut enablement = 0.0;
            let mut trail: Vec<ElemEvent> = Vec::new();

            let firing = if med.enabler {
                let mut best: Option<usize> = None;
                for (i, e) in med.wagered_enablings.iter().enumerate() {
                    if !e.new_in_set && e.value > enablement {
                        enablement = e.value;
                        best = Some(i);
                        cause_begin = e.cause_begin;
                    }
                }
                if let Some(b) = best {
                    let winning = med.wagered_enablings.enablings[b].events.clone();
                    for (i, e) in med.wagered_enablings.iter_mut().enumerate() {
                        if e.new_in_set || (i != b && e.events != winning) {
                            continue;
                        }
                        if i != b {
                            enablement += e.value;
                        }
                        e.effect_wager = true;
                        e.append_events(events);
                    }
                    trail = med.wagered_enablings.enablings[b].events.clone();
                }
                transfer_fraction(strength, enablement) * enablement
            } else {
                let mut winner: Option<usize> = None;
                for (i, e) in med.wagered_enablings.iter_mut().enumerate() {
                    if e.new_in_set || e.age <= timer_at(&timers, e.timer_index) {
                        continue;
                    }
                    enablement += e.value;
                    e.effect_wager = true;
                    e.append_events(events);
                    if winner.is_none() || e.cause_begin > cause_begin {
                        winner = Some(i);
                        cause_begin = e.cause_begin;
                    }
                }
                if let Some(w) = winner {
                    trail = med.wagered_enablings.enablings[w].events.clone();
                }
                transfer_fraction(1.0 - strength, enablement) * enablement
            };

            let total = med.total_enablement();
            let notify_strength = if total > 0.0 { firing / total } else { 0.0 };
            med.cause_begin = cause_begin;
            (firing, notify_strength, cause_begin, trail)
        };
        self.neuron_mut(mediator).firing_strength = firing;
        if firing > 0.0 {
            trace!(mediator = mediator.index(), firing, "mediator fired");
        }

        let outgoing = self
            .neuron(mediator)
            .notify_list
            .iter()
            .filter(|n| n.event_type == EventType::Effect || firing > 0.0)
            .map(|n| Outgoing {
                mediator: n.mediator,
                event_type: n.event_type,
                event_index: n.event_index,
                strength: notify_strength,
                begin: cause_begin,
                events: trail.clone(),
            })
            .collect();
        self.dispatch(outgoing);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MonaConfig, MAX_ENABLEMENT};
    use crate::mona::Mona;

    fn quiet(sensors: usize, responses: usize) -> Mona {
        Mona::new(
            MonaConfig::new(sensors, responses, 1)
                .with_seed(5)
                .with_response_randomness(0.0)
                .without_learning(),
        )
        .unwrap()
    }

    #[test]
    fn two_cause_mediator_waits_for_both_causes() {
        let mut mona = quiet(2, 1);
        let a = mona.add_receptor(&[1.0, 0.0], 0).unwrap();
        let b = mona.add_receptor(&[0.0, 1.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let med = mona.add_mediator(&[a, b], &[], m0, true, MAX_ENABLEMENT).unwrap();

        mona.sensors.copy_from_slice(&[1.0, 0.0]);
        mona.sense();
        mona.enable();
        {
            let m = mona.mediator(med);
            assert_eq!(m.pending_enablings[0].len(), 1);
            assert!(m.pending_enablings[1].is_empty());
            assert!(m.wagered_enablings.is_empty());
        }

        mona.sensors.copy_from_slice(&[0.0, 1.0]);
        mona.sense();
        mona.enable();
        let m = mona.mediator(med);
        assert_eq!(m.wagered_enablings.len(), 1);
        // Strength 1 each; both depleted and dropped.
        assert!(m.pending_enablings.iter().all(Vec::is_empty));
        let trail = &m.wagered_enablings.enablings[0].events;
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].id, mona.neuron(a).id);
    }

    #[test]
    fn partial_strength_enables_a_fraction() {
        let mut mona = quiet(2, 1);
        // One defined sensor of two: firing 0.5.
        let mode = mona.add_sensor_mode(vec![true, false], None).unwrap();
        let r = mona.add_receptor(&[1.0, 0.0], mode).unwrap();
        let m0 = mona.motor(0).unwrap();
        let med = mona.add_mediator(&[r], &[], m0, true, MAX_ENABLEMENT).unwrap();

        mona.sensors.copy_from_slice(&[1.0, 3.0]);
        mona.sense();
        mona.enable();
        let m = mona.mediator(med);
        assert!((m.wagered_enablings.value() - 0.5).abs() < 1e-12);
        assert!((m.base_enablement - 0.5).abs() < 1e-12);
    }

    #[test]
    fn intermediate_moves_enablement_forward() {
        let mut mona = quiet(1, 2);
        let s = mona.add_receptor(&[1.0], 0).unwrap();
        let g = mona.add_receptor(&[2.0], 0).unwrap();
        let m1 = mona.motor(1).unwrap();
        let med = mona.add_mediator(&[s], &[m1], g, true, MAX_ENABLEMENT).unwrap();

        mona.sensors[0] = 1.0;
        mona.sense();
        mona.enable();
        assert!((mona.mediator(med).intermediate_enablings[0].value() - 1.0).abs() < 1e-12);

        // Response 1 fires; next enable moves the enabling to wagers.
        mona.neuron_mut(m1).firing_strength = 1.0;
        mona.sensors[0] = 0.0;
        mona.sense();
        mona.enable();
        let m = mona.mediator(med);
        assert!(m.intermediate_enablings[0].value().abs() < 1e-12);
        assert!((m.wagered_enablings.value() - 1.0).abs() < 1e-12);
        let w = &m.wagered_enablings.enablings[0];
        assert_eq!(w.age, 1);
        assert!(!w.new_in_set);
        assert_eq!(w.events.len(), 2);
    }

    #[test]
    fn effect_fires_mediator_and_notifies_parent() {
        let mut mona = quiet(1, 1);
        let s = mona.add_receptor(&[1.0], 0).unwrap();
        let g = mona.add_receptor(&[2.0], 0).unwrap();
        let m0 = mona.motor(0).unwrap();
        let low = mona.add_mediator(&[s], &[], g, true, MAX_ENABLEMENT).unwrap();
        let high = mona.add_mediator(&[low], &[], m0, true, MAX_ENABLEMENT).unwrap();

        mona.sensors[0] = 1.0;
        mona.sense();
        mona.enable();
        assert!((mona.mediator(low).wagered_enablings.value() - 1.0).abs() < 1e-12);

        mona.sensors[0] = 2.0;
        mona.sense();
        mona.enable();
        assert!((mona.neuron(low).firing_strength - 1.0).abs() < 1e-12);
        assert!(mona.mediator(low).wagered_enablings.enablings[0].effect_wager);
        // The fired mediator is a cause of `high`.
        assert!(!mona.mediator(high).wagered_enablings.is_empty());
    }

    #[test]
    fn disabler_fires_when_the_effect_stays_away() {
        let mut mona = quiet(1, 1);
        let s = mona.add_receptor(&[1.0], 0).unwrap();
        let g = mona.add_receptor(&[2.0], 0).unwrap();
        let med = mona.add_mediator(&[s], &[], g, false, MAX_ENABLEMENT).unwrap();

        mona.sensors[0] = 1.0;
        mona.sense();
        mona.enable();
        assert_eq!(mona.neuron(med).firing_strength, 0.0);
        // Past the level 0 timer bound of 1.
        mona.mediator_mut(med).wagered_enablings.enablings[0].age = 2;

        mona.sensors[0] = 0.0;
        mona.sense();
        mona.enable();
        assert!((mona.neuron(med).firing_strength - 1.0).abs() < 1e-12);
        assert!(mona.mediator(med).wagered_enablings.enablings[0].effect_wager);
    }

    #[test]
    fn disabler_scales_with_missing_effect_strength() {
        let mut mona = quiet(2, 1);
        let half = mona.add_sensor_mode(vec![true, false], None).unwrap();
        let s = mona.add_receptor(&[1.0, 1.0], 0).unwrap();
        let g = mona.add_receptor(&[2.0, 0.0], half).unwrap();
        let med = mona.add_mediator(&[s], &[], g, false, MAX_ENABLEMENT).unwrap();

        mona.sensors.copy_from_slice(&[1.0, 1.0]);
        mona.sense();
        mona.enable();
        mona.mediator_mut(med).wagered_enablings.enablings[0].age = 2;

        // The effect shows up at half strength: the disabler fires at half.
        mona.sensors.copy_from_slice(&[2.0, 0.0]);
        mona.sense();
        assert_eq!(mona.neuron(g).firing_strength, 0.5);
        mona.enable();
        assert!((mona.neuron(med).firing_strength - 0.5).abs() < 1e-12);
    }

    #[test]
    fn wager_event_promotes_staged_effect_enablings() {
        let mut mona = quiet(1, 1);
        let c = mona.add_receptor(&[3.0], 0).unwrap();
        let s = mona.add_receptor(&[1.0], 0).unwrap();
        let g = mona.add_receptor(&[2.0], 0).unwrap();
        let low = mona.add_mediator(&[s], &[], g, true, MAX_ENABLEMENT).unwrap();
        let high = mona.add_mediator(&[c], &[], low, true, MAX_ENABLEMENT).unwrap();

        mona.sensors[0] = 3.0;
        mona.sense();
        mona.enable();
        {
            let m = mona.mediator(high);
            assert!((m.effect_enablings.value() - 1.0).abs() < 1e-12);
            assert!(m.wagered_enablings.is_empty());
        }

        // `low` is enabled, which is a wager event for `high`.
        mona.sensors[0] = 1.0;
        mona.sense();
        mona.enable();
        let m = mona.mediator(high);
        assert!(m.effect_enablings.value().abs() < 1e-12);
        assert!((m.wagered_enablings.value() - 1.0).abs() < 1e-12);
        let w = m.wagered_enablings.iter().find(|e| e.value > 0.0).unwrap();
        assert_eq!(w.effect_begin, Some(0));
        assert!(w.new_in_set);
    }
}
