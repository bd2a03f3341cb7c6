//! Neuron data model: receptors, motors and mediators in one arena.
//!
//! Neurons refer to each other through [`NeuronId`] handles into the owning
//! network's arena. Mediators own their enabling sets; every other relation
//! (causes, intermediates, effect, notify lists) is a handle.

use crate::config::{Enablement, Motive, Sensor, Time, Weight};
use crate::enabling::{EnablingSet, PendingEnabling};
use crate::motive::MotiveAccum;
use crate::value_set::GoalValue;

/// Arena handle. Slots are reused after deletion; the generation tells a
/// stale handle apart from the slot's current occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeuronId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl NeuronId {
    pub(crate) const fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeuronType {
    Receptor,
    Motor,
    Mediator,
}

impl NeuronType {
    pub fn as_str(self) -> &'static str {
        match self {
            NeuronType::Receptor => "receptor",
            NeuronType::Motor => "motor",
            NeuronType::Mediator => "mediator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Cause,
    Intermediate,
    Effect,
    Wager,
}

impl EventType {
    // Notify lists are kept effect-first, then intermediate, then cause.
    fn notify_rank(self) -> u8 {
        match self {
            EventType::Effect => 0,
            EventType::Intermediate => 1,
            EventType::Cause => 2,
            EventType::Wager => 3,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            EventType::Cause => 0,
            EventType::Intermediate => 1,
            EventType::Effect => 2,
            EventType::Wager => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EventType::Cause),
            1 => Some(EventType::Intermediate),
            2 => Some(EventType::Effect),
            3 => Some(EventType::Wager),
            _ => None,
        }
    }
}

/// Back-reference: `mediator` watches this neuron as its `event_type` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notify {
    pub mediator: NeuronId,
    pub event_type: EventType,
    pub event_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receptor {
    // None is a don't-care sensor.
    pub pattern: Vec<Option<Sensor>>,
    pub sensor_mode: usize,
}

impl Receptor {
    pub fn is_duplicate(&self, pattern: &[Option<Sensor>], sensor_mode: usize) -> bool {
        self.sensor_mode == sensor_mode && self.pattern.as_slice() == pattern
    }

    /// True if every sensor this receptor cares about is matched by `other`.
    pub fn subsumes(&self, other: &Receptor) -> bool {
        self.pattern
            .iter()
            .zip(&other.pattern)
            .all(|(mine, theirs)| match mine {
                None => true,
                Some(v) => *theirs == Some(*v),
            })
    }

    pub fn defined_sensors(&self) -> usize {
        self.pattern.iter().filter(|s| s.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    pub response: usize,
    // Neurons on the winning drive path of the last drive phase.
    pub drivers: Vec<NeuronId>,
    pub(crate) driver_work: Vec<NeuronId>,
}

impl Motor {
    pub fn new(response: usize) -> Self {
        Self {
            response,
            drivers: Vec::new(),
            driver_work: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mediator {
    pub causes: Vec<NeuronId>,
    pub intermediates: Vec<NeuronId>,
    pub effect: Option<NeuronId>,
    pub enabler: bool,
    pub instinct: bool,
    pub level: usize,

    pub base_enablement: Enablement,
    pub intermediate_enablements: Vec<Enablement>,
    pub effect_enablement: Enablement,

    pub pending_enablings: Vec<Vec<PendingEnabling>>,
    pub intermediate_enablings: Vec<EnablingSet>,
    pub effect_enablings: EnablingSet,
    pub wagered_enablings: EnablingSet,

    pub timed_wager_weights: Vec<Weight>,
    pub utility: Weight,
    pub cause_begin: Time,
}

impl Mediator {
    pub fn new(enablement: Enablement, enabler: bool, utility: Weight, num_timers: usize) -> Self {
        let n = num_timers.max(1);
        Self {
            causes: Vec::new(),
            intermediates: Vec::new(),
            effect: None,
            enabler,
            instinct: false,
            level: 0,
            base_enablement: enablement,
            intermediate_enablements: Vec::new(),
            effect_enablement: enablement,
            pending_enablings: Vec::new(),
            intermediate_enablings: Vec::new(),
            effect_enablings: EnablingSet::new(),
            wagered_enablings: EnablingSet::new(),
            timed_wager_weights: vec![1.0 / n as f64; n],
            utility,
            cause_begin: 0,
        }
    }

    /// Enablement currently staged in slots.
    pub fn enablement_out(&self) -> Enablement {
        self.intermediate_enablings
            .iter()
            .map(EnablingSet::value)
            .sum::<Enablement>()
            + self.effect_enablings.value()
            + self.wagered_enablings.value()
    }

    /// Total committed capacity: unspent base plus everything staged.
    pub fn total_enablement(&self) -> Enablement {
        self.base_enablement + self.enablement_out()
    }

    /// Reset the updated enablement of every intermediate slot and the effect slot.
    pub(crate) fn set_slot_enablements(&mut self, enablement: Enablement) {
        self.intermediate_enablements
            .iter_mut()
            .for_each(|e| *e = enablement);
        self.effect_enablement = enablement;
    }

    pub fn clear_flags(&mut self) {
        for set in &mut self.intermediate_enablings {
            set.clear_flags();
        }
        self.effect_enablings.clear_flags();
        self.wagered_enablings.clear_flags();
    }

    pub fn enabling_count(&self) -> usize {
        self.intermediate_enablings
            .iter()
            .map(EnablingSet::len)
            .sum::<usize>()
            + self.effect_enablings.len()
            + self.wagered_enablings.len()
    }

    pub fn for_each_enabling_mut<F: FnMut(&mut crate::enabling::Enabling)>(&mut self, mut f: F) {
        for set in &mut self.intermediate_enablings {
            set.iter_mut().for_each(&mut f);
        }
        self.effect_enablings.iter_mut().for_each(&mut f);
        self.wagered_enablings.iter_mut().for_each(&mut f);
    }

    /// Same enabler, same causes as a set, same intermediates in order, same effect.
    pub fn is_duplicate(&self, other: &Mediator) -> bool {
        self.enabler == other.enabler
            && self.causes.len() == other.causes.len()
            && self.causes.iter().all(|c| other.causes.contains(c))
            && self.intermediates == other.intermediates
            && self.effect == other.effect
    }

    /// Every neuron this mediator is built from, in slot order.
    pub fn components(&self) -> impl Iterator<Item = (EventType, usize, NeuronId)> + '_ {
        let causes = self
            .causes
            .iter()
            .enumerate()
            .map(|(i, n)| (EventType::Cause, i, *n));
        let intermediates = self
            .intermediates
            .iter()
            .enumerate()
            .map(|(i, n)| (EventType::Intermediate, i, *n));
        let effect = self.effect.map(|n| (EventType::Effect, 0, n));
        causes.chain(intermediates).chain(effect)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NeuronKind {
    Receptor(Receptor),
    Motor(Motor),
    Mediator(Box<Mediator>),
}

#[derive(Debug, Clone)]
pub struct Neuron {
    pub id: u64,
    pub description: String,
    pub firing_strength: Weight,
    pub goals: GoalValue,
    pub motive: Motive,
    pub motive_valid: bool,
    // 0: enabling drive, 1: disabling drive.
    pub accum: [MotiveAccum; 2],
    pub notify_list: Vec<Notify>,
    // Accepted drive calls in the last drive phase.
    pub drive_visits: u32,
    pub kind: NeuronKind,
}

impl Neuron {
    pub fn new(id: u64, description: String, num_needs: usize, kind: NeuronKind) -> Self {
        Self {
            id,
            description,
            firing_strength: 0.0,
            goals: GoalValue::new(num_needs),
            motive: 0.0,
            motive_valid: false,
            accum: [MotiveAccum::new(num_needs), MotiveAccum::new(num_needs)],
            notify_list: Vec::new(),
            drive_visits: 0,
            kind,
        }
    }

    pub fn neuron_type(&self) -> NeuronType {
        match self.kind {
            NeuronKind::Receptor(_) => NeuronType::Receptor,
            NeuronKind::Motor(_) => NeuronType::Motor,
            NeuronKind::Mediator(_) => NeuronType::Mediator,
        }
    }

    pub fn is_motor(&self) -> bool {
        matches!(self.kind, NeuronKind::Motor(_))
    }

    pub fn as_receptor(&self) -> Option<&Receptor> {
        match &self.kind {
            NeuronKind::Receptor(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_motor(&self) -> Option<&Motor> {
        match &self.kind {
            NeuronKind::Motor(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mediator(&self) -> Option<&Mediator> {
        match &self.kind {
            NeuronKind::Mediator(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mediator_mut(&mut self) -> Option<&mut Mediator> {
        match &mut self.kind {
            NeuronKind::Mediator(m) => Some(m),
            _ => None,
        }
    }

    /// Level a mediator built on this neuron would need to exceed.
    pub fn level(&self) -> Option<usize> {
        self.as_mediator().map(|m| m.level)
    }

    pub(crate) fn add_notify(&mut self, notify: Notify) {
        self.notify_list.push(notify);
        self.notify_list
            .sort_by_key(|n| n.event_type.notify_rank());
    }

    pub(crate) fn remove_notify(&mut self, mediator: NeuronId) {
        self.notify_list.retain(|n| n.mediator != mediator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_list_is_effect_first() {
        let mut n = Neuron::new(
            1,
            "r".into(),
            1,
            NeuronKind::Receptor(Receptor {
                pattern: vec![Some(1.0)],
                sensor_mode: 0,
            }),
        );
        n.add_notify(Notify {
            mediator: NeuronId::new(5, 0),
            event_type: EventType::Cause,
            event_index: 0,
        });
        n.add_notify(Notify {
            mediator: NeuronId::new(6, 0),
            event_type: EventType::Effect,
            event_index: 0,
        });
        n.add_notify(Notify {
            mediator: NeuronId::new(7, 0),
            event_type: EventType::Intermediate,
            event_index: 0,
        });
        let order: Vec<EventType> = n.notify_list.iter().map(|x| x.event_type).collect();
        assert_eq!(
            order,
            vec![EventType::Effect, EventType::Intermediate, EventType::Cause]
        );
        n.remove_notify(NeuronId::new(6, 0));
        assert_eq!(n.notify_list.len(), 2);
    }

    #[test]
    fn receptor_subsumption() {
        let general = Receptor {
            pattern: vec![Some(1.0), None],
            sensor_mode: 1,
        };
        let specific = Receptor {
            pattern: vec![Some(1.0), Some(0.0)],
            sensor_mode: 0,
        };
        assert!(general.subsumes(&specific));
        assert!(!specific.subsumes(&general));
        assert!(specific.is_duplicate(&[Some(1.0), Some(0.0)], 0));
        assert!(!specific.is_duplicate(&[Some(1.0), Some(0.0)], 1));
    }

    #[test]
    fn mediator_duplicate_ignores_cause_order() {
        let mut a = Mediator::new(0.5, true, 0.5, 1);
        a.causes = vec![NeuronId::new(1, 0), NeuronId::new(2, 0)];
        a.effect = Some(NeuronId::new(3, 0));
        let mut b = a.clone();
        b.causes = vec![NeuronId::new(2, 0), NeuronId::new(1, 0)];
        assert!(a.is_duplicate(&b));
        b.enabler = false;
        assert!(!a.is_duplicate(&b));
    }
}
