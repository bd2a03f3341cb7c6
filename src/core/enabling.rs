//! In-flight enablement records owned by mediators.

use std::cmp::Ordering;

use crate::config::{Enablement, Motive, Time, Weight};
use crate::value_set::ValueSet;

/// One elementary firing: which neuron (by stable id) and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElemEvent {
    pub id: u64,
    pub timestamp: Time,
}

impl ElemEvent {
    pub fn new(id: u64, timestamp: Time) -> Self {
        Self { id, timestamp }
    }
}

impl Ord for ElemEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for ElemEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merge several event trails into one ordered by (timestamp, id).
pub fn merge_event_trails<'a, I>(trails: I) -> Vec<ElemEvent>
where
    I: IntoIterator<Item = &'a [ElemEvent]>,
{
    let mut out: Vec<ElemEvent> = trails.into_iter().flatten().copied().collect();
    // Stable so identical events keep source order.
    out.sort();
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enabling {
    pub value: Enablement,
    pub motive: Motive,
    // Needs at creation.
    pub need_save: ValueSet,
    pub age: Time,
    pub timer_index: usize,
    pub cause_begin: Time,
    pub effect_begin: Option<Time>,
    pub events: Vec<ElemEvent>,

    // Per-phase flags.
    pub new_in_set: bool,
    pub effect_wager: bool,
    pub parasite: bool,
}

impl Enabling {
    pub fn new(
        value: Enablement,
        motive: Motive,
        need_save: &ValueSet,
        age: Time,
        timer_index: usize,
        cause_begin: Time,
    ) -> Self {
        Self {
            value,
            motive,
            need_save: need_save.clone(),
            age,
            timer_index,
            cause_begin,
            effect_begin: None,
            events: Vec::new(),
            new_in_set: false,
            effect_wager: false,
            parasite: false,
        }
    }

    pub fn append_events(&mut self, events: &[ElemEvent]) {
        self.events.extend_from_slice(events);
    }

    /// Split off `fraction` of this enabling's value into a clone.
    pub fn split(&mut self, fraction: Weight) -> Enabling {
        let mut part = self.clone();
        part.value *= fraction;
        self.value *= 1.0 - fraction;
        part
    }
}

/// An ordered collection of enablings attached to one mediator slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnablingSet {
    pub enablings: Vec<Enabling>,
}

impl EnablingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.enablings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enablings.is_empty()
    }

    /// Insert an enabling; it is marked new for the rest of the phase.
    pub fn insert(&mut self, mut enabling: Enabling) {
        enabling.new_in_set = true;
        self.enablings.push(enabling);
    }

    /// Insert an enabling that counts as already present this phase.
    pub fn insert_settled(&mut self, mut enabling: Enabling) {
        enabling.new_in_set = false;
        self.enablings.push(enabling);
    }

    pub fn value(&self) -> Enablement {
        self.enablings.iter().map(|e| e.value).sum()
    }

    /// Total value of entries that were present before this phase.
    pub fn settled_value(&self) -> Enablement {
        self.enablings
            .iter()
            .filter(|e| !e.new_in_set)
            .map(|e| e.value)
            .sum()
    }

    pub fn clear_flags(&mut self) {
        for e in &mut self.enablings {
            e.new_in_set = false;
            e.effect_wager = false;
            e.parasite = false;
        }
    }

    pub fn clear(&mut self) {
        self.enablings.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Enabling> {
        self.enablings.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Enabling> {
        self.enablings.iter_mut()
    }
}

/// A cause firing waiting for its sibling causes.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEnabling {
    pub strength: Weight,
    pub age: Time,
    pub cause_begin: Time,
    pub events: Vec<ElemEvent>,
}

/// Fraction of `enablement` a firing of `strength` can move.
///
/// A strength of 1 can move up to `MAX_ENABLEMENT`; zero enablement moves nothing.
pub fn transfer_fraction(strength: Weight, enablement: Enablement) -> Weight {
    use crate::config::MAX_ENABLEMENT;
    if enablement <= 0.0 {
        0.0
    } else if strength >= enablement / MAX_ENABLEMENT {
        1.0
    } else {
        (MAX_ENABLEMENT * strength) / enablement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_trail_is_ordered_by_time_then_id() {
        let a = [ElemEvent::new(3, 5)];
        let b = [ElemEvent::new(1, 5), ElemEvent::new(2, 6)];
        let merged = merge_event_trails([&a[..], &b[..]]);
        assert_eq!(
            merged,
            vec![
                ElemEvent::new(1, 5),
                ElemEvent::new(3, 5),
                ElemEvent::new(2, 6)
            ]
        );
    }

    #[test]
    fn split_conserves_value() {
        let mut e = Enabling::new(0.8, 0.0, &ValueSet::zeros(1), 0, 0, 0);
        let part = e.split(0.25);
        assert!((part.value - 0.2).abs() < 1e-12);
        assert!((e.value - 0.6).abs() < 1e-12);
    }

    #[test]
    fn set_flags_and_values() {
        let mut s = EnablingSet::new();
        s.insert(Enabling::new(0.3, 0.0, &ValueSet::zeros(1), 0, 0, 0));
        assert!(s.enablings[0].new_in_set);
        assert_eq!(s.settled_value(), 0.0);
        s.clear_flags();
        assert!((s.settled_value() - 0.3).abs() < 1e-12);
        assert!((s.value() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn transfer_fraction_cases() {
        assert_eq!(transfer_fraction(1.0, 0.5), 1.0);
        assert!((transfer_fraction(0.25, 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(transfer_fraction(0.0, 0.0), 0.0);
        assert_eq!(transfer_fraction(1.0, 0.0), 0.0);
        assert_eq!(transfer_fraction(-0.1, 0.0), 0.0);
    }
}
