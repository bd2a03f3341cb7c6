//! Fixed-length scalar vectors (needs, goals) and goal values.

use crate::config::Need;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet {
    values: Vec<f64>,
}

impl ValueSet {
    pub fn zeros(n: usize) -> Self {
        Self {
            values: vec![0.0; n],
        }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> f64 {
        self.values[i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, v: f64) {
        self.values[i] = v;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn zero(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Copy `other` into self, adopting its length.
    pub fn load(&mut self, other: &ValueSet) {
        self.values.clear();
        self.values.extend_from_slice(&other.values);
    }

    pub fn multiply(&mut self, k: f64) {
        self.values.iter_mut().for_each(|v| *v *= k);
    }

    pub fn add(&mut self, other: &ValueSet) {
        debug_assert_eq!(self.len(), other.len());
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a += *b;
        }
    }

    pub fn subtract(&mut self, other: &ValueSet) {
        debug_assert_eq!(self.len(), other.len());
        for (a, b) in self.values.iter_mut().zip(&other.values) {
            *a -= *b;
        }
    }
}

/// Per-need goal values attached to a neuron.
///
/// A neuron whose goal sum is non-zero seeds the drive phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalValue {
    pub goals: ValueSet,
    pub weight: f64,
}

impl GoalValue {
    pub fn new(num_needs: usize) -> Self {
        Self {
            goals: ValueSet::zeros(num_needs),
            weight: 0.0,
        }
    }

    pub fn value(&self) -> Need {
        self.goals.sum()
    }

    pub fn value_at(&self, need: usize) -> Need {
        self.goals.get(need)
    }

    pub fn set_goal(&mut self, need: usize, value: Need) {
        self.goals.set(need, value);
        self.weight = 1.0;
    }

    pub fn is_active(&self) -> bool {
        self.value() != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let mut a = ValueSet::from_vec(vec![1.0, 2.0, 3.0]);
        let b = ValueSet::from_vec(vec![0.5, 0.5, 0.5]);
        a.subtract(&b);
        assert_eq!(a.as_slice(), &[0.5, 1.5, 2.5]);
        a.multiply(2.0);
        assert_eq!(a.sum(), 9.0);
        a.add(&b);
        assert_eq!(a.get(0), 1.5);
        a.zero();
        assert_eq!(a.sum(), 0.0);
    }

    #[test]
    fn goal_activity() {
        let mut g = GoalValue::new(2);
        assert!(!g.is_active());
        g.set_goal(1, 0.75);
        assert!(g.is_active());
        assert_eq!(g.value_at(1), 0.75);
        assert_eq!(g.value(), 0.75);
    }
}
