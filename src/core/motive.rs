//! Motive accumulators carried through the drive phase.

use crate::config::{Motive, Need, Weight, MAX_NEED};
use crate::value_set::{GoalValue, ValueSet};

/// Need-change signal flowing through the network while driving.
///
/// `base` is the need vector at the seed, `delta` the accumulated need
/// change. `value()` reduces the pair to a scalar motive bounded by the
/// needs actually available to satisfy (or to worsen up to `MAX_NEED`).
#[derive(Debug, Clone, Default)]
pub struct MotiveAccum {
    pub base: ValueSet,
    pub delta: ValueSet,
    pub weight: Weight,
    pub enabler: bool,
}

impl MotiveAccum {
    pub fn new(num_needs: usize) -> Self {
        Self {
            base: ValueSet::zeros(num_needs),
            delta: ValueSet::zeros(num_needs),
            weight: 1.0,
            enabler: true,
        }
    }

    pub fn value(&self) -> Motive {
        let mut v = 0.0;
        for i in 0..self.delta.len() {
            let b: Need = self.base.get(i);
            let d: Need = self.delta.get(i);
            if d < 0.0 {
                if b + d < 0.0 {
                    v += b;
                } else {
                    v -= d;
                }
            } else if b + d > MAX_NEED {
                v -= MAX_NEED - b;
            } else {
                v -= d;
            }
        }
        v
    }

    /// Fresh accumulator seeded from the need vector.
    pub fn init(&mut self, needs: &ValueSet) {
        self.base.load(needs);
        self.delta = ValueSet::zeros(needs.len());
        self.weight = 1.0;
        self.enabler = true;
    }

    /// Derive from `accum`, scaled by `weight`.
    pub fn config(&mut self, accum: &MotiveAccum, weight: Weight) {
        self.init(&accum.base);
        self.load_needs(accum);
        self.delta.multiply(weight);
        self.weight *= weight;
    }

    pub fn load_needs(&mut self, accum: &MotiveAccum) {
        self.delta.load(&accum.delta);
    }

    pub fn accum_goals(&mut self, goals: &GoalValue) {
        let mut v = goals.goals.clone();
        v.multiply(self.weight);
        self.delta.subtract(&v);
    }

    pub fn reset(&mut self) {
        self.delta.zero();
        self.weight = 1.0;
        self.enabler = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needs(v: &[f64]) -> ValueSet {
        ValueSet::from_vec(v.to_vec())
    }

    #[test]
    fn value_is_bounded_by_available_need() {
        let mut a = MotiveAccum::new(1);
        a.init(&needs(&[0.5]));
        let mut g = GoalValue::new(1);
        g.set_goal(0, 2.0);
        a.accum_goals(&g);
        // Can only satisfy what is there.
        assert!((a.value() - 0.5).abs() < 1e-12);

        a.init(&needs(&[5.0]));
        a.accum_goals(&g);
        assert!((a.value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn negative_goal_is_capped_at_max_need() {
        let mut a = MotiveAccum::new(1);
        a.init(&needs(&[9.0]));
        let mut g = GoalValue::new(1);
        g.set_goal(0, -3.0);
        a.accum_goals(&g);
        assert!((a.value() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn config_scales_delta_and_weight() {
        let mut a = MotiveAccum::new(2);
        a.init(&needs(&[4.0, 4.0]));
        let mut g = GoalValue::new(2);
        g.set_goal(0, 1.0);
        g.set_goal(1, 1.0);
        a.accum_goals(&g);

        let mut b = MotiveAccum::new(2);
        b.config(&a, 0.5);
        assert!((b.value() - 1.0).abs() < 1e-12);
        assert!((b.weight - 0.5).abs() < 1e-12);
        b.reset();
        assert_eq!(b.value(), 0.0);
    }
}
