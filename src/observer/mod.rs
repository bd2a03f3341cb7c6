use crate::config::{Enablement, Motive, Need, Time, Weight};
use crate::mona::{Diagnostics, Mona};
use crate::neuron::{Neuron, NeuronKind};

#[cfg(feature = "serde")]
use serde::Serialize;

/// A read-only snapshot of the network.
///
/// Observers cannot mutate the network. Snapshotting allocates and is meant
/// for dumps and tooling, not for the cycle loop.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MonaSnapshot {
    pub event_clock: Time,
    pub needs: Vec<Need>,
    pub response: Option<usize>,
    pub response_override: Option<usize>,
    pub diagnostics: Diagnostics,
    pub neurons: Vec<NeuronSnapshot>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct NeuronSnapshot {
    pub id: u64,
    pub kind: &'static str,
    pub description: String,
    pub firing_strength: Weight,
    pub motive: Motive,
    pub goal: Need,
    pub mediator: Option<MediatorSnapshot>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MediatorSnapshot {
    pub level: usize,
    pub enabler: bool,
    pub instinct: bool,
    pub causes: Vec<u64>,
    pub intermediates: Vec<u64>,
    pub effect: Option<u64>,
    pub base_enablement: Enablement,
    pub total_enablement: Enablement,
    pub utility: Weight,
    pub enablings: usize,
}

pub struct MonaAdapter<'a> {
    mona: &'a Mona,
}

impl<'a> MonaAdapter<'a> {
    pub fn new(mona: &'a Mona) -> Self {
        Self { mona }
    }

    pub fn snapshot(&self) -> MonaSnapshot {
        let m = self.mona;
        let neurons = m
            .receptors()
            .iter()
            .chain(m.motors())
            .chain(m.mediators())
            .filter_map(|&id| m.get(id))
            .map(|n| self.neuron_snapshot(n))
            .collect();

        MonaSnapshot {
            event_clock: m.event_clock(),
            needs: m.needs().to_vec(),
            response: m.response(),
            response_override: m.response_override(),
            diagnostics: m.diagnostics(),
            neurons,
        }
    }

    fn neuron_snapshot(&self, n: &Neuron) -> NeuronSnapshot {
        let id_of = |h| self.mona.get(h).map(|n: &Neuron| n.id);
        let mediator = match &n.kind {
            NeuronKind::Mediator(med) => Some(MediatorSnapshot {
                level: med.level,
                enabler: med.enabler,
                instinct: med.instinct,
                causes: med.causes.iter().filter_map(|&c| id_of(c)).collect(),
                intermediates: med.intermediates.iter().filter_map(|&i| id_of(i)).collect(),
                effect: med.effect.and_then(id_of),
                base_enablement: med.base_enablement,
                total_enablement: med.total_enablement(),
                utility: med.utility,
                enablings: med.enabling_count(),
            }),
            _ => None,
        };
        NeuronSnapshot {
            id: n.id,
            kind: n.neuron_type().as_str(),
            description: n.description.clone(),
            firing_strength: n.firing_strength,
            motive: n.motive,
            goal: n.goals.value(),
            mediator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonaConfig;

    #[test]
    fn snapshot_mirrors_network() {
        let mut mona = Mona::new(MonaConfig::new(1, 2, 1).without_learning()).unwrap();
        mona.set_need(0, 2.0).unwrap();
        let goal = mona.add_goal(0, &[1.0], 0, Some(0), 1.0).unwrap();
        mona.cycle(&[1.0]).unwrap();

        let snap = MonaAdapter::new(&mona).snapshot();
        assert_eq!(snap.event_clock, 1);
        assert_eq!(snap.needs, vec![2.0]);
        assert_eq!(snap.neurons.len(), 4);
        assert_eq!(snap.neurons[0].kind, "receptor");
        let med = snap.neurons.iter().find(|n| n.id == goal).unwrap();
        let info = med.mediator.as_ref().unwrap();
        assert!(info.instinct);
        assert_eq!(info.causes, vec![snap.neurons[0].id]);
        assert_eq!(info.effect, Some(0));
        assert_eq!(snap.diagnostics.mediators, 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serializes_to_json() {
        let mona = Mona::new(MonaConfig::new(1, 1, 1)).unwrap();
        let json = serde_json::to_string(&MonaAdapter::new(&mona).snapshot()).unwrap();
        assert!(json.contains("\"kind\":\"motor\""));
        assert!(json.contains("\"event_clock\":0"));
    }
}
