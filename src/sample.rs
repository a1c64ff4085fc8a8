//! Randomized rollout sampling.
//!
//! A rollout is one root-to-leaf walk over a compiled [`TaskGraph`]: starting
//! at the root, pick a child uniformly at random until a node with no
//! children is reached. External training loops use these walks to produce
//! candidate action sequences.

use rand::Rng;

use crate::error::QueryError;
use crate::graph::{InstanceKey, TaskGraph};
use crate::task::Task;
use crate::template::OptionHandle;

/// One sampled root-to-leaf walk. The root itself is the walk's start but is
/// not recorded; `keys` and `options` are parallel.
#[derive(Clone)]
pub struct Rollout {
    /// Visited instance keys, in order.
    pub keys: Vec<InstanceKey>,
    /// The option handle of each visited node.
    pub options: Vec<OptionHandle>,
}

impl Rollout {
    /// Number of steps in the walk.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the root was already terminal.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl TaskGraph {
    /// Samples one rollout using the thread-local RNG.
    pub fn sample_sequence(&self) -> Rollout {
        self.sample_sequence_with(&mut rand::thread_rng())
    }

    /// Samples one rollout using the supplied RNG, for reproducible walks.
    pub fn sample_sequence_with<R: Rng>(&self, rng: &mut R) -> Rollout {
        let mut keys = Vec::new();
        let mut options = Vec::new();
        let mut current = self.root();

        // A loop-free graph walks at most `num_actions` nodes; capping the
        // walk turns accidental wiring cycles into truncation, not a hang.
        for _ in 0..self.num_actions() {
            let children = self.children_of(current);
            if children.is_empty() {
                return Rollout { keys, options };
            }

            current = children[rng.gen_range(0..children.len())];
            let node = self.node(current);
            keys.push(node.key.clone());
            options.push(node.option.clone());
        }

        tracing::warn!("sampling walk hit the node-count cap; graph wiring may be cyclic");
        Rollout { keys, options }
    }
}

impl Task {
    /// Samples one rollout from the compiled graph. See
    /// [`TaskGraph::sample_sequence`].
    pub fn sample_sequence(&self) -> Result<Rollout, QueryError> {
        Ok(self.graph()?.sample_sequence())
    }

    /// Samples one rollout using the supplied RNG.
    pub fn sample_sequence_with<R: Rng>(&self, rng: &mut R) -> Result<Rollout, QueryError> {
        Ok(self.graph()?.sample_sequence_with(rng))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::args::{ArgSpec, ArgValue};
    use crate::template::TemplateSpec;

    fn leaf_spec() -> TemplateSpec {
        TemplateSpec::leaf(["object"], |kwargs| {
            Ok(Arc::new(kwargs["object"].clone()) as OptionHandle)
        })
    }

    fn compiled_chain() -> Task {
        let mut task = Task::new();
        task.add("pick", &[], Some(leaf_spec())).unwrap();
        task.add("place", &["pick"], Some(leaf_spec())).unwrap();
        task.add("retract", &["place"], Some(leaf_spec())).unwrap();

        let mut spec = ArgSpec::new();
        spec.insert("object".into(), ArgValue::many(["red", "blue", "green"]));
        task.compile(&spec).unwrap();
        task
    }

    #[test]
    fn sampling_before_compile_is_rejected() {
        let task = Task::new();
        assert!(matches!(
            task.sample_sequence(),
            Err(QueryError::NotCompiled)
        ));
    }

    #[test]
    fn walks_terminate_at_a_leaf() {
        let task = compiled_chain();
        let graph = task.graph().unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let rollout = graph.sample_sequence_with(&mut rng);

            assert_eq!(rollout.keys.len(), rollout.options.len());
            assert_eq!(rollout.len(), 3); // pick, place, retract
            let last = rollout.keys.last().unwrap();
            assert!(graph.get_children(last).is_empty());
        }
    }

    #[test]
    fn the_root_is_not_recorded() {
        let task = compiled_chain();
        let graph = task.graph().unwrap();
        let rollout = graph.sample_sequence_with(&mut StdRng::seed_from_u64(0));

        assert!(rollout.keys.iter().all(|key| key != graph.root_key()));
    }

    #[test]
    fn a_root_only_graph_yields_an_empty_rollout() {
        let mut task = Task::new();
        task.compile(&ArgSpec::new()).unwrap();

        let rollout = task.sample_sequence().unwrap();
        assert!(rollout.is_empty());
    }

    #[test]
    fn seeded_walks_are_reproducible() {
        let task = compiled_chain();

        let left = task
            .sample_sequence_with(&mut StdRng::seed_from_u64(42))
            .unwrap();
        let right = task
            .sample_sequence_with(&mut StdRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(left.keys, right.keys);
    }

    #[test]
    fn a_walk_stays_on_one_argument_branch() {
        let task = compiled_chain();
        let rollout = task
            .sample_sequence_with(&mut StdRng::seed_from_u64(3))
            .unwrap();

        // pick/place/retract of the same pass share their object binding
        let first = rollout.keys[0].bindings().to_vec();
        for key in &rollout.keys {
            assert_eq!(key.bindings(), first.as_slice());
        }
    }
}
