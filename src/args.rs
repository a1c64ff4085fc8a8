//! Argument expansion.
//!
//! The compiler takes a description of the world as a mapping from argument
//! name to either a single [`Value`] or a list of candidate values. Before
//! instantiating any template, this mapping is expanded into the full
//! cartesian product of concrete [`ArgAssignment`]s, one per combination of
//! candidates.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{ArcStr, Value};

/// One concrete binding of every argument name to a single value.
///
/// Insertion order is the order arguments appeared in the source [`ArgSpec`],
/// which keeps expansion and node indexing reproducible.
pub type ArgAssignment = IndexMap<ArcStr, Value>;

/// A mapping from argument name to its candidate values, as supplied by the
/// caller or a world collaborator.
pub type ArgSpec = IndexMap<ArcStr, ArgValue>;

/// Either a fixed scalar or an ordered list of candidates for one argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// A single fixed value, held constant across the expansion.
    One(Value),
    /// An ordered list of candidates, enumerated by the expansion.
    Many(Vec<Value>),
}

impl ArgValue {
    /// A fixed scalar argument.
    pub fn one(value: impl Into<Value>) -> Self {
        ArgValue::One(value.into())
    }

    /// An ordered list of candidate values.
    pub fn many<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        ArgValue::Many(values.into_iter().map(Into::into).collect())
    }
}

/// A capability that yields the argument mapping for one compilation.
///
/// A raw [`ArgSpec`] works directly; world or environment collaborators
/// implement this to report the objects they currently contain.
pub trait ArgSource {
    /// Retrieve the argument mapping.
    fn arguments(&self) -> ArgSpec;
}

impl ArgSource for ArgSpec {
    fn arguments(&self) -> ArgSpec {
        self.clone()
    }
}

impl ArgSource for &ArgSpec {
    fn arguments(&self) -> ArgSpec {
        (*self).clone()
    }
}

/// Expands an argument mapping into the ordered sequence of all concrete
/// assignments.
///
/// Scalar arguments are held fixed; list arguments multiply the output by
/// their length, so a single empty candidate list yields no assignments at
/// all. Enumeration follows the insertion order of `spec`, with later
/// arguments varying fastest. An empty spec yields a single empty
/// assignment.
pub fn expand(spec: &ArgSpec) -> Vec<ArgAssignment> {
    let mut assignments = vec![ArgAssignment::new()];

    for (name, value) in spec {
        match value {
            ArgValue::One(value) => {
                for assignment in &mut assignments {
                    assignment.insert(name.clone(), value.clone());
                }
            }
            ArgValue::Many(values) => {
                let mut next = Vec::with_capacity(assignments.len() * values.len());
                for prefix in &assignments {
                    for value in values {
                        let mut assignment = prefix.clone();
                        assignment.insert(name.clone(), value.clone());
                        next.push(assignment);
                    }
                }
                assignments = next;
            }
        }
    }

    assignments
}

/// Parses an [`ArgSpec`] from a JSON object, e.g. a world description file.
///
/// ```json
/// { "object": ["red", "blue"], "drop_height": 3 }
/// ```
pub fn spec_from_json(json: &str) -> serde_json::Result<ArgSpec> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(entries: &[(&str, ArgValue)]) -> ArgSpec {
        entries
            .iter()
            .map(|(name, value)| (ArcStr::from(*name), value.clone()))
            .collect()
    }

    #[test]
    fn empty_spec_yields_one_empty_assignment() {
        let assignments = expand(&ArgSpec::new());
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].is_empty());
    }

    #[test]
    fn scalar_only_spec_yields_identity() {
        let spec = spec(&[("a", ArgValue::one("x")), ("b", ArgValue::one(7))]);
        let assignments = expand(&spec);

        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0]["a"], Value::from("x"));
        assert_eq!(assignments[0]["b"], Value::from(7));
    }

    #[test]
    fn product_size_and_distinctness() {
        let spec = spec(&[
            ("a", ArgValue::many(["x", "y"])),
            ("b", ArgValue::one(true)),
            ("c", ArgValue::many([1, 2, 3])),
        ]);
        let assignments = expand(&spec);

        assert_eq!(assignments.len(), 6);
        for (i, left) in assignments.iter().enumerate() {
            for right in &assignments[i + 1..] {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn empty_candidate_list_zeroes_the_product() {
        let spec = spec(&[
            ("a", ArgValue::many(["x", "y"])),
            ("b", ArgValue::Many(Vec::new())),
        ]);

        assert!(expand(&spec).is_empty());
    }

    #[test]
    fn later_arguments_vary_fastest() {
        let spec = spec(&[
            ("a", ArgValue::many(["x", "y"])),
            ("b", ArgValue::many([1, 2])),
        ]);
        let assignments = expand(&spec);

        let pairs: Vec<(String, String)> = assignments
            .iter()
            .map(|a| (a["a"].to_string(), a["b"].to_string()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("x".into(), "1".into()),
                ("x".into(), "2".into()),
                ("y".into(), "1".into()),
                ("y".into(), "2".into()),
            ]
        );
    }

    #[test]
    fn assignment_preserves_spec_order() {
        let spec = spec(&[("b", ArgValue::one(1)), ("a", ArgValue::many(["x"]))]);
        let assignments = expand(&spec);
        let names: Vec<&str> = assignments[0].keys().map(AsRef::as_ref).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn spec_parses_from_json() {
        let spec = spec_from_json(r#"{ "object": ["red", "blue"], "height": 3 }"#).unwrap();
        assert_eq!(spec["object"], ArgValue::many(["red", "blue"]));
        assert_eq!(spec["height"], ArgValue::one(3));

        let assignments = expand(&spec);
        assert_eq!(assignments.len(), 2);
    }
}
