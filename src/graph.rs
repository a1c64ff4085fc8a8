//! The compiled task graph.
//!
//! A [`TaskGraph`] is the frozen artifact of one [`compile`] call: every
//! instantiated node keyed by its canonical [`InstanceKey`], a dense
//! `index ⇄ key` bijection assigned once at freeze time, and the children
//! wiring laid down during instantiation. After freezing the graph is
//! immutable, so read-only lookups and sampling walks are safe from multiple
//! threads without locking.
//!
//! [`compile`]: crate::Task::compile

use std::fmt;

use indexmap::IndexMap;
use petgraph::Graph;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::args::ArgAssignment;
use crate::error::QueryError;
use crate::template::{OptionHandle, TemplateName};
use crate::value::{ArcStr, Value};

/// Canonical identity of a compiled node: the template name plus the
/// concrete argument bindings it was instantiated with, sorted by name.
///
/// Sorting makes identity independent of argument declaration order, and the
/// structured form avoids the collisions a formatted string would invite.
/// [`InstanceKey`] implements `Display` purely as a debug rendering, e.g.
/// `pick(object=red)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    template: TemplateName,
    bindings: Vec<(ArcStr, Value)>,
}

impl InstanceKey {
    /// Builds a key from a template name and its argument bindings.
    pub fn new<I, S, V>(template: TemplateName, bindings: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<ArcStr>,
        V: Into<Value>,
    {
        let mut bindings: Vec<(ArcStr, Value)> = bindings
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));

        InstanceKey { template, bindings }
    }

    pub(crate) fn from_kwargs(template: &TemplateName, kwargs: &ArgAssignment) -> Self {
        InstanceKey::new(
            template.clone(),
            kwargs.iter().map(|(name, value)| (name.clone(), value.clone())),
        )
    }

    /// The template this node was instantiated from.
    pub fn template(&self) -> &TemplateName {
        &self.template
    }

    /// The sorted argument bindings of this instance.
    pub fn bindings(&self) -> &[(ArcStr, Value)] {
        &self.bindings
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.template)?;
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}

/// One instantiated node.
#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) key: InstanceKey,
    pub(crate) option: OptionHandle,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, Option(*))", self.key)
    }
}

/// Accumulates nodes and edges during one compilation pass, then freezes
/// into a [`TaskGraph`].
pub(crate) struct GraphBuilder {
    graph: Graph<Node, ()>,
    lookup: IndexMap<InstanceKey, NodeIndex>,
    root: NodeIndex,
}

impl GraphBuilder {
    /// Starts a builder already holding the root node at index 0, so every
    /// frozen graph has a root even when expansion yields no assignments.
    pub(crate) fn new(root_key: InstanceKey, root_option: OptionHandle) -> Self {
        let mut graph = Graph::new();
        let root = graph.add_node(Node {
            key: root_key.clone(),
            option: root_option,
        });

        let mut lookup = IndexMap::new();
        lookup.insert(root_key, root);

        GraphBuilder {
            graph,
            lookup,
            root,
        }
    }

    pub(crate) fn find(&self, key: &InstanceKey) -> Option<NodeIndex> {
        self.lookup.get(key).copied()
    }

    /// Adds a node; indices are dense and follow creation order, which is
    /// what later backs the `index ⇄ key` bijection.
    pub(crate) fn insert(&mut self, key: InstanceKey, option: OptionHandle) -> NodeIndex {
        let index = self.graph.add_node(Node {
            key: key.clone(),
            option,
        });
        self.lookup.insert(key, index);
        index
    }

    /// Wires `parent → child`, keeping the first-inserted edge on repeats so
    /// children order stays stable.
    pub(crate) fn connect(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.graph.update_edge(parent, child, ());
    }

    pub(crate) fn freeze(self) -> TaskGraph {
        let mut children = vec![Vec::new(); self.graph.node_count()];

        // Edge references iterate in insertion order, so each node's
        // children come out in the order they were first wired.
        for edge in self.graph.edge_references() {
            children[edge.source().index()].push(edge.target());
        }

        TaskGraph {
            root: self.root,
            graph: self.graph,
            lookup: self.lookup,
            children,
        }
    }
}

/// The frozen, indexed graph of instantiated options.
#[derive(Debug)]
pub struct TaskGraph {
    graph: Graph<Node, ()>,
    lookup: IndexMap<InstanceKey, NodeIndex>,
    children: Vec<Vec<NodeIndex>>,
    root: NodeIndex,
}

impl TaskGraph {
    /// Count of distinct nodes, root included. Indices run `0..num_actions()`.
    pub fn num_actions(&self) -> usize {
        self.graph.node_count()
    }

    /// The key of the implicit root node.
    pub fn root_key(&self) -> &InstanceKey {
        &self.graph[self.root].key
    }

    /// The option held by the implicit root node.
    pub fn root_option(&self) -> OptionHandle {
        self.graph[self.root].option.clone()
    }

    /// The children of `key`, in first-wired order.
    ///
    /// Unknown keys yield an empty list rather than an error, so external
    /// planners can probe speculatively.
    pub fn get_children(&self, key: &InstanceKey) -> Vec<InstanceKey> {
        match self.lookup.get(key) {
            Some(&index) => self.children[index.index()]
                .iter()
                .map(|&child| self.graph[child].key.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// The option instantiated for `key`.
    pub fn get_option(&self, key: &InstanceKey) -> Result<OptionHandle, QueryError> {
        self.lookup
            .get(key)
            .map(|&index| self.graph[index].option.clone())
            .ok_or_else(|| QueryError::UnknownNode { key: key.clone() })
    }

    /// The dense index assigned to `key` at freeze time.
    pub fn index(&self, key: &InstanceKey) -> Result<usize, QueryError> {
        self.lookup
            .get(key)
            .map(|index| index.index())
            .ok_or_else(|| QueryError::UnknownNode { key: key.clone() })
    }

    /// The key assigned to `index` at freeze time.
    pub fn name(&self, index: usize) -> Result<&InstanceKey, QueryError> {
        if index >= self.num_actions() {
            return Err(QueryError::IndexOutOfRange {
                index,
                len: self.num_actions(),
            });
        }
        Ok(&self.graph[NodeIndex::new(index)].key)
    }

    /// All instance keys, in index order.
    pub fn keys(&self) -> impl Iterator<Item = &InstanceKey> {
        self.graph.node_weights().map(|node| &node.key)
    }

    pub(crate) fn children_of(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.children[index.index()]
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    pub(crate) fn root(&self) -> NodeIndex {
        self.root
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// One line per node: `key --> [children]`.
    pub fn node_summary(&self) -> String {
        use std::fmt::Write;

        let mut summary = String::new();
        for index in self.graph.node_indices() {
            let children: Vec<String> = self.children[index.index()]
                .iter()
                .map(|&child| self.graph[child].key.to_string())
                .collect();
            writeln!(
                summary,
                "{} --> [{}]",
                self.graph[index].key,
                children.join(", ")
            )
            .expect("writing to a String cannot fail");
        }
        summary
    }
}

/// Renders the graph as a mermaid flowchart for quick inspection.
impl fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let label = self.graph[index].key.to_string().replace('"', "\\\"");
            writeln!(f, "    {}[\"{}\"]", index.index(), label)?;
        }

        for edge in self.graph.edge_references() {
            writeln!(
                f,
                "    {} --> {}",
                edge.source().index(),
                edge.target().index()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn key(template: &str, bindings: &[(&str, &str)]) -> InstanceKey {
        InstanceKey::new(
            TemplateName::named(template),
            bindings.iter().map(|(n, v)| (*n, Value::from(*v))),
        )
    }

    fn root_builder() -> GraphBuilder {
        GraphBuilder::new(
            InstanceKey::new::<_, ArcStr, Value>(TemplateName::Root, []),
            Arc::new(()),
        )
    }

    fn sample_graph() -> TaskGraph {
        let mut builder = root_builder();
        let root = builder.root;
        let a = builder.insert(key("pick", &[("object", "red")]), Arc::new(()));
        let b = builder.insert(key("place", &[("object", "red")]), Arc::new(()));
        builder.connect(root, a);
        builder.connect(a, b);
        builder.freeze()
    }

    #[test]
    fn a_fresh_builder_freezes_to_a_root_only_graph() {
        let graph = root_builder().freeze();

        assert_eq!(graph.num_actions(), 1);
        assert!(graph.get_children(graph.root_key()).is_empty());
    }

    #[test]
    fn key_identity_ignores_binding_order() {
        let left = key("pick", &[("a", "1"), ("b", "2")]);
        let right = key("pick", &[("b", "2"), ("a", "1")]);
        assert_eq!(left, right);
    }

    #[test]
    fn key_display_is_a_debug_view() {
        assert_eq!(
            key("pick", &[("object", "red")]).to_string(),
            "pick(object=red)"
        );
        assert_eq!(
            InstanceKey::new::<_, ArcStr, Value>(TemplateName::Root, []).to_string(),
            "ROOT()"
        );
    }

    #[test]
    fn index_and_name_are_a_bijection() {
        let graph = sample_graph();

        for i in 0..graph.num_actions() {
            let key = graph.name(i).unwrap();
            assert_eq!(graph.index(key).unwrap(), i);
        }
        for key in graph.keys() {
            let i = graph.index(key).unwrap();
            assert_eq!(graph.name(i).unwrap(), key);
        }
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let graph = sample_graph();
        let err = graph.name(99).unwrap_err();
        assert!(matches!(err, QueryError::IndexOutOfRange { index: 99, .. }));
    }

    #[test]
    fn unknown_key_children_are_empty_but_option_errors() {
        let graph = sample_graph();
        let ghost = key("ghost", &[]);

        assert!(graph.get_children(&ghost).is_empty());
        assert!(matches!(
            graph.get_option(&ghost),
            Err(QueryError::UnknownNode { .. })
        ));
    }

    #[test]
    fn duplicate_edges_are_kept_once() {
        let mut builder = root_builder();
        let root = builder.root;
        let a = builder.insert(key("pick", &[]), Arc::new(()));
        builder.connect(root, a);
        builder.connect(root, a);

        let graph = builder.freeze();
        assert_eq!(graph.get_children(graph.root_key()).len(), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn summary_lists_every_node() {
        let graph = sample_graph();
        let summary = graph.node_summary();

        assert!(summary.contains("ROOT() --> [pick(object=red)]"));
        assert!(summary.contains("place(object=red) --> []"));
    }

    #[test]
    fn graph_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TaskGraph>();
    }
}
