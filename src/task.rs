//! The task engine.
//!
//! A [`Task`] models a hierarchical task as a set of parameterized option
//! templates plus parent→child connections. Calling [`Task::compile`] once
//! expands a concrete argument mapping into every assignment, instantiates
//! each template per assignment with stable, deduplicated identity, wires
//! children declared within the same assignment pass, and freezes the result
//! into an indexed [`TaskGraph`].

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use tracing::{debug, info};

use crate::args::{self, ArgAssignment, ArgSource, ArgSpec};
use crate::error::{CompileError, QueryError, RegistryError};
use crate::graph::{GraphBuilder, InstanceKey, TaskGraph};
use crate::registry::TemplateRegistry;
use crate::template::{TemplateName, TemplateSpec};
use crate::value::ArcStr;

/// Default bound on sub-task nesting. Deep legitimate hierarchies are rare;
/// anything past this is almost certainly an accidental cycle between nested
/// engines.
pub const DEFAULT_RECURSION_LIMIT: usize = 32;

/// A task-graph engine: a mutable template registry that compiles, exactly
/// once, into a frozen [`TaskGraph`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use taskplan::{ArgSpec, ArgValue, OptionHandle, Task, TemplateSpec};
///
/// let mut task = Task::new();
/// task.add("pick", &[], Some(TemplateSpec::leaf(["object"], |kwargs| {
///     Ok(Arc::new(kwargs["object"].clone()) as OptionHandle)
/// }))).unwrap();
///
/// let mut spec = ArgSpec::new();
/// spec.insert("object".into(), ArgValue::many(["red", "blue"]));
///
/// task.compile(&spec).unwrap();
/// assert_eq!(task.num_actions().unwrap(), 3); // root + 2 picks
/// ```
#[derive(Debug)]
pub struct Task {
    registry: TemplateRegistry,
    pub(crate) graph: Option<TaskGraph>,
    recursion_limit: usize,
}

impl Task {
    /// Creates an empty engine holding only the implicit root template.
    pub fn new() -> Self {
        Task {
            registry: TemplateRegistry::new(),
            graph: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Overrides the bound on sub-task nesting depth.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Registers a template under `name` and connects it to its parents.
    ///
    /// An empty `parents` slice attaches the template to the implicit root.
    /// Parents do not have to be registered yet; forward references are
    /// resolved at compile time. Passing `spec` again for a name whose
    /// parameters are already set fails with
    /// [`RegistryError::DuplicateParameters`]; passing `None` only
    /// accumulates additional parent edges.
    pub fn add(
        &mut self,
        name: impl Into<ArcStr>,
        parents: &[&str],
        spec: Option<TemplateSpec>,
    ) -> Result<(), RegistryError> {
        self.registry.add(name.into(), parents, spec)
    }

    /// Instantiates this task for a particular world.
    ///
    /// Expands `source` into every concrete argument assignment, creates one
    /// node per distinct (template, arguments) identity, wires children
    /// declared within the same assignment pass, and freezes the graph.
    /// An expansion that yields no assignments (any argument with an empty
    /// candidate list zeroes the product) compiles to a root-only graph.
    /// Succeeds at most once per engine; later attempts fail with
    /// [`CompileError::AlreadyCompiled`]. Any error aborts compilation and
    /// leaves the engine uncompiled.
    ///
    /// Returns the ordered assignment sequence for caller inspection.
    pub fn compile<S: ArgSource>(&mut self, source: S) -> Result<Vec<ArgAssignment>, CompileError> {
        self.compile_at(source.arguments(), 0)
    }

    /// Compilation body, with the nesting depth threaded through recursive
    /// sub-task compiles.
    pub(crate) fn compile_at(
        &mut self,
        spec: ArgSpec,
        depth: usize,
    ) -> Result<Vec<ArgAssignment>, CompileError> {
        if self.graph.is_some() {
            return Err(CompileError::AlreadyCompiled);
        }
        if depth > self.recursion_limit {
            return Err(CompileError::RecursionLimit {
                limit: self.recursion_limit,
            });
        }

        let assignments = args::expand(&spec);
        debug!(
            assignments = assignments.len(),
            depth, "expanded argument source"
        );

        self.registry.materialize_connections()?;

        // The root exists in every compiled graph, even when the expansion
        // is empty (an empty candidate list zeroes the whole product).
        let none = ArgAssignment::new();
        let root_key = InstanceKey::from_kwargs(&TemplateName::Root, &none);
        let root_option = self
            .registry
            .root()
            .instantiate(&TemplateName::Root, &none, &none, depth)?;
        let mut builder = GraphBuilder::new(root_key, root_option);

        for assignment in &assignments {
            // Instance keys produced in this pass, one per template. A key
            // already present in the builder keeps its first-produced option
            // (first-write-wins) and is not re-instantiated.
            let mut pass: IndexMap<&TemplateName, NodeIndex> = IndexMap::new();

            for (name, template) in self.registry.iter() {
                let kwargs = template.kwargs(name, assignment)?;
                let key = InstanceKey::from_kwargs(name, &kwargs);

                let index = match builder.find(&key) {
                    Some(index) => index,
                    None => {
                        let option = template.instantiate(name, &kwargs, assignment, depth)?;
                        builder.insert(key, option)
                    }
                };
                pass.insert(name, index);
            }

            // Children are only wired to instances of the same pass;
            // cross-assignment wiring is out of scope by construction.
            for (name, template) in self.registry.iter() {
                let parent = pass[name];
                for child in template.children() {
                    let child_name = TemplateName::Named(child.clone());
                    if let Some(&child_index) = pass.get(&child_name) {
                        builder.connect(parent, child_index);
                    }
                }
            }
        }

        let graph = builder.freeze();
        info!(
            nodes = graph.num_actions(),
            edges = graph.edge_count(),
            "task graph compiled"
        );
        self.graph = Some(graph);

        Ok(assignments)
    }

    /// Whether [`compile`](Task::compile) has already succeeded.
    pub fn is_compiled(&self) -> bool {
        self.graph.is_some()
    }

    /// The compiled graph, for direct (and thread-shareable) read access.
    pub fn graph(&self) -> Result<&TaskGraph, QueryError> {
        self.graph.as_ref().ok_or(QueryError::NotCompiled)
    }

    /// Count of distinct nodes in the compiled graph, root included.
    pub fn num_actions(&self) -> Result<usize, QueryError> {
        Ok(self.graph()?.num_actions())
    }

    /// The dense index of `key`. See [`TaskGraph::index`].
    pub fn index(&self, key: &InstanceKey) -> Result<usize, QueryError> {
        self.graph()?.index(key)
    }

    /// The key at `index`. See [`TaskGraph::name`].
    pub fn name(&self, index: usize) -> Result<&InstanceKey, QueryError> {
        self.graph()?.name(index)
    }

    /// The children of `key`; empty for unknown keys and before compilation,
    /// never an error.
    pub fn get_children(&self, key: &InstanceKey) -> Vec<InstanceKey> {
        match &self.graph {
            Some(graph) => graph.get_children(key),
            None => Vec::new(),
        }
    }

    /// The option instantiated for `key`. See [`TaskGraph::get_option`].
    pub fn get_option(&self, key: &InstanceKey) -> Result<crate::OptionHandle, QueryError> {
        self.graph()?.get_option(key)
    }

    /// Per-node `key --> [children]` listing of the compiled graph.
    pub fn node_summary(&self) -> Result<String, QueryError> {
        Ok(self.graph()?.node_summary())
    }
}

impl Default for Task {
    fn default() -> Self {
        Task::new()
    }
}
