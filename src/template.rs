//! Option templates.
//!
//! A template is a named, parameterized description of an action. It stays
//! abstract until [`compile`](crate::Task::compile) binds it to concrete
//! argument values, at which point it produces one node per distinct
//! combination of its parameters. A template either wraps a constructor
//! capability supplied by the caller ([`OptionFactory`]) or embeds a whole
//! nested [`Task`], which is how hierarchical composition is expressed.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::args::{ArgAssignment, ArgSpec, ArgValue};
use crate::error::CompileError;
use crate::task::Task;
use crate::value::ArcStr;

/// A type-erased, thread-safe option produced by a constructor.
///
/// The compiler assumes nothing about options beyond identity; downcast to
/// your concrete type at the planning boundary.
pub type OptionHandle = Arc<dyn Any + Send + Sync>;

/// The option held by the implicit root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootOption;

/// The name of a template, with a dedicated variant for the implicit root so
/// it can never collide with a user template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateName {
    /// The implicit top-level node with no parent.
    Root,
    /// A caller-registered template.
    Named(ArcStr),
}

impl TemplateName {
    pub(crate) fn named(name: impl Into<ArcStr>) -> Self {
        TemplateName::Named(name.into())
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateName::Root => write!(f, "ROOT"),
            TemplateName::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Constructor function pointer used to instantiate an option from resolved
/// keyword arguments. The type is erased behind `dyn Fn` so that domain
/// collaborators can plug in arbitrary constructors.
type FactoryFnPtr = Arc<dyn Fn(&ArgAssignment) -> anyhow::Result<OptionHandle> + Send + Sync>;

/// Wraps `FactoryFnPtr` and implements the `Debug` trait for it.
#[derive(Clone)]
pub struct OptionFactory(FactoryFnPtr);

impl OptionFactory {
    /// Creates a constructor capability from a closure taking the resolved
    /// keyword mapping.
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&ArgAssignment) -> anyhow::Result<OptionHandle> + Send + Sync + 'static,
    {
        OptionFactory(Arc::new(build))
    }

    pub(crate) fn build(&self, kwargs: &ArgAssignment) -> anyhow::Result<OptionHandle> {
        (self.0)(kwargs)
    }
}

impl fmt::Debug for OptionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionFactory(*)")
    }
}

/// What a template produces when instantiated: a flat constructor call, or
/// the root of a recursively compiled nested task.
#[derive(Clone)]
pub(crate) enum TemplateBody {
    Leaf(OptionFactory),
    Sub(Arc<Mutex<Task>>),
}

impl fmt::Debug for TemplateBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateBody::Leaf(factory) => factory.fmt(f),
            TemplateBody::Sub(_) => write!(f, "SubTask(*)"),
        }
    }
}

/// The public description of a template, passed to [`Task::add`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use taskplan::{OptionHandle, TemplateSpec};
///
/// let spec = TemplateSpec::leaf(["object"], |kwargs| {
///     Ok(Arc::new(kwargs["goal"].clone()) as OptionHandle)
/// })
/// .remap("object", "goal");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub(crate) params: Vec<ArcStr>,
    pub(crate) remap: IndexMap<ArcStr, ArcStr>,
    pub(crate) body: TemplateBody,
}

impl TemplateSpec {
    /// A template that instantiates options by calling `build` with the
    /// resolved keyword mapping.
    pub fn leaf<I, S, F>(params: I, build: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArcStr>,
        F: Fn(&ArgAssignment) -> anyhow::Result<OptionHandle> + Send + Sync + 'static,
    {
        TemplateSpec {
            params: params.into_iter().map(Into::into).collect(),
            remap: IndexMap::new(),
            body: TemplateBody::Leaf(OptionFactory::new(build)),
        }
    }

    /// A template that embeds a nested task. Instantiation compiles the
    /// nested engine against the current argument assignment and reuses its
    /// root option handle.
    pub fn subtask<I, S>(params: I, task: Task) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArcStr>,
    {
        TemplateSpec {
            params: params.into_iter().map(Into::into).collect(),
            remap: IndexMap::new(),
            body: TemplateBody::Sub(Arc::new(Mutex::new(task))),
        }
    }

    /// Renames parameter `param` to the constructor keyword `kwarg`.
    pub fn remap(mut self, param: impl Into<ArcStr>, kwarg: impl Into<ArcStr>) -> Self {
        self.remap.insert(param.into(), kwarg.into());
        self
    }
}

/// A registered template together with the child template names materialized
/// from connections at compile time.
#[derive(Debug)]
pub(crate) struct OptionTemplate {
    params: Vec<ArcStr>,
    remap: IndexMap<ArcStr, ArcStr>,
    body: TemplateBody,
    children: Vec<ArcStr>,
}

impl OptionTemplate {
    pub(crate) fn new(spec: TemplateSpec) -> Self {
        OptionTemplate {
            params: spec.params,
            remap: spec.remap,
            body: spec.body,
            children: Vec::new(),
        }
    }

    /// The template backing the implicit root node.
    pub(crate) fn root() -> Self {
        OptionTemplate::new(TemplateSpec::leaf::<_, ArcStr, _>([], |_| {
            Ok(Arc::new(RootOption) as OptionHandle)
        }))
    }

    /// Declares `child` as a child template. Idempotent.
    pub(crate) fn connect(&mut self, child: &ArcStr) {
        if !self.children.contains(child) {
            self.children.push(child.clone());
        }
    }

    pub(crate) fn children(&self) -> &[ArcStr] {
        &self.children
    }

    /// Builds the constructor keyword mapping for one assignment: each
    /// declared parameter resolves through the remap table, taking its value
    /// from the assignment.
    pub(crate) fn kwargs(
        &self,
        name: &TemplateName,
        assignment: &ArgAssignment,
    ) -> Result<ArgAssignment, CompileError> {
        let mut kwargs = ArgAssignment::with_capacity(self.params.len());

        for param in &self.params {
            let value =
                assignment
                    .get(param)
                    .ok_or_else(|| CompileError::MissingArgument {
                        template: name.clone(),
                        param: param.clone(),
                    })?;
            let target = self.remap.get(param).unwrap_or(param);
            kwargs.insert(target.clone(), value.clone());
        }

        Ok(kwargs)
    }

    /// Produces the option for one concrete assignment.
    ///
    /// Leaf templates call their constructor with `kwargs`. Sub-task
    /// templates compile the nested engine against the full `assignment` at
    /// `depth + 1` on first use and reuse its root option thereafter.
    pub(crate) fn instantiate(
        &self,
        name: &TemplateName,
        kwargs: &ArgAssignment,
        assignment: &ArgAssignment,
        depth: usize,
    ) -> Result<OptionHandle, CompileError> {
        match &self.body {
            TemplateBody::Leaf(factory) => factory
                .build(kwargs)
                .map_err(|err| CompileError::Constructor(name.clone(), err)),
            TemplateBody::Sub(task) => {
                // A panic inside a nested compile poisons the lock; surface
                // that as a constructor failure instead of panicking again.
                let mut sub = task.lock().map_err(|_| {
                    CompileError::Constructor(
                        name.clone(),
                        anyhow::anyhow!("nested task engine mutex is poisoned"),
                    )
                })?;

                if sub.graph.is_none() {
                    let spec: ArgSpec = assignment
                        .iter()
                        .map(|(name, value)| (name.clone(), ArgValue::One(value.clone())))
                        .collect();
                    sub.compile_at(spec, depth + 1)?;
                }

                let graph = sub
                    .graph
                    .as_ref()
                    .expect("sub-task compile left no graph behind");
                Ok(graph.root_option())
            }
        }
    }
}
