use thiserror::Error;

use crate::graph::InstanceKey;
use crate::template::TemplateName;
use crate::value::ArcStr;

/// Errors raised while declaring templates, before compilation.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("parameters for template '{name}' are already set")]
    DuplicateParameters { name: ArcStr },
}

/// Errors raised by [`Task::compile`](crate::Task::compile).
///
/// Compilation is all-or-nothing: any of these aborts it and leaves the
/// engine uncompiled.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("task has already been compiled")]
    AlreadyCompiled,

    #[error("connection references template '{name}', which was never registered")]
    UndefinedTemplate { name: ArcStr },

    #[error(
        "template '{template}' declares parameter '{param}', which is missing from the argument mapping"
    )]
    MissingArgument { template: TemplateName, param: ArcStr },

    #[error("sub-task nesting exceeded the recursion limit of {limit}")]
    RecursionLimit { limit: usize },

    #[error("constructor for template '{0}' failed:\n{1}")]
    Constructor(TemplateName, anyhow::Error),
}

/// Errors raised by the read-only query surface of a compiled graph.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("task has not been compiled yet")]
    NotCompiled,

    #[error("node {key} does not exist")]
    UnknownNode { key: InstanceKey },

    #[error("index {index} is out of range for a graph of {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Umbrella error for callers that do not care which phase failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Query(#[from] QueryError),
}
