#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod args;
mod error;
mod graph;
mod registry;
mod sample;
mod task;
mod template;
#[cfg(feature = "logging")]
mod utils;
mod value;

pub use crate::args::{ArgAssignment, ArgSource, ArgSpec, ArgValue, expand, spec_from_json};
pub use crate::error::{CompileError, QueryError, RegistryError, TaskError};
pub use crate::graph::{InstanceKey, TaskGraph};
pub use crate::sample::Rollout;
pub use crate::task::{DEFAULT_RECURSION_LIMIT, Task};
pub use crate::template::{
    OptionFactory, OptionHandle, RootOption, TemplateName, TemplateSpec,
};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
pub use crate::value::{ArcStr, Value};
