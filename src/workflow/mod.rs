//! Multi-step workflows: definitions, the template resolver and the executor.

pub mod definition;
pub mod executor;
pub mod resolver;

pub use definition::{WorkflowDefinition, WorkflowError, WorkflowResult, WorkflowStep};
pub use executor::WorkflowExecutor;
pub use resolver::{resolve, resolve_path, resolve_with, PlaceholderPolicy, ResolutionError};
