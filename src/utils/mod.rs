pub mod deadline;

pub use deadline::{run_with_deadline, Deadline};
