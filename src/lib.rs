pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod init;
pub mod jobs;
pub mod mcp;
pub mod tools;
pub mod utils;
pub mod workflow;

pub use error::ToolweaveError;
