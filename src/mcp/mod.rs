pub mod error;
pub mod server;

pub use error::ToolError;
pub use server::{run_mcp_server, ToolweaveServer};
