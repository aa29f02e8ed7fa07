#![allow(dead_code)]

pub mod harness;
pub mod tools;

// Re-export commonly used test utilities
pub use harness::TestHarness;
pub use tools::ScriptedTool;
