//! Command handlers.

pub mod converse;
pub mod export;
pub mod repl;
pub mod say;
