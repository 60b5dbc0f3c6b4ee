//! LLM agent: chat backends, the tool registry and the dispatch loop.

pub mod agent_loop;
pub mod backend;
pub mod tools;

pub use agent_loop::ProductAgent;
pub use backend::build_backend;
