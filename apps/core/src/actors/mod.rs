//! Actor system: the orchestrator and the two backends it drives.

pub mod llm;
pub mod messages;
pub mod rag;
pub mod supervisor;
pub mod traits;
