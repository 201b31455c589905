//! Chat-with-a-repository core: configuration, secrets, repository registry,
//! the deduplicating RAG session and the two-step conversation orchestrator.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod rag;
pub mod registry;
pub mod transcript;
pub mod vault;

pub use error::{ChatError, Result};
pub use orchestrator::{ConversationSession, Orchestrator, SessionState, TurnOutcome};
pub use transcript::{Exchange, SourceCitation, StructuredReply, Turn};
