//! Resolution pipeline: conversations, validation, pattern fallback, and the
//! orchestrator that ties them to a generative provider.

pub mod classify;
pub mod config;
pub mod conversation;
pub mod orchestrator;
pub mod pattern;
pub mod prompt;
pub mod rationale;
pub mod validator;

pub use classify::{classify, should_retry, ErrorContext};
pub use config::{load_config, AppConfig, ResolverConfig, ServerConfig};
pub use conversation::{Conversation, ConversationError, ConversationStore};
pub use orchestrator::{ResolutionSource, Resolver};
pub use pattern::{PatternAnalysis, PatternEngine};
pub use rationale::{RationaleContext, RationaleGenerator};
pub use validator::{ResponseValidator, ValidationOutcome};
