//! Conversational task orchestration: turn chat messages and meeting
//! transcripts into a hierarchical task forest, and keep that forest stable
//! across rewrites, follow-up turns, and recurring meeting sessions.
//!
//! The entry point is [`Dispatcher::handle_turn`]: one [`TurnRequest`] in,
//! one complete [`TurnResponse`] out. Everything destructive is gated behind
//! an explicit confirmation exchange, and every branch returns the full
//! forest rather than a patch.
//!
//! External collaborators are injected through two traits:
//! [`CompletionProvider`] for the text-generation service and
//! [`SessionStore`] for prior-session lookup.

pub mod classifier;
pub mod config;
pub mod confirm;
pub mod dispatcher;
pub mod error;
pub mod extraction;
pub mod matcher;
pub mod provider;
pub mod rollover;
pub mod text;
pub mod tree;
pub mod types;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, Route};
pub use error::ProviderError;
pub use provider::{
    CompletionProvider, GenerationOutput, GenerationPurpose, GenerationRequest, SessionStore,
};
pub use types::{
    DetailLevel, PendingAction, PendingConfirmation, SessionSnapshot, Task, TaskLevels,
    TaskStatus, TurnRequest, TurnResponse,
};
