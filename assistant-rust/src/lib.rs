pub mod chat;
pub mod config;
mod errors;
pub mod image;
mod knowledge;
pub mod logging;
pub mod prompt;
pub mod server;
mod transcript;

pub use chat::{ChatEvent, ChatFlow, ChatObserver, TurnOutcome, TurnState};
pub use errors::{AssistantError, BoxedError};
pub use image::{GeneratedImage, ImageFlow, ImageOutcome, ReferenceImage};
pub use knowledge::{KnowledgeBase, NO_KNOWLEDGE_BASE};
pub use transcript::{Message, Role, Transcript};
