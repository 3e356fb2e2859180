pub mod error;
pub mod flow;
pub mod message;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use error::{AssistantError, Result};
pub use flow::{CreationStep, GuidedFlow, StepOutcome};
pub use message::{Message, MessageRole, Transcript};
pub use session::{InMemorySessionStorage, Session, SessionStorage};
pub use state::{ConversationState, PolicyDraft};
