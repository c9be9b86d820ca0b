pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod markdown;
pub mod session;
pub mod settings;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use client::{ChatClient, FrameStream, HistoryEntry};
pub use config::Config;
pub use error::{ChatError, Result, UnknownName};
pub use export::{save_export, save_transcript_html, Export};
pub use frame::{FrameDecoder, StreamFrame};
pub use markdown::{CodeBlock, MarkdownEngine, MarkdownRenderer, Rendered};
pub use session::{ChatSession, RegenerateError, TurnEvent, TurnEventKind, TurnId, TurnKind, TurnRequest, TurnUpdate};
pub use settings::{AnimationSpeed, Settings, SettingsStore, Theme};
pub use state::{ChatMessage, ChatRole, MessageId, MessageStatus};
pub use storage::{FileStorage, MemoryStorage, Storage};
