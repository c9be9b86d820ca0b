//! UI-agnostic message types
//!
//! These are shared by every front end and don't depend on a UI framework.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::markdown::{MarkdownRenderer, Rendered};

/// Stable identifier of a message within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "AI Assistant",
            ChatRole::System => "System",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Complete,
    /// Placeholder still receiving content.
    Streaming,
    /// Content is an error notice rather than a reply.
    Failed,
}

/// A chat message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Local>,
    pub status: MessageStatus,
    /// Set while a regeneration re-targets this message.
    pub regenerating: bool,
    #[serde(skip)]
    rendered: Option<Rendered>,
}

impl ChatMessage {
    pub fn new(id: MessageId, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at: Local::now(),
            status: MessageStatus::Complete,
            regenerating: false,
            rendered: None,
        }
    }

    /// Replace the content. Assistant messages are re-rendered in full.
    pub fn set_content(&mut self, content: impl Into<String>, renderer: &MarkdownRenderer) {
        self.content = content.into();
        self.rendered = match self.role {
            ChatRole::Assistant => Some(renderer.render(&self.content)),
            ChatRole::User | ChatRole::System => None,
        };
    }

    /// Rendered HTML and code blocks; `None` for user and system messages.
    pub fn rendered(&self) -> Option<&Rendered> {
        self.rendered.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_assistant_messages_render() {
        let renderer = MarkdownRenderer::default();
        let mut user = ChatMessage::new(MessageId(1), ChatRole::User, "");
        user.set_content("**hi**", &renderer);
        assert!(user.rendered().is_none());

        let mut ai = ChatMessage::new(MessageId(2), ChatRole::Assistant, "");
        ai.set_content("**hi**", &renderer);
        let rendered = ai.rendered().expect("assistant output is rendered");
        assert!(rendered.html.contains("<strong>hi</strong>"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChatRole::Assistant).unwrap(), "\"assistant\"");
    }
}
