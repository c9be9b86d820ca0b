//! Chat session state and the stream frame reducer.
//!
//! `ChatSession` owns the message list and the single in-flight turn. It never
//! touches the network or a terminal: the transport feeds it [`TurnEvent`]s and
//! the UI reads the resulting messages.

use tracing::{debug, info, warn};

use crate::frame::StreamFrame;
use crate::markdown::MarkdownRenderer;
use crate::state::{ChatMessage, ChatRole, MessageId, MessageStatus};

pub const SEND_FAILED: &str = "Sorry, there was an error processing your request. Please try again.";
pub const READ_FAILED: &str = "Sorry, there was an error processing the response.";
pub const REGENERATE_SEND_FAILED: &str =
    "Sorry, there was an error regenerating the response. Please try again.";
pub const REGENERATE_READ_FAILED: &str =
    "Sorry, there was an error processing the regenerated response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    New,
    /// Re-target an existing assistant message.
    Regenerate(MessageId),
}

/// What the transport must send for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub turn: TurnId,
    pub kind: TurnKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEventKind {
    Frame(StreamFrame),
    /// The request never produced a readable body (connect error, non-2xx).
    RequestFailed(String),
    /// Reading the body failed part way.
    ReadFailed(String),
    /// The body ended.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnEvent {
    pub turn: TurnId,
    pub kind: TurnEventKind,
}

impl TurnEvent {
    pub fn new(turn: TurnId, kind: TurnEventKind) -> Self {
        Self { turn, kind }
    }
}

/// Effect of one event on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnUpdate {
    /// Stale turn, or a frame out of place; nothing changed.
    Ignored,
    Started(MessageId),
    Updated(MessageId),
    /// The turn ended with a reply; the single-flight lock is released.
    Finished(MessageId),
    /// The turn ended with an error notice; the single-flight lock is released.
    Failed(MessageId),
}

impl TurnUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnUpdate::Finished(_) | TurnUpdate::Failed(_))
    }

    pub fn message(&self) -> Option<MessageId> {
        match self {
            TurnUpdate::Ignored => None,
            TurnUpdate::Started(id)
            | TurnUpdate::Updated(id)
            | TurnUpdate::Finished(id)
            | TurnUpdate::Failed(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegenerateError {
    #[error("a response is already in progress")]
    Busy,
    #[error("message not found")]
    UnknownMessage,
    #[error("only assistant messages can be regenerated")]
    NotAssistant,
    #[error("could not find user message to regenerate response for")]
    NoPrompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Receiving,
}

#[derive(Debug)]
struct ActiveTurn {
    id: TurnId,
    kind: TurnKind,
    phase: Phase,
    placeholder: Option<MessageId>,
    accumulated: String,
}

#[derive(Debug)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    renderer: MarkdownRenderer,
    active: Option<ActiveTurn>,
    welcome_visible: bool,
    next_message: u64,
    next_turn: u64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(MarkdownRenderer::default())
    }
}

impl ChatSession {
    pub fn new(renderer: MarkdownRenderer) -> Self {
        Self {
            messages: Vec::new(),
            renderer,
            active: None,
            welcome_visible: true,
            next_message: 1,
            next_turn: 1,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// True while a turn holds the single-flight lock.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// True between issuing a request and its `start` frame.
    pub fn is_waiting(&self) -> bool {
        matches!(&self.active, Some(turn) if turn.phase == Phase::Waiting)
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        self.active.as_ref().map(|t| t.id)
    }

    pub fn welcome_visible(&self) -> bool {
        self.welcome_visible
    }

    pub fn renderer(&self) -> MarkdownRenderer {
        self.renderer
    }

    /// Switch engines and re-render every assistant message.
    pub fn set_renderer(&mut self, renderer: MarkdownRenderer) {
        self.renderer = renderer;
        for msg in &mut self.messages {
            let content = std::mem::take(&mut msg.content);
            msg.set_content(content, &renderer);
        }
    }

    /// Start a new turn for `input`. Returns `None` (and changes nothing) when
    /// the input is blank or a turn is already in flight.
    pub fn begin_send(&mut self, input: &str) -> Option<TurnRequest> {
        let message = input.trim();
        if message.is_empty() {
            return None;
        }
        if self.is_busy() {
            debug!("send ignored, a turn is in flight");
            return None;
        }

        self.welcome_visible = false;
        self.push(ChatRole::User, message);
        Some(self.open_turn(TurnKind::New, message.to_string(), None))
    }

    /// Start a turn that re-targets assistant message `id` with the prompt of
    /// the closest user message before it.
    pub fn begin_regenerate(&mut self, id: MessageId) -> Result<TurnRequest, RegenerateError> {
        if self.is_busy() {
            return Err(RegenerateError::Busy);
        }
        let idx = self.position(id).ok_or(RegenerateError::UnknownMessage)?;
        if self.messages[idx].role != ChatRole::Assistant {
            return Err(RegenerateError::NotAssistant);
        }
        let prompt = self.messages[..idx]
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .ok_or(RegenerateError::NoPrompt)?;

        let renderer = self.renderer;
        let msg = &mut self.messages[idx];
        msg.set_content(String::new(), &renderer);
        msg.status = MessageStatus::Streaming;
        msg.regenerating = true;

        Ok(self.open_turn(TurnKind::Regenerate(id), prompt, Some(id)))
    }

    /// Apply one transport event. Events for any turn other than the active
    /// one are ignored, so the lock is released exactly once per turn.
    pub fn handle(&mut self, event: TurnEvent) -> TurnUpdate {
        let Some(mut turn) = self.active.take() else {
            debug!(turn = event.turn.0, "event for finished turn ignored");
            return TurnUpdate::Ignored;
        };
        if turn.id != event.turn {
            debug!(turn = event.turn.0, active = turn.id.0, "stale turn event ignored");
            self.active = Some(turn);
            return TurnUpdate::Ignored;
        }

        let update = match event.kind {
            TurnEventKind::Frame(StreamFrame::Start) => {
                if turn.phase == Phase::Receiving {
                    warn!(turn = turn.id.0, "duplicate start frame");
                    TurnUpdate::Ignored
                } else {
                    turn.phase = Phase::Receiving;
                    turn.accumulated.clear();
                    TurnUpdate::Started(self.placeholder(&mut turn))
                }
            }
            TurnEventKind::Frame(StreamFrame::Content { text }) => match turn.placeholder {
                Some(id) if turn.phase == Phase::Receiving => {
                    turn.accumulated.push_str(&text);
                    self.set_content(id, turn.accumulated.clone());
                    TurnUpdate::Updated(id)
                }
                _ => {
                    warn!(turn = turn.id.0, "content frame before start ignored");
                    TurnUpdate::Ignored
                }
            },
            TurnEventKind::Frame(StreamFrame::End { full_text }) => {
                let id = self.placeholder(&mut turn);
                self.set_content(id, full_text);
                self.settle(id, MessageStatus::Complete);
                info!(turn = turn.id.0, "turn finished");
                return TurnUpdate::Finished(id);
            }
            TurnEventKind::Frame(StreamFrame::Error { message }) => {
                warn!(turn = turn.id.0, error = %message, "server reported an error");
                return self.fail(&mut turn, format!("Sorry, there was an error: {message}"));
            }
            TurnEventKind::RequestFailed(reason) => {
                warn!(turn = turn.id.0, error = %reason, "chat request failed");
                let text = match turn.kind {
                    TurnKind::New => SEND_FAILED,
                    TurnKind::Regenerate(_) => REGENERATE_SEND_FAILED,
                };
                return self.fail(&mut turn, text.to_string());
            }
            TurnEventKind::ReadFailed(reason) => {
                warn!(turn = turn.id.0, error = %reason, "stream read failed");
                let text = read_failed_text(turn.kind).to_string();
                return self.fail(&mut turn, text);
            }
            TurnEventKind::Closed => {
                warn!(turn = turn.id.0, "stream closed before end frame");
                let text = read_failed_text(turn.kind).to_string();
                return self.fail(&mut turn, text);
            }
        };

        self.active = Some(turn);
        update
    }

    /// Append a transient notice.
    pub fn push_system(&mut self, text: impl Into<String>) -> MessageId {
        self.push(ChatRole::System, text)
    }

    /// Remove a message unless a running turn is writing into it.
    pub fn remove(&mut self, id: MessageId) -> bool {
        if matches!(&self.active, Some(turn) if turn.placeholder == Some(id)) {
            return false;
        }
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        before != self.messages.len()
    }

    /// Drop every message, abandon any running turn and show the welcome state.
    pub fn clear(&mut self) {
        if let Some(turn) = self.active.take() {
            info!(turn = turn.id.0, "turn abandoned by clear");
        }
        self.messages.clear();
        self.welcome_visible = true;
    }

    /// Replace the transcript with history fetched from the server.
    pub fn restore<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (ChatRole, String)>,
    {
        if self.is_busy() {
            return 0;
        }
        self.messages.clear();
        for (role, content) in entries {
            self.push(role, content);
        }
        self.welcome_visible = self.messages.is_empty();
        self.messages.len()
    }

    fn push(&mut self, role: ChatRole, content: impl Into<String>) -> MessageId {
        let id = MessageId(self.next_message);
        self.next_message += 1;
        let mut msg = ChatMessage::new(id, role, String::new());
        msg.set_content(content, &self.renderer);
        self.messages.push(msg);
        id
    }

    fn open_turn(
        &mut self,
        kind: TurnKind,
        message: String,
        placeholder: Option<MessageId>,
    ) -> TurnRequest {
        let turn = TurnId(self.next_turn);
        self.next_turn += 1;
        self.active = Some(ActiveTurn {
            id: turn,
            kind,
            phase: Phase::Waiting,
            placeholder,
            accumulated: String::new(),
        });
        debug!(turn = turn.0, ?kind, "turn opened");
        TurnRequest {
            turn,
            kind,
            message,
        }
    }

    fn placeholder(&mut self, turn: &mut ActiveTurn) -> MessageId {
        if let Some(id) = turn.placeholder {
            return id;
        }
        let id = self.push(ChatRole::Assistant, String::new());
        if let Some(msg) = self.message_mut(id) {
            msg.status = MessageStatus::Streaming;
        }
        turn.placeholder = Some(id);
        id
    }

    fn fail(&mut self, turn: &mut ActiveTurn, text: String) -> TurnUpdate {
        let id = self.placeholder(turn);
        self.set_content(id, text);
        self.settle(id, MessageStatus::Failed);
        TurnUpdate::Failed(id)
    }

    fn settle(&mut self, id: MessageId, status: MessageStatus) {
        if let Some(msg) = self.message_mut(id) {
            msg.status = status;
            msg.regenerating = false;
        }
    }

    fn set_content(&mut self, id: MessageId, content: String) {
        let renderer = self.renderer;
        if let Some(msg) = self.message_mut(id) {
            msg.set_content(content, &renderer);
        }
    }

    fn message_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

fn read_failed_text(kind: TurnKind) -> &'static str {
    match kind {
        TurnKind::New => READ_FAILED,
        TurnKind::Regenerate(_) => REGENERATE_READ_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(turn: TurnId, frame: StreamFrame) -> TurnEvent {
        TurnEvent::new(turn, TurnEventKind::Frame(frame))
    }

    fn content(text: &str) -> StreamFrame {
        StreamFrame::Content { text: text.into() }
    }

    fn end(text: &str) -> StreamFrame {
        StreamFrame::End { full_text: text.into() }
    }

    fn last(session: &ChatSession) -> &ChatMessage {
        session.messages().last().unwrap()
    }

    #[test]
    fn test_end_frame_is_authoritative() {
        let mut session = ChatSession::default();
        let req = session.begin_send("  hello  ").unwrap();
        assert_eq!(req.message, "hello");
        assert!(session.is_waiting());

        assert!(matches!(session.handle(frame(req.turn, StreamFrame::Start)), TurnUpdate::Started(_)));
        assert!(!session.is_waiting());
        session.handle(frame(req.turn, content("Hel")));
        session.handle(frame(req.turn, content("lo wrld")));
        assert_eq!(last(&session).content, "Hello wrld");
        assert!(last(&session).is_streaming());

        let update = session.handle(frame(req.turn, end("Hello world")));
        assert!(matches!(update, TurnUpdate::Finished(_)));
        assert_eq!(last(&session).content, "Hello world");
        assert_eq!(last(&session).status, MessageStatus::Complete);
        assert!(!session.is_busy());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_content_rerenders_placeholder() {
        let mut session = ChatSession::default();
        let req = session.begin_send("code please").unwrap();
        session.handle(frame(req.turn, StreamFrame::Start));
        session.handle(frame(req.turn, content("```rust\nfn a() {}\n")));
        assert_eq!(last(&session).rendered().unwrap().code_blocks.len(), 1);
        session.handle(frame(req.turn, content("```\n\nand **more**")));
        let rendered = last(&session).rendered().unwrap();
        assert!(rendered.html.contains("<strong>more</strong>"));
        assert_eq!(rendered.code_blocks[0].code, "fn a() {}");
    }

    #[test]
    fn test_error_frame_replaces_placeholder_and_releases_lock() {
        let mut session = ChatSession::default();
        let req = session.begin_send("hi").unwrap();
        session.handle(frame(req.turn, StreamFrame::Start));
        session.handle(frame(req.turn, content("partial")));
        let update = session.handle(frame(
            req.turn,
            StreamFrame::Error { message: "quota exceeded".into() },
        ));
        assert!(matches!(update, TurnUpdate::Failed(_)));
        assert_eq!(last(&session).content, "Sorry, there was an error: quota exceeded");
        assert_eq!(last(&session).status, MessageStatus::Failed);
        assert!(!session.is_busy());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_error_before_start_still_surfaces() {
        let mut session = ChatSession::default();
        let req = session.begin_send("hi").unwrap();
        session.handle(frame(req.turn, StreamFrame::Error { message: "boom".into() }));
        assert_eq!(session.messages().len(), 2);
        assert_eq!(last(&session).role, ChatRole::Assistant);
        assert_eq!(last(&session).content, "Sorry, there was an error: boom");
    }

    #[test]
    fn test_send_while_in_flight_is_noop() {
        let mut session = ChatSession::default();
        let req = session.begin_send("first").unwrap();
        assert!(session.begin_send("second").is_none());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.active_turn(), Some(req.turn));
        assert!(session.begin_send("   ").is_none());
    }

    #[test]
    fn test_content_before_start_is_ignored() {
        let mut session = ChatSession::default();
        let req = session.begin_send("hi").unwrap();
        assert_eq!(session.handle(frame(req.turn, content("early"))), TurnUpdate::Ignored);
        assert_eq!(session.messages().len(), 1);
        assert!(session.is_busy());
    }

    #[test]
    fn test_lock_released_exactly_once() {
        let mut session = ChatSession::default();
        let req = session.begin_send("hi").unwrap();
        session.handle(frame(req.turn, StreamFrame::Start));
        assert!(session.handle(frame(req.turn, end("done"))).is_terminal());
        // Trailing noise from the same turn changes nothing.
        assert_eq!(session.handle(TurnEvent::new(req.turn, TurnEventKind::Closed)), TurnUpdate::Ignored);
        assert_eq!(
            session.handle(frame(req.turn, StreamFrame::Error { message: "late".into() })),
            TurnUpdate::Ignored
        );
        assert_eq!(last(&session).content, "done");
    }

    #[test]
    fn test_transport_failures_map_to_generic_messages() {
        let mut session = ChatSession::default();
        let req = session.begin_send("hi").unwrap();
        session.handle(TurnEvent::new(req.turn, TurnEventKind::RequestFailed("refused".into())));
        assert_eq!(last(&session).content, SEND_FAILED);
        assert!(!session.is_busy());

        let req = session.begin_send("again").unwrap();
        session.handle(frame(req.turn, StreamFrame::Start));
        session.handle(frame(req.turn, content("half")));
        session.handle(TurnEvent::new(req.turn, TurnEventKind::ReadFailed("reset".into())));
        assert_eq!(last(&session).content, READ_FAILED);

        let req = session.begin_send("once more").unwrap();
        session.handle(frame(req.turn, StreamFrame::Start));
        session.handle(TurnEvent::new(req.turn, TurnEventKind::Closed));
        assert_eq!(last(&session).content, READ_FAILED);
        assert!(!session.is_busy());
    }

    #[test]
    fn test_clear_restores_welcome_and_drops_turn() {
        let mut session = ChatSession::default();
        assert!(session.welcome_visible());
        let req = session.begin_send("hi").unwrap();
        assert!(!session.welcome_visible());
        session.handle(frame(req.turn, StreamFrame::Start));

        session.clear();
        assert!(session.messages().is_empty());
        assert!(session.welcome_visible());
        assert!(!session.is_busy());
        // Frames still arriving for the abandoned turn are dropped.
        assert_eq!(session.handle(frame(req.turn, content("ghost"))), TurnUpdate::Ignored);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_stale_turn_events_are_ignored() {
        let mut session = ChatSession::default();
        let first = session.begin_send("one").unwrap();
        session.clear();
        let second = session.begin_send("two").unwrap();
        assert_eq!(session.handle(frame(first.turn, StreamFrame::Start)), TurnUpdate::Ignored);
        assert!(session.is_waiting());
        assert!(matches!(session.handle(frame(second.turn, StreamFrame::Start)), TurnUpdate::Started(_)));
    }

    fn finished_exchange(session: &mut ChatSession) -> MessageId {
        let req = session.begin_send("question").unwrap();
        session.handle(frame(req.turn, StreamFrame::Start));
        match session.handle(frame(req.turn, end("first answer"))) {
            TurnUpdate::Finished(id) => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_regenerate_retargets_existing_message() {
        let mut session = ChatSession::default();
        let answer = finished_exchange(&mut session);
        session.push_system("Settings saved successfully!");

        let req = session.begin_regenerate(answer).unwrap();
        assert_eq!(req.message, "question");
        assert_eq!(req.kind, TurnKind::Regenerate(answer));
        let msg = session.message(answer).unwrap();
        assert!(msg.regenerating);
        assert!(msg.content.is_empty());

        assert_eq!(session.handle(frame(req.turn, StreamFrame::Start)), TurnUpdate::Started(answer));
        session.handle(frame(req.turn, content("second")));
        assert_eq!(session.handle(frame(req.turn, end("second answer"))), TurnUpdate::Finished(answer));

        let msg = session.message(answer).unwrap();
        assert_eq!(msg.content, "second answer");
        assert!(!msg.regenerating);
        assert_eq!(session.messages().len(), 3);
    }

    #[test]
    fn test_regenerate_restores_control_on_every_exit() {
        let exits = [
            TurnEventKind::RequestFailed("down".into()),
            TurnEventKind::ReadFailed("reset".into()),
            TurnEventKind::Closed,
            TurnEventKind::Frame(StreamFrame::Error { message: "bad".into() }),
        ];
        let expected = [
            REGENERATE_SEND_FAILED.to_string(),
            REGENERATE_READ_FAILED.to_string(),
            REGENERATE_READ_FAILED.to_string(),
            "Sorry, there was an error: bad".to_string(),
        ];
        for (exit, text) in exits.into_iter().zip(expected) {
            let mut session = ChatSession::default();
            let answer = finished_exchange(&mut session);
            let req = session.begin_regenerate(answer).unwrap();
            assert_eq!(session.handle(TurnEvent::new(req.turn, exit)), TurnUpdate::Failed(answer));
            let msg = session.message(answer).unwrap();
            assert!(!msg.regenerating);
            assert_eq!(msg.content, text);
            assert!(!session.is_busy());
        }
    }

    #[test]
    fn test_regenerate_preconditions() {
        let mut session = ChatSession::default();
        assert_eq!(session.begin_regenerate(MessageId(99)), Err(RegenerateError::UnknownMessage));

        let answer = finished_exchange(&mut session);
        let user = session.messages()[0].id;
        assert_eq!(session.begin_regenerate(user), Err(RegenerateError::NotAssistant));

        session.begin_send("busy now").unwrap();
        assert_eq!(session.begin_regenerate(answer), Err(RegenerateError::Busy));

        let mut orphan = ChatSession::default();
        orphan.restore(vec![(ChatRole::Assistant, "hello".to_string())]);
        let id = orphan.messages()[0].id;
        assert_eq!(orphan.begin_regenerate(id), Err(RegenerateError::NoPrompt));
    }

    #[test]
    fn test_system_messages_come_and_go() {
        let mut session = ChatSession::default();
        let id = session.push_system("Settings reset to defaults!");
        assert_eq!(session.messages().len(), 1);
        assert!(session.remove(id));
        assert!(!session.remove(id));
    }

    #[test]
    fn test_placeholder_cannot_be_removed_mid_turn() {
        let mut session = ChatSession::default();
        let req = session.begin_send("hi").unwrap();
        let Some(id) = session.handle(frame(req.turn, StreamFrame::Start)).message() else {
            panic!("start opens a placeholder");
        };
        assert!(!session.remove(id));
    }

    #[test]
    fn test_restore_history() {
        let mut session = ChatSession::default();
        let count = session.restore(vec![
            (ChatRole::User, "hi".to_string()),
            (ChatRole::Assistant, "**hello**".to_string()),
        ]);
        assert_eq!(count, 2);
        assert!(!session.welcome_visible());
        assert!(session.messages()[1].rendered().unwrap().html.contains("<strong>"));
    }
}
