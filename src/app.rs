use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use streamchat_core::export::{save_export, save_transcript_html};
use streamchat_core::settings::{MAX_FONT_SIZE, MIN_FONT_SIZE};
use streamchat_core::{
    AnimationSpeed, ChatClient, ChatRole, ChatSession, Config, HistoryEntry, MarkdownRenderer, MessageId,
    RegenerateError, Settings, SettingsStore, Storage, Theme, TurnEvent, TurnRequest, TurnUpdate,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::theme::Palette;
use crate::tui::AppEvent;

pub const MAX_INPUT_CHARS: usize = 2000;
pub const COUNTER_WARN: usize = 1800;
pub const COUNTER_ERROR: usize = 1950;

/// How long system notices stay in the transcript.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);
pub const COPIED_TTL: Duration = Duration::from_secs(2);

pub const FEEDBACK_URL: &str = "mailto:support@example.com?subject=AI Chatbot Feedback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Settings,
    ExportTranscript,
    Shortcuts,
    About,
    Feedback,
}

impl MenuItem {
    pub fn all() -> Vec<MenuItem> {
        vec![
            MenuItem::Settings,
            MenuItem::ExportTranscript,
            MenuItem::Shortcuts,
            MenuItem::About,
            MenuItem::Feedback,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::Settings => "Settings",
            MenuItem::ExportTranscript => "Save transcript as HTML",
            MenuItem::Shortcuts => "Keyboard shortcuts",
            MenuItem::About => "About",
            MenuItem::Feedback => "Send feedback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Theme,
    SendOnEnter,
    SoundEffects,
    MessageTimestamps,
    AutoScroll,
    FontSize,
    AnimationSpeed,
}

impl SettingsField {
    pub fn all() -> Vec<SettingsField> {
        vec![
            SettingsField::Theme,
            SettingsField::SendOnEnter,
            SettingsField::SoundEffects,
            SettingsField::MessageTimestamps,
            SettingsField::AutoScroll,
            SettingsField::FontSize,
            SettingsField::AnimationSpeed,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::Theme => "Theme",
            SettingsField::SendOnEnter => "Send on Enter",
            SettingsField::SoundEffects => "Sound effects",
            SettingsField::MessageTimestamps => "Message timestamps",
            SettingsField::AutoScroll => "Auto-scroll",
            SettingsField::FontSize => "Font size",
            SettingsField::AnimationSpeed => "Animation speed",
        }
    }
}

/// Working copy of the settings while the modal is open.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub draft: Settings,
    pub field: usize,
}

impl SettingsForm {
    pub fn new(settings: Settings) -> Self {
        Self {
            draft: settings,
            field: 0,
        }
    }

    pub fn selected(&self) -> SettingsField {
        let fields = SettingsField::all();
        fields[self.field.min(fields.len() - 1)]
    }

    pub fn next(&mut self) {
        self.field = (self.field + 1) % SettingsField::all().len();
    }

    pub fn prev(&mut self) {
        let len = SettingsField::all().len();
        self.field = (self.field + len - 1) % len;
    }

    /// Step the selected field forward or back.
    pub fn adjust(&mut self, forward: bool) {
        let field = self.selected();
        let d = &mut self.draft;
        match field {
            SettingsField::Theme => d.theme = cycle(&Theme::all(), d.theme, forward),
            SettingsField::SendOnEnter => d.send_on_enter = !d.send_on_enter,
            SettingsField::SoundEffects => d.sound_effects = !d.sound_effects,
            SettingsField::MessageTimestamps => d.message_timestamps = !d.message_timestamps,
            SettingsField::AutoScroll => d.auto_scroll = !d.auto_scroll,
            SettingsField::FontSize => {
                let size = if forward {
                    d.font_size.saturating_add(1)
                } else {
                    d.font_size.saturating_sub(1)
                };
                *d = d.with_font_size(size as u64);
            }
            SettingsField::AnimationSpeed => {
                d.animation_speed = cycle(&AnimationSpeed::all(), d.animation_speed, forward)
            }
        }
    }

    pub fn value_label(&self, field: SettingsField) -> String {
        let d = &self.draft;
        let on_off = |b: bool| (if b { "on" } else { "off" }).to_string();
        match field {
            SettingsField::Theme => d.theme.as_str().to_string(),
            SettingsField::SendOnEnter => on_off(d.send_on_enter),
            SettingsField::SoundEffects => on_off(d.sound_effects),
            SettingsField::MessageTimestamps => on_off(d.message_timestamps),
            SettingsField::AutoScroll => on_off(d.auto_scroll),
            SettingsField::FontSize => format!("{}px ({}-{})", d.font_size, MIN_FONT_SIZE, MAX_FONT_SIZE),
            SettingsField::AnimationSpeed => d.animation_speed.as_str().to_string(),
        }
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let idx = all.iter().position(|v| *v == current).unwrap_or(0);
    let next = if forward {
        (idx + 1) % all.len()
    } else {
        (idx + all.len() - 1) % all.len()
    };
    all[next]
}

#[derive(Debug, Clone)]
pub enum Modal {
    Settings(SettingsForm),
    About,
    Shortcuts,
    ConfirmClear,
}

/// What the last successful copy took, for the "Copied!" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    Message(MessageId),
    /// 1-based code block index within a message.
    CodeBlock(MessageId, usize),
}

impl CopyTarget {
    pub fn message(&self) -> MessageId {
        match self {
            CopyTarget::Message(id) | CopyTarget::CodeBlock(id, _) => *id,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub config: Config,
    pub session: ChatSession,
    pub settings: Settings,
    pub palette: Palette,
    store: SettingsStore<Box<dyn Storage>>,
    client: ChatClient,
    events: UnboundedSender<AppEvent>,

    // Input box
    pub input: String,
    pub cursor: usize, // char index into input

    // Overlays
    pub modal: Option<Modal>,
    pub menu_open: bool,
    pub menu_state: ListState,

    // Message actions
    pub selected: Option<MessageId>,
    pub notices: Vec<(MessageId, Instant)>,
    pub copied: Option<(CopyTarget, Instant)>,
    clipboard: Option<arboard::Clipboard>,

    // Chat viewport (updated during render)
    pub scroll: u16,
    pub follow: bool,
    pub chat_area: Option<Rect>,
    pub chat_height: u16,
    pub chat_lines: u16,
    pub message_rows: Vec<(MessageId, u16, u16)>,

    pub animation_frame: u8,
    pub bell_pending: bool,
    pub tick_changed: bool,
}

impl App {
    pub fn new(
        config: Config,
        client: ChatClient,
        store: SettingsStore<Box<dyn Storage>>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let settings = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not load settings, using defaults");
            Settings::default()
        });
        let session = ChatSession::new(MarkdownRenderer::new(config.markdown_engine()));

        Self {
            should_quit: false,
            config,
            session,
            settings,
            palette: Palette::for_theme(settings.theme),
            store,
            client,
            events,
            input: String::new(),
            cursor: 0,
            modal: None,
            menu_open: false,
            menu_state: ListState::default(),
            selected: None,
            notices: Vec::new(),
            copied: None,
            clipboard: None,
            scroll: 0,
            follow: true,
            chat_area: None,
            chat_height: 0,
            chat_lines: 0,
            message_rows: Vec::new(),
            animation_frame: 0,
            bell_pending: false,
            tick_changed: false,
        }
    }

    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn tick_period(&self) -> Option<Duration> {
        self.settings
            .animation_speed
            .tick_millis()
            .map(Duration::from_millis)
    }

    // Sending

    /// Take the input and open a turn for it. `None` when the input is blank
    /// or a reply is still streaming; the input is then left as is.
    pub fn submit(&mut self) -> Option<TurnRequest> {
        if self.input.trim().is_empty() {
            return None;
        }
        let request = self.session.begin_send(&self.input)?;
        self.input.clear();
        self.cursor = 0;
        self.selected = None;
        self.follow = true;
        Some(request)
    }

    pub fn send(&mut self) {
        if let Some(request) = self.submit() {
            self.spawn_turn(request);
        }
    }

    /// Regenerate the selected assistant message, or the latest one.
    pub fn regenerate(&mut self) {
        let Some(id) = self.action_target() else {
            return;
        };
        match self.session.begin_regenerate(id) {
            Ok(request) => {
                self.follow = self.settings.auto_scroll;
                self.spawn_turn(request);
            }
            Err(RegenerateError::Busy) => debug!("regenerate ignored, a turn is in flight"),
            Err(e) => {
                warn!(error = %e, "cannot regenerate");
                self.notify(format!("Cannot regenerate: {}", e));
            }
        }
    }

    fn spawn_turn(&self, request: TurnRequest) {
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            client
                .stream_turn(&request, |event| {
                    let _ = tx.send(AppEvent::Turn(event));
                })
                .await;
        });
    }

    pub fn apply_turn_event(&mut self, event: TurnEvent) {
        let update = self.session.handle(event);
        match update {
            TurnUpdate::Ignored => return,
            TurnUpdate::Finished(_) => {
                if self.settings.sound_effects {
                    self.bell_pending = true;
                }
            }
            TurnUpdate::Failed(id) => error!(id = id.0, "turn failed"),
            TurnUpdate::Started(_) | TurnUpdate::Updated(_) => {}
        }
        if !self.settings.auto_scroll {
            self.follow = false;
        }
    }

    // Notices and housekeeping

    /// Show a transient system message.
    pub fn notify(&mut self, text: impl Into<String>) {
        let id = self.session.push_system(text);
        self.notices.push((id, Instant::now()));
        self.follow = true;
    }

    pub fn tick(&mut self, now: Instant) {
        let (expired, live): (Vec<_>, Vec<_>) = self
            .notices
            .drain(..)
            .partition(|(_, at)| now.duration_since(*at) >= NOTICE_TTL);
        self.notices = live;
        for (id, _) in expired {
            self.session.remove(id);
            if self.selected == Some(id) {
                self.selected = None;
            }
        }

        if matches!(self.copied, Some((_, at)) if now.duration_since(at) >= COPIED_TTL) {
            self.copied = None;
        }

        if self.settings.animation_speed != AnimationSpeed::Off {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Selection

    /// Explicit selection, else the most recent assistant message.
    pub fn action_target(&self) -> Option<MessageId> {
        self.selected.or_else(|| {
            self.session
                .messages()
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::Assistant)
                .map(|m| m.id)
        })
    }

    pub fn select_prev(&mut self) {
        let ids = self.selectable();
        let Some(last) = ids.last().copied() else {
            return;
        };
        self.selected = Some(match self.selected.and_then(|s| ids.iter().position(|id| *id == s)) {
            Some(0) => ids[0],
            Some(i) => ids[i - 1],
            None => last,
        });
        self.follow = false;
    }

    pub fn select_next(&mut self) {
        let ids = self.selectable();
        let Some(pos) = self.selected.and_then(|s| ids.iter().position(|id| *id == s)) else {
            return;
        };
        self.selected = ids.get(pos + 1).copied();
        if self.selected.is_none() {
            self.follow = true;
        }
    }

    fn selectable(&self) -> Vec<MessageId> {
        self.session
            .messages()
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| m.id)
            .collect()
    }

    /// Select the message drawn at `row` of the chat viewport.
    pub fn select_at_row(&mut self, row: u16) {
        let line = self.scroll.saturating_add(row);
        self.selected = self
            .message_rows
            .iter()
            .find(|(_, start, end)| line >= *start && line < *end)
            .map(|(id, _, _)| *id);
    }

    // Clipboard

    pub fn copy_message(&mut self) {
        let Some(id) = self.action_target() else {
            return;
        };
        let Some(text) = self.session.message(id).map(|m| m.content.clone()) else {
            return;
        };
        self.copy(CopyTarget::Message(id), &text);
    }

    /// Copy code block `n` (1-based) of the target message.
    pub fn copy_code_block(&mut self, n: usize) {
        let Some(id) = self.action_target() else {
            return;
        };
        let code = self
            .session
            .message(id)
            .and_then(|m| m.rendered())
            .and_then(|r| r.code_blocks.get(n.wrapping_sub(1)))
            .map(|b| b.code.clone());
        match code {
            Some(code) => self.copy(CopyTarget::CodeBlock(id, n), &code),
            None => self.notify(format!("No code block {} in this message", n)),
        }
    }

    fn copy(&mut self, target: CopyTarget, text: &str) {
        match self.set_clipboard(text) {
            Ok(()) => {
                debug!(?target, bytes = text.len(), "copied to clipboard");
                self.copied = Some((target, Instant::now()));
            }
            Err(e) => {
                error!(error = %e, "clipboard write failed");
                self.notify("Failed to copy to clipboard");
            }
        }
    }

    fn set_clipboard(&mut self, text: &str) -> anyhow::Result<()> {
        if self.clipboard.is_none() {
            self.clipboard = Some(arboard::Clipboard::new()?);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard.set_text(text.to_string())?;
        }
        Ok(())
    }

    // Overlays

    pub fn open_modal(&mut self, modal: Modal) {
        self.menu_open = false;
        self.modal = Some(modal);
    }

    pub fn open_settings(&mut self) {
        self.open_modal(Modal::Settings(SettingsForm::new(self.settings)));
    }

    pub fn toggle_menu(&mut self) {
        self.menu_open = !self.menu_open;
        if self.menu_open {
            self.menu_state.select(Some(0));
        }
    }

    /// Escape: close every modal and the menu.
    pub fn close_overlays(&mut self) {
        self.modal = None;
        self.menu_open = false;
    }

    pub fn activate_menu_item(&mut self, item: MenuItem) {
        self.menu_open = false;
        match item {
            MenuItem::Settings => self.open_settings(),
            MenuItem::ExportTranscript => self.export_transcript(),
            MenuItem::Shortcuts => self.open_modal(Modal::Shortcuts),
            MenuItem::About => self.open_modal(Modal::About),
            MenuItem::Feedback => {
                if let Err(e) = open_url(FEEDBACK_URL) {
                    warn!(error = %e, "could not open mail client");
                    self.notify(format!("Send feedback to {}", FEEDBACK_URL));
                }
            }
        }
    }

    // Settings

    pub fn cycle_theme(&mut self) {
        let theme = self.settings.theme.next();
        self.settings.theme = theme;
        self.palette = Palette::for_theme(theme);
        if let Err(e) = self.store.set_theme(theme) {
            error!(error = %e, "failed to persist theme");
            self.notify("Failed to save theme");
        }
    }

    pub fn save_settings(&mut self) {
        let Some(Modal::Settings(form)) = &self.modal else {
            return;
        };
        let draft = form.draft;
        match self.store.save(&draft) {
            Ok(()) => {
                self.apply_settings(draft);
                self.modal = None;
                self.notify("Settings saved successfully!");
            }
            Err(e) => {
                error!(error = %e, "failed to save settings");
                self.notify("Failed to save settings");
            }
        }
    }

    pub fn reset_settings(&mut self) {
        match self.store.reset() {
            Ok(defaults) => {
                self.apply_settings(defaults);
                if let Some(Modal::Settings(form)) = &mut self.modal {
                    form.draft = defaults;
                }
                self.notify("Settings reset to defaults!");
            }
            Err(e) => {
                error!(error = %e, "failed to reset settings");
                self.notify("Failed to reset settings");
            }
        }
    }

    fn apply_settings(&mut self, settings: Settings) {
        if settings.animation_speed != self.settings.animation_speed {
            self.tick_changed = true;
        }
        self.palette = Palette::for_theme(settings.theme);
        self.settings = settings;
        info!(theme = settings.theme.as_str(), "settings applied");
    }

    // Server actions

    pub async fn clear_chat(&mut self) {
        self.modal = None;
        match self.client.clear().await {
            Ok(()) => {
                self.session.clear();
                self.notices.clear();
                self.selected = None;
                self.copied = None;
                self.scroll = 0;
                self.follow = true;
            }
            Err(e) => {
                error!(error = %e, "clear chat failed");
                self.notify("Failed to clear chat. Please try again.");
            }
        }
    }

    pub async fn export_chat(&mut self) {
        match self.client.export().await {
            Ok(export) => match save_export(&self.config.download_dir(), &export) {
                Ok(path) => self.notify(format!("Chat exported to {}", path.display())),
                Err(e) => {
                    error!(error = %e, "saving export failed");
                    self.notify("Failed to export chat. Please try again.");
                }
            },
            Err(e) if e.is_not_found() => self.notify("No chat history to export."),
            Err(e) => {
                error!(error = %e, "export request failed");
                self.notify("Failed to export chat. Please try again.");
            }
        }
    }

    /// Save the rendered transcript as a local HTML page.
    pub fn export_transcript(&mut self) {
        let has_chat = self
            .session
            .messages()
            .iter()
            .any(|m| m.role != ChatRole::System);
        if !has_chat {
            self.notify("No chat history to export.");
            return;
        }
        let dir: PathBuf = self.config.download_dir();
        match save_transcript_html(&dir, self.session.messages()) {
            Ok(path) => self.notify(format!("Transcript saved to {}", path.display())),
            Err(e) => {
                error!(error = %e, "saving transcript failed");
                self.notify("Failed to save transcript");
            }
        }
    }

    /// Fetch the server-side conversation in the background; the result
    /// comes back as [`AppEvent::History`].
    pub fn request_history(&self) {
        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppEvent::History(client.history().await));
        });
    }

    /// Restore fetched history unless the conversation already moved on.
    /// Failures only get logged.
    pub fn apply_history(&mut self, history: streamchat_core::Result<Vec<HistoryEntry>>) {
        let history = match history {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "could not load chat history");
                return;
            }
        };
        let started = self
            .session
            .messages()
            .iter()
            .any(|m| m.role != ChatRole::System);
        if started || self.session.is_busy() {
            debug!(entries = history.len(), "history arrived after the chat started, ignored");
            return;
        }
        let count = self
            .session
            .restore(history.into_iter().map(|h| (h.chat_role(), h.content)));
        self.follow = true;
        info!(count, "chat history restored");
    }

    // Scrolling

    pub fn max_scroll(&self) -> u16 {
        self.chat_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if self.follow {
            self.scroll = self.max_scroll();
        }
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        if self.scroll >= self.max_scroll() {
            self.follow = true;
        }
    }
}

/// Hand `url` to the platform opener.
pub fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut cmd = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = std::process::Command::new("xdg-open");

    cmd.arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
}
