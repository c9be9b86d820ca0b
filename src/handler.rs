use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, MenuItem, Modal, MAX_INPUT_CHARS};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick(Instant::now()),
        AppEvent::Turn(event) => app.apply_turn_event(event),
        AppEvent::History(history) => app.apply_history(history),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return Ok(());
    }
    if key.code == KeyCode::Esc {
        if app.modal.is_some() || app.menu_open {
            app.close_overlays();
        } else {
            app.selected = None;
        }
        return Ok(());
    }

    if app.modal.is_some() {
        return handle_modal_key(app, key).await;
    }
    if app.menu_open {
        handle_menu_key(app, key);
        return Ok(());
    }

    if ctrl {
        match key.code {
            KeyCode::Char('k') => app.open_modal(Modal::ConfirmClear),
            KeyCode::Char('d') => app.cycle_theme(),
            KeyCode::Char('s') => app.export_chat().await,
            KeyCode::Char('o') => app.toggle_menu(),
            KeyCode::Char('r') => app.regenerate(),
            KeyCode::Char('y') => app.copy_message(),
            KeyCode::Up => app.select_prev(),
            KeyCode::Down => app.select_next(),
            _ => {}
        }
        return Ok(());
    }

    if key.modifiers.contains(KeyModifiers::ALT) {
        if let KeyCode::Char(c @ '1'..='9') = key.code {
            app.copy_code_block(c as usize - '0' as usize);
            return Ok(());
        }
    }

    match key.code {
        KeyCode::F(1) => app.open_modal(Modal::Shortcuts),
        KeyCode::F(2) => app.open_settings(),
        KeyCode::PageUp => app.scroll_up(page(app)),
        KeyCode::PageDown => app.scroll_down(page(app)),
        _ => handle_input_key(app, key),
    }
    Ok(())
}

fn page(app: &App) -> u16 {
    (app.chat_height / 2).max(1)
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            let alt = key.modifiers.contains(KeyModifiers::ALT);
            let shift = key.modifiers.contains(KeyModifiers::SHIFT);
            // send-on-enter: Enter sends, Alt/Shift+Enter adds a newline.
            // Otherwise the other way round.
            let send = if app.settings.send_on_enter {
                !alt && !shift
            } else {
                alt
            };
            if send {
                app.send();
            } else {
                insert_char(app, '\n');
            }
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.cursor < app.input_len() {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            app.cursor = (app.cursor + 1).min(app.input_len());
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input_len();
        }
        KeyCode::Char(c) => insert_char(app, c),
        _ => {}
    }
}

/// Insert at the cursor unless the input is already at the length limit.
fn insert_char(app: &mut App, c: char) {
    if app.input_len() >= MAX_INPUT_CHARS {
        return;
    }
    let byte_pos = char_to_byte_index(&app.input, app.cursor);
    app.input.insert(byte_pos, c);
    app.cursor += 1;
}

async fn handle_modal_key(app: &mut App, key: KeyEvent) -> Result<()> {
    match app.modal {
        Some(Modal::ConfirmClear) => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.clear_chat().await,
            KeyCode::Char('n') | KeyCode::Char('N') => app.modal = None,
            _ => {}
        },
        Some(Modal::About) | Some(Modal::Shortcuts) => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char('q')) {
                app.modal = None;
            }
        }
        Some(Modal::Settings(_)) => handle_settings_key(app, key),
        None => {}
    }
    Ok(())
}

fn handle_settings_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.save_settings(),
        KeyCode::Char('r') => app.reset_settings(),
        code => {
            let Some(Modal::Settings(form)) = &mut app.modal else {
                return;
            };
            match code {
                KeyCode::Up | KeyCode::BackTab | KeyCode::Char('k') => form.prev(),
                KeyCode::Down | KeyCode::Tab | KeyCode::Char('j') => form.next(),
                KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => form.adjust(true),
                KeyCode::Left | KeyCode::Char('h') => form.adjust(false),
                _ => {}
            }
        }
    }
}

fn handle_menu_key(app: &mut App, key: KeyEvent) {
    let items = MenuItem::all();
    let selected = app.menu_state.selected().unwrap_or(0);
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.menu_state.select(Some(selected.saturating_sub(1)));
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.menu_state.select(Some((selected + 1).min(items.len() - 1)));
        }
        KeyCode::Enter => {
            if let Some(item) = items.get(selected).copied() {
                app.activate_menu_item(item);
            }
        }
        KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => app.toggle_menu(),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let Some(area) = app.chat_area else {
        return;
    };
    if app.modal.is_some() || !point_in_rect(mouse.column, mouse.row, area) {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::Down(MouseButton::Left) => {
            // Row 0 of the area is the border
            if mouse.row > area.y {
                app.select_at_row(mouse.row - area.y - 1);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use streamchat_core::{ChatClient, Config, MemoryStorage, SettingsStore, Storage};
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = ChatClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let store: SettingsStore<Box<dyn Storage>> = SettingsStore::new(Box::new(MemoryStorage::new()));
        App::new(Config::new(), client, store, tx)
    }

    fn key(code: KeyCode) -> AppEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    async fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[tokio::test]
    async fn test_editing_is_utf8_safe() {
        let mut app = test_app();
        type_str(&mut app, "añb").await;
        handle_event(&mut app, key(KeyCode::Left)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.input, "ab");
        assert_eq!(app.cursor, 1);
        handle_event(&mut app, key(KeyCode::Delete)).await.unwrap();
        assert_eq!(app.input, "a");
        handle_event(&mut app, key(KeyCode::Home)).await.unwrap();
        type_str(&mut app, "x").await;
        assert_eq!(app.input, "xa");
    }

    #[tokio::test]
    async fn test_input_limit() {
        let mut app = test_app();
        app.input = "a".repeat(MAX_INPUT_CHARS);
        app.cursor = MAX_INPUT_CHARS;
        type_str(&mut app, "b").await;
        assert_eq!(app.input_len(), MAX_INPUT_CHARS);
        assert!(!app.input.contains('b'));
    }

    #[tokio::test]
    async fn test_enter_sends_when_send_on_enter() {
        let mut app = test_app();
        type_str(&mut app, "hello").await;
        handle_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::ALT)).await.unwrap();
        assert_eq!(app.input, "hello\n");
        handle_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::SHIFT)).await.unwrap();
        assert_eq!(app.input, "hello\n\n");

        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.input.is_empty());
        assert!(app.session.is_busy());
        assert_eq!(app.session.messages()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_enter_adds_newline_without_send_on_enter() {
        let mut app = test_app();
        app.settings.send_on_enter = false;
        type_str(&mut app, "hi").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.input, "hi\n");
        assert!(!app.session.is_busy());
    }

    #[tokio::test]
    async fn test_clear_confirmation_can_be_declined() {
        let mut app = test_app();
        handle_event(&mut app, key_with(KeyCode::Char('k'), KeyModifiers::CONTROL)).await.unwrap();
        assert!(matches!(app.modal, Some(Modal::ConfirmClear)));
        // Typing goes to the modal, not the input
        handle_event(&mut app, key(KeyCode::Char('x'))).await.unwrap();
        assert!(app.input.is_empty());
        handle_event(&mut app, key(KeyCode::Char('n'))).await.unwrap();
        assert!(app.modal.is_none());
    }

    #[tokio::test]
    async fn test_escape_closes_overlays() {
        let mut app = test_app();
        handle_event(&mut app, key_with(KeyCode::Char('o'), KeyModifiers::CONTROL)).await.unwrap();
        assert!(app.menu_open);
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert!(!app.menu_open);

        handle_event(&mut app, key(KeyCode::F(1))).await.unwrap();
        assert!(matches!(app.modal, Some(Modal::Shortcuts)));
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        assert!(app.modal.is_none());
    }

    #[tokio::test]
    async fn test_menu_opens_settings() {
        let mut app = test_app();
        handle_event(&mut app, key_with(KeyCode::Char('o'), KeyModifiers::CONTROL)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(!app.menu_open);
        assert!(matches!(app.modal, Some(Modal::Settings(_))));
    }

    #[tokio::test]
    async fn test_settings_modal_saves() {
        let mut app = test_app();
        handle_event(&mut app, key(KeyCode::F(2))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Down)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char(' '))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.modal.is_none());
        assert!(!app.settings.send_on_enter);
    }

    #[tokio::test]
    async fn test_theme_shortcut() {
        let mut app = test_app();
        let before = app.settings.theme;
        handle_event(&mut app, key_with(KeyCode::Char('d'), KeyModifiers::CONTROL)).await.unwrap();
        assert_eq!(app.settings.theme, before.next());
    }

    #[tokio::test]
    async fn test_mouse_click_selects_message() {
        let mut app = test_app();
        app.chat_area = Some(Rect::new(0, 1, 80, 20));
        app.message_rows = vec![(streamchat_core::MessageId(4), 0, 5)];
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 10,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        handle_event(&mut app, AppEvent::Mouse(click)).await.unwrap();
        assert_eq!(app.selected, Some(streamchat_core::MessageId(4)));
    }
}
