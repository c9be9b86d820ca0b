use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};
use streamchat_core::{AnimationSpeed, ChatMessage, ChatRole, MessageId, MessageStatus};
use unicode_width::UnicodeWidthChar;

use crate::app::{
    App, CopyTarget, MenuItem, Modal, SettingsField, SettingsForm, COUNTER_ERROR, COUNTER_WARN,
    MAX_INPUT_CHARS,
};
use crate::markdown;
use crate::theme::Palette;

const MAX_INPUT_ROWS: usize = 5;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat_screen(app, frame, body_area);
    render_footer(app, frame, footer_area);

    // Overlays last so they sit on top
    if app.menu_open {
        render_menu(app, frame, body_area);
    }
    match &app.modal {
        Some(Modal::Settings(form)) => render_settings(&app.palette, form, frame, area),
        Some(Modal::About) => render_about(app, frame, area),
        Some(Modal::Shortcuts) => render_shortcuts(&app.palette, frame, area),
        Some(Modal::ConfirmClear) => render_confirm_clear(&app.palette, frame, area),
        None => {}
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let p = &app.palette;
    let status = if app.session.is_busy() {
        Span::styled(" ● replying ", Style::default().fg(p.warning))
    } else {
        Span::styled(" ● ready ", Style::default().fg(p.success))
    };

    let title = Line::from(vec![
        Span::styled(" StreamChat ", Style::default().fg(p.accent).bold()),
        Span::styled(app.config.server_url().to_string(), Style::default().fg(p.muted)),
        status,
        Span::styled(
            format!("theme: {} ", app.settings.theme.as_str()),
            Style::default().fg(p.muted),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(p.muted),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(p.header_bg));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let p = &app.palette;
    let key_style = Style::default().bg(p.key_bg).fg(p.text);
    let label_style = Style::default().fg(p.muted);

    let send_key = if app.settings.send_on_enter { " Enter " } else { " Alt+Enter " };
    let mut hints = vec![
        Span::styled(send_key, key_style),
        Span::styled(" send ", label_style),
        Span::styled(" Ctrl+O ", key_style),
        Span::styled(" menu ", label_style),
        Span::styled(" Ctrl+K ", key_style),
        Span::styled(" clear ", label_style),
        Span::styled(" Ctrl+D ", key_style),
        Span::styled(" theme ", label_style),
        Span::styled(" Ctrl+S ", key_style),
        Span::styled(" export ", label_style),
    ];
    if app.action_target().is_some() {
        hints.extend(vec![
            Span::styled(" Ctrl+Y ", key_style),
            Span::styled(" copy ", label_style),
            Span::styled(" Ctrl+R ", key_style),
            Span::styled(" regenerate ", label_style),
        ]);
    }
    hints.extend(vec![
        Span::styled(" F1 ", key_style),
        Span::styled(" keys ", label_style),
        Span::styled(" Ctrl+C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let (input_rows, cursor) = layout_input(&app.input, app.cursor, inner_width);
    let input_height = input_rows.len().clamp(1, MAX_INPUT_ROWS) as u16 + 2;

    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(input_height)]).areas(area);

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area, &input_rows, cursor);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let p = app.palette;
    let width = area.width.saturating_sub(2) as usize;

    let (lines, rows) = if app.session.welcome_visible() && app.session.messages().is_empty() {
        (welcome_lines(&p), Vec::new())
    } else {
        chat_lines(app, width)
    };

    // Store geometry for scrolling and mouse hit-testing
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_lines = lines.len().min(u16::MAX as usize) as u16;
    app.message_rows = rows;
    if app.follow || app.scroll > app.max_scroll() {
        app.scroll = app.max_scroll();
    }

    let title = if app.selected.is_some() {
        " Chat · selected: Ctrl+Y copy, Ctrl+R regenerate, Alt+1-9 copy code, Esc deselect "
    } else {
        " Chat "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.muted))
        .title(title);

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.scroll, 0));
    frame.render_widget(chat, area);
}

fn welcome_lines(p: &Palette) -> Vec<Line<'static>> {
    vec![
        Line::default(),
        Line::from(Span::styled(
            "Welcome to StreamChat",
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::default(),
        Line::from(Span::styled(
            "Type a message below to start a conversation.",
            Style::default().fg(p.muted),
        ))
        .alignment(Alignment::Center),
        Line::from(Span::styled(
            "Replies stream in as they are written.",
            Style::default().fg(p.muted),
        ))
        .alignment(Alignment::Center),
    ]
}

/// Every message as pre-wrapped lines, plus the rows each message covers.
fn chat_lines(app: &App, width: usize) -> (Vec<Line<'static>>, Vec<(MessageId, u16, u16)>) {
    let p = &app.palette;
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut rows = Vec::new();

    for msg in app.session.messages() {
        let start = lines.len();
        for line in message_lines(app, msg) {
            lines.extend(wrap_line(line, width));
        }
        let end = lines.len();
        rows.push((msg.id, start as u16, end as u16));
        lines.push(Line::default());
    }

    if app.session.is_waiting() {
        lines.push(Line::from(Span::styled(
            ChatRole::Assistant.label(),
            Style::default().fg(p.assistant).add_modifier(Modifier::BOLD),
        )));
        let dots = if app.settings.animation_speed == AnimationSpeed::Off {
            "...".to_string()
        } else {
            ".".repeat(app.animation_frame as usize + 1)
        };
        lines.push(Line::from(Span::styled(
            format!("Typing{}", dots),
            Style::default().fg(p.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    (lines, rows)
}

fn message_lines(app: &App, msg: &ChatMessage) -> Vec<Line<'static>> {
    let p = &app.palette;
    let selected = app.selected == Some(msg.id);
    let mut lines = Vec::new();

    let role_color = match msg.role {
        ChatRole::User => p.user,
        ChatRole::Assistant => p.assistant,
        ChatRole::System => p.system,
    };
    let mut header = vec![
        Span::raw(if selected { "▶ " } else { "" }),
        Span::styled(
            msg.role.label(),
            Style::default().fg(role_color).add_modifier(Modifier::BOLD),
        ),
    ];
    if app.settings.message_timestamps {
        header.push(Span::styled(
            format!("  {}", msg.created_at.format("%H:%M")),
            Style::default().fg(p.muted),
        ));
    }
    if msg.regenerating {
        header.push(Span::styled("  regenerating…", Style::default().fg(p.muted)));
    }
    if let Some(code_count) = msg.rendered().map(|r| r.code_blocks.len()).filter(|n| *n > 0) {
        header.push(Span::styled(
            format!("  [{} code block{}]", code_count, if code_count == 1 { "" } else { "s" }),
            Style::default().fg(p.muted),
        ));
    }
    if let Some((target, _)) = app.copied.filter(|(t, _)| t.message() == msg.id) {
        let text = match target {
            CopyTarget::Message(_) => "  Copied!".to_string(),
            CopyTarget::CodeBlock(_, n) => format!("  Copied code {}!", n),
        };
        header.push(Span::styled(text, Style::default().fg(p.success)));
    }
    lines.push(Line::from(header));

    let body_style = if selected {
        Style::default().bg(p.selection_bg)
    } else {
        Style::default()
    };
    match (msg.role, msg.status) {
        (ChatRole::Assistant, MessageStatus::Failed) => {
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(p.error),
                )));
            }
        }
        (ChatRole::Assistant, _) => {
            let mut body = markdown::to_lines(&msg.content, p);
            if msg.is_streaming() {
                match body.last_mut() {
                    Some(last) => last.spans.push(Span::styled("▌", Style::default().fg(p.muted))),
                    None => body.push(Line::from(Span::styled("▌", Style::default().fg(p.muted)))),
                }
            }
            lines.extend(body.into_iter().map(|l| l.patch_style(body_style)));
        }
        (ChatRole::User, _) => {
            for line in msg.content.lines() {
                lines.push(Line::from(line.to_string()).style(body_style));
            }
        }
        (ChatRole::System, _) => {
            for line in msg.content.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(p.system).add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }

    lines
}

fn render_input(
    app: &App,
    frame: &mut Frame,
    area: Rect,
    rows: &[String],
    cursor: (u16, u16),
) {
    let p = &app.palette;
    let count = app.input_len();
    let counter_color = if count > COUNTER_ERROR {
        p.error
    } else if count > COUNTER_WARN {
        p.warning
    } else {
        p.muted
    };

    let title = if app.session.is_busy() {
        " Message (waiting for reply) "
    } else if app.settings.send_on_enter {
        " Message (Enter to send, Alt+Enter for newline) "
    } else {
        " Message (Alt+Enter to send) "
    };
    let border_color = if app.session.is_busy() { p.muted } else { p.accent };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title_bottom(
            Line::from(Span::styled(
                format!(" {}/{} ", count, MAX_INPUT_CHARS),
                Style::default().fg(counter_color),
            ))
            .right_aligned(),
        );

    // Keep the cursor row visible
    let visible = area.height.saturating_sub(2) as usize;
    let (cursor_x, cursor_y) = cursor;
    let offset = (cursor_y as usize + 1).saturating_sub(visible);

    let text: Vec<Line> = rows
        .iter()
        .skip(offset)
        .take(visible)
        .map(|r| Line::from(r.clone()))
        .collect();
    let input = Paragraph::new(text)
        .style(Style::default().fg(p.user))
        .block(block);
    frame.render_widget(input, area);

    // A box squeezed to its borders has no row for the cursor
    if app.modal.is_none() && !app.menu_open && visible > 0 {
        let row = (cursor_y as usize).saturating_sub(offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + row + 1));
    }
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Split the input into rows at most `width` cells wide, breaking at
/// newlines, and locate the cursor (column, row) among them.
fn layout_input(input: &str, cursor: usize, width: usize) -> (Vec<String>, (u16, u16)) {
    let width = width.max(1);
    let mut rows = vec![String::new()];
    let mut col = 0;
    let mut pos = None;

    for (i, c) in input.chars().enumerate() {
        if c == '\n' {
            if i == cursor {
                pos = Some((col, rows.len() - 1));
            }
            rows.push(String::new());
            col = 0;
            continue;
        }
        let w = char_width(c);
        if col > 0 && col + w > width {
            rows.push(String::new());
            col = 0;
        }
        if i == cursor {
            pos = Some((col, rows.len() - 1));
        }
        if let Some(row) = rows.last_mut() {
            row.push(c);
        }
        col += w;
    }

    let (x, y) = match pos {
        Some(pos) => pos,
        None if col >= width => {
            rows.push(String::new());
            (0, rows.len() - 1)
        }
        None => (col, rows.len() - 1),
    };
    (rows, (x.min(width - 1) as u16, y as u16))
}

/// Wrap a styled line to `width` cells, preferring to break after a space.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }

    let cells: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|s| s.content.chars().map(move |c| (c, s.style)))
        .collect();

    let mut out = Vec::new();
    let mut start = 0;
    while start < cells.len() {
        let mut end = start;
        let mut used = 0;
        while end < cells.len() {
            let w = char_width(cells[end].0);
            // Always take one char so a glyph wider than the row still moves on
            if end > start && used + w > width {
                break;
            }
            used += w;
            end += 1;
        }
        if end < cells.len() {
            if let Some(space) = cells[start..end].iter().rposition(|(c, _)| *c == ' ') {
                if space > 0 {
                    end = start + space + 1;
                }
            }
        }
        out.push(cells_to_line(&cells[start..end]).style(line.style));
        start = end;
    }
    out
}

fn cells_to_line(cells: &[(char, Style)]) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut style = None;
    for (c, s) in cells {
        if style.is_some_and(|cur| cur != *s) {
            spans.push(Span::styled(std::mem::take(&mut text), style.unwrap_or_default()));
        }
        style = Some(*s);
        text.push(*c);
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, style.unwrap_or_default()));
    }
    Line::from(spans)
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(2));

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_menu(app: &mut App, frame: &mut Frame, area: Rect) {
    let p = app.palette;
    let items = MenuItem::all();
    let width = 30.min(area.width);
    let height = (items.len() as u16 + 2).min(area.height);
    let menu_area = Rect::new(area.x + area.width.saturating_sub(width), area.y, width, height);

    frame.render_widget(Clear, menu_area);

    let list_items: Vec<ListItem> = items
        .iter()
        .map(|item| ListItem::new(format!(" {} ", item.label())))
        .collect();

    let list = List::new(list_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.accent))
                .title(" Menu "),
        )
        .highlight_style(
            Style::default()
                .bg(p.accent)
                .fg(p.header_bg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, menu_area, &mut app.menu_state);
}

fn render_settings(p: &Palette, form: &SettingsForm, frame: &mut Frame, area: Rect) {
    let fields = SettingsField::all();
    let popup = popup_area(area, 56, fields.len() as u16 + 6);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.accent))
        .title(" Settings ");
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let mut lines: Vec<Line> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let selected = i == form.field;
            let marker = if selected { "> " } else { "  " };
            let style = if selected {
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{}{:<20}", marker, field.label()), style),
                Span::styled(format!("‹ {} ›", form.value_label(*field)), style),
            ])
        })
        .collect();
    lines.push(Line::default());
    if form.selected() == SettingsField::FontSize {
        lines.push(Line::from(Span::styled(
            "Font size is kept for other clients; the terminal sets its own.",
            Style::default().fg(p.muted),
        )));
    } else {
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(
        "↑/↓ field  ←/→ change  Enter save  r reset  Esc cancel",
        Style::default().fg(p.muted),
    )));

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_about(app: &App, frame: &mut Frame, area: Rect) {
    let p = &app.palette;
    let popup = popup_area(area, 60, 10);
    frame.render_widget(Clear, popup);

    let lines = vec![
        Line::from(Span::styled(
            format!("StreamChat v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("A terminal client for streaming chat servers."),
        Line::from("Replies are rendered from Markdown as they arrive."),
        Line::default(),
        Line::from(Span::styled(
            format!("Server:   {}", app.config.server_url()),
            Style::default().fg(p.muted),
        )),
        Line::from(Span::styled(
            format!("Markdown: {}", app.session.renderer().engine().as_str()),
            Style::default().fg(p.muted),
        )),
    ];

    let about = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.accent))
            .title(" About (Esc to close) "),
    );
    frame.render_widget(about, popup);
}

fn render_shortcuts(p: &Palette, frame: &mut Frame, area: Rect) {
    let shortcuts = [
        ("Enter", "Send message (Alt+Enter for newline)"),
        ("Ctrl+K", "Clear chat"),
        ("Ctrl+D", "Cycle theme"),
        ("Ctrl+S", "Export chat"),
        ("Ctrl+O", "Open menu"),
        ("Ctrl+Up/Down", "Select message"),
        ("Ctrl+Y", "Copy selected message"),
        ("Alt+1..9", "Copy code block N"),
        ("Ctrl+R", "Regenerate response"),
        ("PgUp/PgDn", "Scroll"),
        ("F2", "Settings"),
        ("Esc", "Close dialogs and menu"),
        ("Ctrl+C", "Quit"),
    ];
    let popup = popup_area(area, 56, shortcuts.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let lines: Vec<Line> = shortcuts
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!(" {:<14}", key), Style::default().fg(p.accent).bold()),
                Span::raw(*action),
            ])
        })
        .collect();

    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.accent))
            .title(" Keyboard Shortcuts (Esc to close) "),
    );
    frame.render_widget(help, popup);
}

fn render_confirm_clear(p: &Palette, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 54, 6);
    frame.render_widget(Clear, popup);

    let lines = vec![
        Line::default(),
        Line::from("Are you sure you want to clear the chat history?").alignment(Alignment::Center),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(p.error).fg(p.header_bg).bold()),
            Span::raw(" clear   "),
            Span::styled(" n ", Style::default().bg(p.key_bg).fg(p.text)),
            Span::raw(" cancel"),
        ])
        .alignment(Alignment::Center),
    ];

    let confirm = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.warning))
            .title(" Clear Chat "),
    );
    frame.render_widget(confirm, popup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ratatui::{backend::TestBackend, Terminal};
    use streamchat_core::{
        ChatClient, Config, MemoryStorage, SettingsStore, Storage, StreamFrame, TurnEvent,
        TurnEventKind,
    };
    use tokio::sync::mpsc;

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let client = ChatClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let store: SettingsStore<Box<dyn Storage>> = SettingsStore::new(Box::new(MemoryStorage::new()));
        App::new(Config::new(), client, store, tx)
    }

    #[test]
    fn test_renders_on_tiny_terminals() {
        let mut app = test_app();
        app.input = "hello there\nsecond line".into();
        app.cursor = app.input_len();
        let request = app.submit().unwrap();
        app.apply_turn_event(TurnEvent::new(
            request.turn,
            TurnEventKind::Frame(StreamFrame::End { full_text: "你好世界 **ok**".into() }),
        ));
        app.input = "draft".into();
        app.cursor = 5;

        for (width, height) in [(40, 4), (40, 3), (40, 2), (40, 1), (3, 6), (1, 1), (80, 24)] {
            let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
            terminal.draw(|frame| render(&mut app, frame)).unwrap();
        }
    }

    #[test]
    fn test_wide_chars_fit_the_viewport() {
        let line = Line::from("你好世界你好世界你好世界");
        let rows = wrap_line(line, 10);
        let widths: Vec<usize> = rows.iter().map(|r| r.width()).collect();
        assert_eq!(widths, vec![10, 10, 4]);
        assert_eq!(rows.iter().map(text_of).collect::<String>(), "你好世界你好世界你好世界");

        let (rows, cursor) = layout_input("你好世界", 4, 5);
        assert_eq!(rows, vec!["你好", "世界"]);
        assert_eq!(cursor, (4, 1));
    }

    #[test]
    fn test_glyph_wider_than_row_still_advances() {
        let rows = wrap_line(Line::from("你好"), 1);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_layout_input_wraps_and_tracks_cursor() {
        let (rows, cursor) = layout_input("abcdef", 6, 4);
        assert_eq!(rows, vec!["abcd", "ef"]);
        assert_eq!(cursor, (2, 1));

        let (rows, cursor) = layout_input("ab\ncd", 1, 10);
        assert_eq!(rows, vec!["ab", "cd"]);
        assert_eq!(cursor, (1, 0));

        let (rows, cursor) = layout_input("abcd", 4, 4);
        assert_eq!(rows, vec!["abcd", ""]);
        assert_eq!(cursor, (0, 1));

        let (rows, cursor) = layout_input("", 0, 4);
        assert_eq!(rows, vec![""]);
        assert_eq!(cursor, (0, 0));
    }

    #[test]
    fn test_wrap_line_prefers_spaces() {
        let line = Line::from(vec![
            Span::styled("hello ", Style::default().bold()),
            Span::raw("wide world"),
        ]);
        let rows: Vec<String> = wrap_line(line, 8).iter().map(text_of).collect();
        assert_eq!(rows, vec!["hello ", "wide ", "world"]);
    }

    #[test]
    fn test_wrap_line_keeps_styles() {
        let line = Line::from(vec![
            Span::styled("aaaa", Style::default().bold()),
            Span::raw("bbbb"),
        ]);
        let rows = wrap_line(line, 6);
        assert_eq!(text_of(&rows[0]), "aaaabb");
        assert_eq!(rows[0].spans.len(), 2);
        assert!(rows[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(text_of(&rows[1]), "bb");
    }

    #[test]
    fn test_short_lines_are_untouched() {
        let rows = wrap_line(Line::from("short"), 80);
        assert_eq!(rows.len(), 1);
    }
}
