//! Markdown to styled terminal lines.
//!
//! Mirrors what the HTML renderer produces for the browser: the same parser
//! options, soft breaks as line breaks, raw HTML shown as text, and fenced
//! code blocks numbered in the order `streamchat_core::markdown::code_blocks`
//! lists them.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::theme::Palette;

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

pub fn to_lines(text: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut writer = LineWriter::new(palette);
    for event in Parser::new_ext(text, options()) {
        writer.event(event);
    }
    writer.finish()
}

struct LineWriter<'p> {
    palette: &'p Palette,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    marker: Option<String>,
    quote_depth: usize,
    code: Option<String>,
    code_index: usize,
    link: Option<(String, String)>,
}

impl<'p> LineWriter<'p> {
    fn new(palette: &'p Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            current: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            marker: None,
            quote_depth: 0,
            code: None,
            code_index: 0,
            link: None,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            // Raw HTML is never interpreted.
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::Code(code) => {
                let style = self.style().fg(self.palette.code);
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak | Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(self.palette.muted),
                )));
                self.blank();
            }
            Event::TaskListMarker(done) => {
                self.current
                    .push(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => {
                self.flush();
                self.styles.push(
                    Style::default()
                        .fg(self.palette.accent)
                        .add_modifier(Modifier::BOLD),
                );
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.quote_depth += 1;
                self.styles.push(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.code_index += 1;
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string)
                        .unwrap_or_default(),
                    CodeBlockKind::Indented => String::new(),
                };
                let lang = if lang.is_empty() { "text".to_string() } else { lang };
                self.lines.push(Line::from(Span::styled(
                    format!("┌─ {} · code {} ", lang, self.code_index),
                    Style::default().fg(self.palette.muted),
                )));
                self.code = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.marker = Some(marker);
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self
                .styles
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.styles.push(
                    Style::default()
                        .fg(self.palette.link)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.link = Some((dest_url.to_string(), String::new()));
            }
            Tag::Image { dest_url, .. } => {
                self.current.push(Span::styled(
                    "[image] ",
                    Style::default().fg(self.palette.muted),
                ));
                self.styles.push(Style::default().fg(self.palette.link));
                self.link = Some((dest_url.to_string(), String::new()));
            }
            Tag::Table { .. } => self.flush(),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Heading { .. } => {
                self.flush();
                self.styles.pop();
                self.blank();
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.styles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            TagEnd::CodeBlock => {
                let code = self.code.take().unwrap_or_default();
                let style = Style::default().fg(self.palette.code);
                for line in code.lines() {
                    let mut spans = self.prefix();
                    spans.push(Span::styled("│ ", Style::default().fg(self.palette.muted)));
                    spans.push(Span::styled(line.to_string(), style));
                    self.lines.push(Line::from(spans));
                }
                self.lines.push(Line::from(Span::styled(
                    "└─",
                    Style::default().fg(self.palette.muted),
                )));
                self.blank();
            }
            TagEnd::List { .. } => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link | TagEnd::Image => {
                self.styles.pop();
                if let Some((url, text)) = self.link.take() {
                    if !url.is_empty() && url != text {
                        self.current.push(Span::styled(
                            format!(" <{}>", url),
                            Style::default().fg(self.palette.muted),
                        ));
                    }
                }
            }
            TagEnd::TableCell => self.current.push(Span::styled(
                " │ ",
                Style::default().fg(self.palette.muted),
            )),
            TagEnd::TableHead => {
                let width: usize = self.current.iter().map(|s| s.content.chars().count()).sum();
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(width.max(3)),
                    Style::default().fg(self.palette.muted),
                )));
            }
            TagEnd::TableRow => self.flush(),
            TagEnd::Table => self.blank(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
            return;
        }
        if let Some((_, link_text)) = self.link.as_mut() {
            link_text.push_str(text);
        }
        let style = self.style();
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn prefix(&mut self) -> Vec<Span<'static>> {
        let mut spans = Vec::new();
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(self.palette.muted),
            ));
        }
        if !self.lists.is_empty() {
            let indent = "  ".repeat(self.lists.len() - 1);
            match self.marker.take() {
                Some(marker) => spans.push(Span::raw(format!("{}{}", indent, marker))),
                None => spans.push(Span::raw(format!("{}  ", indent))),
            }
        }
        spans
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = self.prefix();
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}
