//! Saving exported transcripts to disk.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::error::Result;
use crate::markdown::escape_html;
use crate::state::{ChatMessage, ChatRole};

pub const FALLBACK_EXPORT_NAME: &str = "chat_export.txt";

/// A downloaded transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub filename: String,
    pub contents: Vec<u8>,
}

fn disposition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'[^']*')?("([^"]*)"|[^;]+)"#).expect("static regex")
    })
}

/// File name from a `Content-Disposition` header value, reduced to a single
/// safe path component.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let caps = disposition_re().captures(header)?;
    let raw = caps
        .get(2)
        .or_else(|| caps.get(1))
        .map(|m| m.as_str().trim().trim_matches('"'))?;
    sanitize_filename(raw)
}

fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, ':' | '*' | '?' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Write `export` into `dir` under its own name, never replacing an existing
/// file: `chat.txt`, `chat (1).txt`, `chat (2).txt`, ...
pub fn save_export(dir: &Path, export: &Export) -> Result<PathBuf> {
    let name = sanitize_filename(&export.filename).unwrap_or_else(|| FALLBACK_EXPORT_NAME.into());
    save_unique(dir, &name, &export.contents)
}

fn save_unique(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    for n in 0u32.. {
        let candidate = match (n, ext) {
            (0, _) => name.to_string(),
            (n, Some(ext)) => format!("{stem} ({n}).{ext}"),
            (n, None) => format!("{stem} ({n})"),
        };
        let path = dir.join(candidate);
        // create_new makes the existence check and the create one step.
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(contents)?;
                info!(path = %path.display(), bytes = contents.len(), "export saved");
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("u32 range exhausted while naming export")
}

/// Standalone HTML page of the transcript. Assistant messages use their
/// sanitized rendering; everything else is escaped text.
pub fn transcript_html(messages: &[ChatMessage]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Chat Export</title>\n</head>\n<body>\n",
    );
    for msg in messages.iter().filter(|m| m.role != ChatRole::System) {
        let class = match msg.role {
            ChatRole::User => "user",
            _ => "assistant",
        };
        html.push_str(&format!(
            "<div class=\"message {class}\">\n<div class=\"meta\">{} &middot; {}</div>\n",
            msg.role.label(),
            msg.created_at.format("%Y-%m-%d %H:%M")
        ));
        match msg.rendered() {
            Some(rendered) => html.push_str(&rendered.html),
            None => html.push_str(&format!("<p>{}</p>", escape_html(&msg.content))),
        }
        html.push_str("\n</div>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Save [`transcript_html`] as `chat_export_<timestamp>.html` in `dir`.
pub fn save_transcript_html(dir: &Path, messages: &[ChatMessage]) -> Result<PathBuf> {
    let name = format!("chat_export_{}.html", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    save_unique(dir, &name, transcript_html(messages).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::MarkdownRenderer;
    use crate::state::MessageId;

    #[test]
    fn test_disposition_quoted_and_bare() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="chat_export_20240101.txt""#).as_deref(),
            Some("chat_export_20240101.txt")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=notes.txt; size=10").as_deref(),
            Some("notes.txt")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.txt").as_deref(),
            Some("r%C3%A9sum%C3%A9.txt")
        );
    }

    #[test]
    fn test_disposition_strips_paths() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="C:\temp\x.txt""#).as_deref(),
            Some("x.txt")
        );
        assert_eq!(filename_from_disposition(r#"attachment; filename="..""#), None);
        assert_eq!(filename_from_disposition("attachment"), None);
    }

    #[test]
    fn test_save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let export = Export {
            filename: "chat.txt".into(),
            contents: b"one".to_vec(),
        };
        let first = save_export(dir.path(), &export).unwrap();
        let second = save_export(dir.path(), &Export { contents: b"two".to_vec(), ..export.clone() }).unwrap();
        let third = save_export(dir.path(), &export).unwrap();

        assert_eq!(first.file_name().unwrap(), "chat.txt");
        assert_eq!(second.file_name().unwrap(), "chat (1).txt");
        assert_eq!(third.file_name().unwrap(), "chat (2).txt");
        assert_eq!(fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two");
    }

    #[test]
    fn test_save_falls_back_on_bad_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_export(
            dir.path(),
            &Export {
                filename: "/".into(),
                contents: Vec::new(),
            },
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), FALLBACK_EXPORT_NAME);
    }

    #[test]
    fn test_transcript_html_escapes_user_text() {
        let renderer = MarkdownRenderer::default();
        let mut user = ChatMessage::new(MessageId(1), ChatRole::User, "");
        user.set_content("<b>hi</b>", &renderer);
        let mut ai = ChatMessage::new(MessageId(2), ChatRole::Assistant, "");
        ai.set_content("**bold**", &renderer);
        let notice = ChatMessage::new(MessageId(3), ChatRole::System, "Settings saved successfully!");

        let html = transcript_html(&[user, ai, notice]);
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(!html.contains("Settings saved"));
    }
}
