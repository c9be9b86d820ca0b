//! Markdown to sanitized HTML for assistant output.
//!
//! The CommonMark engine delegates to `pulldown-cmark`; the basic engine is a
//! small regex renderer kept for minimal output. Both escape any HTML found
//! in the source and open links in a new context without referrer or opener.

use std::str::FromStr;
use std::sync::OnceLock;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::UnknownName;

const LINK_ATTRS: &str = r#"target="_blank" rel="noopener noreferrer""#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownEngine {
    #[default]
    CommonMark,
    Basic,
}

impl MarkdownEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkdownEngine::CommonMark => "commonmark",
            MarkdownEngine::Basic => "basic",
        }
    }

}

impl FromStr for MarkdownEngine {
    type Err = UnknownName;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "commonmark" | "cmark" | "full" => Ok(MarkdownEngine::CommonMark),
            "basic" | "fallback" => Ok(MarkdownEngine::Basic),
            _ => Err(UnknownName::new("markdown engine", s, "commonmark, basic")),
        }
    }
}

/// A code block found in a message, offered for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

/// Output of one render pass over a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub code_blocks: Vec<CodeBlock>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer {
    engine: MarkdownEngine,
}

impl MarkdownRenderer {
    pub fn new(engine: MarkdownEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> MarkdownEngine {
        self.engine
    }

    /// Full reparse of `text`. The code block list is rebuilt every time so it
    /// always matches the HTML it came with.
    pub fn render(&self, text: &str) -> Rendered {
        let html = match self.engine {
            MarkdownEngine::CommonMark => render_html(text),
            MarkdownEngine::Basic => render_basic(text),
        };
        Rendered {
            html,
            code_blocks: code_blocks(text),
        }
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Render with pulldown-cmark, rewriting the events that need sanitizing.
pub fn render_html(text: &str) -> String {
    let events = Parser::new_ext(text, options()).map(|event| match event {
        // Raw HTML from the model is shown, not interpreted.
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::SoftBreak => Event::HardBreak,
        Event::Start(Tag::CodeBlock(kind)) => {
            let lang = match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .map(str::to_string)
                    .filter(|l| !l.is_empty()),
                CodeBlockKind::Indented => None,
            };
            Event::Html(CowStr::from(format!(
                "<pre><code class=\"language-{}\">",
                escape_html(lang.as_deref().unwrap_or("text"))
            )))
        }
        Event::End(TagEnd::CodeBlock) => Event::Html(CowStr::from("</code></pre>\n")),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            ..
        }) => {
            // Autolinked addresses arrive without their scheme.
            let href = match link_type {
                LinkType::Email => format!("mailto:{}", dest_url),
                _ => safe_url(&dest_url),
            };
            let mut open = format!("<a href=\"{}\"", escape_html(&href));
            if !title.is_empty() {
                open.push_str(&format!(" title=\"{}\"", escape_html(&title)));
            }
            open.push(' ');
            open.push_str(LINK_ATTRS);
            open.push('>');
            Event::Html(CowStr::from(open))
        }
        Event::End(TagEnd::Link) => Event::Html(CowStr::from("</a>")),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::from(safe_url(&dest_url)),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(\w+)?\n([\s\S]*?)```").expect("static regex"))
}

fn inline_res() -> &'static [(Regex, &'static str); 3] {
    static RES: OnceLock<[(Regex, &'static str); 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            (Regex::new(r"`([^`]+)`").expect("static regex"), "<code>$1</code>"),
            (Regex::new(r"\*\*(.*?)\*\*").expect("static regex"), "<strong>$1</strong>"),
            (Regex::new(r"\*(.*?)\*").expect("static regex"), "<em>$1</em>"),
        ]
    })
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("static regex"))
}

/// Regex renderer: fenced code, inline code, bold, italic, line breaks, links.
pub fn render_basic(text: &str) -> String {
    let escaped = escape_html(text);
    let mut out = String::with_capacity(escaped.len());
    let mut last = 0;

    for caps in code_block_re().captures_iter(&escaped) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&render_basic_inline(&escaped[last..whole.start()]));
        let class = caps
            .get(1)
            .map(|m| format!(" class=\"language-{}\"", m.as_str()))
            .unwrap_or_default();
        let code = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        out.push_str(&format!("<pre><code{class}>{code}</code></pre>"));
        last = whole.end();
    }
    out.push_str(&render_basic_inline(&escaped[last..]));
    out
}

fn render_basic_inline(segment: &str) -> String {
    let mut text = segment.to_string();
    for (re, replacement) in inline_res() {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    text = text.replace('\n', "<br>");
    link_re()
        .replace_all(&text, |caps: &Captures| {
            // The segment is already escaped; only the scheme needs checking.
            let href = if safe_url(&caps[2]) == "#" { "#" } else { &caps[2] };
            format!("<a href=\"{href}\" {LINK_ATTRS}>{}</a>", &caps[1])
        })
        .into_owned()
}

/// Every code block in `text`, fenced or indented, in document order.
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in Parser::new_ext(text, options()) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string)
                        .filter(|l| !l.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                current = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Event::Text(t) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&t);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    if block.code.ends_with('\n') {
                        block.code.pop();
                    }
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    // An unterminated fence while streaming still counts.
    if let Some(mut block) = current {
        if block.code.ends_with('\n') {
            block.code.pop();
        }
        blocks.push(block);
    }

    blocks
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace script-capable URL schemes with `#`.
fn safe_url(url: &str) -> String {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    let blocked = ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|scheme| compact.starts_with(scheme));
    if blocked {
        "#".to_string()
    } else {
        url.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_open_in_new_context() {
        let html = render_html("see [docs](https://example.com/a?b=1&c=2)");
        assert!(html.contains(
            r#"<a href="https://example.com/a?b=1&amp;c=2" target="_blank" rel="noopener noreferrer">docs</a>"#
        ));
    }

    #[test]
    fn test_email_autolinks_get_mailto() {
        let html = render_html("write to <someone@example.com>");
        assert!(html.contains(r#"<a href="mailto:someone@example.com" target="_blank""#));
        assert!(html.contains(">someone@example.com</a>"));
    }

    #[test]
    fn test_script_links_are_neutralized() {
        let html = render_html("[click](javascript:alert(1))");
        assert!(html.contains(r##"href="#""##));
        assert!(!html.contains("javascript"));

        let basic = render_basic("[click](JavaScript:alert)");
        assert!(basic.contains(r##"href="#""##));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_html("hi <script>alert('x')</script> there");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));

        let block = render_html("<div onclick=\"x()\">\nboom\n</div>");
        assert!(!block.contains("<div"));
    }

    #[test]
    fn test_fenced_code_gets_language_class() {
        let html = render_html("```rust\nfn main() { let a = 1 < 2; }\n```\n");
        assert!(html.contains(r#"<pre><code class="language-rust">"#));
        assert!(html.contains("1 &lt; 2"));

        let plain = render_html("```\nplain\n```\n");
        assert!(plain.contains(r#"class="language-text""#));
    }

    #[test]
    fn test_soft_breaks_become_line_breaks() {
        let html = render_html("one\ntwo");
        assert!(html.contains("<br />"));
    }

    #[test]
    fn test_basic_renderer_inline_styles() {
        let html = render_basic("**bold** and *it* and `x<y`\nnext [a](http://b)");
        assert_eq!(
            html,
            "<strong>bold</strong> and <em>it</em> and <code>x&lt;y</code><br>next \
             <a href=\"http://b\" target=\"_blank\" rel=\"noopener noreferrer\">a</a>"
        );
    }

    #[test]
    fn test_basic_renderer_leaves_code_blocks_alone() {
        let html = render_basic("before\n```py\nx = a*b*c\n```\nafter");
        assert!(html.contains(r#"<pre><code class="language-py">x = a*b*c</code></pre>"#));
        assert!(html.starts_with("before<br>"));
    }

    #[test]
    fn test_code_blocks_are_listed_in_order() {
        let text = "intro\n\n```sh\nls -la\n```\n\ntext\n\n    indented\n\n```\nlast\n```\n";
        let blocks = code_blocks(text);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].language.as_deref(), Some("sh"));
        assert_eq!(blocks[0].code, "ls -la");
        assert_eq!(blocks[1].language, None);
        assert_eq!(blocks[1].code, "indented");
        assert_eq!(blocks[2].code, "last");
    }

    #[test]
    fn test_unterminated_fence_counts_while_streaming() {
        let blocks = code_blocks("```js\nconsole.log(1)");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "console.log(1)");
    }

    #[test]
    fn test_renderer_rebuilds_code_blocks_every_pass() {
        let renderer = MarkdownRenderer::new(MarkdownEngine::CommonMark);
        let first = renderer.render("no code yet");
        assert!(first.code_blocks.is_empty());
        let second = renderer.render("now\n```\ncode\n```");
        assert_eq!(second.code_blocks.len(), 1);
    }

    #[test]
    fn test_engine_names() {
        assert_eq!("Basic".parse::<MarkdownEngine>(), Ok(MarkdownEngine::Basic));
        assert_eq!("commonmark".parse::<MarkdownEngine>(), Ok(MarkdownEngine::CommonMark));
        let err = "nope".parse::<MarkdownEngine>().unwrap_err();
        assert_eq!(err.to_string(), "unknown markdown engine 'nope' (expected one of: commonmark, basic)");
        assert_eq!(MarkdownEngine::Basic.as_str(), "basic");
    }
}
