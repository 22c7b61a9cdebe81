//! HTML rendering of the chat page
//!
//! Templates are compiled into the binary; `.html` templates are
//! auto-escaped, responses are rendered from markdown.

use crate::models::ChatTurn;
use crate::session::Notice;
use crate::Result;
use minijinja::{Environment, Value};
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;

const LAYOUT_TEMPLATE: &str = include_str!("../templates/layout.html");
const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

pub const PAGE_TITLE: &str = "AI Multi-Agent System";

#[derive(Debug, Serialize)]
pub struct AgentOption<'a> {
    pub label: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse<'a> {
    pub agent: &'a str,
    pub response: &'a str,
}

/// Everything the page shows for one session.
#[derive(Debug, Serialize)]
pub struct PageView<'a> {
    pub title: &'a str,
    /// False until the session has a credential; controls are hidden.
    pub authorized: bool,
    pub agents: Vec<AgentOption<'a>>,
    pub selected: Option<&'a str>,
    pub notice: Option<Notice>,
    pub latest: Option<LatestResponse<'a>>,
    pub history: &'a [ChatTurn],
    pub processing: bool,
}

pub struct PageRenderer {
    env: Environment<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("layout.html", LAYOUT_TEMPLATE)?;
        env.add_template("index.html", INDEX_TEMPLATE)?;
        env.add_filter("markdown", markdown_filter);
        Ok(Self { env })
    }

    pub fn render_page(&self, view: &PageView<'_>) -> Result<String> {
        let template = self.env.get_template("index.html")?;
        Ok(template.render(view)?)
    }
}

fn markdown_filter(text: String) -> Value {
    Value::from_safe_string(markdown_to_html(&text))
}

/// Markdown to HTML. Raw HTML in the source is shown as text; links and
/// images pointing anywhere but http(s), mailto or a relative path are
/// reduced to their text.
pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut dropped_link = false;
    let mut dropped_image = false;
    let parser = Parser::new_ext(text, options).filter_map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => {
            Some(Event::Text(CowStr::from(raw.into_string())))
        }
        Event::Start(Tag::Link { ref dest_url, .. }) if !is_allowed_url(dest_url) => {
            dropped_link = true;
            None
        }
        Event::End(TagEnd::Link) if dropped_link => {
            dropped_link = false;
            None
        }
        Event::Start(Tag::Image { ref dest_url, .. }) if !is_allowed_url(dest_url) => {
            dropped_image = true;
            None
        }
        Event::End(TagEnd::Image) if dropped_image => {
            dropped_image = false;
            None
        }
        other => Some(other),
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Relative URLs, or absolute ones with an http, https or mailto scheme.
fn is_allowed_url(url: &str) -> bool {
    let url = url.trim();
    match url.find(&[':', '/', '?', '#'][..]) {
        Some(i) if url[i..].starts_with(':') => {
            let scheme = url[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoticeLevel;

    fn view<'a>(history: &'a [ChatTurn]) -> PageView<'a> {
        PageView {
            title: PAGE_TITLE,
            authorized: true,
            agents: vec![
                AgentOption { label: "🌍 Web Search Agent", name: "Web Agent" },
                AgentOption { label: "📈 Finance Agent", name: "Finance Agent" },
            ],
            selected: Some("📈 Finance Agent"),
            notice: None,
            latest: None,
            history,
            processing: false,
        }
    }

    #[test]
    fn test_markdown_tables_render() {
        let html = markdown_to_html("| Ticker | Price |\n|---|---|\n| AAPL | 189.84 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>AAPL</td>"));
    }

    #[test]
    fn test_markdown_raw_html_is_escaped() {
        let html = markdown_to_html("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_script_urls_are_not_linked() {
        let html = markdown_to_html("[click me](javascript:alert(document.domain))");
        assert!(!html.contains("javascript:"));
        assert!(!html.contains("<a "));
        assert!(html.contains("click me"));

        let html = markdown_to_html("[x](JaVaScRiPt:alert(1)) and <javascript:alert(2)>");
        assert!(!html.to_ascii_lowercase().contains("href=\"javascript"));

        let html = markdown_to_html("![chart](data:image/svg+xml;base64,PHN2Zz4=)");
        assert!(!html.contains("<img"));
        assert!(html.contains("chart"));
    }

    #[test]
    fn test_web_links_are_kept() {
        let html = markdown_to_html(
            "[docs](https://example.com/a?b=1) [mail](mailto:ir@example.com) [rel](/export)",
        );
        assert!(html.contains(r#"<a href="https://example.com/a?b=1">docs</a>"#));
        assert!(html.contains(r#"<a href="mailto:ir@example.com">mail</a>"#));
        assert!(html.contains(r#"<a href="/export">rel</a>"#));

        let html = markdown_to_html("![logo](https://example.com/logo.png)");
        assert!(html.contains(r#"<img src="https://example.com/logo.png" alt="logo""#));
    }

    #[test]
    fn test_page_lists_agents_and_history() {
        let renderer = PageRenderer::new().unwrap();
        let history = vec![ChatTurn::new("AAPL stock price", "**189.84**")];
        let mut page = view(&history);
        page.latest = Some(LatestResponse {
            agent: "Finance Agent",
            response: "**189.84**",
        });

        let html = renderer.render_page(&page).unwrap();

        assert!(html.contains("🌍 Web Search Agent"));
        assert!(html.contains(r#"<option value="📈 Finance Agent" data-name="Finance Agent" selected>"#));
        assert!(html.contains("📢 AI Response from Finance Agent:"));
        assert!(html.contains("<strong>189.84</strong>"));
        assert!(html.contains("📝 Chat History"));
        assert!(html.contains("AAPL stock price"));
    }

    #[test]
    fn test_queries_are_escaped() {
        let renderer = PageRenderer::new().unwrap();
        let history = vec![ChatTurn::new("<img src=x onerror=alert(1)>", "ok")];
        let html = renderer.render_page(&view(&history)).unwrap();

        assert!(!html.contains("<img src=x"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
    }

    #[test]
    fn test_unauthorized_page_hides_controls() {
        let renderer = PageRenderer::new().unwrap();
        let mut page = view(&[]);
        page.authorized = false;
        page.notice = Some(Notice {
            level: NoticeLevel::Warning,
            message: "Please enter your OpenAI API key to proceed.".to_string(),
        });

        let html = renderer.render_page(&page).unwrap();

        assert!(html.contains("Please enter your OpenAI API key to proceed."));
        assert!(html.contains(r#"type="password""#));
        assert!(!html.contains("Run Agent"));
        assert!(!html.contains("Chat History"));
    }
}
