//! PDF export.
//!
//! `html::render_cv_html` builds the document; a `PdfRenderer` turns it into
//! PDF bytes. Production posts the HTML to a Gotenberg-compatible conversion
//! service. Without one configured, `BasicPdfRenderer` lays the document's
//! text out with printpdf.

use async_trait::async_trait;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use thiserror::Error;
use tracing::{debug, warn};

pub mod handlers;
pub mod html;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("renderer returned status {0}")]
    Renderer(u16),

    #[error("document error: {0}")]
    Document(String),
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Conversion service
// ────────────────────────────────────────────────────────────────────────────

/// Sends the document as the `index.html` form file, the convention of
/// Gotenberg's `/forms/chromium/convert/html` route.
pub struct HttpPdfRenderer {
    client: Client,
    endpoint: String,
}

impl HttpPdfRenderer {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let part = Part::bytes(html.as_bytes().to_vec())
            .file_name("index.html")
            .mime_str("text/html")?;
        let form = Form::new().part("files", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("PDF renderer returned {}", status);
            return Err(PdfError::Renderer(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        debug!(size = bytes.len(), "PDF rendered by conversion service");
        Ok(bytes.to_vec())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process text renderer
// ────────────────────────────────────────────────────────────────────────────

const PAGE_WIDTH: f32 = 210.0; // A4
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const MARGIN_TOP: f32 = 277.0;
const MARGIN_BOTTOM: f32 = 20.0;
const LINE_HEIGHT: f32 = 5.5;
const FONT_SIZE: f32 = 11.0;
const WRAP_CHARS: usize = 90;

/// Plain-text A4 rendering of the HTML's visible text. Styling is ignored.
#[derive(Debug, Default, Clone)]
pub struct BasicPdfRenderer;

#[async_trait]
impl PdfRenderer for BasicPdfRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, PdfError> {
        let lines: Vec<String> = html_to_lines(html)
            .iter()
            .flat_map(|line| wrap_text(line, WRAP_CHARS))
            .collect();

        // PdfDocument is not Send; build it off the async executor.
        tokio::task::spawn_blocking(move || text_pdf(&lines))
            .await
            .map_err(|e| PdfError::Document(e.to_string()))?
    }
}

fn text_pdf(lines: &[String]) -> Result<Vec<u8>, PdfError> {
    let (doc, page, layer) =
        PdfDocument::new("CV", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PdfError::Document(e.to_string()))?;

    let mut current_layer = doc.get_page(page).get_layer(layer);
    let mut y = Mm(MARGIN_TOP);
    for line in lines {
        if y < Mm(MARGIN_BOTTOM) {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            current_layer = doc.get_page(page).get_layer(layer);
            y = Mm(MARGIN_TOP);
        }
        current_layer.use_text(line.as_str(), FONT_SIZE, Mm(MARGIN_LEFT), y, &font);
        y -= Mm(LINE_HEIGHT);
    }

    doc.save_to_bytes()
        .map_err(|e| PdfError::Document(e.to_string()))
}

const BLOCK_TAGS: &[&str] = &["div", "p", "br", "li", "h1", "h2", "h3", "tr"];

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Visible text of an HTML document, one entry per block element. The
/// `<head>` (styles, title) is skipped.
pub fn html_to_lines(html: &str) -> Vec<String> {
    let body = match html.find("<body") {
        Some(start) => &html[start..],
        None => html,
    };

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut rest = body;

    let mut flush = |current: &mut String| {
        let line = decode_entities(current.split_whitespace().collect::<Vec<_>>().join(" ").as_str());
        if !line.is_empty() {
            lines.push(line);
        }
        current.clear();
    };

    while let Some(open) = rest.find('<') {
        current.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[open + 1..open + close];
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if BLOCK_TAGS.contains(&name.as_str()) {
            flush(&mut current);
        } else if name == "span" && !tag.starts_with('/') && !current.is_empty() {
            current.push(' ');
        }
        rest = &rest[open + close + 1..];
    }
    current.push_str(rest);
    flush(&mut current);

    lines
}

/// Greedy word wrap; words longer than `max_chars` get a line of their own.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty()
            && current_line.chars().count() + word.chars().count() + 1 > max_chars
        {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }
    lines
}
