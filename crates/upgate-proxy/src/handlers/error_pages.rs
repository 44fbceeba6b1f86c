//! HTML error pages for clients that accept HTML.
//!
//! Pages come from `.html` files in a directory: `404.html` matches one
//! code, `5xx.html` a class of codes, and `error.html` anything from 400 up.
//! A built-in page covers whatever the directory leaves out. The most
//! specific page wins.
//!
//! Page files may use `{{.StatusCode}}`, `{{.StatusText}}` and
//! `{{.Variables.<name>}}`; substituted values are HTML-escaped.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use http::{Request, StatusCode};
use tracing::debug;

use crate::dispatch::Handler;
use crate::recorder::Recorder;
use crate::response::ResponseSink;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const DEFAULT_COLOR: &str = "#6061BE";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    File(String),
    Builtin,
}

/// One error page and the codes it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    name: String,
    code: u16,
    range: bool,
    source: Source,
}

impl Page {
    fn builtin() -> Self {
        Self {
            name: "default".to_string(),
            code: 0,
            range: false,
            source: Source::Builtin,
        }
    }

    /// Build a page from a file name such as `404.html`, `5xx.html` or
    /// `error.html`. Other names are not error pages.
    fn from_file(file_name: &str, template: String) -> Option<Self> {
        let name = file_name.strip_suffix(".html")?;
        let (code, range) = match name.as_bytes() {
            b"error" => (0, false),
            [class @ b'1'..=b'9', b'x', b'x'] => (u16::from(class - b'0'), true),
            _ => (name.parse().ok()?, false),
        };
        Some(Self {
            name: name.to_string(),
            code,
            range,
            source: Source::File(template),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, code: u16) -> bool {
        match self.source {
            Source::Builtin => code >= 400,
            Source::File(_) if self.name == "error" => code >= 400,
            Source::File(_) if self.range => self.code == code / 100,
            Source::File(_) => self.code == code,
        }
    }

    fn specificity(&self) -> u8 {
        match self.source {
            Source::Builtin => 4,
            Source::File(_) if self.name == "error" => 3,
            Source::File(_) if self.range => 2,
            Source::File(_) => 1,
        }
    }

    pub fn render(&self, code: u16, variables: &BTreeMap<String, String>) -> String {
        let text = status_text(code);
        match &self.source {
            Source::File(template) => render_template(template, code, text, variables),
            Source::Builtin => default_page(code, text, variables),
        }
    }
}

/// Error pages ordered from most to least specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pages {
    pages: Vec<Page>,
}

impl Pages {
    /// Only the built-in page.
    pub fn builtin() -> Self {
        Self {
            pages: vec![Page::builtin()],
        }
    }

    /// Load the pages in `dir`, then the built-in page.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

        let mut pages = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if Page::from_file(file_name, String::new()).is_none() {
                continue;
            }

            let path = entry.path();
            let template = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            if let Some(page) = Page::from_file(file_name, template) {
                pages.push(page);
            }
        }

        pages.push(Page::builtin());
        pages.sort_by(|a, b| a.specificity().cmp(&b.specificity()).then(a.name.cmp(&b.name)));
        Ok(Self { pages })
    }

    pub fn find(&self, code: u16) -> Option<&Page> {
        self.pages.iter().find(|page| page.matches(code))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Replaces matching responses with an HTML error page when the request
/// accepts HTML. The page replaces the handler's headers and body; the
/// status is kept.
pub struct ErrorPages<H> {
    pages: Pages,
    variables: BTreeMap<String, String>,
    next: H,
}

impl<H: Handler> ErrorPages<H> {
    pub fn new(pages: Pages, variables: BTreeMap<String, String>, next: H) -> Self {
        Self {
            pages,
            variables,
            next,
        }
    }
}

impl<H: Handler> Handler for ErrorPages<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        let accept = req
            .headers()
            .get(http::header::ACCEPT)
            .and_then(|v| v.to_str().ok());
        if !accepts_html(accept) {
            return self.next.serve(req, res);
        }

        let mut rec = Recorder::new();
        self.next.serve(req, &mut rec)?;

        let page = rec
            .committed_status()
            .and_then(|code| self.pages.find(code).map(|page| (code, page)));
        let Some((code, page)) = page else {
            rec.replay(res)?;
            return Ok(());
        };

        debug!(code, page = page.name(), "serving error page");
        let html = page.render(code, &self.variables);
        res.set_header("Vary", "Accept");
        res.set_header("Content-Type", HTML_CONTENT_TYPE);
        res.set_status(code);
        res.write_body(html.as_bytes())?;
        Ok(())
    }
}

/// Whether an `Accept` header admits `text/html`. A missing or empty
/// header admits anything.
pub fn accepts_html(accept: Option<&str>) -> bool {
    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return true;
    };

    accept.split(',').any(|range| {
        let mut parts = range.split(';');
        let media = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let refused = parts.any(|param| {
            param
                .trim()
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        });
        !refused && matches!(media.as_str(), "text/html" | "text/*" | "*/*")
    })
}

fn status_text(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or_default()
}

fn render_template(
    template: &str,
    code: u16,
    text: &str,
    variables: &BTreeMap<String, String>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);

        let action = &rest[start..start + len + 2];
        match action[2..action.len() - 2].trim() {
            ".StatusCode" => out.push_str(&code.to_string()),
            ".StatusText" => out.push_str(&escape_html(text)),
            other => match other.strip_prefix(".Variables.") {
                Some(name) => {
                    let value = variables.get(name).map(String::as_str).unwrap_or_default();
                    out.push_str(&escape_html(value));
                }
                None => out.push_str(action),
            },
        }
        rest = &rest[start + len + 2..];
    }

    out.push_str(rest);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn default_page(code: u16, text: &str, variables: &BTreeMap<String, String>) -> String {
    let var = |name: &str| {
        variables
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|v| escape_html(v))
    };
    let color = var("color").unwrap_or_else(|| DEFAULT_COLOR.to_string());
    let message = match var("support_email") {
        Some(email) => format!(
            r#"Please try your request again or <a href="mailto:{email}">contact support</a>."#
        ),
        None => "Please try your request again or contact support.".to_string(),
    };
    let text = escape_html(text);

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{text} – {code}</title>
    <style>
      html, body {{
        margin: 0;
        width: 100%;
        height: 100%;
        display: flex;
        justify-content: center;
        align-items: center;
      }}

      body {{
        font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
        font-size: 15px;
      }}

      .Error {{
        font-size: 1.35em;
        color: {color};
      }}

      .Error .message {{
        font-weight: 200;
        letter-spacing: 0.095em;
      }}

      .Error .message a {{
        text-decoration: none;
        color: inherit;
        border-bottom: 1px dotted {color};
      }}

      .Error .status {{
        font-weight: 700;
      }}

      .Error .code {{
        display: none;
      }}

      .Error .dot {{
        font-weight: 100;
      }}

      @media screen and (max-width: 800px) {{
        body {{
          font-size: 10px;
        }}

        .Error {{
          display: flex;
          flex-direction: column;
        }}

        .Error .status {{
          font-size: 1.1em;
        }}

        .Error .dot {{
          display: none
        }}
      }}
    </style>
  </head>
  <body>
    <div class="Error">
      <span class="status">{text}</span>
      <span class="code">{code}</span>
      <span class="dot">•</span>
      <span class="message">{message}</span>
    </div>
  </body>
</html>"#
    )
}
