//! Path-matched response header rules.
//!
//! A rule pattern is a request path where `*` matches any run of characters,
//! slashes included. Only the most specific matching rule applies: an exact
//! path beats any wildcard, and among wildcards the one with more literal
//! characters wins.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use http::Request;
use tracing::debug;

use crate::dispatch::Handler;
use crate::response::ResponseSink;

/// Header name to value.
pub type Fields = BTreeMap<String, String>;

/// Name of the optional rules file, in the Netlify `_headers` layout.
pub const HEADERS_FILE: &str = "_headers";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRules {
    rules: BTreeMap<String, Fields>,
}

impl HeaderRules {
    pub fn new(rules: BTreeMap<String, Fields>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Read a `_headers` file. A missing file yields no rules.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse the `_headers` layout: an unindented path line followed by
    /// indented `Name: value` lines. `#` starts a comment line.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut rules = BTreeMap::new();
        let mut current: Option<String> = None;

        for (n, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                rules.entry(trimmed.to_string()).or_insert_with(Fields::new);
                current = Some(trimmed.to_string());
                continue;
            }

            let path = current
                .as_ref()
                .with_context(|| format!("line {}: header before any path", n + 1))?;
            let (name, value) = trimmed
                .split_once(':')
                .with_context(|| format!("line {}: expected `Name: value`", n + 1))?;
            if let Some(fields) = rules.get_mut(path) {
                fields
                    .entry(name.trim().to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }

        Ok(Self { rules })
    }

    /// Combine two rule sets. Fields in `other` replace fields in `self`
    /// for the same pattern and name.
    pub fn merge(mut self, other: Self) -> Self {
        for (pattern, fields) in other.rules {
            self.rules.entry(pattern).or_default().extend(fields);
        }
        self
    }

    /// Fields of the most specific rule matching `path`.
    pub fn lookup(&self, path: &str) -> Option<&Fields> {
        if let Some(fields) = self.rules.get(path) {
            if !path.contains('*') {
                return Some(fields);
            }
        }

        self.rules
            .iter()
            .filter(|(pattern, _)| pattern.contains('*') && glob_match(pattern, path))
            .max_by_key(|(pattern, _)| pattern.len() - pattern.matches('*').count())
            .map(|(_, fields)| fields)
    }
}

fn glob_match(pattern: &str, path: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let mut parts: Vec<&str> = parts.collect();
    let last = parts.pop().unwrap_or_default();
    for part in parts {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Applies [`HeaderRules`] to the response before delegating, so the
/// handler can still override a rule's value.
pub struct Headers<H> {
    rules: HeaderRules,
    next: H,
}

impl<H: Handler> Headers<H> {
    pub fn new(rules: HeaderRules, next: H) -> Self {
        debug!(rules = rules.len(), "header rules loaded");
        Self { rules, next }
    }
}

impl<H: Handler> Handler for Headers<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        if let Some(fields) = self.rules.lookup(req.uri().path()) {
            for (name, value) in fields {
                res.set_header(name, value);
            }
        }
        self.next.serve(req, res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler_fn;
    use crate::recorder::Recorder;

    fn rules(entries: &[(&str, &str)]) -> HeaderRules {
        HeaderRules::new(
            entries
                .iter()
                .map(|(pattern, kind)| {
                    let fields = Fields::from([("X-Type".to_string(), kind.to_string())]);
                    (pattern.to_string(), fields)
                })
                .collect(),
        )
    }

    fn kind<'a>(rules: &'a HeaderRules, path: &str) -> Option<&'a str> {
        rules
            .lookup(path)
            .and_then(|fields| fields.get("X-Type"))
            .map(String::as_str)
    }

    #[test]
    fn most_specific_rule_wins() {
        let rules = rules(&[
            ("*", "html"),
            ("*.css", "css"),
            ("/docs/alerts", "docs alerts"),
            ("/docs/*", "docs"),
        ]);

        assert_eq!(kind(&rules, "/something"), Some("html"));
        assert_eq!(kind(&rules, "/docs"), Some("html"));
        assert_eq!(kind(&rules, "/docs/"), Some("docs"));
        assert_eq!(kind(&rules, "/style.css"), Some("css"));
        assert_eq!(kind(&rules, "/public/css/style.css"), Some("css"));
        assert_eq!(kind(&rules, "/docs/checks"), Some("docs"));
        assert_eq!(kind(&rules, "/docs/alerts"), Some("docs alerts"));
    }

    #[test]
    fn unmatched_path_has_no_fields() {
        let rules = rules(&[("/*.css", "css"), ("/about", "about")]);
        assert_eq!(kind(&rules, "/"), None);
        assert_eq!(kind(&rules, "/about/team"), None);
        assert_eq!(kind(&rules, "/a.js"), None);
    }

    #[test]
    fn inner_wildcards_match_in_order() {
        let rules = rules(&[("/assets/*/img/*.png", "png")]);
        assert_eq!(kind(&rules, "/assets/v2/img/logo.png"), Some("png"));
        assert_eq!(kind(&rules, "/assets/img/v2/logo.png"), None);
    }

    #[test]
    fn parses_headers_file() {
        let rules = HeaderRules::parse(concat!(
            "# cache assets\n",
            "/*.css\n",
            "  Cache-Control: public, max-age=999999\n",
            "  X-Type: css\n",
            "\n",
            "/\n",
            "  X-Frame-Options: DENY\n",
        ))
        .unwrap();

        assert_eq!(rules.len(), 2);
        let css = rules.lookup("/style.css").unwrap();
        assert_eq!(css["Cache-Control"], "public, max-age=999999");
        assert_eq!(css["X-Type"], "css");
        assert_eq!(rules.lookup("/").unwrap()["X-Frame-Options"], "DENY");
    }

    #[test]
    fn field_without_path_is_rejected() {
        assert!(HeaderRules::parse("  X-Type: css\n").is_err());
        assert!(HeaderRules::parse("/\n  no separator\n").is_err());
    }

    #[test]
    fn missing_file_has_no_rules() {
        let dir = tempfile::tempdir().unwrap();
        let rules = HeaderRules::from_file(&dir.path().join(HEADERS_FILE)).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn merge_prefers_other() {
        let file = HeaderRules::parse("/*.css\n  X-Type: file\n  X-File: yes\n").unwrap();
        let merged = file.merge(rules(&[("/*.css", "config")]));

        let fields = merged.lookup("/a.css").unwrap();
        assert_eq!(fields["X-Type"], "config");
        assert_eq!(fields["X-File"], "yes");
    }

    #[test]
    fn matched_rule_is_applied() {
        let rules = HeaderRules::new(BTreeMap::from([(
            "/*.css".to_string(),
            Fields::from([(
                "Cache-Control".to_string(),
                "public, max-age=999999".to_string(),
            )]),
        )]));
        let handler = Headers::new(
            rules,
            handler_fn(|_, res| {
                res.set_header("Content-Type", "text/css; charset=utf-8");
                res.write_body(b"body { color: red }\n")?;
                Ok(())
            }),
        );

        let mut rec = Recorder::new();
        let req = Request::get("/style.css").body(Bytes::new()).unwrap();
        handler.serve(&req, &mut rec).unwrap();
        assert_eq!(rec.header("Cache-Control"), Some("public, max-age=999999"));
        assert_eq!(rec.body(), b"body { color: red }\n");

        let mut rec = Recorder::new();
        let req = Request::get("/").body(Bytes::new()).unwrap();
        handler.serve(&req, &mut rec).unwrap();
        assert_eq!(rec.header("Cache-Control"), None);
    }
}
