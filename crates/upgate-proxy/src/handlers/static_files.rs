use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use http::{Method, Request};
use tracing::debug;

use crate::dispatch::Handler;
use crate::request::percent_decode;
use crate::response::ResponseSink;

/// Serves files below a root directory.
///
/// `/` and directory paths map to `index.html`. Paths that try to climb out
/// of the root are answered with 404, like missing files.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the filesystem, or `None` if it escapes the root.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let decoded = percent_decode(path);
        let mut file = self.root.clone();

        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.contains('\\') || s.contains('\0') => return None,
                s => file.push(s),
            }
        }

        if decoded.ends_with('/') || file.is_dir() {
            file.push("index.html");
        }
        Some(file)
    }
}

impl Handler for StaticFiles {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            res.set_header("Allow", "GET, HEAD");
            res.set_status(405);
            res.write_body(b"Method Not Allowed\n")?;
            return Ok(());
        }

        let Some(file) = self.resolve(req.uri().path()) else {
            debug!(path = req.uri().path(), "rejected path outside static root");
            return not_found(res);
        };

        let contents = match std::fs::read(&file) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return not_found(res),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", file.display()));
            }
        };

        res.set_header("Content-Type", content_type_for(&file));
        res.set_header("Content-Length", &contents.len().to_string());
        res.set_status(200);
        if req.method() == Method::GET {
            res.write_body(&contents)?;
        }
        Ok(())
    }
}

fn not_found(res: &mut dyn ResponseSink) -> anyhow::Result<()> {
    res.set_status(404);
    res.write_body(b"Not Found\n")?;
    Ok(())
}

/// `Content-Type` for a file, chosen by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
