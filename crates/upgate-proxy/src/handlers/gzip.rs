use std::io::Write;

use anyhow::Context;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::Request;
use tracing::trace;

use crate::dispatch::Handler;
use crate::header::HeaderMap;
use crate::recorder::Recorder;
use crate::response::ResponseSink;

/// Bodies shorter than this are sent as they are.
pub const DEFAULT_MIN_SIZE: usize = 1400;

/// Gzip-compresses response bodies for clients that accept it.
///
/// Every response gets `Vary: Accept-Encoding`. A body is compressed when
/// the request accepts gzip, the body is at least the minimum size, and the
/// handler did not set a `Content-Encoding` of its own.
pub struct Gzip<H> {
    min_size: usize,
    next: H,
}

impl<H: Handler> Gzip<H> {
    pub fn new(next: H) -> Self {
        Self::with_min_size(DEFAULT_MIN_SIZE, next)
    }

    pub fn with_min_size(min_size: usize, next: H) -> Self {
        Self { min_size, next }
    }
}

impl<H: Handler> Handler for Gzip<H> {
    fn serve(&self, req: &Request<Bytes>, res: &mut dyn ResponseSink) -> anyhow::Result<()> {
        let mut rec = Recorder::new();
        self.next.serve(req, &mut rec)?;
        add_vary(rec.headers_mut());

        let accept = req
            .headers()
            .get(http::header::ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok());
        let eligible = accepts_gzip(accept)
            && rec.body().len() >= self.min_size
            && !rec.headers().contains("Content-Encoding");

        if eligible {
            let plain = rec.body().len();
            let compressed = compress(rec.body())?;
            trace!(plain, compressed = compressed.len(), "gzip response body");

            let headers = rec.headers_mut();
            headers.set("Content-Encoding", "gzip");
            if headers.contains("Content-Length") {
                headers.set("Content-Length", compressed.len().to_string());
            }
            rec.set_body(compressed);
        }

        rec.replay(res)?;
        Ok(())
    }
}

/// Gateway results carry one value per header, so `Accept-Encoding` joins
/// any `Vary` list the handler set.
fn add_vary(headers: &mut HeaderMap) {
    let vary = match headers.get("Vary") {
        Some(existing) if !existing.is_empty() => format!("{existing}, Accept-Encoding"),
        _ => "Accept-Encoding".to_string(),
    };
    headers.set("Vary", vary);
}

fn compress(body: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).context("compressing response body")?;
    encoder.finish().context("compressing response body")
}

/// Whether an `Accept-Encoding` header admits gzip.
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding.unwrap_or_default().split(',').any(|coding| {
        let mut parts = coding.split(';');
        let name = parts.next().unwrap_or_default().trim();
        let refused = parts.any(|param| {
            param
                .trim()
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        });
        !refused && (name.eq_ignore_ascii_case("gzip") || name == "*")
    })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;
    use crate::dispatch::handler_fn;

    fn body() -> String {
        "так".repeat(5000)
    }

    fn server() -> impl Handler {
        handler_fn(|req, res| {
            res.set_header("Content-Type", "text/plain; charset=utf-8");
            if req.uri().path() == "/small" {
                res.write_body(b"Hello World")?;
            } else {
                res.write_body(body().as_bytes())?;
            }
            Ok(())
        })
    }

    fn get(handler: &impl Handler, path: &str, accept_encoding: Option<&str>) -> Recorder {
        let mut req = Request::get(path);
        if let Some(value) = accept_encoding {
            req = req.header("Accept-Encoding", value);
        }
        let req = req.body(Bytes::new()).unwrap();
        let mut rec = Recorder::new();
        handler.serve(&req, &mut rec).unwrap();
        rec
    }

    fn gunzip(bytes: &[u8]) -> String {
        let mut out = String::new();
        GzDecoder::new(bytes).read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn compresses_when_accepted() {
        let rec = get(&Gzip::new(server()), "/", Some("gzip"));

        assert_eq!(rec.status(), 200);
        assert_eq!(rec.header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(rec.header("Content-Encoding"), Some("gzip"));
        assert_eq!(rec.header("Vary"), Some("Accept-Encoding"));
        assert!(rec.body().len() < body().len());
        assert_eq!(gunzip(rec.body()), body());
    }

    #[test]
    fn identity_is_left_alone() {
        for accept in [None, Some("identity"), Some("gzip;q=0, identity")] {
            let rec = get(&Gzip::new(server()), "/", accept);

            assert_eq!(rec.header("Content-Encoding"), None);
            assert_eq!(rec.header("Vary"), Some("Accept-Encoding"));
            assert_eq!(rec.body(), body().as_bytes());
        }
    }

    #[test]
    fn small_bodies_are_not_compressed() {
        let rec = get(&Gzip::new(server()), "/small", Some("gzip, deflate"));

        assert_eq!(rec.header("Content-Encoding"), None);
        assert_eq!(rec.header("Vary"), Some("Accept-Encoding"));
        assert_eq!(rec.body(), b"Hello World");
    }

    #[test]
    fn existing_encoding_is_kept() {
        let handler = Gzip::with_min_size(
            0,
            handler_fn(|_, res| {
                res.set_header("Content-Encoding", "br");
                res.write_body(b"already encoded")?;
                Ok(())
            }),
        );
        let rec = get(&handler, "/", Some("gzip, br"));

        assert_eq!(rec.header("Content-Encoding"), Some("br"));
        assert_eq!(rec.body(), b"already encoded");
    }

    #[test]
    fn content_length_follows_compressed_body() {
        let handler = Gzip::with_min_size(
            0,
            handler_fn(|_, res| {
                res.set_header("Content-Length", "11");
                res.write_body(b"Hello World")?;
                Ok(())
            }),
        );
        let rec = get(&handler, "/", Some("gzip"));

        let expected = rec.body().len().to_string();
        assert_eq!(rec.header("Content-Length"), Some(expected.as_str()));
        assert_eq!(gunzip(rec.body()), "Hello World");
    }

    #[test]
    fn status_is_preserved() {
        let handler = Gzip::with_min_size(
            0,
            handler_fn(|_, res| {
                res.set_status(404);
                res.write_body(b"missing")?;
                Ok(())
            }),
        );
        let rec = get(&handler, "/", Some("*"));

        assert_eq!(rec.status(), 404);
        assert_eq!(gunzip(rec.body()), "missing");
    }

    #[test]
    fn vary_joins_existing_list() {
        let handler = Gzip::new(handler_fn(|_, res| {
            res.set_header("Vary", "Accept");
            res.set_status(404);
            Ok(())
        }));
        let rec = get(&handler, "/", None);
        assert_eq!(rec.header("Vary"), Some("Accept, Accept-Encoding"));
    }

    #[test]
    fn accept_encoding_parsing() {
        assert!(accepts_gzip(Some("gzip")));
        assert!(accepts_gzip(Some("deflate, GZIP;q=0.5")));
        assert!(accepts_gzip(Some("*")));
        assert!(!accepts_gzip(None));
        assert!(!accepts_gzip(Some("br")));
        assert!(!accepts_gzip(Some("gzip;q=0")));
    }
}
