//! Translation of gateway proxy events into HTTP requests.
//!
//! The produced request looks like what a server would hand a handler: an
//! origin-form URI (path and query), the event's headers, and the decoded
//! body. The caller's source address travels as a [`RemoteAddr`] extension.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Request;

use crate::error::ProxyResult;
use crate::event::Input;

/// Source IP of the caller, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

/// Build the synthetic request for `input`.
pub fn new_request(input: &Input) -> ProxyResult<Request<Bytes>> {
    let method = if input.http_method.is_empty() {
        "GET"
    } else {
        input.http_method.as_str()
    };
    let uri = request_uri(&input.path, &input.query_string_parameters);
    let body = decode_body(input)?;

    let mut req = Request::builder().method(method).uri(uri).body(body)?;

    let headers = req.headers_mut();
    for (name, value) in &input.headers {
        insert_header(headers, name, value)?;
    }
    insert_header(headers, "x-request-id", &input.request_context.request_id)?;
    insert_header(headers, "x-stage", &input.request_context.stage)?;

    req.extensions_mut().insert(RemoteAddr(
        input.request_context.identity.source_ip.clone(),
    ));

    Ok(req)
}

fn decode_body(input: &Input) -> ProxyResult<Bytes> {
    if input.is_base64_encoded {
        Ok(Bytes::from(STANDARD.decode(&input.body)?))
    } else {
        Ok(Bytes::from(input.body.clone()))
    }
}

fn insert_header(headers: &mut http::HeaderMap, name: &str, value: &str) -> ProxyResult<()> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
    let value = HeaderValue::from_str(value).map_err(http::Error::from)?;
    headers.insert(name, value);
    Ok(())
}

/// Merge the query embedded in `path` with the event's query parameters.
/// Event parameters replace embedded ones with the same key.
fn request_uri(path: &str, params: &HashMap<String, String>) -> String {
    let (raw_path, raw_query) = path.split_once('?').unwrap_or((path, ""));

    let mut query = parse_query(raw_query);
    for (key, value) in params {
        query.insert(key.clone(), vec![value.clone()]);
    }

    let mut uri = String::with_capacity(path.len() + 1);
    if !raw_path.starts_with('/') {
        uri.push('/');
    }
    uri.push_str(&escape_path(raw_path));

    let encoded = encode_query(&query);
    if !encoded.is_empty() {
        uri.push('?');
        uri.push_str(&encoded);
    }
    uri
}

fn parse_query(raw: &str) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.entry(form_decode(key))
            .or_default()
            .push(form_decode(value));
    }
    out
}

/// Form-encode `query`, keys in sorted order.
fn encode_query(query: &BTreeMap<String, Vec<String>>) -> String {
    query
        .iter()
        .flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| format!("{}={}", form_encode(key), form_encode(value)))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Escape each path segment, keeping the `/` separators.
fn escape_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn form_encode(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

/// Decode a form component: `+` is a space, malformed escapes stay literal.
fn form_decode(s: &str) -> String {
    percent_decode(&s.replace('+', " "))
}

/// Decode `%XX` escapes. Malformed escapes are kept literally and invalid
/// UTF-8 is replaced.
pub(crate) fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Identity, RequestContext};
    use crate::ProxyError;

    fn event(method: &str, path: &str) -> Input {
        Input {
            http_method: method.to_string(),
            path: path.to_string(),
            headers: HashMap::from([
                ("Host".to_string(), "apex-ping.com".to_string()),
                ("User-Agent".to_string(), "curl/7.48.0".to_string()),
            ]),
            request_context: RequestContext {
                request_id: "344b184b".to_string(),
                stage: "prod".to_string(),
                identity: Identity {
                    source_ip: "207.102.57.26".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn get_request() {
        let mut input = event("GET", "/pets/tobi");
        input
            .query_string_parameters
            .insert("format".to_string(), "json".to_string());

        let req = new_request(&input).unwrap();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.uri().path(), "/pets/tobi");
        assert_eq!(req.uri().query(), Some("format=json"));
        assert_eq!(req.headers()["host"], "apex-ping.com");
        assert_eq!(req.headers()["x-request-id"], "344b184b");
        assert_eq!(req.headers()["x-stage"], "prod");
        assert_eq!(
            req.extensions().get::<RemoteAddr>(),
            Some(&RemoteAddr("207.102.57.26".to_string()))
        );
        assert!(req.body().is_empty());
    }

    #[test]
    fn post_request_body() {
        let mut input = event("POST", "/pets/tobi");
        input.body = r#"{ "name": "Tobi" }"#.to_string();

        let req = new_request(&input).unwrap();
        assert_eq!(req.method(), "POST");
        assert_eq!(req.uri().query(), None);
        assert_eq!(req.body().as_ref(), br#"{ "name": "Tobi" }"#);
    }

    #[test]
    fn base64_body_is_decoded() {
        let mut input = event("POST", "/pets/tobi");
        input.body = "SGVsbG8gV29ybGQ=".to_string();
        input.is_base64_encoded = true;

        let req = new_request(&input).unwrap();
        assert_eq!(req.body().as_ref(), b"Hello World");
    }

    #[test]
    fn invalid_base64_body() {
        let mut input = event("POST", "/");
        input.body = "!!!not-base64!!!".to_string();
        input.is_base64_encoded = true;

        assert!(matches!(new_request(&input), Err(ProxyError::Base64Body(_))));
    }

    #[test]
    fn invalid_header_name() {
        let mut input = event("GET", "/");
        input
            .headers
            .insert("bad header".to_string(), "x".to_string());

        assert!(matches!(new_request(&input), Err(ProxyError::Request(_))));
    }

    #[test]
    fn empty_method_and_path_default() {
        let req = new_request(&Input::default()).unwrap();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.uri().path(), "/");
    }

    #[test]
    fn event_params_override_embedded_query() {
        let mut input = event("GET", "/search?q=old&page=2");
        input
            .query_string_parameters
            .insert("q".to_string(), "new value".to_string());

        let req = new_request(&input).unwrap();
        assert_eq!(req.uri().query(), Some("page=2&q=new+value"));
    }

    #[test]
    fn path_is_escaped() {
        let req = new_request(&event("GET", "/files/my file.txt")).unwrap();
        assert_eq!(req.uri().path(), "/files/my%20file.txt");
    }

    #[test]
    fn request_id_header_overrides_event_header() {
        let mut input = event("GET", "/");
        input
            .headers
            .insert("X-Request-Id".to_string(), "spoofed".to_string());

        let req = new_request(&input).unwrap();
        assert_eq!(req.headers().get_all("x-request-id").iter().count(), 1);
        assert_eq!(req.headers()["x-request-id"], "344b184b");
    }

    #[test]
    fn decoding_keeps_malformed_escapes() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("a+b"), "a+b");
        assert_eq!(form_decode("a+b%2Bc"), "a b+c");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn reserved_characters_in_params_are_escaped() {
        let mut input = event("GET", "/");
        input
            .query_string_parameters
            .insert("redirect".to_string(), "/a?b=c&d".to_string());

        let req = new_request(&input).unwrap();
        assert_eq!(req.uri().query(), Some("redirect=%2Fa%3Fb%3Dc%26d"));
    }

    #[test]
    fn query_encoding_is_sorted_and_escaped() {
        let query = parse_query("b=2&a=x%26y&a=z");
        assert_eq!(encode_query(&query), "a=x%26y&a=z&b=2");
    }
}
