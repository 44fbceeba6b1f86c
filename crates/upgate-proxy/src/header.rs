use std::collections::BTreeMap;

/// Response headers as a handler builds them.
///
/// Keys are canonical names (see [`canonical_name`]), so lookups ignore
/// case. A name may hold several values in the order they were added; the
/// gateway result only carries one, and [`collapse`](Self::collapse) keeps
/// the most recent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    values: BTreeMap<String, Vec<String>>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(canonical_name(name), vec![value.into()]);
    }

    /// Add `value` after any existing values of `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .entry(canonical_name(name))
            .or_default()
            .push(value.into());
    }

    /// Drop `name`. Returns the values it held.
    pub fn remove(&mut self, name: &str) -> Vec<String> {
        self.values.remove(&canonical_name(name)).unwrap_or_default()
    }

    /// The value `name` would commit with: the last one added.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values(name).last().map(String::as_str)
    }

    /// Every value of `name`, oldest first.
    pub fn values(&self, name: &str) -> &[String] {
        self.values
            .get(&canonical_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }

    /// Canonical names present, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// One value per name, as sent to the gateway.
    pub fn collapse(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .filter_map(|(name, values)| Some((name.clone(), values.last()?.clone())))
            .collect()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), value);
        }
        headers
    }
}

/// Canonical MIME form of a header name: the first letter and every letter
/// following a hyphen are upper-cased, the rest lower-cased
/// (`content-type` → `Content-Type`).
///
/// Names containing bytes that are not valid token characters are returned
/// unchanged.
pub fn canonical_name(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
