//! URL query parameters
//!
//! Parameters keep insertion order when built explicitly and are sorted by name when
//! built from a map. Encoding percent-escapes reserved characters; `+` is always sent as
//! `%2B` so servers never read it as a space.

use std::collections::BTreeMap;
use std::fmt;

/// Ordered list of query name/value pairs; a `None` value encodes as a bare name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    items: Vec<(String, Option<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs, sorted alphabetically by name
    pub fn sorted<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let map: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.to_string()))
            .collect();

        Self {
            items: map
                .into_iter()
                .map(|(name, value)| (name, Some(value)))
                .collect(),
        }
    }

    /// Parse a query string, splitting on `&` and the first `=` of each item.
    ///
    /// Percent-escapes are decoded; an item that fails to decode is kept verbatim.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let items = query
            .split('&')
            .filter(|item| !item.is_empty())
            .map(|item| match item.split_once('=') {
                Some((name, value)) => (decode(name), Some(decode(value))),
                None => (decode(item), None),
            })
            .collect();

        Self { items }
    }

    /// Append a pair, or replace the value of an existing name
    pub fn put(&mut self, name: impl Into<String>, value: Option<impl ToString>) -> &mut Self {
        let name = name.into();
        let value = value.map(|value| value.to_string());

        match self.items.iter_mut().find(|(existing, _)| *existing == name) {
            Some(item) => item.1 = value,
            None => self.items.push((name, value)),
        }
        self
    }

    /// Builder form of `put` for a present value
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.put(name, Some(value));
        self
    }

    /// Value of the first item with this name; `None` for missing or bare names
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|(existing, _)| existing == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.items
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, value)) in self.items.iter().enumerate() {
            if index > 0 {
                f.write_str("&")?;
            }
            f.write_str(&urlencoding::encode(name))?;
            if let Some(value) = value {
                write!(f, "={}", urlencoding::encode(value))?;
            }
        }
        Ok(())
    }
}

fn decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}
