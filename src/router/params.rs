//! Parameters handed to an action.
//!
//! Entries are either positional (path segments, numeric query keys) or named
//! (named captures, query keys). Merging follows the usual array-merge rules:
//! named keys overwrite in place, positional entries are appended and
//! renumbered.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionParams {
    entries: Vec<(ParamKey, String)>,
    next_index: usize,
}

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional parameters from a `/`-separated string. An empty string
    /// still yields one empty segment.
    pub fn from_path(parameter: &str) -> Self {
        let mut params = Self::new();
        for segment in parameter.split('/') {
            params.push(segment);
        }
        params
    }

    /// Append a positional value.
    pub fn push(&mut self, value: impl Into<String>) {
        self.entries.push((ParamKey::Index(self.next_index), value.into()));
        self.next_index += 1;
    }

    /// Set a named value, overwriting in place when the name exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| matches!(k, ParamKey::Name(n) if *n == name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((ParamKey::Name(name), value)),
        }
    }

    /// Merge `other` over `self`.
    pub fn merge(mut self, other: ActionParams) -> Self {
        for (key, value) in other.entries {
            match key {
                ParamKey::Index(_) => self.push(value),
                ParamKey::Name(name) => self.insert(name, value),
            }
        }
        self
    }

    /// Merge parsed query pairs over `self`. Numeric keys are positional.
    pub fn merge_query(self, query: &IndexMap<String, String>) -> Self {
        let mut other = ActionParams::new();
        for (key, value) in query {
            if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
                other.push(value.clone());
            } else {
                other.insert(key.clone(), value.clone());
            }
        }
        self.merge(other)
    }

    /// Positional value at `index`.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == ParamKey::Index(index))
            .map(|(_, v)| v.as_str())
    }

    /// Named value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, ParamKey::Name(n) if n == name))
            .map(|(_, v)| v.as_str())
    }

    /// All values in order, as an action's argument list.
    pub fn values(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a query string (leading `?` allowed) into ordered pairs. Later
/// duplicates overwrite earlier ones.
pub fn parse_query_string(query: &str) -> IndexMap<String, String> {
    let mut result = IndexMap::new();
    let query = query.trim_start_matches('?');
    if query.is_empty() {
        return result;
    }

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decoded_key = decode(key);
        if decoded_key.is_empty() {
            continue;
        }
        result.insert(decoded_key, decode(value));
    }

    result
}

fn decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|d| d.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_path_explodes() {
        assert_eq!(ActionParams::from_path("a/b/c").values(), vec!["a", "b", "c"]);
        assert_eq!(ActionParams::from_path("").values(), vec![""]);
        assert_eq!(ActionParams::from_path("a//b").values(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_parse_query_string() {
        let q = parse_query_string("?name=John+Doe&city=New%20York&flag&=skip&name=Jane");
        assert_eq!(q.get("name").map(String::as_str), Some("Jane"));
        assert_eq!(q.get("city").map(String::as_str), Some("New York"));
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert_eq!(q.len(), 3);
        assert_eq!(q.keys().next().map(String::as_str), Some("name"));
    }

    #[test]
    fn test_query_wins_on_named_collision() {
        let mut params = ActionParams::new();
        params.insert("id", "7");
        params.insert("slug", "x");
        let merged = params.merge_query(&parse_query_string("id=9&page=2"));
        assert_eq!(merged.get("id"), Some("9"));
        assert_eq!(merged.values(), vec!["9", "x", "2"]);
    }

    #[test]
    fn test_numeric_query_keys_are_appended() {
        let params = ActionParams::from_path("a/b");
        let merged = params.merge_query(&parse_query_string("0=z&sort=asc"));
        assert_eq!(merged.values(), vec!["a", "b", "z", "asc"]);
        assert_eq!(merged.positional(2), Some("z"));
        assert_eq!(merged.get("sort"), Some("asc"));
    }

    #[test]
    fn test_invalid_percent_encoding_is_kept() {
        let q = parse_query_string("bad=%E0%A4%A");
        assert_eq!(q.get("bad").map(String::as_str), Some("%E0%A4%A"));
    }
}
