//! Call metadata.
//!
//! Names compare case-insensitively; values are stored and compared verbatim.

/// Ordered, multi-value call metadata attached to requests and responses.
///
/// # Examples
///
/// ```
/// use readthrough::rpc::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Cache-Control", "max-age=0");
/// headers.insert("cache-control", "no-cache");
///
/// assert_eq!(headers.get("CACHE-CONTROL"), Some("max-age=0"));
/// assert!(headers.get_all("Cache-Control").any(|v| v == "no-cache"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for `name`, keeping any values already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Makes `value` the only value for `name`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// First value recorded for `name`.
    pub fn get<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.get_all(name).next()
    }

    /// Every value recorded for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of values, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
