use std::collections::HashMap;

/// A request target split into its path, query and fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub pathname: String,
    pub query: HashMap<String, String>,
    pub fragment: Option<String>,
}

impl Target {
    /// Splits `raw` at the first `#`, then at the first `?`.
    ///
    /// The query is decoded with form-urlencoded rules and repeated keys keep
    /// their last value. An empty path becomes `/`.
    pub fn parse(raw: &str) -> Self {
        let (without_fragment, fragment) = match raw.split_once('#') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (raw, None),
        };

        let (path, search) = without_fragment
            .split_once('?')
            .unwrap_or((without_fragment, ""));

        let query = url::form_urlencoded::parse(search.as_bytes())
            .into_owned()
            .collect();

        let pathname = if path.is_empty() { "/" } else { path };

        Self {
            pathname: pathname.to_string(),
            query,
            fragment: fragment.filter(|f| !f.is_empty()),
        }
    }
}
