use std::borrow::Cow;

/// Local-only option: render the URL instead of sending the request.
pub const DEBUG_PARAM: &str = "$debug";

/// Ordered `OData` query parameters (`$filter`, `$select`, ...).
///
/// Setting a key twice replaces the earlier value in place. `$debug` is kept
/// apart: it never reaches the query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ODataParams {
    pairs: Vec<(String, String)>,
    debug: bool,
}

impl ODataParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == DEBUG_PARAM {
            self.debug = true;
            return self;
        }
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    /// Set `key` when `value` is present.
    pub fn set_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `key=value&...`, percent-encoded. Spaces become `%20` and the `$` of
    /// system query options is kept literal.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", encode_key(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn encode_key(key: &str) -> Cow<'_, str> {
    match key.strip_prefix('$') {
        Some(rest) => Cow::Owned(format!("${}", urlencoding::encode(rest))),
        None => urlencoding::encode(key),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_replaces_in_place() {
        let params = ODataParams::new()
            .set("$filter", "City eq 'Seattle'")
            .set("$top", "10")
            .set("$filter", "City eq 'Tacoma'");
        let pairs: Vec<_> = params.pairs().collect();
        assert_eq!(pairs, vec![("$filter", "City eq 'Tacoma'"), ("$top", "10")]);
    }

    #[test]
    fn query_string_encoding() {
        let params = ODataParams::new()
            .set("$filter", "City eq 'Seattle' and ListPrice ge 500000")
            .set("$select", "ListingKey,City");
        assert_eq!(
            params.to_query_string(),
            "$filter=City%20eq%20%27Seattle%27%20and%20ListPrice%20ge%20500000\
             &$select=ListingKey%2CCity"
        );
    }

    #[test]
    fn debug_is_never_encoded() {
        let params = ODataParams::new().set("$top", "1").set(DEBUG_PARAM, "true");
        assert!(params.is_debug());
        assert_eq!(params.to_query_string(), "$top=1");
    }

    #[test]
    fn set_opt_skips_none() {
        let params = ODataParams::new()
            .set_opt("$skip", None::<String>)
            .set_opt("$top", Some("5"));
        assert_eq!(params.get("$skip"), None);
        assert_eq!(params.get("$top"), Some("5"));
        assert!(!params.is_empty());
    }
}
