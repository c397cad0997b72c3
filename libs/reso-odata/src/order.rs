use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// One `$orderby` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderClause {
    /// `Field asc` / `Field desc`
    Field(String, SortDir),
    /// Passed through verbatim, e.g. `"ListPrice desc"`.
    Raw(String),
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderClause::Field(field, dir) => write!(f, "{field} {}", dir.as_str()),
            OrderClause::Raw(text) => f.write_str(text),
        }
    }
}

impl From<&str> for OrderClause {
    fn from(s: &str) -> Self {
        OrderClause::Raw(s.to_owned())
    }
}

impl From<String> for OrderClause {
    fn from(s: String) -> Self {
        OrderClause::Raw(s)
    }
}

impl<S: Into<String>> From<(S, SortDir)> for OrderClause {
    fn from((field, dir): (S, SortDir)) -> Self {
        OrderClause::Field(field.into(), dir)
    }
}

/// Join clauses into a `$orderby` value.
#[must_use]
pub fn render_order(clauses: &[OrderClause]) -> String {
    clauses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
