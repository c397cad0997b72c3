use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ConditionError;

/// A bare comparison token with its surrounding whitespace, e.g. `" >= "`.
///
/// Two-character tokens come first in the alternation so `>=` is never split
/// into `>` and `=`.
pub static OPERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\s*(>=|<=|!=|>|<|=)\s*").unwrap()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ComparisonOperator {
    /// The `OData` keyword for this operator.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "eq",
            ComparisonOperator::Ne => "ne",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Ge => "ge",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Le => "le",
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(ComparisonOperator::Gt),
            ">=" => Ok(ComparisonOperator::Ge),
            "<" => Ok(ComparisonOperator::Lt),
            "<=" => Ok(ComparisonOperator::Le),
            "=" => Ok(ComparisonOperator::Eq),
            "!=" => Ok(ComparisonOperator::Ne),
            other => Err(ConditionError::UnknownOperator(other.to_owned())),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Map a comparison token (`>`, `>=`, `<`, `<=`, `=`, `!=`) to its `OData` keyword.
///
/// # Errors
///
/// Returns [`ConditionError::UnknownOperator`] for any other token.
pub fn translate_operator(op: &str) -> Result<&'static str, ConditionError> {
    op.parse::<ComparisonOperator>().map(ComparisonOperator::keyword)
}

/// Rewrite every bare comparison token in `text` to `" <keyword> "`.
pub(crate) fn rewrite_operators(text: &str) -> String {
    OPERATOR_PATTERN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            // The pattern only matches known tokens.
            let keyword = translate_operator(&caps[1]).unwrap_or("eq");
            format!(" {keyword} ")
        })
        .into_owned()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn translates_all_six_tokens() {
        for (token, keyword) in [
            (">", "gt"),
            (">=", "ge"),
            ("<", "lt"),
            ("<=", "le"),
            ("=", "eq"),
            ("!=", "ne"),
        ] {
            assert_eq!(translate_operator(token).unwrap(), keyword, "token {token}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(translate_operator("  >= ").unwrap(), "ge");
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        for token in ["??", "==", "<>", "eq", ""] {
            assert!(
                matches!(
                    translate_operator(token),
                    Err(ConditionError::UnknownOperator(_))
                ),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn rewrite_normalizes_spacing() {
        assert_eq!(rewrite_operators("Price>=?"), "Price ge ?");
        assert_eq!(rewrite_operators("Price   <   ?"), "Price lt ?");
        assert_eq!(
            rewrite_operators("A != ? and B = ?"),
            "A ne ? and B eq ?"
        );
    }
}
