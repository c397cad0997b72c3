//! Placeholder templates: `"ListPrice >= ? and City = ?"` or
//! `"ListPrice >= :min"`.
//!
//! Rendering rewrites bare comparison tokens to `OData` keywords and then
//! substitutes placeholders with formatted literals. Both steps skip text
//! inside single-quoted literals, so `'a = b?'` survives untouched.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ConditionError;
use crate::operator::rewrite_operators;
use crate::value::{ODataValue, format_value};

static NAMED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// A filter template plus its bound values.
#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub struct Template {
    text: String,
    positional: Vec<ODataValue>,
    named: Vec<(String, ODataValue)>,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            positional: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Bind the next `?` placeholder.
    pub fn bind(mut self, value: impl Into<ODataValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Bind a `:name` placeholder.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<ODataValue>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the template into a single filter fragment.
    ///
    /// # Errors
    ///
    /// - [`ConditionError::PlaceholderMismatch`] when the number of `?`
    ///   placeholders differs from the number of positional values.
    /// - [`ConditionError::MissingBinding`] for a `:name` with no binding.
    /// - [`ConditionError::UnsupportedShape`] when positional and named
    ///   bindings are mixed.
    pub fn render(&self) -> Result<String, ConditionError> {
        if !self.positional.is_empty() && !self.named.is_empty() {
            return Err(ConditionError::UnsupportedShape(
                "template mixes positional and named bindings".to_owned(),
            ));
        }

        let segments = split_quoted(&self.text);

        if self.named.is_empty() {
            let placeholders: usize = segments
                .iter()
                .filter(|s| !s.quoted)
                .map(|s| s.text.matches('?').count())
                .sum();
            if placeholders != self.positional.len() {
                return Err(ConditionError::PlaceholderMismatch {
                    placeholders,
                    values: self.positional.len(),
                });
            }
        }

        let mut values = self.positional.iter();
        let mut out = String::with_capacity(self.text.len());
        for segment in segments {
            if segment.quoted {
                out.push_str(segment.text);
                continue;
            }
            let rewritten = rewrite_operators(segment.text);
            if self.positional.is_empty() {
                out.push_str(&self.substitute_named(&rewritten)?);
            } else {
                for ch in rewritten.chars() {
                    if ch == '?' {
                        // Count checked above.
                        if let Some(v) = values.next() {
                            out.push_str(&format_value(v));
                        }
                    } else {
                        out.push(ch);
                    }
                }
            }
        }
        Ok(out)
    }

    fn substitute_named(&self, text: &str) -> Result<String, ConditionError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in NAMED_PLACEHOLDER.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = self
                .named
                .iter()
                .find(|(n, _)| n == name.as_str())
                .map(|(_, v)| v)
                .ok_or_else(|| ConditionError::MissingBinding(name.as_str().to_owned()))?;
            out.push_str(&text[last..whole.start()]);
            out.push_str(&format_value(value));
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Template::new(text)
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Template::new(text)
    }
}

struct Segment<'a> {
    quoted: bool,
    text: &'a str,
}

/// Split into alternating unquoted / single-quoted runs. Quoted runs keep
/// their quotes; a doubled `''` escape splits into two adjacent quoted runs,
/// which is harmless because they are emitted unchanged.
fn split_quoted(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quote = false;
    for (i, c) in text.char_indices() {
        if c != '\'' {
            continue;
        }
        if in_quote {
            out.push(Segment {
                quoted: true,
                text: &text[start..=i],
            });
            start = i + 1;
            in_quote = false;
        } else {
            if start < i {
                out.push(Segment {
                    quoted: false,
                    text: &text[start..i],
                });
            }
            start = i;
            in_quote = true;
        }
    }
    if start < text.len() {
        out.push(Segment {
            quoted: in_quote,
            text: &text[start..],
        });
    }
    out
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn positional_string_value() {
        let t = Template::new("CloseDate > ?").bind("2026-02-04");
        assert_eq!(t.render().unwrap(), "CloseDate gt '2026-02-04'");
    }

    #[test]
    fn positional_integer_value() {
        let t = Template::new("ListPrice >= ?").bind(500_000);
        assert_eq!(t.render().unwrap(), "ListPrice ge 500000");
    }

    #[test]
    fn multiple_positional_values_in_order() {
        let t = Template::new("ListPrice >= ? and ListPrice <= ?")
            .bind(300_000)
            .bind(500_000);
        assert_eq!(
            t.render().unwrap(),
            "ListPrice ge 300000 and ListPrice le 500000"
        );
    }

    #[test]
    fn datetime_value() {
        let time = Utc.with_ymd_and_hms(2026, 2, 4, 12, 0, 0).unwrap();
        let t = Template::new("ModificationTimestamp > ?").bind(time);
        assert_eq!(
            t.render().unwrap(),
            "ModificationTimestamp gt 2026-02-04T12:00:00Z"
        );
    }

    #[test]
    fn named_values() {
        let t = Template::new("ListPrice >= :min and ListPrice <= :max")
            .bind_named("min", 300_000)
            .bind_named("max", 500_000);
        assert_eq!(
            t.render().unwrap(),
            "ListPrice ge 300000 and ListPrice le 500000"
        );
    }

    #[test]
    fn named_prefix_names_do_not_collide() {
        let t = Template::new("A = :min and B = :minimum")
            .bind_named("minimum", 2)
            .bind_named("min", 1);
        assert_eq!(t.render().unwrap(), "A eq 1 and B eq 2");
    }

    #[test]
    fn values_containing_operators_are_not_rewritten() {
        let t = Template::new("Remarks = ?").bind("a >= b ?");
        assert_eq!(t.render().unwrap(), "Remarks eq 'a >= b ?'");
    }

    #[test]
    fn quoted_literals_in_template_are_untouched() {
        let t = Template::new("City = 'Who?' and Price > ?").bind(5);
        assert_eq!(t.render().unwrap(), "City eq 'Who?' and Price gt 5");
    }

    #[test]
    fn doubled_quotes_in_template_literal() {
        let t = Template::new("Name = 'O''Brien = x'");
        assert_eq!(t.render().unwrap(), "Name eq 'O''Brien = x'");
    }

    #[test]
    fn raw_fragment_without_placeholders() {
        let t = Template::new("City eq 'Seattle'");
        assert_eq!(t.render().unwrap(), "City eq 'Seattle'");
    }

    #[test]
    fn too_few_values_is_an_error() {
        let t = Template::new("A > ? and B < ?").bind(1);
        assert_eq!(
            t.render().unwrap_err(),
            ConditionError::PlaceholderMismatch {
                placeholders: 2,
                values: 1
            }
        );
    }

    #[test]
    fn too_many_values_is_an_error() {
        let t = Template::new("A > ?").bind(1).bind(2);
        assert!(matches!(
            t.render(),
            Err(ConditionError::PlaceholderMismatch { .. })
        ));
    }

    #[test]
    fn missing_named_binding_is_an_error() {
        let t = Template::new("A > :lo").bind_named("hi", 1);
        assert_eq!(
            t.render().unwrap_err(),
            ConditionError::MissingBinding("lo".into())
        );
    }

    #[test]
    fn unbound_named_placeholder_is_an_error() {
        assert_eq!(
            Template::new("Name eq :name").render().unwrap_err(),
            ConditionError::MissingBinding("name".into())
        );
    }

    #[test]
    fn colons_inside_quotes_and_timestamps_are_not_placeholders() {
        let t = Template::new("Remarks eq 'a :b' and T gt 2026-02-04T12:00:00Z");
        assert_eq!(
            t.render().unwrap(),
            "Remarks eq 'a :b' and T gt 2026-02-04T12:00:00Z"
        );
    }

    #[test]
    fn mixed_bindings_are_rejected() {
        let t = Template::new("A > ? and B < :x").bind(1).bind_named("x", 2);
        assert!(matches!(
            t.render(),
            Err(ConditionError::UnsupportedShape(_))
        ));
    }
}
