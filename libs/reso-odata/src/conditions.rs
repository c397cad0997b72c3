//! Condition parsing: typed filter expressions into `OData` filter fragments.
//!
//! Two forms are accepted:
//!
//! - **mapping form**: field/value pairs built with [`Conditions::field`]. A
//!   scalar becomes `eq`, a list becomes `in (...)`, a range becomes
//!   `ge`/`le`/`lt`, and a string with a leading and/or trailing `%` becomes
//!   `startswith`/`endswith`/`contains`.
//! - **template form**: a [`Template`] with `?` or `:name` placeholders.
//!
//! ```
//! use reso_odata::{Conditions, parse};
//!
//! let c = Conditions::new()
//!     .field("City", "Seattle")
//!     .field("ListPrice", 300_000..=500_000);
//! assert_eq!(
//!     parse(&c, false).unwrap(),
//!     vec![
//!         "City eq 'Seattle'".to_owned(),
//!         "ListPrice ge 300000 and ListPrice le 500000".to_owned(),
//!     ]
//! );
//! ```

use std::ops::{Range, RangeFrom, RangeInclusive, RangeTo, RangeToInclusive};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

use crate::errors::ConditionError;
use crate::template::Template;
use crate::value::{ODataValue, format_value, quote};

/// Value side of a single mapping-form entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Value(ODataValue),
    List(Vec<ODataValue>),
    Range(ValueRange),
}

/// A range with optional bounds. The lower bound is always inclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueRange {
    pub lower: Option<ODataValue>,
    pub upper: Option<UpperBound>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpperBound {
    pub value: ODataValue,
    pub inclusive: bool,
}

impl ValueRange {
    pub fn new(lower: Option<ODataValue>, upper: Option<UpperBound>) -> Self {
        Self { lower, upper }
    }
}

macro_rules! condition_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Condition {
                fn from(v: $t) -> Self {
                    Condition::Value(v.into())
                }
            }
        )*
    };
}

condition_from_scalar!(
    &str, String, &String, bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64,
    NaiveDate, NaiveDateTime, ODataValue, serde_json::Value
);

impl<Tz: TimeZone> From<DateTime<Tz>> for Condition {
    fn from(v: DateTime<Tz>) -> Self {
        Condition::Value(v.into())
    }
}

impl<T: Into<ODataValue>> From<Option<T>> for Condition {
    fn from(v: Option<T>) -> Self {
        Condition::Value(v.into())
    }
}

impl<T: Into<ODataValue>> From<Vec<T>> for Condition {
    fn from(values: Vec<T>) -> Self {
        Condition::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ODataValue>, const N: usize> From<[T; N]> for Condition {
    fn from(values: [T; N]) -> Self {
        Condition::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ODataValue> + Clone> From<&[T]> for Condition {
    fn from(values: &[T]) -> Self {
        Condition::List(values.iter().cloned().map(Into::into).collect())
    }
}

impl From<ValueRange> for Condition {
    fn from(range: ValueRange) -> Self {
        Condition::Range(range)
    }
}

impl<T: Into<ODataValue>> From<Range<T>> for Condition {
    fn from(r: Range<T>) -> Self {
        Condition::Range(ValueRange::new(
            Some(r.start.into()),
            Some(UpperBound {
                value: r.end.into(),
                inclusive: false,
            }),
        ))
    }
}

impl<T: Into<ODataValue>> From<RangeInclusive<T>> for Condition {
    fn from(r: RangeInclusive<T>) -> Self {
        let (start, end) = r.into_inner();
        Condition::Range(ValueRange::new(
            Some(start.into()),
            Some(UpperBound {
                value: end.into(),
                inclusive: true,
            }),
        ))
    }
}

impl<T: Into<ODataValue>> From<RangeFrom<T>> for Condition {
    fn from(r: RangeFrom<T>) -> Self {
        Condition::Range(ValueRange::new(Some(r.start.into()), None))
    }
}

impl<T: Into<ODataValue>> From<RangeTo<T>> for Condition {
    fn from(r: RangeTo<T>) -> Self {
        Condition::Range(ValueRange::new(
            None,
            Some(UpperBound {
                value: r.end.into(),
                inclusive: false,
            }),
        ))
    }
}

impl<T: Into<ODataValue>> From<RangeToInclusive<T>> for Condition {
    fn from(r: RangeToInclusive<T>) -> Self {
        Condition::Range(ValueRange::new(
            None,
            Some(UpperBound {
                value: r.end.into(),
                inclusive: true,
            }),
        ))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Clause {
    Field(String, Condition),
    Template(Template),
}

/// An ordered set of conditions. Each entry renders to one fragment.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct Conditions {
    clauses: Vec<Clause>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a template-form condition. Convert with `.into()` or pass it
    /// anywhere an `impl Into<Conditions>` is accepted.
    pub fn template(text: impl Into<String>) -> Template {
        Template::new(text)
    }

    /// Add a mapping-form entry.
    pub fn field(mut self, name: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.clauses
            .push(Clause::Field(name.into(), condition.into()));
        self
    }

    /// Add a template-form entry.
    pub fn and_template(mut self, template: impl Into<Template>) -> Self {
        self.clauses.push(Clause::Template(template.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Build conditions from a JSON document.
    ///
    /// An object is mapping form: arrays become `in` lists, everything else
    /// an equality. An array is template form: the first element is the
    /// template text, followed by either one object of named bindings or any
    /// number of positional values.
    ///
    /// # Errors
    ///
    /// [`ConditionError::UnsupportedShape`] for any other root, for a template
    /// array whose first element is not a string, or for an object-valued
    /// field.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConditionError> {
        use serde_json::Value;
        match value {
            Value::Object(map) => {
                let mut out = Conditions::new();
                for (field, v) in map {
                    let condition = match v {
                        Value::Array(items) => Condition::List(items.iter().map(Into::into).collect()),
                        Value::Object(_) => {
                            return Err(ConditionError::UnsupportedShape(format!(
                                "object value for field {field}"
                            )));
                        }
                        scalar => Condition::Value(scalar.into()),
                    };
                    out = out.field(field.clone(), condition);
                }
                Ok(out)
            }
            Value::Array(items) => {
                let Some((Value::String(text), bindings)) = items.split_first() else {
                    return Err(ConditionError::UnsupportedShape(
                        "template array must start with a string".to_owned(),
                    ));
                };
                let mut template = Template::new(text.clone());
                match bindings {
                    [Value::Object(named)] => {
                        for (name, v) in named {
                            template = template.bind_named(name.clone(), v);
                        }
                    }
                    positional => {
                        for v in positional {
                            template = template.bind(v);
                        }
                    }
                }
                Ok(template.into())
            }
            other => Err(ConditionError::UnsupportedShape(json_kind(other).to_owned())),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Template> for Conditions {
    fn from(template: Template) -> Self {
        Conditions::new().and_template(template)
    }
}

/// A bare string is a template without bindings, e.g. `"City eq 'Seattle'"`.
impl From<&str> for Conditions {
    fn from(text: &str) -> Self {
        Template::new(text).into()
    }
}

impl From<String> for Conditions {
    fn from(text: String) -> Self {
        Template::new(text).into()
    }
}

impl<K: Into<String>, V: Into<Condition>> From<(K, V)> for Conditions {
    fn from((field, condition): (K, V)) -> Self {
        Conditions::new().field(field, condition)
    }
}

/// Render `conditions` into filter fragments, one per entry, in insertion
/// order. Fragments that render empty (a negated empty list) are dropped.
///
/// # Errors
///
/// Any [`ConditionError`] raised by a template or a range without bounds.
pub fn parse(conditions: &Conditions, negate: bool) -> Result<Vec<String>, ConditionError> {
    let mut fragments = Vec::with_capacity(conditions.clauses.len());
    for clause in &conditions.clauses {
        let fragment = match (clause, negate) {
            (Clause::Field(field, condition), false) => fragment(field, condition)?,
            (Clause::Field(field, condition), true) => negated_fragment(field, condition)?,
            (Clause::Template(template), false) => template.render()?,
            (Clause::Template(template), true) => format!("not ({})", template.render()?),
        };
        if !fragment.is_empty() {
            fragments.push(fragment);
        }
    }
    Ok(fragments)
}

fn fragment(field: &str, condition: &Condition) -> Result<String, ConditionError> {
    Ok(match condition {
        Condition::List(values) => format_in(field, values),
        Condition::Range(range) => format_range(field, range)?,
        Condition::Value(ODataValue::String(s)) => StringMatch::classify(s).render(field),
        Condition::Value(value) => format!("{field} eq {}", format_value(value)),
    })
}

fn negated_fragment(field: &str, condition: &Condition) -> Result<String, ConditionError> {
    Ok(match condition {
        Condition::List(values) => values
            .iter()
            .map(|v| format!("{field} ne {}", format_value(v)))
            .collect::<Vec<_>>()
            .join(" and "),
        Condition::Range(range) => format!("not ({})", format_range(field, range)?),
        Condition::Value(ODataValue::String(s)) => match StringMatch::classify(s) {
            StringMatch::Exact(literal) => format!("{field} ne {}", quote(&literal)),
            pattern => format!("not {}", pattern.render(field)),
        },
        Condition::Value(value) => format!("{field} ne {}", format_value(value)),
    })
}

fn format_in(field: &str, values: &[ODataValue]) -> String {
    let formatted = values.iter().map(format_value).collect::<Vec<_>>().join(",");
    format!("{field} in ({formatted})")
}

fn format_range(field: &str, range: &ValueRange) -> Result<String, ConditionError> {
    let mut parts = Vec::with_capacity(2);
    if let Some(lower) = &range.lower {
        parts.push(format!("{field} ge {}", format_value(lower)));
    }
    if let Some(upper) = &range.upper {
        let op = if upper.inclusive { "le" } else { "lt" };
        parts.push(format!("{field} {op} {}", format_value(&upper.value)));
    }
    if parts.is_empty() {
        return Err(ConditionError::EmptyRange(field.to_owned()));
    }
    Ok(parts.join(" and "))
}

#[derive(Debug, PartialEq, Eq)]
enum StringMatch {
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    Exact(String),
}

impl StringMatch {
    /// A `%` at the very start or end is a wildcard unless preceded by `\`.
    /// After stripping markers a boundary `\%` becomes a literal `%`.
    fn classify(value: &str) -> Self {
        let leading = value.starts_with('%');
        let trailing = value.ends_with('%') && !value.ends_with("\\%");

        let mut inner = value;
        if leading {
            inner = inner.strip_prefix('%').unwrap_or(inner);
        }
        if trailing {
            inner = inner.strip_suffix('%').unwrap_or(inner);
        }
        let inner = unescape_boundaries(inner);

        match (leading, trailing) {
            (true, true) => StringMatch::Contains(inner),
            (true, false) => StringMatch::EndsWith(inner),
            (false, true) => StringMatch::StartsWith(inner),
            (false, false) => StringMatch::Exact(inner),
        }
    }

    fn render(&self, field: &str) -> String {
        match self {
            StringMatch::StartsWith(s) => format!("startswith({field},{})", quote(s)),
            StringMatch::EndsWith(s) => format!("endswith({field},{})", quote(s)),
            StringMatch::Contains(s) => format!("contains({field},{})", quote(s)),
            StringMatch::Exact(s) => format!("{field} eq {}", quote(s)),
        }
    }
}

fn unescape_boundaries(s: &str) -> String {
    let head = match s.strip_prefix("\\%") {
        Some(rest) => format!("%{rest}"),
        None => s.to_owned(),
    };
    match head.strip_suffix("\\%") {
        Some(rest) => format!("{rest}%"),
        None => head,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(c: impl Into<Conditions>) -> String {
        let mut out = parse(&c.into(), false).unwrap();
        assert_eq!(out.len(), 1);
        out.remove(0)
    }

    fn one_not(c: impl Into<Conditions>) -> String {
        let mut out = parse(&c.into(), true).unwrap();
        assert_eq!(out.len(), 1);
        out.remove(0)
    }

    #[test]
    fn scalar_equality() {
        assert_eq!(one(("City", "Seattle")), "City eq 'Seattle'");
        assert_eq!(one(("BedroomsTotal", 3)), "BedroomsTotal eq 3");
        assert_eq!(one(("NewConstructionYN", true)), "NewConstructionYN eq true");
        assert_eq!(one(("ClosePrice", None::<i64>)), "ClosePrice eq null");
    }

    #[test]
    fn list_becomes_in() {
        assert_eq!(
            one(("StandardStatus", vec!["Active", "Pending"])),
            "StandardStatus in ('Active','Pending')"
        );
        assert_eq!(one(("BedroomsTotal", [2, 3])), "BedroomsTotal in (2,3)");
    }

    #[test]
    fn inclusive_range() {
        assert_eq!(
            one(("ListPrice", 300_000..=500_000)),
            "ListPrice ge 300000 and ListPrice le 500000"
        );
    }

    #[test]
    fn exclusive_range_uses_lt() {
        assert_eq!(
            one(("ListPrice", 300_000..500_000)),
            "ListPrice ge 300000 and ListPrice lt 500000"
        );
    }

    #[test]
    fn open_ranges_emit_one_bound() {
        assert_eq!(one(("ListPrice", 300_000..)), "ListPrice ge 300000");
        assert_eq!(one(("ListPrice", ..=500_000)), "ListPrice le 500000");
        assert_eq!(one(("ListPrice", ..500_000)), "ListPrice lt 500000");
    }

    #[test]
    fn date_range() {
        let lo = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let hi = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert_eq!(
            one(("CloseDate", lo..hi)),
            "CloseDate ge 2026-01-01 and CloseDate lt 2026-02-01"
        );
    }

    #[test]
    fn unbounded_range_is_an_error() {
        let c = Conditions::new().field("ListPrice", ValueRange::new(None, None));
        assert_eq!(
            parse(&c, false).unwrap_err(),
            ConditionError::EmptyRange("ListPrice".into())
        );
    }

    #[test]
    fn wildcards() {
        assert_eq!(one(("City", "Slifer%")), "startswith(City,'Slifer')");
        assert_eq!(one(("City", "%Frampton")), "endswith(City,'Frampton')");
        assert_eq!(one(("City", "%Smith%")), "contains(City,'Smith')");
    }

    #[test]
    fn interior_percent_is_plain_text() {
        assert_eq!(one(("Remarks", "100% Pure")), "Remarks eq '100% Pure'");
    }

    #[test]
    fn escaped_boundary_marker_is_literal() {
        assert_eq!(one(("City", "\\%Realty")), "City eq '%Realty'");
        assert_eq!(one(("City", "Realty\\%")), "City eq 'Realty%'");
        assert_eq!(one(("City", "\\%Realty%")), "startswith(City,'%Realty')");
        assert_eq!(one(("City", "%Realty\\%")), "endswith(City,'Realty%')");
    }

    #[test]
    fn interior_escape_and_backslash_pass_through() {
        assert_eq!(one(("Remarks", "a\\%b")), "Remarks eq 'a\\%b'");
        assert_eq!(one(("Remarks", "C:\\dir")), "Remarks eq 'C:\\dir'");
    }

    #[test]
    fn lone_marker_is_contains_empty() {
        assert_eq!(one(("City", "%")), "contains(City,'')");
    }

    #[test]
    fn wildcard_literal_quotes_are_doubled() {
        assert_eq!(one(("Name", "O'Br%")), "startswith(Name,'O''Br')");
    }

    #[test]
    fn negated_scalar() {
        assert_eq!(one_not(("City", "Seattle")), "City ne 'Seattle'");
        assert_eq!(one_not(("BedroomsTotal", 3)), "BedroomsTotal ne 3");
    }

    #[test]
    fn negated_list_expands_to_ne() {
        assert_eq!(
            one_not(("StandardStatus", vec!["Closed", "Expired"])),
            "StandardStatus ne 'Closed' and StandardStatus ne 'Expired'"
        );
    }

    #[test]
    fn negated_empty_list_is_dropped() {
        let c = Conditions::new().field("StandardStatus", Vec::<String>::new());
        assert!(parse(&c, true).unwrap().is_empty());
        assert_eq!(parse(&c, false).unwrap(), vec!["StandardStatus in ()"]);
    }

    #[test]
    fn negated_wildcard_gets_not_prefix() {
        assert_eq!(one_not(("City", "Slifer%")), "not startswith(City,'Slifer')");
        assert_eq!(one_not(("City", "%Smith%")), "not contains(City,'Smith')");
    }

    #[test]
    fn negated_escaped_literal_uses_unescaped_value() {
        assert_eq!(one_not(("City", "\\%Realty")), "City ne '%Realty'");
    }

    #[test]
    fn negated_range_is_wrapped() {
        assert_eq!(
            one_not(("ListPrice", 1..=2)),
            "not (ListPrice ge 1 and ListPrice le 2)"
        );
    }

    #[test]
    fn negated_template_is_wrapped() {
        let t = Conditions::template("ListPrice > ?").bind(500_000);
        assert_eq!(one_not(t), "not (ListPrice gt 500000)");
    }

    #[test]
    fn multiple_fields_keep_insertion_order() {
        let c = Conditions::new()
            .field("ListPrice", 1..)
            .field("City", "Seattle")
            .and_template("BedroomsTotal >= 2");
        assert_eq!(
            parse(&c, false).unwrap(),
            vec!["ListPrice ge 1", "City eq 'Seattle'", "BedroomsTotal ge 2"]
        );
    }

    #[test]
    fn from_json_mapping() {
        let c = Conditions::from_json(&json!({"City": "Seattle", "BedroomsTotal": [2, 3]})).unwrap();
        let mut out = parse(&c, false).unwrap();
        out.sort();
        assert_eq!(out, vec!["BedroomsTotal in (2,3)", "City eq 'Seattle'"]);
    }

    #[test]
    fn from_json_positional_template() {
        let c = Conditions::from_json(&json!(["ListPrice >= ?", 500_000])).unwrap();
        assert_eq!(parse(&c, false).unwrap(), vec!["ListPrice ge 500000"]);
    }

    #[test]
    fn from_json_named_template() {
        let c = Conditions::from_json(&json!(["ListPrice >= :min", {"min": 500_000}])).unwrap();
        assert_eq!(parse(&c, false).unwrap(), vec!["ListPrice ge 500000"]);
    }

    #[test]
    fn from_json_rejects_other_roots() {
        for v in [json!("City eq 'x'"), json!(3), json!(null), json!([1, 2])] {
            assert!(
                matches!(Conditions::from_json(&v), Err(ConditionError::UnsupportedShape(_))),
                "{v} should be rejected"
            );
        }
    }

    #[test]
    fn from_json_rejects_nested_objects() {
        let v = json!({"ListPrice": {"gt": 1}});
        assert!(matches!(
            Conditions::from_json(&v),
            Err(ConditionError::UnsupportedShape(_))
        ));
    }
}
