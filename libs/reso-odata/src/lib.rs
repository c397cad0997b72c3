#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `OData` filter rendering for RESO Web API queries.
//!
//! Pure, I/O-free building blocks: literal formatting ([`format_value`]),
//! operator translation ([`translate_operator`]), condition parsing
//! ([`parse`]) and `$orderby` clauses ([`OrderClause`]).

pub mod conditions;
pub mod errors;
pub mod operator;
pub mod order;
pub mod template;
pub mod value;

pub use conditions::{Condition, Conditions, UpperBound, ValueRange, parse};
pub use errors::ConditionError;
pub use operator::{ComparisonOperator, OPERATOR_PATTERN, translate_operator};
pub use order::{OrderClause, SortDir, render_order};
pub use template::Template;
pub use value::{ODataValue, format_value, quote};
