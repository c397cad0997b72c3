use thiserror::Error;

/// Errors raised while translating conditions into `OData` filter fragments.
///
/// All variants are input errors: they are detected before any request is
/// built and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConditionError {
    /// A comparison token outside `> >= < <= = !=`.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// A template has a different number of `?` placeholders than bound values.
    #[error("template has {placeholders} positional placeholder(s) but {values} value(s) were bound")]
    PlaceholderMismatch { placeholders: usize, values: usize },

    /// A `:name` placeholder has no matching binding.
    #[error("no binding for named placeholder :{0}")]
    MissingBinding(String),

    /// A range condition with neither a lower nor an upper bound.
    #[error("range condition on {0} has no bounds")]
    EmptyRange(String),

    /// The root condition value is neither a mapping nor a template.
    #[error("unsupported condition shape: {0}")]
    UnsupportedShape(String),
}
