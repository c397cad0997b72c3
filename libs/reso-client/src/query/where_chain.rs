use reso_odata::Conditions;

use super::QueryBuilder;

/// The second step of `query.where_chain().not(...)`.
#[derive(Clone, Debug)]
#[must_use]
pub struct WhereChain {
    builder: QueryBuilder,
}

impl WhereChain {
    pub(crate) fn new(builder: QueryBuilder) -> Self {
        Self { builder }
    }

    /// Add `conditions`, each negated.
    pub fn not(self, conditions: impl Into<Conditions>) -> QueryBuilder {
        self.builder.with_conditions(&conditions.into(), true)
    }

    /// Add `conditions` as in [`QueryBuilder::filter`].
    pub fn and(self, conditions: impl Into<Conditions>) -> QueryBuilder {
        self.builder.with_conditions(&conditions.into(), false)
    }
}
