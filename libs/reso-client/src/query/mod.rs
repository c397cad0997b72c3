//! Fluent, immutable queries over one resource.

mod builder;
mod params;
mod where_chain;

pub use builder::{DEFAULT_FIND_EACH_BATCH, DEFAULT_PROPERTIES_SCOPE, QueryBuilder};
pub use params::{DEBUG_PARAM, ODataParams};
pub use where_chain::WhereChain;
