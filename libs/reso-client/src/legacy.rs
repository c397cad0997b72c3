//! Option-map queries: raw `OData` options in, payload out.

use reso_odata::quote;
use serde::Deserialize;
use serde_json::Value;

use crate::query::ODataParams;

/// Raw `OData` options for [`ResoClient::query`](crate::ResoClient::query).
///
/// `filter` is sent as written; the client's OSN restriction is ANDed onto
/// it. Unset options are omitted from the request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub select: Option<String>,
    pub filter: Option<String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub orderby: Vec<String>,
    pub skiptoken: Option<String>,
    pub expand: Option<String>,
    pub count: Option<bool>,
    pub ignorenulls: Option<bool>,
    /// Return the request URL instead of sending it.
    pub debug: bool,
    /// Deliver whole pages instead of single records.
    pub batch: bool,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request parameters, in the order the server sees them.
    pub fn to_params(&self, osn: Option<&str>) -> ODataParams {
        let osn_filter = osn.map(|osn| format!("OriginatingSystemName eq {}", quote(osn)));
        let filter = [self.filter.clone(), osn_filter]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" and ");

        ODataParams::new()
            .set_opt("$select", self.select.as_deref())
            .set_opt("$filter", (!filter.is_empty()).then_some(filter))
            .set_opt("$top", self.top.map(|n| n.to_string()))
            .set_opt("$skip", self.skip.map(|n| n.to_string()))
            .set_opt(
                "$orderby",
                (!self.orderby.is_empty()).then(|| self.orderby.join(",")),
            )
            .set_opt("$skiptoken", self.skiptoken.as_deref())
            .set_opt("$expand", self.expand.as_deref())
            .set_opt("$count", self.count.map(|b| b.to_string()))
            .set_opt("$ignorenulls", self.ignorenulls.map(|b| b.to_string()))
            .debug(self.debug)
    }
}

/// What [`ResoClient::query_each`](crate::ResoClient::query_each) hands to
/// its consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    Record(Value),
    /// A whole page, when [`QueryOptions::batch`] is set.
    Page(Vec<Value>),
}
