//! `$metadata` document helpers.

use crate::error::ClientError;

/// EDM namespace of `OData` v4 CSDL documents.
pub const EDM_NAMESPACE: &str = "http://docs.oasis-open.org/odata/ns/edm";

/// `Name` of every `EntityType` in a CSDL document, in document order.
///
/// # Errors
///
/// [`ClientError::Metadata`] when `xml` is not well-formed.
pub fn entity_names(xml: &str) -> Result<Vec<String>, ClientError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| ClientError::Metadata(e.to_string()))?;
    Ok(doc
        .descendants()
        .filter(|node| node.has_tag_name((EDM_NAMESPACE, "EntityType")))
        .filter_map(|node| node.attribute("Name"))
        .map(str::to_owned)
        .collect())
}
