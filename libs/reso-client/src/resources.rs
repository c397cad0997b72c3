//! The resource map: which endpoint serves which resource and which field
//! identifies its records.

use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// Path of the EDM metadata document.
pub const METADATA_PATH: &str = "/$metadata";

/// Filterable RESO resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Media,
    Members,
    Offices,
    OpenHouses,
    Properties,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Media,
        Resource::Members,
        Resource::Offices,
        Resource::OpenHouses,
        Resource::Properties,
    ];

    /// Collection name, e.g. `open_houses`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Resource::Media => "media",
            Resource::Members => "members",
            Resource::Offices => "offices",
            Resource::OpenHouses => "open_houses",
            Resource::Properties => "properties",
        }
    }

    /// Singular name used for key lookups, e.g. `open_house`.
    #[must_use]
    pub fn detail_name(self) -> &'static str {
        match self {
            Resource::Media => "medium",
            Resource::Members => "member",
            Resource::Offices => "office",
            Resource::OpenHouses => "open_house",
            Resource::Properties => "property",
        }
    }

    /// Endpoint path relative to the API base URL. Collection queries and
    /// key lookups share it.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Resource::Media => "/Media",
            Resource::Members => "/Member",
            Resource::Offices => "/Office",
            Resource::OpenHouses => "/OpenHouse",
            Resource::Properties => "/Property",
        }
    }

    /// Identity key field.
    #[must_use]
    pub fn key_field(self) -> &'static str {
        match self {
            Resource::Media => "MediaKey",
            Resource::Members => "MemberKey",
            Resource::Offices => "OfficeKey",
            Resource::OpenHouses => "OpenHouseKey",
            Resource::Properties => "ListingKey",
        }
    }

    /// `"/Property('key')"`, with quotes inside `key` doubled.
    #[must_use]
    pub fn detail_path(self, key: &str) -> String {
        format!("{}({})", self.path(), reso_odata::quote(key))
    }

    /// Look up a collection name.
    ///
    /// # Errors
    ///
    /// [`ClientError::UnknownResource`] for names outside the map.
    pub fn from_name(name: &str) -> Result<Self, ClientError> {
        Self::ALL
            .into_iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| ClientError::UnknownResource(name.to_owned()))
    }

    /// Look up a singular detail name.
    ///
    /// # Errors
    ///
    /// [`ClientError::UnknownResource`] for names outside the map.
    pub fn from_detail_name(name: &str) -> Result<Self, ClientError> {
        Self::ALL
            .into_iter()
            .find(|r| r.detail_name() == name)
            .ok_or_else(|| ClientError::UnknownResource(name.to_owned()))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
