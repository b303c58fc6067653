use std::{collections::HashSet, fmt};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Stable identity of a feed item.  Backends hand out either string or numeric
/// keys; both are kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => ItemId(id),
            RawId::Number(id) => ItemId::from(id),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Image,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(alias = "_id")]
    pub id: ItemId,
    pub content_type: ContentType,
    pub content_url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

impl Item {
    pub fn is_video(&self) -> bool {
        self.content_type == ContentType::Video
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.content_url.trim().is_empty() {
            return Err(Error::EmptyContentUrl {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Text of the price badge drawn over the media.
    pub fn price_label(&self) -> String {
        format!("${}", self.price)
    }
}

/// Check every item and make sure ids are unique within one snapshot, since
/// they key per-item playback state across refetches.
pub fn validate_items(items: &[Item]) -> Result<(), Error> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        item.validate()?;
        if !seen.insert(&item.id) {
            return Err(Error::DuplicateItemId {
                id: item.id.clone(),
            });
        }
    }
    Ok(())
}
