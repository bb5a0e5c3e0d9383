use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Record identifiers arrive as numbers from some sources and strings from others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

impl From<i32> for RecordId {
    fn from(value: i32) -> Self {
        RecordId::Number(value.into())
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

/// Price after normalization: a plain number, or the string a boxed decimal was unwrapped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Amount(serde_json::Number),
    Text(String),
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Amount(n) => write!(f, "{}", n),
            Price::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Identity carried by legacy sources; preferred over `id` when present.
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<RecordId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Normalized identity: the legacy id if present, else the primary id.
    pub fn identity(&self) -> Option<String> {
        self.legacy_id
            .as_ref()
            .or(self.id.as_ref())
            .map(|id| id.to_string())
            .filter(|id| !id.trim().is_empty())
    }
}

/// Display fields may be absent or explicitly `null` upstream.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Auxiliary constraints forwarded to the remote search collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(flatten)]
    pub context: SearchContext,
    pub limit: usize,
}

/// Snapshot of a record's display fields taken when it entered the comparison set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionItem {
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

impl SelectionItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: String::new(),
            title: title.into(),
            thumbnail: None,
            price: None,
            added_at: None,
        }
    }

    /// Returns `None` when the record has no usable identity.
    pub fn from_record(record: &CatalogRecord) -> Option<Self> {
        let id = record.identity()?;
        Some(Self {
            id,
            slug: record.slug.clone(),
            title: record.title.clone(),
            thumbnail: record.thumbnail.clone(),
            price: record.price.as_ref().map(|p| p.to_string()),
            added_at: Some(Utc::now()),
        })
    }

    pub fn identity(&self) -> Option<&str> {
        let id = self.id.trim();
        (!id.is_empty()).then_some(id)
    }
}

/// Who produced a change-feed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A selection store living in this process.
    Store(u64),
    /// A durable-storage handle; writes are attributed to the handle that made them.
    Storage(u64),
    /// Another process, seen through the storage layer.
    External,
}

/// Full-snapshot message carried by every change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange {
    pub origin: Origin,
    pub key: String,
    pub items: Vec<SelectionItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_id_wins_over_primary_id() {
        let record: CatalogRecord =
            serde_json::from_value(json!({"id": 7, "_id": "64ab", "title": "Split AC"})).unwrap();
        assert_eq!(record.identity().as_deref(), Some("64ab"));

        let record: CatalogRecord = serde_json::from_value(json!({"id": 7})).unwrap();
        assert_eq!(record.identity().as_deref(), Some("7"));
    }

    #[test]
    fn record_without_identity_cannot_be_selected() {
        let record: CatalogRecord = serde_json::from_value(json!({"title": "Orphan"})).unwrap();
        assert_eq!(record.identity(), None);
        assert!(SelectionItem::from_record(&record).is_none());
    }

    #[test]
    fn snapshot_keeps_display_price() {
        let record: CatalogRecord = serde_json::from_value(json!({
            "id": 2,
            "title": "Window AC 1.5 Ton",
            "slug": "window-ac-1-5-ton",
            "price": "199.99",
            "thumbnail": "/img/2.png"
        }))
        .unwrap();

        let item = SelectionItem::from_record(&record).unwrap();
        assert_eq!(item.id, "2");
        assert_eq!(item.price.as_deref(), Some("199.99"));
        assert_eq!(item.slug, "window-ac-1-5-ton");
        assert!(item.added_at.is_some());
    }

    #[test]
    fn zero_price_is_kept() {
        let record: CatalogRecord =
            serde_json::from_value(json!({"id": 3, "price": 0})).unwrap();
        let item = SelectionItem::from_record(&record).unwrap();
        assert_eq!(item.price.as_deref(), Some("0"));
    }

    #[test]
    fn null_display_fields_decode_as_empty() {
        let record: CatalogRecord =
            serde_json::from_value(json!({"id": 1, "slug": null, "title": null})).unwrap();
        assert_eq!(record.identity().as_deref(), Some("1"));
        assert!(record.title.is_empty());
        assert!(record.slug.is_empty());
    }

    #[test]
    fn excerpt_and_description_are_kept_apart() {
        let record: CatalogRecord = serde_json::from_value(json!({
            "id": 2,
            "excerpt": "Short",
            "description": "A much longer description"
        }))
        .unwrap();
        assert_eq!(record.excerpt.as_deref(), Some("Short"));
        assert_eq!(record.description.as_deref(), Some("A much longer description"));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let record: CatalogRecord =
            serde_json::from_value(json!({"id": 1, "brand": "Acme"})).unwrap();
        assert_eq!(record.extra.get("brand"), Some(&json!("Acme")));
    }
}
