use serde::{Serialize, Serializer};

use crate::models::media::Item;

pub const FRAME_START: &str = "START_INFO:";
pub const FRAME_END: &str = ":END_INFO";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Downloading,
    Finished,
    Error,
}

/// Byte count reported by the engine; serialized as `"unknown"` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalBytes {
    Known(u64),
    #[default]
    Unknown,
}

impl From<Option<u64>> for TotalBytes {
    fn from(value: Option<u64>) -> Self {
        value.map(TotalBytes::Known).unwrap_or(TotalBytes::Unknown)
    }
}

impl Serialize for TotalBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TotalBytes::Known(n) => serializer.serialize_u64(*n),
            TotalBytes::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusEvent {
    pub id: String,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    pub total_bytes: TotalBytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEvent {
    pub fn downloading(id: impl Into<String>, percent: f64, total_bytes: TotalBytes) -> Self {
        Self {
            id: id.into(),
            status: EventStatus::Downloading,
            percent: Some(percent),
            total_bytes,
            output_path: None,
            message: None,
        }
    }

    pub fn finished(
        id: impl Into<String>,
        output_path: impl Into<String>,
        total_bytes: TotalBytes,
    ) -> Self {
        Self {
            id: id.into(),
            status: EventStatus::Finished,
            percent: Some(100.0),
            total_bytes,
            output_path: Some(output_path.into()),
            message: None,
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: EventStatus::Error,
            percent: None,
            total_bytes: TotalBytes::Unknown,
            output_path: None,
            message: Some(message.into()),
        }
    }
}

/// Resolved metadata: an object for a single item, an array for a collection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataPayload {
    Single(Item),
    Collection(Vec<Item>),
}

impl MetadataPayload {
    pub fn items(&self) -> &[Item] {
        match self {
            MetadataPayload::Single(item) => std::slice::from_ref(item),
            MetadataPayload::Collection(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<Item> {
        match self {
            MetadataPayload::Single(item) => vec![item],
            MetadataPayload::Collection(items) => items,
        }
    }
}

/// Wraps a serialized payload in the line framing parent processes parse.
pub fn frame<T: Serialize>(payload: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(format!("{}{}{}", FRAME_START, json, FRAME_END))
}

pub trait EventEmitter: Send + Sync + Clone + 'static {
    fn emit_metadata(&self, payload: &MetadataPayload);
    fn emit_status(&self, event: &StatusEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> Item {
        Item {
            id: id.into(),
            title: format!("title {id}"),
            source_url: format!("https://www.youtube.com/watch?v={id}"),
            duration_seconds: 1.0,
            thumbnail_url: Some("https://i.ytimg.com/x.jpg".into()),
        }
    }

    #[test]
    fn downloading_event_omits_path_and_message() {
        let ev = StatusEvent::downloading("a", 42.5, TotalBytes::Unknown);
        let line = frame(&ev).unwrap();
        assert_eq!(
            line,
            r#"START_INFO:{"id":"a","status":"downloading","percent":42.5,"total_bytes":"unknown"}:END_INFO"#
        );
    }

    #[test]
    fn finished_event_carries_path_and_bytes() {
        let ev = StatusEvent::finished("a", "/tmp/a.mkv", TotalBytes::Known(1024));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["status"], "finished");
        assert_eq!(json["percent"], 100.0);
        assert_eq!(json["total_bytes"], 1024);
        assert_eq!(json["output_path"], "/tmp/a.mkv");
    }

    #[test]
    fn error_event_has_no_percent() {
        let json = serde_json::to_value(StatusEvent::error("a", "boom")).unwrap();
        assert!(json.get("percent").is_none());
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn metadata_single_is_object_collection_is_array() {
        let single = serde_json::to_value(MetadataPayload::Single(item("a"))).unwrap();
        assert!(single.is_object());
        let many =
            serde_json::to_value(MetadataPayload::Collection(vec![item("a"), item("b")])).unwrap();
        assert_eq!(many.as_array().map(|a| a.len()), Some(2));
    }
}
