use std::sync::Arc;

use serde_json::Value;

use tubegrab_core::core::events::MetadataPayload;
use tubegrab_core::error::Error;
use tubegrab_core::models::media::Item;

use crate::core::url_parser::{self, ParsedContentType};
use crate::platforms::traits::MediaEngine;

const UNTITLED: &str = "Untitled";

pub struct YouTubeResolver {
    engine: Arc<dyn MediaEngine>,
}

impl YouTubeResolver {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    /// Resolves `url` into one item, or into every playable entry of a
    /// collection (engine order, entries without a URL dropped).
    pub async fn resolve(&self, url: &str) -> Result<MetadataPayload, Error> {
        tracing::info!("fetching info for {}", url);

        match url_parser::classify(url) {
            ParsedContentType::Collection { list_id } => {
                let playlist_url = url_parser::canonical_collection_url(&list_id);
                let json = self
                    .engine
                    .extract_metadata(&playlist_url, true)
                    .await
                    .map_err(|e| unavailable(url, e))?;

                let items = Self::parse_collection(&json);
                tracing::info!(
                    "playlist '{}' resolved to {} items",
                    collection_title(&json),
                    items.len()
                );
                Ok(MetadataPayload::Collection(items))
            }
            ParsedContentType::Video => {
                let json = self
                    .engine
                    .extract_metadata(url, false)
                    .await
                    .map_err(|e| unavailable(url, e))?;

                let item = Self::parse_video_info(&json, url);
                tracing::info!("single video: {}", item.title);
                Ok(MetadataPayload::Single(item))
            }
        }
    }

    pub fn parse_collection(json: &Value) -> Vec<Item> {
        let entries = match json.get("entries").and_then(|v| v.as_array()) {
            Some(e) => e,
            None => return Vec::new(),
        };

        entries
            .iter()
            .filter_map(|entry| {
                let url = entry.get("url").and_then(|v| v.as_str())?.to_string();
                let id = entry
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| url_parser::extract_video_id(&url))
                    .unwrap_or_else(|| url.clone());

                Some(Item {
                    id,
                    title: str_field(entry, "title").unwrap_or_else(|| UNTITLED.to_string()),
                    source_url: url,
                    duration_seconds: duration(entry),
                    thumbnail_url: thumbnail(entry),
                })
            })
            .collect()
    }

    pub fn parse_video_info(json: &Value, source_url: &str) -> Item {
        let id = str_field(json, "id")
            .or_else(|| url_parser::extract_video_id(source_url))
            .unwrap_or_default();

        Item {
            id,
            title: str_field(json, "title").unwrap_or_else(|| UNTITLED.to_string()),
            source_url: source_url.to_string(),
            duration_seconds: duration(json),
            thumbnail_url: thumbnail(json),
        }
    }
}

fn unavailable(url: &str, err: anyhow::Error) -> Error {
    Error::MetadataUnavailable {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn duration(json: &Value) -> f64 {
    json.get("duration")
        .and_then(|v| v.as_f64())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0)
}

fn thumbnail(json: &Value) -> Option<String> {
    json.get("thumbnails")
        .and_then(|v| v.as_array())
        .and_then(|thumbs| thumbs.first())
        .and_then(|t| t.get("url"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| str_field(json, "thumbnail"))
}

fn collection_title(json: &Value) -> String {
    str_field(json, "title")
        .or_else(|| str_field(json, "playlist_title"))
        .unwrap_or_else(|| "Unnamed playlist".to_string())
}
