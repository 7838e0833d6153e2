const PLAYLIST_BASE: &str = "https://www.youtube.com/playlist";

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedContentType {
    Video,
    Collection { list_id: String },
}

/// Classifies a URL by its `list` query parameter. Anything that cannot be
/// parsed as a URL is handed to the engine as a single item.
pub fn classify(url_str: &str) -> ParsedContentType {
    match collection_id(url_str) {
        Some(list_id) => ParsedContentType::Collection { list_id },
        None => ParsedContentType::Video,
    }
}

pub fn collection_id(url_str: &str) -> Option<String> {
    let parsed = url::Url::parse(url_str).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "list")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Canonical collection-only form, dropping the `v=` and index parameters
/// that would otherwise make the engine resolve a single entry.
pub fn canonical_collection_url(list_id: &str) -> String {
    let mut url = match url::Url::parse(PLAYLIST_BASE) {
        Ok(u) => u,
        Err(_) => return format!("{}?list={}", PLAYLIST_BASE, list_id),
    };
    url.query_pairs_mut().append_pair("list", list_id);
    url.to_string()
}

pub fn extract_video_id(url_str: &str) -> Option<String> {
    let parsed = url::Url::parse(url_str).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

    if host.contains("youtu.be") {
        return segments.first().map(|s| s.to_string());
    }

    if host.contains("youtube.com") || host.contains("youtube-nocookie.com") {
        if matches!(segments.first(), Some(&"shorts") | Some(&"embed") | Some(&"live")) {
            return segments.get(1).map(|s| s.to_string());
        }
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.to_string());
    }

    None
}
