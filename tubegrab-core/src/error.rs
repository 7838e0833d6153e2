use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The engine could not resolve a URL to one or more items.
    #[error("cannot extract information from {url}: {message}")]
    MetadataUnavailable { url: String, message: String },

    /// Invalid format, codec or quality. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The engine failed while transferring or post-processing an item.
    #[error("download failed for {id}: {message}")]
    DownloadFailure { id: String, message: String },

    #[error("extraction engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Identifier used when the error is surfaced as a status event.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Error::MetadataUnavailable { url, .. } => Some(url),
            Error::DownloadFailure { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The underlying message without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Error::MetadataUnavailable { message, .. } => message.clone(),
            Error::DownloadFailure { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_unavailable_display_names_url() {
        let err = Error::MetadataUnavailable {
            url: "https://example.com/x".into(),
            message: "Private video".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot extract information from https://example.com/x: Private video"
        );
        assert_eq!(err.subject(), Some("https://example.com/x"));
        assert_eq!(err.detail(), "Private video");
    }

    #[test]
    fn configuration_has_no_subject() {
        let err = Error::config("bad quality");
        assert!(err.subject().is_none());
        assert_eq!(err.detail(), "configuration error: bad quality");
    }
}
