use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// One downloadable media unit as resolved by the extraction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    #[serde(
        rename = "thumbnail",
        serialize_with = "serialize_thumbnail",
        deserialize_with = "deserialize_thumbnail"
    )]
    pub thumbnail_url: Option<String>,
}

fn serialize_thumbnail<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

fn deserialize_thumbnail<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    Video,
    Audio,
    InfoOnly,
}

impl FromStr for FormatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" => Ok(FormatKind::Video),
            "audio" => Ok(FormatKind::Audio),
            "info-only" | "info_only" => Ok(FormatKind::InfoOnly),
            other => Err(Error::config(format!(
                "unsupported format '{}' (expected video, audio or info-only)",
                other
            ))),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatKind::Video => "video",
            FormatKind::Audio => "audio",
            FormatKind::InfoOnly => "info-only",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
    M4a,
    Wav,
    Flac,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::M4a => "m4a",
            AudioCodec::Wav => "wav",
            AudioCodec::Flac => "flac",
        }
    }
}

impl FromStr for AudioCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioCodec::Mp3),
            "m4a" => Ok(AudioCodec::M4a),
            "wav" => Ok(AudioCodec::Wav),
            "flac" => Ok(AudioCodec::Flac),
            other => Err(Error::config(format!(
                "unsupported audio format '{}' (expected mp3, m4a, wav or flac)",
                other
            ))),
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested video quality: either no cap or a maximum pixel height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Best,
    MaxHeight(u32),
}

impl Quality {
    pub fn height_cap(&self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::MaxHeight(h) => Some(*h),
        }
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "best" {
            return Ok(Quality::Best);
        }
        let digits = s.strip_suffix('p').unwrap_or(&s);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::config(format!(
                "invalid quality '{}' (expected <height>p or best)",
                s
            )));
        }
        match digits.parse::<u32>() {
            Ok(h) if h > 0 => Ok(Quality::MaxHeight(h)),
            _ => Err(Error::config(format!("invalid quality '{}'", s))),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::MaxHeight(h) => write!(f, "{}p", h),
        }
    }
}

/// Format options shared by every URL of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    pub format_kind: FormatKind,
    pub audio_codec: AudioCodec,
    pub quality: Quality,
}

impl FormatOptions {
    /// Validates the user-facing strings. Every combination that survives
    /// this can be turned into an engine configuration.
    pub fn parse(format_kind: &str, audio_codec: &str, quality: &str) -> Result<Self, Error> {
        Ok(Self {
            format_kind: format_kind.parse()?,
            audio_codec: audio_codec.parse()?,
            quality: quality.parse()?,
        })
    }

    /// Extension of the file the engine leaves behind.
    pub fn extension(&self) -> &'static str {
        match self.format_kind {
            FormatKind::Audio => self.audio_codec.as_str(),
            _ => "mkv",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub item: Item,
    pub format: FormatOptions,
    pub output_directory: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_parses_height_suffix() {
        assert_eq!("480p".parse::<Quality>().unwrap(), Quality::MaxHeight(480));
        assert_eq!("1080".parse::<Quality>().unwrap(), Quality::MaxHeight(1080));
        assert_eq!("BEST".parse::<Quality>().unwrap(), Quality::Best);
    }

    #[test]
    fn quality_rejects_garbage() {
        for bad in ["4k-ish", "p", "", "0p", "72 0p", "-480p", "hd"] {
            let err = bad.parse::<Quality>().unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{bad} should fail");
        }
    }

    #[test]
    fn format_kind_accepts_both_info_spellings() {
        assert_eq!("info-only".parse::<FormatKind>().unwrap(), FormatKind::InfoOnly);
        assert_eq!("info_only".parse::<FormatKind>().unwrap(), FormatKind::InfoOnly);
        assert!("podcast".parse::<FormatKind>().is_err());
    }

    #[test]
    fn audio_codec_rejects_unknown() {
        assert_eq!("FLAC".parse::<AudioCodec>().unwrap(), AudioCodec::Flac);
        assert!(matches!(
            "ogg".parse::<AudioCodec>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn extension_follows_format_kind() {
        let mut opts = FormatOptions {
            format_kind: FormatKind::Video,
            audio_codec: AudioCodec::Wav,
            quality: Quality::Best,
        };
        assert_eq!(opts.extension(), "mkv");
        opts.format_kind = FormatKind::Audio;
        assert_eq!(opts.extension(), "wav");
    }

    #[test]
    fn item_serializes_with_wire_names() {
        let item = Item {
            id: "abc".into(),
            title: "Song".into(),
            source_url: "https://www.youtube.com/watch?v=abc".into(),
            duration_seconds: 12.0,
            thumbnail_url: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["url"], "https://www.youtube.com/watch?v=abc");
        assert_eq!(json["duration"], 12.0);
        assert_eq!(json["thumbnail"], "");
    }
}
