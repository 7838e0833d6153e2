use crate::models::media::{AudioCodec, FormatKind, FormatOptions, Quality};

pub const VIDEO_CONTAINER: &str = "mkv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: AudioCodec,
    /// Engine quality scale, `0` is best.
    pub quality: String,
}

/// Engine configuration for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    pub format_selector: String,
    pub height_cap: Option<u32>,
    pub merge_output_format: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    pub output_template: String,
    pub embed_thumbnail: bool,
    pub no_overwrites: bool,
    pub extra_flags: Vec<String>,
}

impl DownloadConfig {
    pub fn with_embed_thumbnail(mut self, embed: bool) -> Self {
        self.embed_thumbnail = embed;
        self
    }

    pub fn with_extra_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_flags = flags;
        self
    }

    /// wav has no cover art container, the engine's embed step rejects it.
    fn can_embed_thumbnail(&self) -> bool {
        !matches!(
            self.extract_audio,
            Some(AudioExtraction {
                codec: AudioCodec::Wav,
                ..
            })
        )
    }

    /// Renders the configuration as engine command-line flags.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_string(), self.format_selector.clone()];

        if let Some(ref container) = self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        if let Some(ref extraction) = self.extract_audio {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(extraction.codec.as_str().to_string());
            args.push("--audio-quality".to_string());
            args.push(extraction.quality.clone());
        }

        if self.embed_thumbnail && self.can_embed_thumbnail() {
            args.push("--embed-thumbnail".to_string());
        }
        if self.no_overwrites {
            args.push("--no-overwrites".to_string());
        }

        args.extend(self.extra_flags.iter().cloned());

        args.push("-o".to_string());
        args.push(self.output_template.clone());
        args
    }
}

fn video_selector(quality: Quality) -> String {
    match quality.height_cap() {
        None => "bestvideo+bestaudio".to_string(),
        Some(h) => format!("bestvideo[height<={}]+bestaudio", h),
    }
}

/// Builds the engine configuration for `opts`. `info-only` has no download
/// configuration and yields `None`.
///
/// Kind, codec and quality are already validated when parsed, so building
/// itself cannot fail.
pub fn build_download_config(opts: &FormatOptions, output_template: &str) -> Option<DownloadConfig> {
    let base = DownloadConfig {
        format_selector: String::new(),
        height_cap: None,
        merge_output_format: None,
        extract_audio: None,
        output_template: output_template.to_string(),
        embed_thumbnail: true,
        no_overwrites: true,
        extra_flags: Vec::new(),
    };

    match opts.format_kind {
        FormatKind::Video => Some(DownloadConfig {
            format_selector: video_selector(opts.quality),
            height_cap: opts.quality.height_cap(),
            merge_output_format: Some(VIDEO_CONTAINER.to_string()),
            ..base
        }),
        FormatKind::Audio => Some(DownloadConfig {
            format_selector: "bestaudio/best".to_string(),
            extract_audio: Some(AudioExtraction {
                codec: opts.audio_codec,
                quality: "0".to_string(),
            }),
            ..base
        }),
        FormatKind::InfoOnly => None,
    }
}
