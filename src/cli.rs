use std::env;
use std::path::PathBuf;

use anyhow::{bail, Result};

use tubegrab_core::models::media::FormatOptions;
use tubegrab_core::models::settings::AppSettings;

use crate::core::queue::RunOptions;

pub const USAGE: &str = "\
Usage: tubegrab [OPTIONS] <URL>...

Options:
  --format <video|audio|info-only>   What to fetch (default: video)
  --audio-format <mp3|m4a|wav|flac>  Codec for audio downloads (default: mp3)
  --quality <best|NNNp>              Maximum video height (default: 720p)
  --output-dir <path>                Destination directory
  --max-workers <n>                  Concurrent downloads (default: 4)
  --ytdlp <path>                     Use this yt-dlp binary
  -h, --help                         Print this help";

/// Raw command line. Unset options fall back to the saved settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub urls: Vec<String>,
    pub format: Option<String>,
    pub audio_format: Option<String>,
    pub quality: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_workers: Option<usize>,
    pub ytdlp: Option<PathBuf>,
    pub help: bool,
}

const VALUE_FLAGS: &[&str] = &[
    "--format",
    "--audio-format",
    "--quality",
    "--output-dir",
    "--max-workers",
    "--ytdlp",
];

impl CliArgs {
    pub fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    pub fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--" {
                parsed.urls.extend(args);
                break;
            }

            if arg == "-h" || arg == "--help" {
                parsed.help = true;
                continue;
            }

            if let Some((flag, value)) = arg.split_once('=') {
                if VALUE_FLAGS.contains(&flag) {
                    parsed.set(flag, value.to_string())?;
                    continue;
                }
            }

            if VALUE_FLAGS.contains(&arg.as_str()) {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{arg} requires a value"))?;
                parsed.set(&arg, value)?;
                continue;
            }

            if arg.starts_with('-') {
                bail!("unknown argument: {arg}");
            }

            parsed.urls.push(arg);
        }

        if !parsed.help && parsed.urls.is_empty() {
            bail!("at least one URL is required\n\n{USAGE}");
        }

        Ok(parsed)
    }

    fn set(&mut self, flag: &str, value: String) -> Result<()> {
        if value.is_empty() {
            bail!("{flag} requires a value");
        }
        match flag {
            "--format" => self.format = Some(value),
            "--audio-format" => self.audio_format = Some(value),
            "--quality" => self.quality = Some(value),
            "--output-dir" => self.output_dir = Some(PathBuf::from(value)),
            "--max-workers" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid --max-workers value: {value}"))?;
                if n == 0 {
                    bail!("--max-workers must be at least 1");
                }
                self.max_workers = Some(n);
            }
            "--ytdlp" => self.ytdlp = Some(PathBuf::from(value)),
            _ => bail!("unknown argument: {flag}"),
        }
        Ok(())
    }

    /// Merges the command line over `settings` and validates the format
    /// options. Nothing touches the network before this succeeds.
    pub fn into_run_options(&self, settings: &AppSettings) -> Result<RunOptions> {
        let dl = &settings.download;
        let format = FormatOptions::parse(
            self.format.as_deref().unwrap_or(&dl.format),
            self.audio_format.as_deref().unwrap_or(&dl.audio_format),
            self.quality.as_deref().unwrap_or(&dl.video_quality),
        )?;

        let max_workers = self
            .max_workers
            .unwrap_or(settings.advanced.max_workers)
            .max(1);

        Ok(RunOptions {
            format,
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| dl.default_output_dir.clone()),
            max_workers,
            embed_thumbnail: dl.embed_thumbnail,
            extra_flags: dl.extra_ytdlp_flags.clone(),
        })
    }

    pub fn engine_path(&self, settings: &AppSettings) -> Option<PathBuf> {
        self.ytdlp
            .clone()
            .or_else(|| settings.advanced.ytdlp_path.clone())
    }
}
