use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const MAX_TITLE_CHARS: usize = 200;
// leaves room for the extension within the common 255-byte name limit
const MAX_TITLE_BYTES: usize = 240;
const FALLBACK_TITLE: &str = "video";

pub fn sanitize_path_component(name: &str) -> String {
    let name: String = name.nfc().collect();
    let name = name.trim().replace(['\t', '\n', '\r'], " ");
    let name = WS_RE.replace_all(&name, " ");
    let name = name.replace(" | ", "｜");

    let name = name.trim_end_matches([' ', '-', '.', ';']);

    let forbidden: &[(char, char)] = &[
        ('<', '＜'),
        ('>', '＞'),
        (':', '꞉'),
        ('"', '＂'),
        ('/', '⧸'),
        ('\\', '＼'),
        ('|', '｜'),
        ('?', '？'),
        ('*', ' '),
    ];

    let mut result = name.to_string();
    for (from, to) in forbidden {
        result = result.replace(*from, &to.to_string());
    }

    result.trim().to_string()
}

/// File stem for an item title. Same title, same stem: skip-if-exists relies
/// on every run computing the identical path.
pub fn sanitize_title(title: &str) -> String {
    let cleaned = sanitize_filename::sanitize_with_options(
        sanitize_path_component(title),
        sanitize_filename::Options {
            windows: true,
            truncate: false,
            replacement: "",
        },
    );

    let mut truncated = String::new();
    for c in cleaned.chars().take(MAX_TITLE_CHARS) {
        if truncated.len() + c.len_utf8() > MAX_TITLE_BYTES {
            break;
        }
        truncated.push(c);
    }
    let truncated = truncated.trim().trim_end_matches('.').to_string();
    if truncated.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        truncated
    }
}

/// Escapes a literal path for use inside an engine output template.
pub fn escape_template(path: &str) -> String {
    path.replace('%', "%%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_basic_forbidden_chars() {
        assert_eq!(sanitize_path_component("a:b?c"), "a꞉b？c");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_path_component("hello \t  world"), "hello world");
    }

    #[test]
    fn sanitize_trims_trailing_punctuation() {
        assert_eq!(sanitize_path_component("file name - "), "file name");
    }

    #[test]
    fn sanitize_unicode_nfc_normalization() {
        let decomposed = "e\u{0301}";
        assert_eq!(sanitize_path_component(decomposed), "\u{00e9}");
    }

    #[test]
    fn sanitize_pipe_separator() {
        assert_eq!(sanitize_path_component("a | b"), "a｜b");
    }

    #[test]
    fn sanitize_windows_forbidden_paths() {
        let chars = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
        for c in chars {
            let input = format!("test{}file", c);
            let result = sanitize_title(&input);
            assert!(!result.contains(c), "char '{}' should be replaced", c);
        }
    }

    #[test]
    fn title_is_deterministic() {
        let title = "Lo-fi Beats: \"Study\" / Relax | 2024";
        assert_eq!(sanitize_title(title), sanitize_title(title));
    }

    #[test]
    fn title_falls_back_when_empty() {
        assert_eq!(sanitize_title(""), "video");
        assert_eq!(sanitize_title("  ...  "), "video");
    }

    #[test]
    fn title_truncated_by_chars_and_bytes() {
        assert_eq!(sanitize_title(&"a".repeat(300)).chars().count(), 200);
        let result = sanitize_title(&"é".repeat(300));
        assert_eq!(result.chars().count(), 120);
        assert!(result.len() <= 240);
    }

    #[test]
    fn template_percent_escaped() {
        assert_eq!(escape_template("/d/100% real"), "/d/100%% real");
    }
}
