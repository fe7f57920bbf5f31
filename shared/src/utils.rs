use std::path::Path;

pub fn is_supported_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext, "txt" | "md" | "rst" | "html" | "htm" | "json" | "toml" | "rs")
}

pub fn is_web_locator(locator: &str) -> bool {
    let lower = locator.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("", 3), "");
    }

    #[test]
    fn web_locators_are_detected_case_insensitively() {
        assert!(is_web_locator("https://example.com/a"));
        assert!(is_web_locator("HTTP://example.com"));
        assert!(!is_web_locator("./notes/readme.md"));
    }

    #[test]
    fn supported_files_are_matched_by_extension() {
        assert!(is_supported_file(Path::new("docs/guide.md")));
        assert!(is_supported_file(Path::new("page.html")));
        assert!(!is_supported_file(Path::new("image.png")));
        assert!(!is_supported_file(Path::new("Makefile")));
    }
}
