/// Maximum length of a sanitized filename, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Replace any character outside `[A-Za-z0-9_.-]` with `_` and truncate to
/// [`MAX_FILENAME_LEN`] bytes.
///
/// Idempotent: `sanitize_filename(sanitize_filename(x)) == sanitize_filename(x)`,
/// since the output alphabet is a subset of the allowed one and truncation of
/// an already-truncated string is a no-op.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.len() <= MAX_FILENAME_LEN {
        cleaned
    } else {
        cleaned.chars().take(MAX_FILENAME_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_disallowed_characters() {
        assert_eq!(sanitize_filename("re port/v1 (final).txt"), "re_port_v1__final_.txt");
    }

    #[test]
    fn leaves_allowed_characters_untouched() {
        assert_eq!(sanitize_filename("leak-2024_report.v2.txt"), "leak-2024_report.v2.txt");
    }

    #[test]
    fn truncates_to_max_len() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn is_idempotent() {
        let name = "wëird näme!! report.pdf";
        let once = sanitize_filename(name);
        let twice = sanitize_filename(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn idempotent_after_truncation() {
        let long = format!("{}.txt", "é".repeat(400));
        let once = sanitize_filename(&long);
        let twice = sanitize_filename(&once);
        assert_eq!(once, twice);
    }
}
