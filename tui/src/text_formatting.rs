use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

/// Longest prefix of `text` whose display width fits in `max_width`.
pub fn take_prefix_by_width(text: &str, max_width: usize) -> &str {
    if max_width == 0 {
        return "";
    }
    if UnicodeWidthStr::width(text) <= max_width {
        return text;
    }

    let mut used_width = 0usize;
    let mut end = 0usize;
    for (idx, ch) in text.char_indices() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used_width + ch_width > max_width {
            break;
        }
        used_width += ch_width;
        end = idx + ch.len_utf8();
    }
    &text[..end]
}

/// Drops leading characters of `text` until at least `skip_width` columns are gone.
pub fn skip_prefix_by_width(text: &str, skip_width: usize) -> &str {
    let mut skipped = 0usize;
    for (idx, ch) in text.char_indices() {
        if skipped >= skip_width {
            return &text[idx..];
        }
        skipped += UnicodeWidthChar::width(ch).unwrap_or(0);
    }
    ""
}

/// Truncates to `max_width` columns, ending with `…` when something was cut.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut truncated = take_prefix_by_width(text, max_width - 1).to_string();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn take_prefix_respects_wide_chars() {
        assert_eq!(take_prefix_by_width("hello", 3), "hel");
        assert_eq!(take_prefix_by_width("👻👻", 3), "👻");
        assert_eq!(take_prefix_by_width("abc", 0), "");
        assert_eq!(take_prefix_by_width("abc", 10), "abc");
    }

    #[test]
    fn skip_prefix_counts_columns() {
        assert_eq!(skip_prefix_by_width("hello", 2), "llo");
        assert_eq!(skip_prefix_by_width("👻ab", 1), "ab");
        assert_eq!(skip_prefix_by_width("ab", 5), "");
        assert_eq!(skip_prefix_by_width("ab", 0), "ab");
    }

    #[test]
    fn truncate_with_ellipsis_only_when_needed() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("a longer line", 6), "a lon…");
        assert_eq!(truncate_with_ellipsis("abc", 0), "");
    }
}
