use anyhow::Result;
use unicode_width::UnicodeWidthStr;

use crate::geometry::Size;

/// Byte index of the `char_idx`-th char, clamped to the end of `s`.
pub fn char_to_byte(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map_or(s.len(), |(byte, _)| byte)
}

/// Chars `start..end` of `s` as an owned string. Out-of-range bounds clamp.
pub fn char_slice(s: &str, start: usize, end: usize) -> String {
    if end <= start {
        return String::new();
    }
    s.chars().skip(start).take(end - start).collect()
}

/// Replaces chars `start..end` of `s` with `replacement`.
pub fn replace_chars(s: &mut String, start: usize, end: usize, replacement: &str) {
    let from = char_to_byte(s, start);
    let to = char_to_byte(s, end.max(start));
    s.replace_range(from..to, replacement);
}

/// Terminal cells taken by `s` on one line.
pub fn display_width(s: &str) -> i32 {
    i32::try_from(UnicodeWidthStr::width(s)).unwrap_or(i32::MAX)
}

/// Current terminal size in cells.
pub fn viewport_size() -> Result<Size> {
    let (cols, rows) = crossterm::terminal::size()?;
    Ok(Size::new(i32::from(cols), i32::from(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_helpers_respect_multibyte_text() {
        let s = "ab你好cd";
        assert_eq!(char_to_byte(s, 3), 5);
        assert_eq!(char_to_byte(s, 99), s.len());
        assert_eq!(char_slice(s, 2, 4), "你好");
        assert_eq!(char_slice(s, 4, 2), "");
    }

    #[test]
    fn replace_chars_swaps_the_range() {
        let mut s = String::from("say 你好 now");
        replace_chars(&mut s, 4, 6, "hello");
        assert_eq!(s, "say hello now");
    }

    #[test]
    fn wide_chars_take_two_cells() {
        assert_eq!(display_width("ab"), 2);
        assert_eq!(display_width("你好"), 4);
    }
}
