//! Isolates the same-script run sitting just before the caret of a focused
//! editable surface, together with the rest of its line as context.

use std::ops::Range;

use crate::geometry::Rect;
use crate::language::{Direction, ScriptClassifier, ScriptKind};
use crate::utils::char_slice;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    ContentEditable,
    TextInput,
    TextArea,
    ReadOnly,
}

impl SurfaceKind {
    pub fn is_editable(&self) -> bool {
        !matches!(self, SurfaceKind::ReadOnly)
    }
}

/// Anything with text and a caret that the host can focus.
/// Every offset is a char offset into `text()`.
pub trait EditableSurface {
    fn kind(&self) -> SurfaceKind;
    fn text(&self) -> &str;
    fn caret(&self) -> Option<usize>;
    fn bounds(&self) -> Rect;
    /// Replaces `start..end` and leaves the caret after the inserted text.
    fn replace_range(&mut self, start: usize, end: usize, replacement: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorContext {
    pub matched_text: String,
    pub direction: Direction,
    pub context: String,
    /// Char offset of the caret's line within the surface text.
    pub line_start: usize,
    /// Offsets of the matched run within the line.
    pub start: usize,
    pub end: usize,
    pub target: SurfaceId,
}

impl CursorContext {
    pub fn absolute_range(&self) -> Range<usize> {
        self.line_start + self.start..self.line_start + self.end
    }
}

/// `None` means the gesture does not apply here: not an editable surface,
/// no caret, or nothing recognisable before the caret.
pub fn extract_at_cursor(
    surface: &dyn EditableSurface,
    target: SurfaceId,
    classifier: &dyn ScriptClassifier,
) -> Option<CursorContext> {
    if !surface.kind().is_editable() {
        return None;
    }
    let text = surface.text();
    let chars: Vec<char> = text.chars().collect();
    let caret = surface.caret()?.min(chars.len());

    let line_start = chars[..caret]
        .iter()
        .rposition(|c| *c == '\n')
        .map_or(0, |i| i + 1);
    let line_end = chars[caret..]
        .iter()
        .position(|c| *c == '\n')
        .map_or(chars.len(), |i| caret + i);
    let line = char_slice(text, line_start, line_end);
    let caret_in_line = caret - line_start;
    let before = char_slice(&line, 0, caret_in_line);

    let run = classifier.trailing_run(&before)?;
    let (start, end) = match run.kind {
        ScriptKind::Cjk => (run.start, caret_in_line),
        ScriptKind::Latin | ScriptKind::Other => {
            let trimmed = run.text.trim();
            if trimmed.is_empty() {
                return None;
            }
            let lead = run.text.chars().take_while(|c| c.is_whitespace()).count();
            let trail = run.text.chars().rev().take_while(|c| c.is_whitespace()).count();
            (run.start + lead, caret_in_line - trail)
        }
    };

    let matched_text = char_slice(&line, start, end);
    let line_len = line.chars().count();
    let context = format!(
        "{}{}",
        char_slice(&line, 0, start),
        char_slice(&line, end, line_len)
    )
    .trim()
    .to_string();

    Some(CursorContext {
        matched_text,
        direction: Direction::from_script(run.kind),
        context,
        line_start,
        start,
        end,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::RegexClassifier;

    struct Field {
        kind: SurfaceKind,
        text: String,
        caret: Option<usize>,
    }

    impl Field {
        fn new(kind: SurfaceKind, text: &str, caret: usize) -> Self {
            Self {
                kind,
                text: text.to_string(),
                caret: Some(caret),
            }
        }
    }

    impl EditableSurface for Field {
        fn kind(&self) -> SurfaceKind {
            self.kind
        }
        fn text(&self) -> &str {
            &self.text
        }
        fn caret(&self) -> Option<usize> {
            self.caret
        }
        fn bounds(&self) -> Rect {
            Rect::default()
        }
        fn replace_range(&mut self, _start: usize, _end: usize, _replacement: &str) {}
    }

    fn extract(field: &Field) -> Option<CursorContext> {
        extract_at_cursor(field, SurfaceId(7), &RegexClassifier)
    }

    #[test]
    fn cjk_run_before_caret_is_taken_whole() {
        for (text, run) in [("你好", "你好"), ("Say 你好世界", "你好世界"), ("。我们", "我们")] {
            let caret = text.chars().count();
            let ctx = extract(&Field::new(SurfaceKind::TextInput, text, caret)).unwrap();
            assert_eq!(ctx.direction, Direction::CjkToLatin);
            assert_eq!(ctx.matched_text, run, "{text}");
            assert_eq!(ctx.end, caret);
        }
    }

    #[test]
    fn latin_run_is_trimmed_and_offsets_follow_trim() {
        let field = Field::new(SurfaceKind::TextArea, "我想说 good morning  ", 17);
        let ctx = extract(&field).unwrap();
        assert_eq!(ctx.direction, Direction::LatinToCjk);
        assert_eq!(ctx.matched_text, "good morning");
        assert_eq!((ctx.start, ctx.end), (4, 16));
        assert_eq!(ctx.context, "我想说");
    }

    #[test]
    fn only_the_caret_line_is_considered() {
        let text = "first line\nhello 世界\nthird";
        let caret = "first line\nhello 世界".chars().count();
        let ctx = extract(&Field::new(SurfaceKind::ContentEditable, text, caret)).unwrap();
        assert_eq!(ctx.matched_text, "世界");
        assert_eq!(ctx.line_start, 11);
        assert_eq!(ctx.context, "hello");
        assert_eq!(ctx.absolute_range(), 17..19);
    }

    #[test]
    fn context_keeps_text_after_the_caret() {
        let text = "see 苹果 here";
        let ctx = extract(&Field::new(SurfaceKind::TextInput, text, 6)).unwrap();
        assert_eq!(ctx.matched_text, "苹果");
        assert_eq!(ctx.context, "see  here");
    }

    #[test]
    fn no_text_found_cases() {
        assert!(extract(&Field::new(SurfaceKind::ReadOnly, "hello", 5)).is_none());
        assert!(extract(&Field::new(SurfaceKind::TextInput, "hello   ", 0)).is_none());
        assert!(extract(&Field::new(SurfaceKind::TextInput, "hello\n   ", 9)).is_none());
        assert!(extract(&Field::new(SurfaceKind::TextInput, "5€", 2)).is_none());
        let no_caret = Field {
            kind: SurfaceKind::TextInput,
            text: "hello".into(),
            caret: None,
        };
        assert!(extract(&no_caret).is_none());
    }
}
