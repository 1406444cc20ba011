use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// CJK Unified Ideographs block.
static CJK_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4E00}-\u{9FFF}]").unwrap());
static CJK_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4E00}-\u{9FFF}]+$").unwrap());
static LATIN_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").unwrap());
static LATIN_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[A-Za-z0-9\s.,;:'"!?()\[\]{}]+$"#).unwrap());

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptKind {
    Cjk,
    Latin,
    Other,
}

/// Which way a fragment gets translated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Chinese source, English target.
    CjkToLatin,
    /// English source, Chinese target.
    LatinToCjk,
}

impl Direction {
    /// Anything that is not CJK is sent the English-to-Chinese way.
    pub fn from_script(kind: ScriptKind) -> Self {
        match kind {
            ScriptKind::Cjk => Direction::CjkToLatin,
            ScriptKind::Latin | ScriptKind::Other => Direction::LatinToCjk,
        }
    }

    /// Stable tag used in cache keys and request logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::CjkToLatin => "zh-to-en",
            Direction::LatinToCjk => "en-to-zh",
        }
    }

    pub fn source_language(&self) -> &'static str {
        match self {
            Direction::CjkToLatin => "Chinese",
            Direction::LatinToCjk => "English",
        }
    }

    pub fn target_language(&self) -> &'static str {
        match self {
            Direction::CjkToLatin => "English",
            Direction::LatinToCjk => "Chinese",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A same-script run that ends exactly at the end of the searched text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptRun {
    pub kind: ScriptKind,
    /// Char offset of the first character of the run.
    pub start: usize,
    /// The run as matched, untrimmed.
    pub text: String,
}

pub trait ScriptClassifier: Send + Sync {
    fn classify(&self, text: &str) -> ScriptKind;

    /// Longest run of one script that is right-anchored at the end of `text`.
    /// CJK is tried before Latin.
    fn trailing_run(&self, text: &str) -> Option<ScriptRun>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RegexClassifier;

impl ScriptClassifier for RegexClassifier {
    fn classify(&self, text: &str) -> ScriptKind {
        if CJK_CHAR.is_match(text) {
            ScriptKind::Cjk
        } else if LATIN_CHAR.is_match(text) {
            ScriptKind::Latin
        } else {
            ScriptKind::Other
        }
    }

    fn trailing_run(&self, text: &str) -> Option<ScriptRun> {
        let (kind, m) = if let Some(m) = CJK_TAIL.find(text) {
            (ScriptKind::Cjk, m)
        } else {
            (ScriptKind::Latin, LATIN_TAIL.find(text)?)
        };
        Some(ScriptRun {
            kind,
            start: text[..m.start()].chars().count(),
            text: m.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prefers_cjk_when_any_ideograph_present() {
        let c = RegexClassifier;
        assert_eq!(c.classify("hello 世界"), ScriptKind::Cjk);
        assert_eq!(c.classify("The cat sat."), ScriptKind::Latin);
        assert_eq!(c.classify("12345 !?"), ScriptKind::Other);
    }

    #[test]
    fn direction_for_non_cjk_is_latin_to_cjk() {
        assert_eq!(Direction::from_script(ScriptKind::Other), Direction::LatinToCjk);
        assert_eq!(Direction::from_script(ScriptKind::Cjk).target_language(), "English");
    }

    #[test]
    fn trailing_run_takes_maximal_cjk_tail() {
        let run = RegexClassifier.trailing_run("abc 你好世界").unwrap();
        assert_eq!(run.kind, ScriptKind::Cjk);
        assert_eq!(run.text, "你好世界");
        assert_eq!(run.start, 4);
    }

    #[test]
    fn trailing_run_falls_back_to_latin() {
        let run = RegexClassifier.trailing_run("你好 good morning, ").unwrap();
        assert_eq!(run.kind, ScriptKind::Latin);
        assert_eq!(run.text, " good morning, ");
        assert_eq!(run.start, 2);
    }

    #[test]
    fn trailing_run_rejects_unknown_tail() {
        assert!(RegexClassifier.trailing_run("price: 5€").is_none());
        assert!(RegexClassifier.trailing_run("").is_none());
    }
}
