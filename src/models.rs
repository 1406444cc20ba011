use std::fmt;

use serde::{Deserialize, Serialize};

use crate::language::Direction;

/// The three user actions that share the exclusivity flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    TranslateSelection,
    AnalyzeGrammar,
    CorrectGrammar,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::TranslateSelection,
        ActionKind::AnalyzeGrammar,
        ActionKind::CorrectGrammar,
    ];

    /// Text on the quick-action button.
    pub fn button_label(&self) -> &'static str {
        match self {
            ActionKind::TranslateSelection => "Translate",
            ActionKind::AnalyzeGrammar => "Grammar Analysis",
            ActionKind::CorrectGrammar => "Grammar Correction",
        }
    }

    pub fn requires_english(&self) -> bool {
        !matches!(self, ActionKind::TranslateSelection)
    }

    /// Name used in log lines and error toasts.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::TranslateSelection => "Translation",
            ActionKind::AnalyzeGrammar => "Grammar analysis",
            ActionKind::CorrectGrammar => "Grammar correction",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarAnalysis {
    pub structure: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarCorrection {
    pub corrected: String,
    pub explanation: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// How a popup section body should be drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Original,
    Corrected,
    Monospace,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: String,
    pub tone: Tone,
}

impl Section {
    fn new(heading: impl Into<String>, body: impl Into<String>, tone: Tone) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
            tone,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopupContent {
    Loading {
        label: String,
    },
    Translation {
        original: String,
        translation: String,
        direction: Direction,
    },
    Analysis {
        original: String,
        analysis: GrammarAnalysis,
    },
    Correction {
        original: String,
        correction: GrammarCorrection,
    },
}

impl PopupContent {
    pub fn loading() -> Self {
        PopupContent::Loading {
            label: "Loading...".to_string(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PopupContent::Loading { .. })
    }

    pub fn title(&self) -> &'static str {
        match self {
            PopupContent::Loading { .. } => "",
            PopupContent::Translation { .. } => "Translation",
            PopupContent::Analysis { .. } => "Grammar Analysis",
            PopupContent::Correction { .. } => "Grammar Correction",
        }
    }

    pub fn sections(&self) -> Vec<Section> {
        match self {
            PopupContent::Loading { label } => vec![Section::new("", label.clone(), Tone::Plain)],
            PopupContent::Translation {
                original,
                translation,
                direction,
            } => vec![
                Section::new(direction.source_language(), original.clone(), Tone::Plain),
                Section::new(direction.target_language(), translation.clone(), Tone::Plain),
            ],
            PopupContent::Analysis { original, analysis } => vec![
                Section::new("Original Text", original.clone(), Tone::Plain),
                Section::new("Grammar Analysis", analysis.structure.clone(), Tone::Monospace),
            ],
            PopupContent::Correction {
                original,
                correction,
            } => vec![
                Section::new("Original Text", original.clone(), Tone::Original),
                Section::new("Corrected Text", correction.corrected.clone(), Tone::Corrected),
                Section::new("Explanation", correction.explanation.clone(), Tone::Plain),
            ],
        }
    }

    /// The part worth copying out of a finished popup.
    pub fn result_text(&self) -> Option<&str> {
        match self {
            PopupContent::Loading { .. } => None,
            PopupContent::Translation { translation, .. } => Some(translation),
            PopupContent::Analysis { analysis, .. } => Some(&analysis.structure),
            PopupContent::Correction { correction, .. } => Some(&correction.corrected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_sections_carry_language_headers() {
        let content = PopupContent::Translation {
            original: "你好世界".into(),
            translation: "Hello world".into(),
            direction: Direction::CjkToLatin,
        };
        let headings: Vec<_> = content.sections().into_iter().map(|s| s.heading).collect();
        assert_eq!(headings, ["Chinese", "English"]);
        assert_eq!(content.result_text(), Some("Hello world"));
    }

    #[test]
    fn correction_sections_use_distinct_tones() {
        let content = PopupContent::Correction {
            original: "he go".into(),
            correction: GrammarCorrection {
                corrected: "he goes".into(),
                explanation: "third person".into(),
            },
        };
        let tones: Vec<_> = content.sections().into_iter().map(|s| s.tone).collect();
        assert_eq!(tones, [Tone::Original, Tone::Corrected, Tone::Plain]);
    }

    #[test]
    fn only_grammar_actions_need_english() {
        assert!(!ActionKind::TranslateSelection.requires_english());
        assert!(ActionKind::AnalyzeGrammar.requires_english());
        assert_eq!(ActionKind::CorrectGrammar.to_string(), "Grammar correction");
    }
}
