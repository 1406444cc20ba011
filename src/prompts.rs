// Prompt builders for the three actions, and the parser for the
// delimited grammar-correction answer.

use crate::language::Direction;
use crate::models::GrammarCorrection;

pub const CORRECTED_MARKER: &str = "[[CORRECTED]]";
pub const EXPLANATION_MARKER: &str = "[[EXPLANATION]]";
pub const NO_CHANGES_EXPLANATION: &str = "No changes needed; the text is already correct.";

pub fn translate_prompt(text: &str, context: &str, direction: Direction) -> String {
    let context = if context.trim().is_empty() { "(none)" } else { context };
    match direction {
        Direction::CjkToLatin => format!(
            r#"You are a professional translator. Translate the Chinese text into natural English, choosing the wording that best fits the surrounding context.
Context: {context}
Chinese text: {text}
Reply with the translation only, no explanation."#
        ),
        Direction::LatinToCjk => format!(
            r#"You are a professional translator. Translate the English text into natural Simplified Chinese, choosing the wording that best fits the surrounding context.
Context: {context}
English text: {text}
Reply with the translation only, no explanation."#
        ),
    }
}

pub fn analysis_prompt(text: &str) -> String {
    format!(
        r#"You are an English grammar parser. Break the sentence into functional blocks only, never word by word.

Blocks to recognise:
- Core: S (subject) + V (verb type) + O (object type)
- Modifiers: AdjP / AdvP / PP
- Special: Clause (with its type) / Phrase (non-finite structure)

Output format, one block per line:
[sentence skeleton]
→ [core structure]
→ ([modifier type]@position)
→ (...)

Join coordinated parts with "&", mark nesting with ">", mark ellipsis with "∅".

Sentence: "{text}"

Follow the format strictly and add nothing else."#
    )
}

pub fn correction_prompt(text: &str) -> String {
    format!(
        r#"You are an English grammar teacher. Correct every grammar mistake and unnatural phrasing in the text below while keeping its meaning, so that it reads like a native speaker wrote it.

Text: "{text}"

Answer in exactly this layout and nothing else:
{CORRECTED_MARKER}
<the corrected text>
{EXPLANATION_MARKER}
<for each change: what changed, the grammar rule behind it, and a better way to say it, written in Chinese>"#
    )
}

/// Splits a correction answer on the two markers. Without markers, the first
/// paragraph is taken as the corrected text and the rest as explanation.
pub fn parse_correction(content: &str, original: &str) -> GrammarCorrection {
    let content = content.trim();
    let (corrected, explanation) = match (
        content.find(CORRECTED_MARKER),
        content.find(EXPLANATION_MARKER),
    ) {
        (Some(c), Some(e)) if c < e => (
            &content[c + CORRECTED_MARKER.len()..e],
            &content[e + EXPLANATION_MARKER.len()..],
        ),
        (Some(c), None) => (&content[c + CORRECTED_MARKER.len()..], ""),
        _ => match content.split_once("\n\n") {
            Some((first, rest)) => (first, rest),
            None => (content, ""),
        },
    };

    let corrected = corrected.trim();
    let explanation = explanation.trim();
    GrammarCorrection {
        corrected: if corrected.is_empty() { original } else { corrected }.to_string(),
        explanation: if explanation.is_empty() {
            NO_CHANGES_EXPLANATION
        } else {
            explanation
        }
        .to_string(),
    }
}
