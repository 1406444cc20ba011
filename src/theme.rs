use ratatui::style::{Color, Modifier, Style};

use chordlate::models::{PopupContent, ToastKind, Tone};
use chordlate::overlay::LineKind;

pub struct Theme {
    pub text: Color,
    pub focus_border: Color,
    pub blurred_border: Color,
    pub selection: Style,
    pub popup_bg: Color,

    pub translation_border: Color,
    pub analysis_border: Color,
    pub correction_border: Color,
    pub loading_border: Color,

    pub popup_title: Style,
    pub close_button: Style,
    pub heading: Style,
    pub original_text: Style,
    pub corrected_text: Style,
    pub monospace: Style,
    pub hint: Style,

    pub button: Style,
    pub button_hover: Style,
    pub indicator: Style,
    pub footer: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Color::White,
            focus_border: Color::Cyan,
            blurred_border: Color::DarkGray,
            selection: Style::default().bg(Color::Rgb(66, 133, 244)).fg(Color::White),
            popup_bg: Color::Rgb(30, 30, 30),

            translation_border: Color::Rgb(66, 133, 244),
            analysis_border: Color::Rgb(249, 171, 0),
            correction_border: Color::Rgb(219, 68, 55),
            loading_border: Color::Gray,

            popup_title: Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            close_button: Style::default().fg(Color::Gray),
            heading: Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
            original_text: Style::default().fg(Color::Rgb(219, 68, 55)),
            corrected_text: Style::default().fg(Color::Rgb(15, 157, 88)),
            monospace: Style::default().fg(Color::Cyan),
            hint: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),

            button: Style::default().bg(Color::Rgb(66, 133, 244)).fg(Color::White),
            button_hover: Style::default()
                .bg(Color::Rgb(51, 103, 214))
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            indicator: Style::default().bg(Color::Rgb(249, 171, 0)).fg(Color::Black),
            footer: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        }
    }
}

impl Theme {
    pub fn popup_border(&self, content: &PopupContent) -> Style {
        let fg = match content {
            PopupContent::Loading { .. } => self.loading_border,
            PopupContent::Translation { .. } => self.translation_border,
            PopupContent::Analysis { .. } => self.analysis_border,
            PopupContent::Correction { .. } => self.correction_border,
        };
        Style::default().fg(fg).bg(self.popup_bg)
    }

    pub fn line(&self, kind: LineKind) -> Style {
        let style = match kind {
            LineKind::Heading => self.heading,
            LineKind::Blank | LineKind::Body(Tone::Plain) => Style::default().fg(self.text),
            LineKind::Body(Tone::Original) => self.original_text,
            LineKind::Body(Tone::Corrected) => self.corrected_text,
            LineKind::Body(Tone::Monospace) => self.monospace,
        };
        style.bg(self.popup_bg)
    }

    pub fn toast(&self, kind: ToastKind) -> Style {
        let bg = match kind {
            ToastKind::Success => Color::Rgb(15, 157, 88),
            ToastKind::Error => Color::Rgb(219, 68, 55),
            ToastKind::Info => Color::Rgb(66, 133, 244),
        };
        Style::default().bg(bg).fg(Color::White)
    }
}
