use std::time::Instant;

use anyhow::Result;
use arboard::Clipboard;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode, MouseButton,
    MouseEvent, MouseEventKind,
};
use tracing::{debug, warn};

use chordlate::geometry::{Point, Size};
use chordlate::gesture::{GestureAction, Key, KeyDown};
use chordlate::models::{ActionKind, ToastKind};
use chordlate::overlay::{Overlay, OverlayManager};
use chordlate::page::TerminalPage;
use chordlate::session::Session;

pub type PageSession = Session<TerminalPage, OverlayManager>;

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub fn handle_event(event: Event, session: &mut PageSession, now: Instant) -> Result<Flow> {
    match event {
        Event::Key(key) => Ok(handle_key(key, session, now)),
        Event::Mouse(mouse) => {
            handle_mouse(mouse, session, now);
            Ok(Flow::Continue)
        }
        Event::Resize(cols, rows) => {
            session
                .workspace()
                .overlay
                .set_viewport(Size::new(i32::from(cols), i32::from(rows)));
            Ok(Flow::Continue)
        }
        _ => Ok(Flow::Continue),
    }
}

/// Maps a terminal key event onto the chord machine's view of it.
///
/// Bare modifier presses only arrive with keyboard enhancement enabled.
/// Crossterm reports SHIFT on every uppercase letter, so the flag is only
/// kept for keys that cannot be typed.
pub fn to_key_down(key: &KeyEvent) -> KeyDown {
    let chord_key = match key.code {
        KeyCode::Modifier(ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl) => {
            Key::Control
        }
        KeyCode::Modifier(ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift) => Key::Shift,
        _ => Key::Other,
    };
    let mut down = KeyDown::key(chord_key);
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        down = down.with_ctrl();
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) && !matches!(key.code, KeyCode::Char(_)) {
        down = down.with_shift();
    }
    if key.kind == KeyEventKind::Repeat {
        down = down.repeated();
    }
    down
}

fn handle_key(key: KeyEvent, session: &mut PageSession, now: Instant) -> Flow {
    if key.kind == KeyEventKind::Release {
        return Flow::Continue;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('q') if ctrl => return Flow::Quit,
        KeyCode::Char('y') if ctrl => {
            // The Ctrl press belongs to the shortcut, not to a chord.
            session.interrupt_chords();
            copy_result(session, now);
            return Flow::Continue;
        }
        _ => {}
    }

    session.key_down(to_key_down(&key), now);

    match key.code {
        KeyCode::Esc => {
            session.dispatcher().dismiss_active_popup();
            session.workspace().overlay.hide_quick_actions();
        }
        KeyCode::F(2) => session.run(ActionKind::TranslateSelection),
        KeyCode::F(3) => session.run(ActionKind::AnalyzeGrammar),
        KeyCode::F(4) => session.run(ActionKind::CorrectGrammar),
        KeyCode::F(5) => session.perform(GestureAction::TranslateAtCursor),
        KeyCode::Tab => session.workspace().document.toggle_focus(),
        KeyCode::Char(ch) if !ctrl => {
            session.interrupt_chords();
            let ch = if key.modifiers.contains(KeyModifiers::SHIFT) && ch.is_ascii_lowercase() {
                ch.to_ascii_uppercase()
            } else {
                ch
            };
            session.workspace().document.type_char(ch);
        }
        KeyCode::Enter => session.workspace().document.type_char('\n'),
        KeyCode::Backspace => session.workspace().document.editor_mut().backspace(),
        KeyCode::Delete => session.workspace().document.editor_mut().delete(),
        KeyCode::Left => session.workspace().document.editor_mut().move_left(),
        KeyCode::Right => session.workspace().document.editor_mut().move_right(),
        KeyCode::Up => session.workspace().document.editor_mut().move_vertical(-1),
        KeyCode::Down => session.workspace().document.editor_mut().move_vertical(1),
        KeyCode::Home => session.workspace().document.editor_mut().move_home(),
        KeyCode::End => session.workspace().document.editor_mut().move_end(),
        _ => {}
    }
    Flow::Continue
}

fn handle_mouse(mouse: MouseEvent, session: &mut PageSession, now: Instant) {
    let point = Point::new(i32::from(mouse.column), i32::from(mouse.row));
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if !session.pointer_down(point) {
                session.workspace().document.mouse_down(point);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if !session.pointer_drag(point) {
                session.workspace().document.mouse_drag(point);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            session.workspace().document.mouse_up();
            session.pointer_up(now);
        }
        MouseEventKind::Moved => session.pointer_move(point, now),
        _ => {}
    }
}

fn copy_result(session: &mut PageSession, now: Instant) {
    let Some(text) = session.active_result() else {
        debug!("nothing to copy");
        return;
    };
    let copied = Clipboard::new().and_then(|mut cb| cb.set_text(text));
    let (message, kind) = match copied {
        Ok(()) => ("Copied to clipboard", ToastKind::Success),
        Err(e) => {
            warn!(error = %e, "clipboard unavailable");
            ("Clipboard unavailable", ToastKind::Error)
        }
    };
    session.workspace().overlay.show_toast(message, kind, now);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn bare_modifiers_map_to_chord_keys() {
        let ctrl = to_key_down(&key(
            KeyCode::Modifier(ModifierKeyCode::LeftControl),
            KeyModifiers::CONTROL,
        ));
        assert_eq!(ctrl.key, Key::Control);
        assert!(ctrl.ctrl);

        let shift = to_key_down(&key(
            KeyCode::Modifier(ModifierKeyCode::RightShift),
            KeyModifiers::SHIFT,
        ));
        assert_eq!(shift.key, Key::Shift);
        assert!(shift.shift);
    }

    #[test]
    fn typed_uppercase_does_not_carry_shift() {
        let down = to_key_down(&key(KeyCode::Char('A'), KeyModifiers::SHIFT));
        assert_eq!(down.key, Key::Other);
        assert!(!down.shift);

        let arrow = to_key_down(&key(KeyCode::Left, KeyModifiers::SHIFT));
        assert!(arrow.shift);
    }

    #[test]
    fn repeats_are_flagged() {
        let mut event = key(
            KeyCode::Modifier(ModifierKeyCode::LeftControl),
            KeyModifiers::CONTROL,
        );
        event.kind = KeyEventKind::Repeat;
        assert!(to_key_down(&event).repeat);
    }
}
