//! Keyboard-chord translation and grammar help, drawn as floating popups over
//! a text page.
//!
//! The library holds everything but the terminal: gesture recognition,
//! selection memory, cursor-text extraction, the action dispatcher, the popup
//! overlay model and the DeepSeek client. The `chordlate` binary wires them to
//! a ratatui page.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod geometry;
pub mod gesture;
pub mod language;
pub mod logging;
pub mod models;
pub mod network;
pub mod overlay;
pub mod page;
pub mod placement;
pub mod prompts;
pub mod selection;
pub mod session;
pub mod store;
pub mod utils;
