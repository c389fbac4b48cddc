//! # Terminal escape-sequence interpretation.
//!
//! Monitored nodes color their own output with ANSI SGR (Select Graphic
//! Rendition) sequences. To re-render that output inside a structured view,
//! the raw byte stream is fed through [`SgrParser`], an incremental state
//! machine that extracts color/attribute directives into a [`Style`]
//! snapshot, which a renderer can re-emit on the controlling terminal.
//!
//! ## Contents
//! - [`SgrParser`] — byte-at-a-time escape-sequence state machine
//! - [`Style`], [`SimpleColor`] — the extracted attribute snapshot

mod parser;
mod style;

pub use parser::SgrParser;
pub use style::{SimpleColor, Style};
