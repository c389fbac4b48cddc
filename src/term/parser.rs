//! # Incremental SGR escape-sequence parser.
//!
//! [`SgrParser`] consumes one byte at a time and tracks the color/attribute
//! state a terminal would be in after printing the stream so far. It only
//! interprets SGR (`ESC [ ... m`) sequences; everything else passes through
//! untouched.
//!
//! ## State machine
//! ```text
//!            0x1B            '['
//!  Ground ────────► SawEscape ────────► InParameterSequence
//!    ▲                  │ other              │         │ other (≤ 16 bytes)
//!    │◄─────────────────┘                    │ 'm'     ▼ buffered
//!    │◄──────────────────────────────────────┘    (overflow ⇒ Ground)
//! ```
//!
//! ## Fail-soft rules
//! - A parameter buffer longer than 16 bytes aborts the sequence back to
//!   `Ground` without error.
//! - A malformed numeric token resets both colors to "unset" and stops
//!   interpreting that sequence.
//! - Unrecognized SGR codes are ignored.

use super::style::{SimpleColor, Style};

/// Parameter-buffer bound; oversized sequences are dropped.
const MAX_PARAM_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    Ground,
    SawEscape,
    InParameterSequence,
}

/// Incremental SGR parser maintaining a [`Style`] snapshot.
#[derive(Clone, Debug)]
pub struct SgrParser {
    state: ParseState,
    buf: Vec<u8>,
    style: Style,
}

impl Default for SgrParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SgrParser {
    /// Creates a parser in `Ground` with all attributes unset.
    pub fn new() -> Self {
        Self {
            state: ParseState::Ground,
            buf: Vec::with_capacity(MAX_PARAM_LEN),
            style: Style::default(),
        }
    }

    /// Current attribute snapshot.
    pub fn style(&self) -> Style {
        self.style
    }

    /// Feeds a single byte.
    pub fn feed(&mut self, byte: u8) {
        match self.state {
            ParseState::Ground => {
                if byte == 0x1b {
                    self.state = ParseState::SawEscape;
                }
            }
            ParseState::SawEscape => {
                if byte == b'[' {
                    self.buf.clear();
                    self.state = ParseState::InParameterSequence;
                } else {
                    self.state = ParseState::Ground;
                }
            }
            ParseState::InParameterSequence => {
                if byte == b'm' {
                    self.apply_parameters();
                    self.state = ParseState::Ground;
                } else {
                    self.buf.push(byte);
                    if self.buf.len() >= MAX_PARAM_LEN {
                        self.state = ParseState::Ground;
                    }
                }
            }
        }
    }

    /// Feeds a whole byte slice.
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.feed(b);
        }
    }

    /// Interprets the accumulated buffer as semicolon-separated SGR codes.
    fn apply_parameters(&mut self) {
        // A lone "ESC [ m" carries no codes; nothing to apply.
        if self.buf.is_empty() {
            return;
        }

        let params = std::mem::take(&mut self.buf);
        for token in params.split(|&b| b == b';') {
            let code = match std::str::from_utf8(token)
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
            {
                Some(code) => code,
                None => {
                    // Malformed token: drop colors and bail out.
                    self.style.fg = None;
                    self.style.bg = None;
                    return;
                }
            };

            match code {
                0 => {
                    self.style.fg = None;
                    self.style.bg = None;
                }
                1 => self.style.bold = true,
                30..=37 => self.style.fg = SimpleColor::from_code(code - 30),
                40..=47 => self.style.bg = SimpleColor::from_code(code - 40),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fed(bytes: &[u8]) -> SgrParser {
        let mut p = SgrParser::new();
        p.feed_bytes(bytes);
        p
    }

    #[test]
    fn red_bold_sequence() {
        let p = fed(b"\x1b[31;1m");
        assert_eq!(p.style().fg, Some(SimpleColor::Red));
        assert_eq!(p.style().bg, None);
        assert!(p.style().bold);
    }

    #[test]
    fn reset_clears_both_colors() {
        let mut p = fed(b"\x1b[31;44m");
        assert_eq!(p.style().fg, Some(SimpleColor::Red));
        assert_eq!(p.style().bg, Some(SimpleColor::Blue));

        p.feed_bytes(b"\x1b[0m");
        assert_eq!(p.style().fg, None);
        assert_eq!(p.style().bg, None);
    }

    #[test]
    fn background_codes() {
        let p = fed(b"\x1b[42m");
        assert_eq!(p.style().bg, Some(SimpleColor::Green));
        assert_eq!(p.style().fg, None);
    }

    #[test]
    fn oversized_sequence_returns_to_ground() {
        let mut p = fed(b"\x1b[1111111111111111111111111");
        // Still no terminator seen; the parser must already be back in
        // Ground, so ordinary text leaves the style untouched.
        p.feed_bytes(b"plain text\x1b[31m");
        assert_eq!(p.style().fg, Some(SimpleColor::Red));
        assert!(!p.style().bold);
    }

    #[test]
    fn malformed_token_resets_colors() {
        let p = fed(b"\x1b[31m\x1b[3x;1m");
        assert_eq!(p.style().fg, None);
        assert_eq!(p.style().bg, None);
    }

    #[test]
    fn non_csi_escape_returns_to_ground() {
        let p = fed(b"\x1b(B\x1b[33m");
        assert_eq!(p.style().fg, Some(SimpleColor::Yellow));
    }

    #[test]
    fn unrecognized_codes_are_ignored() {
        let p = fed(b"\x1b[31m\x1b[7m");
        assert_eq!(p.style().fg, Some(SimpleColor::Red));
    }

    #[test]
    fn empty_parameter_list_is_a_noop() {
        let p = fed(b"\x1b[31m\x1b[m");
        assert_eq!(p.style().fg, Some(SimpleColor::Red));
        assert_eq!(p.style().bg, None);
    }

    #[test]
    fn interleaved_text_does_not_disturb_parsing() {
        let p = fed(b"hello \x1b[3");
        // Mid-sequence; feed the rest later.
        let mut p = p;
        p.feed_bytes(b"5m world");
        assert_eq!(p.style().fg, Some(SimpleColor::Magenta));
    }
}
