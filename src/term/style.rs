//! # Extracted SGR attribute snapshot.
//!
//! [`Style`] is what the escape interpreter distills a node's output stream
//! down to: an optional foreground color, an optional background color, and
//! a bold flag. [`Style::render`] turns the snapshot back into an escape
//! string for the controlling terminal.

use std::fmt;

/// The eight standard ANSI colors (SGR codes 30–37 / 40–47 minus the base).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimpleColor {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

impl SimpleColor {
    /// Maps an SGR color offset (0–7) to a color; out-of-range is `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => SimpleColor::Black,
            1 => SimpleColor::Red,
            2 => SimpleColor::Green,
            3 => SimpleColor::Yellow,
            4 => SimpleColor::Blue,
            5 => SimpleColor::Magenta,
            6 => SimpleColor::Cyan,
            7 => SimpleColor::White,
            _ => return None,
        })
    }
}

/// Foreground/background/bold snapshot extracted from a node's output.
///
/// Each color may be "unset", meaning the node did not select one (or reset
/// it); the renderer then falls back to the terminal's standard colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Style {
    /// Selected foreground color, if any.
    pub fg: Option<SimpleColor>,
    /// Selected background color, if any.
    pub bg: Option<SimpleColor>,
    /// Bold attribute.
    pub bold: bool,
}

impl Style {
    /// Renders the snapshot as an SGR escape string.
    ///
    /// If both colors are set, the paired directive is emitted directly;
    /// otherwise the terminal is reset to its standard colors first and
    /// whichever color is set is applied on top. Bold is appended last.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match (self.fg, self.bg) {
            (Some(fg), Some(bg)) => {
                out.push_str(&format!("\x1b[3{};4{}m", fg as u8, bg as u8));
            }
            (fg, bg) => {
                out.push_str("\x1b[0m");
                if let Some(fg) = fg {
                    out.push_str(&format!("\x1b[3{}m", fg as u8));
                }
                if let Some(bg) = bg {
                    out.push_str(&format!("\x1b[4{}m", bg as u8));
                }
            }
        }
        if self.bold {
            out.push_str("\x1b[1m");
        }
        out
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
