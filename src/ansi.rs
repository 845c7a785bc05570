//! ANSI SGR style rendering
//!
//! Converts inbound text containing SGR escape codes into markup with
//! explicit styled regions, so the display side needs no knowledge of ANSI.
//! Only text attributes are handled; cursor movement and screen control are
//! out of scope for a line-oriented game stream.

use std::fmt::Write;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// VGA palette entry for an SGR color code (30-37 normal, 90-97 bright).
fn palette(code: u16) -> Option<&'static str> {
    Some(match code {
        30 => "rgb(0, 0, 0)",
        31 => "rgb(170, 0, 0)",
        32 => "rgb(0, 170, 0)",
        33 => "rgb(170, 85, 0)",
        34 => "rgb(0, 0, 170)",
        35 => "rgb(170, 0, 170)",
        36 => "rgb(0, 170, 170)",
        37 => "rgb(170, 170, 170)",
        90 => "rgb(85, 85, 85)",
        91 => "rgb(255, 85, 85)",
        92 => "rgb(85, 255, 85)",
        93 => "rgb(255, 255, 85)",
        94 => "rgb(85, 85, 255)",
        95 => "rgb(255, 85, 255)",
        96 => "rgb(85, 255, 255)",
        97 => "rgb(255, 255, 255)",
        _ => return None,
    })
}

/// Text attributes carried by one styled region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub bold: bool,
}

impl Style {
    pub fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && !self.bold
    }
}

/// Incremental SGR renderer for one session.
///
/// Servers routinely split a color code from the text it colors across
/// writes, so `current`/`pending` persist between [`render`](Self::render)
/// calls. A region boundary is only flushed when text actually arrives under
/// a changed style, which avoids emitting empty regions for back-to-back
/// codes. Call [`finish`](Self::finish) at end-of-stream to close an open
/// region.
pub struct StyleRenderer {
    /// Style of the currently open region
    current: Style,
    /// Style set by parsed codes, applied on the next text append
    pending: Style,
    /// Whether a region is open in the emitted markup
    in_region: bool,
}

impl Default for StyleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRenderer {
    pub fn new() -> Self {
        Self {
            current: Style::default(),
            pending: Style::default(),
            in_region: false,
        }
    }

    /// Render one decoded chunk into markup to append to the output stream.
    pub fn render(&mut self, text: &str) -> String {
        let mut out = String::new();
        let mut rest = text;

        while let Some(pos) = rest.find('\x1b') {
            self.append(&mut out, &rest[..pos]);
            let after = &rest[pos + 1..];
            let consumed = self.parse_code(after);
            rest = &after[consumed..];
        }
        self.append(&mut out, rest);
        out
    }

    /// Close any open region at end-of-stream and reset for reuse.
    pub fn finish(&mut self) -> String {
        let closing = if self.in_region {
            "</span>".to_string()
        } else {
            String::new()
        };
        *self = Self::new();
        closing
    }

    /// Parse the escape sequence starting just after ESC, returning how many
    /// bytes it consumed. Unrecognized sequences consume nothing and leave
    /// the style untouched.
    fn parse_code(&mut self, s: &str) -> usize {
        static INDEXED: OnceLock<Regex> = OnceLock::new();
        static RGB: OnceLock<Regex> = OnceLock::new();
        let indexed = INDEXED.get_or_init(|| Regex::new(r"^\[(1;)?(\d+)m").unwrap());
        let rgb = RGB.get_or_init(|| Regex::new(r"^\[(\d+);2;(\d+);(\d+);(\d+)m").unwrap());

        if let Some(caps) = indexed.captures(s) {
            let bold = caps.get(1).is_some();
            if let Ok(code) = caps[2].parse::<u16>() {
                self.set_color(code, bold);
            }
            return caps[0].len();
        }

        if let Some(caps) = rgb.captures(s) {
            let channels = (
                caps[2].parse::<u8>(),
                caps[3].parse::<u8>(),
                caps[4].parse::<u8>(),
            );
            if let (Ok(r), Ok(g), Ok(b)) = channels {
                // 24-bit color bypasses the palette and leaves bold alone
                self.pending.fg = Some(format!("rgb({},{},{})", r, g, b));
            }
            return caps[0].len();
        }

        debug!("ignoring unrecognized escape sequence");
        0
    }

    fn set_color(&mut self, code: u16, bold: bool) {
        self.pending.bold = bold;
        match code {
            0 => self.pending = Style::default(),
            30..=37 => {
                // The bold prefix promotes 30-37 to the bright palette entry
                let entry = if bold { code + 60 } else { code };
                self.pending.fg = palette(entry).map(str::to_owned);
            }
            90..=97 => self.pending.fg = palette(code).map(str::to_owned),
            40..=47 => self.pending.bg = palette(code + 50).map(str::to_owned),
            100..=107 => self.pending.bg = palette(code - 10).map(str::to_owned),
            other => debug!(code = other, "ignoring SGR code"),
        }
    }

    /// Append text under the pending style, flushing a region boundary only
    /// when the style actually changed.
    fn append(&mut self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.pending != self.current {
            if self.in_region {
                out.push_str("</span>");
            }
            if !self.pending.is_plain() {
                out.push_str("<span style='");
                if let Some(bg) = &self.pending.bg {
                    let _ = write!(out, "background-color: {};", bg);
                }
                if let Some(fg) = &self.pending.fg {
                    let _ = write!(out, "color: {};", fg);
                }
                if self.pending.bold {
                    out.push_str("font-weight: bold;");
                }
                out.push_str("'>");
                self.in_region = true;
            } else {
                self.in_region = false;
            }
            self.current = self.pending.clone();
        }
        out.push_str(text);
    }
}
