//! Stroke target abstraction for replaying a drawing log.
//!
//! Rasterization itself belongs to the host: anything that can set a
//! transform and stroke a straight line can display the board.

use kurbo::{Affine, Line};
use peniko::Color;

/// Color used when a segment carries a color string that cannot be parsed.
pub fn fallback_stroke() -> Color {
    Color::from_rgba8(0, 0, 0, 255)
}

/// Trait for drawing backends.
pub trait StrokeTarget {
    /// Set the world-to-screen transform for the following strokes.
    fn set_transform(&mut self, transform: Affine);

    /// Stroke a straight line in world coordinates with a round cap.
    ///
    /// `width` is already compensated for zoom, so the target applies the
    /// transform to it as usual.
    fn stroke_line(&mut self, line: Line, color: Color, width: f64);
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into RGBA8 components.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 4]> {
    let digits = hex.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    match digits.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (i, c) in digits.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgba[i] = v * 17;
            }
            Some(rgba)
        }
        6 | 8 => {
            let r = channel(&digits[0..2])?;
            let g = channel(&digits[2..4])?;
            let b = channel(&digits[4..6])?;
            let a = if digits.len() == 8 {
                channel(&digits[6..8])?
            } else {
                255
            };
            Some([r, g, b, a])
        }
        _ => None,
    }
}

/// Resolve a segment color string to a drawable color.
pub fn stroke_color(hex: &str) -> Color {
    match parse_hex_color(hex) {
        Some([r, g, b, a]) => Color::from_rgba8(r, g, b, a),
        None => {
            log::warn!("Unparsable stroke color {:?}, drawing black", hex);
            fallback_stroke()
        }
    }
}

/// A single recorded draw command.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Transform(Affine),
    Stroke { line: Line, color: Color, width: f64 },
}

/// A target that records every command instead of drawing.
///
/// Useful as a display list for hosts that rasterize later, and in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingTarget {
    pub commands: Vec<DrawCommand>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over recorded strokes as `(line, width)` pairs.
    pub fn strokes(&self) -> impl Iterator<Item = (Line, f64)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Stroke { line, width, .. } => Some((*line, *width)),
            DrawCommand::Transform(_) => None,
        })
    }

    /// The most recently set transform, if any.
    pub fn last_transform(&self) -> Option<Affine> {
        self.commands.iter().rev().find_map(|cmd| match cmd {
            DrawCommand::Transform(t) => Some(*t),
            DrawCommand::Stroke { .. } => None,
        })
    }
}

impl StrokeTarget for RecordingTarget {
    fn set_transform(&mut self, transform: Affine) {
        self.commands.push(DrawCommand::Transform(transform));
    }

    fn stroke_line(&mut self, line: Line, color: Color, width: f64) {
        self.commands.push(DrawCommand::Stroke { line, color, width });
    }
}
