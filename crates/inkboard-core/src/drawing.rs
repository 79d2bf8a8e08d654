//! Stroke segments and the drawing log that holds the whole board.
//!
//! The log is the unit of both local mutation and remote replication: every
//! stroke is appended here and the complete log is what gets saved.

use kurbo::{Line, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::Camera;
use crate::render::{StrokeTarget, stroke_color};

/// Board background color. Eraser segments paint with it.
pub const BOARD_BACKGROUND: &str = "#ffffff";
/// Default pen color for a fresh tool state.
pub const DEFAULT_COLOR: &str = "#000000";
/// Default stroke width in world units.
pub const DEFAULT_SIZE: f64 = 5.0;

/// Drawing log errors.
#[derive(Debug, Error)]
pub enum DrawingError {
    #[error("Corrupt drawing payload: {0}")]
    CorruptPayload(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
}

/// One straight line between two consecutive sampled points, in world space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
    /// Hex color string.
    pub color: String,
    /// Stroke width in world units.
    pub size: f64,
    pub tool: Tool,
}

impl Segment {
    /// A zero-length segment at `point`.
    pub fn dot(point: Point, tools: &ToolState) -> Self {
        tools.segment(point, point)
    }

    /// Whether start and end coincide.
    pub fn is_dot(&self) -> bool {
        self.start == self.end
    }

    fn validate(&self, index: usize) -> Result<(), DrawingError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(DrawingError::CorruptPayload(format!(
                "segment {} has a non-finite point",
                index
            )));
        }
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(DrawingError::CorruptPayload(format!(
                "segment {} has invalid size {}",
                index, self.size
            )));
        }
        Ok(())
    }
}

/// Current drawing preferences. Local only, never synchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    pub tool: Tool,
    pub color: String,
    pub size: f64,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: Tool::Pen,
            color: DEFAULT_COLOR.to_string(),
            size: DEFAULT_SIZE,
        }
    }
}

impl ToolState {
    /// Build a segment with the current preferences.
    ///
    /// Eraser segments carry the board background instead of the pen color.
    pub fn segment(&self, start: Point, end: Point) -> Segment {
        let color = match self.tool {
            Tool::Pen => self.color.clone(),
            Tool::Eraser => BOARD_BACKGROUND.to_string(),
        };
        Segment {
            start,
            end,
            color,
            size: self.size,
            tool: self.tool,
        }
    }

    /// Set the stroke width, ignoring non-positive values.
    pub fn set_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.size = size;
        }
    }
}

/// Ordered sequence of segments representing the whole board.
///
/// Replaying the segments in order reproduces the board exactly; later
/// strokes paint over earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawingLog {
    segments: Vec<Segment>,
}

impl DrawingLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Push a segment to the end of the log.
    ///
    /// A segment that could not be serialized back (non-finite point or bad
    /// size) is dropped with a warning so the log stays loadable.
    pub fn append(&mut self, segment: Segment) {
        if let Err(e) = segment.validate(self.segments.len()) {
            log::warn!("Dropping segment: {}", e);
            return;
        }
        self.segments.push(segment);
    }

    /// Swap in a new sequence, discarding the current one.
    pub fn replace_all(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
    }

    /// Empty the log.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Encode the log as a JSON array of segment records.
    pub fn serialize(&self) -> Result<String, DrawingError> {
        serde_json::to_string(&self.segments)
            .map_err(|e| DrawingError::Serialization(e.to_string()))
    }

    /// Decode a log produced by [`DrawingLog::serialize`].
    ///
    /// Fails with [`DrawingError::CorruptPayload`] on malformed JSON, missing
    /// fields, non-finite coordinates or non-positive sizes.
    pub fn deserialize(blob: &str) -> Result<Self, DrawingError> {
        let segments: Vec<Segment> = serde_json::from_str(blob)
            .map_err(|e| DrawingError::CorruptPayload(e.to_string()))?;
        for (index, segment) in segments.iter().enumerate() {
            segment.validate(index)?;
        }
        Ok(Self { segments })
    }

    /// Replay every segment in order onto `target` under `camera`.
    ///
    /// Widths are divided by the zoom so strokes keep the same apparent
    /// thickness at every zoom level.
    pub fn render<T: StrokeTarget + ?Sized>(&self, target: &mut T, camera: &Camera) {
        target.set_transform(camera.transform());
        for segment in &self.segments {
            target.stroke_line(
                Line::new(segment.start, segment.end),
                stroke_color(&segment.color),
                segment.size / camera.zoom,
            );
        }
    }
}

impl<'a> IntoIterator for &'a DrawingLog {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
