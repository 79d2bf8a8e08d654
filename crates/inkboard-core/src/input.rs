//! Input events delivered by the host surface, in screen coordinates.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Buttons that start a pan gesture instead of a stroke.
    pub fn is_pan_trigger(self) -> bool {
        matches!(self, MouseButton::Middle | MouseButton::Right)
    }
}

/// Pointer event type for unified mouse/pen handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, button: MouseButton },
    Move { position: Point },
    Up { position: Point, button: MouseButton },
    Wheel { position: Point, delta: Vec2 },
}

impl PointerEvent {
    /// Whether every coordinate the event carries is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            PointerEvent::Wheel { position, delta } => position.is_finite() && delta.is_finite(),
            _ => self.position().is_finite(),
        }
    }

    /// Screen position carried by the event.
    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Move { position }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Wheel { position, .. } => *position,
        }
    }
}

/// Touch event type. Only the first touch point is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TouchEvent {
    Start { touches: Vec<Point> },
    Move { touches: Vec<Point> },
    End,
}

impl TouchEvent {
    /// Translate to the equivalent primary-button pointer event.
    ///
    /// `last_position` is where the gesture was last seen; touch end events
    /// carry no coordinates of their own. Start/move events without any
    /// touch point map to `None`.
    pub fn to_pointer(&self, last_position: Point) -> Option<PointerEvent> {
        match self {
            TouchEvent::Start { touches } => touches.first().map(|&position| PointerEvent::Down {
                position,
                button: MouseButton::Left,
            }),
            TouchEvent::Move { touches } => touches
                .first()
                .map(|&position| PointerEvent::Move { position }),
            TouchEvent::End => Some(PointerEvent::Up {
                position: last_position,
                button: MouseButton::Left,
            }),
        }
    }
}
