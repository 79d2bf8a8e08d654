//! Interaction controller: turns input events into camera moves, strokes and
//! saves.

use kurbo::Point;
use thiserror::Error;

use crate::camera::{Camera, ZoomDirection};
use crate::config::BoardConfig;
use crate::drawing::{DrawingLog, Segment, ToolState};
use crate::input::{PointerEvent, TouchEvent};
use crate::render::StrokeTarget;
use crate::session::{Bootstrapped, SaveTarget, SyncClient, SyncEvent};

/// Input handling errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Board is not ready for input")]
    NotReady,
}

/// Current gesture. Drawing and panning never overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Idle,
    /// Drawing a stroke; `last` is the previous sample in world space.
    Drawing { last: Point },
    /// Dragging the view; `last` is the previous sample in screen space.
    Panning { last: Point },
}

/// Owns the board state and threads it through event handlers.
pub struct InteractionController {
    camera: Camera,
    log: DrawingLog,
    tools: ToolState,
    gesture: Gesture,
    sync: Option<SyncClient>,
    save_every: Option<usize>,
    unsaved_segments: usize,
    last_pointer: Point,
    last_save: Option<SaveTarget>,
}

impl InteractionController {
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            camera: Camera::IDENTITY,
            log: DrawingLog::new(),
            tools: ToolState::default(),
            gesture: Gesture::Idle,
            sync: None,
            save_every: config.save_every,
            unsaved_segments: 0,
            last_pointer: Point::ZERO,
            last_save: None,
        }
    }

    /// Install the bootstrapped session and its hydrated log.
    ///
    /// The board accepts input only after this.
    pub fn attach(&mut self, boot: Bootstrapped) {
        log::info!(
            "Board ready with {} segments ({})",
            boot.log.len(),
            if boot.client.is_remote() { "remote" } else { "local" }
        );
        self.log = boot.log;
        self.sync = Some(boot.client);
        self.gesture = Gesture::Idle;
        self.unsaved_segments = 0;
    }

    pub fn is_ready(&self) -> bool {
        self.sync.is_some()
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn log(&self) -> &DrawingLog {
        &self.log
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolState {
        &mut self.tools
    }

    pub fn sync(&self) -> Option<&SyncClient> {
        self.sync.as_ref()
    }

    /// Where the most recent save went.
    pub fn last_save(&self) -> Option<SaveTarget> {
        self.last_save
    }

    /// Handle a pointer event. Returns whether the board needs a redraw.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Result<bool, InputError> {
        self.ensure_ready()?;
        if !event.is_finite() {
            log::trace!("Ignoring non-finite {:?}", event);
            return Ok(false);
        }
        self.last_pointer = event.position();

        let redraw = match (*event, self.gesture) {
            (PointerEvent::Wheel { position, delta }, _) => {
                match ZoomDirection::from_wheel_delta(delta.y) {
                    Some(direction) => {
                        self.camera = self.camera.zoomed_at(position, direction);
                        true
                    }
                    None => false,
                }
            }
            (PointerEvent::Down { position, button }, Gesture::Idle) => {
                if button.is_pan_trigger() {
                    self.gesture = Gesture::Panning { last: position };
                    false
                } else if let Some(world) = self.to_world(position) {
                    self.gesture = Gesture::Drawing { last: world };
                    self.push(Segment::dot(world, &self.tools));
                    true
                } else {
                    false
                }
            }
            (PointerEvent::Down { .. }, _) => {
                log::trace!("Ignoring pointer down during {:?}", self.gesture);
                false
            }
            (PointerEvent::Move { position }, Gesture::Drawing { last }) => {
                match self.to_world(position) {
                    Some(world) => {
                        self.gesture = Gesture::Drawing { last: world };
                        self.push(self.tools.segment(last, world));
                        true
                    }
                    None => false,
                }
            }
            (PointerEvent::Move { position }, Gesture::Panning { last }) => {
                self.camera = self.camera.panned(position - last);
                self.gesture = Gesture::Panning { last: position };
                true
            }
            (PointerEvent::Move { .. }, Gesture::Idle) => false,
            (PointerEvent::Up { .. }, Gesture::Drawing { .. }) => {
                self.gesture = Gesture::Idle;
                self.save();
                false
            }
            (PointerEvent::Up { .. }, Gesture::Panning { .. }) => {
                self.gesture = Gesture::Idle;
                false
            }
            (PointerEvent::Up { .. }, Gesture::Idle) => false,
        };
        Ok(redraw)
    }

    /// Handle a touch event through its primary-pointer equivalent.
    pub fn handle_touch(&mut self, event: &TouchEvent) -> Result<bool, InputError> {
        self.ensure_ready()?;
        match event.to_pointer(self.last_pointer) {
            Some(pointer) => self.handle_pointer(&pointer),
            None => Ok(false),
        }
    }

    /// Wipe the board and reset the view, then persist the empty log.
    pub fn clear(&mut self) -> Result<(), InputError> {
        self.ensure_ready()?;
        self.log.clear();
        self.camera = Camera::IDENTITY;
        self.gesture = Gesture::Idle;
        self.save();
        Ok(())
    }

    /// Apply remote changes delivered since the last call. Returns whether
    /// the log was replaced.
    ///
    /// A replacement overwrites the local log unconditionally, including a
    /// stroke that is still being drawn.
    pub fn poll_remote(&mut self) -> bool {
        let Some(sync) = self.sync.as_mut() else {
            return false;
        };

        let mut replaced = false;
        for event in sync.poll() {
            match event {
                SyncEvent::DocumentReplaced(log) => {
                    log::debug!("Remote replaced the board ({} segments)", log.len());
                    self.log.replace_all(log.into_segments());
                    replaced = true;
                }
                SyncEvent::Degraded { reason } => {
                    log::info!("Saving board locally after losing the store: {}", reason);
                    self.save();
                }
            }
        }
        replaced
    }

    /// Replay the board into `target` through the current camera.
    pub fn render<T: StrokeTarget + ?Sized>(&self, target: &mut T) {
        self.log.render(target, &self.camera);
    }

    /// Release the sync session. Further input is ignored.
    pub fn shutdown(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.shutdown();
        }
        self.gesture = Gesture::Idle;
    }

    fn ensure_ready(&self) -> Result<(), InputError> {
        if self.is_ready() {
            Ok(())
        } else {
            log::trace!("Input before bootstrap ignored");
            Err(InputError::NotReady)
        }
    }

    /// World position of a screen point, `None` if it overflows.
    fn to_world(&self, position: Point) -> Option<Point> {
        let world = self.camera.screen_to_world(position);
        if world.is_finite() {
            Some(world)
        } else {
            log::trace!("Ignoring pointer at {:?}, outside world range", position);
            None
        }
    }

    fn push(&mut self, segment: Segment) {
        self.log.append(segment);
        self.unsaved_segments += 1;
        if self
            .save_every
            .is_some_and(|every| self.unsaved_segments >= every)
        {
            self.save();
        }
    }

    fn save(&mut self) {
        self.unsaved_segments = 0;
        if let Some(sync) = self.sync.as_mut() {
            self.last_save = Some(sync.save(&self.log));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::Tool;
    use crate::identity::Identity;
    use crate::input::MouseButton;
    use crate::render::RecordingTarget;
    use crate::storage::{LocalCache, MemoryCache};
    use crate::sync::{DocumentStore, MemoryDocumentStore};
    use kurbo::Vec2;

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    fn pan_down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Middle,
        }
    }

    fn move_to(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Move {
            position: Point::new(x, y),
        }
    }

    fn up(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    fn wheel(x: f64, y: f64, dy: f64) -> PointerEvent {
        PointerEvent::Wheel {
            position: Point::new(x, y),
            delta: Vec2::new(0.0, dy),
        }
    }

    fn local_board(config: &BoardConfig, cache: MemoryCache) -> InteractionController {
        let mut board = InteractionController::new(config);
        board.attach(SyncClient::bootstrap(
            Identity::new("user-1", "demo", false),
            None,
            Box::new(cache),
        ));
        board
    }

    fn remote_board(store: &MemoryDocumentStore) -> InteractionController {
        let mut board = InteractionController::new(&BoardConfig::default());
        board.attach(SyncClient::bootstrap(
            Identity::new("user-1", "demo", true),
            Some(Box::new(store.handle())),
            Box::new(MemoryCache::new()),
        ));
        board
    }

    #[test]
    fn test_input_before_attach_is_ignored() {
        let mut board = InteractionController::new(&BoardConfig::default());
        assert_eq!(board.handle_pointer(&down(1.0, 1.0)), Err(InputError::NotReady));
        assert_eq!(board.clear(), Err(InputError::NotReady));
        assert!(board.log().is_empty());
        assert_eq!(board.gesture(), Gesture::Idle);
    }

    #[test]
    fn test_pointer_down_appends_dot() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        assert!(board.handle_pointer(&down(100.0, 100.0)).unwrap());

        let segment = &board.log().segments()[0];
        assert_eq!(segment.start, Point::new(100.0, 100.0));
        assert_eq!(segment.end, Point::new(100.0, 100.0));
        assert!(matches!(board.gesture(), Gesture::Drawing { .. }));
    }

    #[test]
    fn test_moves_append_one_segment_each() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        for i in 1..=7 {
            board.handle_pointer(&move_to(i as f64, 0.0)).unwrap();
        }

        assert_eq!(board.log().len(), 8);
        let last = board.log().segments().last().unwrap();
        assert_eq!(last.start, Point::new(6.0, 0.0));
        assert_eq!(last.end, Point::new(7.0, 0.0));
    }

    #[test]
    fn test_strokes_are_stored_in_world_space() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.handle_pointer(&pan_down(0.0, 0.0)).unwrap();
        board.handle_pointer(&move_to(10.0, 20.0)).unwrap();
        board.handle_pointer(&up(10.0, 20.0)).unwrap();

        board.handle_pointer(&down(30.0, 30.0)).unwrap();
        assert_eq!(board.log().segments()[0].start, Point::new(20.0, 10.0));
    }

    #[test]
    fn test_pan_never_appends() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.handle_pointer(&pan_down(5.0, 5.0)).unwrap();
        board.handle_pointer(&move_to(15.0, 0.0)).unwrap();
        board.handle_pointer(&move_to(20.0, 0.0)).unwrap();

        assert!(board.log().is_empty());
        assert_eq!(board.camera().offset, Vec2::new(15.0, -5.0));
    }

    #[test]
    fn test_pointer_down_during_gesture_is_ignored() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.handle_pointer(&pan_down(0.0, 0.0)).unwrap();
        assert!(!board.handle_pointer(&down(3.0, 3.0)).unwrap());

        assert!(board.log().is_empty());
        assert!(matches!(board.gesture(), Gesture::Panning { .. }));
    }

    #[test]
    fn test_wheel_zooms_at_cursor() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        assert!(board.handle_pointer(&wheel(50.0, 50.0, -1.0)).unwrap());

        let camera = board.camera();
        assert!((camera.zoom - 1.1).abs() < 1e-12);
        let world = camera.screen_to_world(Point::new(50.0, 50.0));
        assert!((world - Point::new(50.0, 50.0)).hypot() < 1e-9);

        assert!(!board.handle_pointer(&wheel(50.0, 50.0, 0.0)).unwrap());
        board.handle_pointer(&wheel(50.0, 50.0, 3.0)).unwrap();
        assert!((board.camera().zoom - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_input_is_ignored() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        assert!(!board.handle_pointer(&down(f64::NAN, 0.0)).unwrap());
        assert!(board.log().is_empty());
        assert_eq!(board.gesture(), Gesture::Idle);

        board.handle_pointer(&down(1.0, 1.0)).unwrap();
        assert!(!board.handle_pointer(&move_to(f64::INFINITY, 2.0)).unwrap());
        assert!(!board.handle_pointer(&move_to(2.0, f64::NAN)).unwrap());
        assert_eq!(board.gesture(), Gesture::Drawing { last: Point::new(1.0, 1.0) });
        board.handle_pointer(&up(1.0, 1.0)).unwrap();

        assert!(!board.handle_pointer(&wheel(f64::NAN, 0.0, -1.0)).unwrap());
        assert!(!board.handle_pointer(&wheel(0.0, 0.0, f64::NEG_INFINITY)).unwrap());
        assert_eq!(board.camera(), Camera::IDENTITY);

        board.handle_pointer(&pan_down(0.0, 0.0)).unwrap();
        assert!(!board.handle_pointer(&move_to(f64::NAN, f64::NAN)).unwrap());
        assert_eq!(board.camera(), Camera::IDENTITY);

        assert_eq!(board.log().len(), 1);
        let saved = board.log().serialize().unwrap();
        assert_eq!(DrawingLog::deserialize(&saved).unwrap(), *board.log());
    }

    #[test]
    fn test_overflowing_world_point_is_ignored() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        for _ in 0..40 {
            board.handle_pointer(&wheel(0.0, 0.0, 1.0)).unwrap();
        }
        assert!(!board.handle_pointer(&down(f64::MAX, 0.0)).unwrap());
        assert!(board.log().is_empty());
    }

    #[test]
    fn test_wheel_keeps_gesture() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        board.handle_pointer(&wheel(0.0, 0.0, -1.0)).unwrap();
        assert!(matches!(board.gesture(), Gesture::Drawing { .. }));
    }

    #[test]
    fn test_stroke_end_saves() {
        let cache = MemoryCache::new();
        let config = BoardConfig {
            save_every: None,
            ..BoardConfig::default()
        };
        let mut board = local_board(&config, cache.clone());
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        board.handle_pointer(&move_to(1.0, 1.0)).unwrap();
        assert!(cache.is_empty());

        board.handle_pointer(&up(1.0, 1.0)).unwrap();
        assert_eq!(board.last_save(), Some(SaveTarget::LocalCache));
        let saved = cache.get("whiteboard_lines_user-1").unwrap().unwrap();
        assert_eq!(DrawingLog::deserialize(&saved).unwrap(), *board.log());
    }

    #[test]
    fn test_saves_every_n_segments_mid_stroke() {
        let cache = MemoryCache::new();
        let config = BoardConfig {
            save_every: Some(3),
            ..BoardConfig::default()
        };
        let mut board = local_board(&config, cache.clone());
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        board.handle_pointer(&move_to(1.0, 0.0)).unwrap();
        assert!(cache.is_empty());

        board.handle_pointer(&move_to(2.0, 0.0)).unwrap();
        let saved = cache.get("whiteboard_lines_user-1").unwrap().unwrap();
        assert_eq!(DrawingLog::deserialize(&saved).unwrap().len(), 3);
    }

    #[test]
    fn test_eraser_draws_background() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.tools_mut().tool = Tool::Eraser;
        board.handle_pointer(&down(0.0, 0.0)).unwrap();

        let segment = &board.log().segments()[0];
        assert_eq!(segment.tool, Tool::Eraser);
        assert_eq!(segment.color, "#ffffff");
    }

    #[test]
    fn test_clear_resets_log_and_camera() {
        let cache = MemoryCache::new();
        let mut board = local_board(&BoardConfig::default(), cache.clone());
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        board.handle_pointer(&up(0.0, 0.0)).unwrap();
        board.handle_pointer(&wheel(10.0, 10.0, -1.0)).unwrap();

        board.clear().unwrap();
        assert!(board.log().is_empty());
        assert_eq!(board.camera(), Camera::IDENTITY);
        assert_eq!(cache.get("whiteboard_lines_user-1").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_touch_draws_with_first_point() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board
            .handle_touch(&TouchEvent::Start {
                touches: vec![Point::new(4.0, 4.0), Point::new(90.0, 90.0)],
            })
            .unwrap();
        board
            .handle_touch(&TouchEvent::Move {
                touches: vec![Point::new(8.0, 4.0)],
            })
            .unwrap();
        board.handle_touch(&TouchEvent::End).unwrap();

        assert_eq!(board.log().len(), 2);
        assert_eq!(board.gesture(), Gesture::Idle);
        assert_eq!(board.last_save(), Some(SaveTarget::LocalCache));
    }

    #[test]
    fn test_hydrates_from_cache() {
        let cache = MemoryCache::new();
        let mut first = local_board(&BoardConfig::default(), cache.clone());
        first.handle_pointer(&down(2.0, 2.0)).unwrap();
        first.handle_pointer(&up(2.0, 2.0)).unwrap();

        let second = local_board(&BoardConfig::default(), cache);
        assert_eq!(second.log(), first.log());
    }

    #[test]
    fn test_poll_remote_replaces_log() {
        let mut store = MemoryDocumentStore::new();
        let mut board = remote_board(&store);
        board.handle_pointer(&down(0.0, 0.0)).unwrap();

        let mut theirs = DrawingLog::new();
        theirs.append(ToolState::default().segment(Point::new(1.0, 1.0), Point::new(2.0, 2.0)));
        theirs.append(ToolState::default().segment(Point::new(2.0, 2.0), Point::new(3.0, 3.0)));
        store.set("demo/whiteboard", &theirs.serialize().unwrap()).unwrap();

        assert!(board.poll_remote());
        assert_eq!(*board.log(), theirs);
        assert!(!board.poll_remote());
    }

    #[test]
    fn test_corrupt_remote_keeps_log() {
        let mut store = MemoryDocumentStore::new();
        let mut board = remote_board(&store);
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        let before = board.log().clone();

        store.set("demo/whiteboard", "not json").unwrap();
        assert!(!board.poll_remote());
        assert_eq!(*board.log(), before);
    }

    #[test]
    fn test_outage_moves_board_to_cache() {
        let store = MemoryDocumentStore::new();
        let mut board = remote_board(&store);
        board.handle_pointer(&down(0.0, 0.0)).unwrap();
        board.handle_pointer(&up(0.0, 0.0)).unwrap();
        assert_eq!(board.last_save(), Some(SaveTarget::Remote));

        store.set_reachable(false);
        board.poll_remote();
        assert_eq!(board.last_save(), Some(SaveTarget::LocalCache));
        assert!(!board.sync().unwrap().is_remote());
    }

    #[test]
    fn test_render_uses_camera() {
        let mut board = local_board(&BoardConfig::default(), MemoryCache::new());
        board.handle_pointer(&down(10.0, 10.0)).unwrap();
        board.handle_pointer(&wheel(0.0, 0.0, -1.0)).unwrap();

        let mut target = RecordingTarget::new();
        board.render(&mut target);
        assert_eq!(target.last_transform(), Some(board.camera().transform()));
        let widths: Vec<f64> = target.strokes().map(|(_, width)| width).collect();
        assert_eq!(widths.len(), 1);
        assert!((widths[0] - 5.0 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_shutdown_stops_input() {
        let store = MemoryDocumentStore::new();
        let mut board = remote_board(&store);
        board.shutdown();

        assert_eq!(store.subscriber_count("demo/whiteboard"), 0);
        assert_eq!(board.handle_pointer(&down(0.0, 0.0)), Err(InputError::NotReady));
    }
}
