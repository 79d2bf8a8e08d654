//! Inkboard Core Library
//!
//! Platform-agnostic core of the Inkboard shared whiteboard: camera
//! transform, drawing log, remote document sync with local-cache fallback,
//! and the interaction controller that ties them together.

pub mod camera;
pub mod config;
pub mod controller;
pub mod drawing;
pub mod identity;
pub mod input;
pub mod render;
pub mod session;
pub mod storage;
pub mod sync;

pub use camera::{Camera, ZoomDirection};
pub use config::{BoardConfig, ConfigError};
pub use controller::{Gesture, InputError, InteractionController};
pub use drawing::{DrawingError, DrawingLog, Segment, Tool, ToolState};
pub use identity::{Identity, IdentityProvider, StaticIdentity};
pub use input::{MouseButton, PointerEvent, TouchEvent};
pub use render::{RecordingTarget, StrokeTarget};
pub use session::{Bootstrapped, SaveTarget, SyncClient, SyncEvent, SyncMode, open_cache};
pub use storage::{LocalCache, MemoryCache, StorageError};
pub use sync::{DocumentStore, MemoryDocumentStore, Subscription, SyncError};

#[cfg(not(target_arch = "wasm32"))]
pub use session::connect_store;
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileCache;
#[cfg(not(target_arch = "wasm32"))]
pub use sync::WsDocumentStore;
