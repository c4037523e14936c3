//! Scene editor core: an entity registry with terrain, textures and imported
//! models, an edit/preview mode controller, and a generator that turns the
//! scene into three.js code or a standalone game archive.

pub mod app;
pub mod assets;
pub mod export;
pub mod render;
pub mod scene;
pub mod terrain;
pub mod ui;

pub use app::{EditorSession, Notification, NotificationKind, SessionError};
