//! Inkboard Core Library
//!
//! Platform-agnostic scene model, binding engine, gesture state machine,
//! undo history and collaboration sync for the Inkboard whiteboard.

pub mod binding;
pub mod camera;
pub mod collab;
pub mod config;
pub mod element;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod selection;
pub mod session;
pub mod storage;
pub mod store;
pub mod tools;
pub mod transform;

pub use camera::Camera;
pub use collab::{SceneCipher, SyncError, Synchronizer, Transport, TransportError, WireMessage};
pub use config::{EditorConfig, SyncConfig};
pub use element::{Binding, Element, ElementId, ElementKind, ElementStyle, Endpoint, GroupId};
pub use history::History;
pub use input::{Modifiers, MouseButton, PointerEvent};
pub use interaction::{AppState, Editor, GestureMode, GestureSnapshot};
pub use selection::{Corner, Edge, HandleKind};
pub use session::Session;
pub use store::{ElementPatch, Scene, SceneData, SceneError};
pub use tools::ToolKind;
