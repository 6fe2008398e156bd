#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod logger;

pub mod assets;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod compositor;
pub mod error;
pub mod io;
pub mod ops;
pub mod poster;
pub mod project;
pub mod settings;

pub use canvas::{CanvasState, Layer, LayerId, LayerKind, LayerPatch, LayerStack, Point, Rect, Viewport};
pub use components::tools::{PointerOutcome, StyleDefaults, Tool};
pub use error::StudioError;
pub use ops::ai::{Collaborator, CollaboratorError, EditRequest, EditTask};
pub use ops::shapes::ShapeKind;
pub use poster::{GeneratedBatch, PosterConfig};
pub use project::{EditOutcome, EditTicket, Session};
pub use settings::{EngineConfig, StudioSettings};
