pub mod canvas;
pub mod command;
pub mod demo;
pub mod drag;
pub mod entity;
pub mod persist;
pub mod selection;
pub mod session;
pub mod signal;

pub mod errors {
    use homeplan_core::store::StoreError;
    use thiserror::Error;

    use crate::canvas::Part;
    use crate::selection::EntityKind;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("group {0} does not exist")]
        GroupNotFound(usize),
        #[error("{kind:?} entity {id} not found")]
        EntityNotFound { kind: EntityKind, id: String },
        #[error("canvas node not found")]
        NodeNotFound,
        #[error("entity {0} has been disposed")]
        Disposed(String),
        #[error("entity does not support dragging part {0:?}")]
        UnsupportedPart(Part),
        #[error("room {room} has no vertex {index}")]
        VertexOutOfRange { room: String, index: usize },
        #[error("polygon must have at least three vertices and must not self-intersect")]
        InvalidPolygon,
        #[error(transparent)]
        Store(#[from] StoreError),
    }
}

pub use errors::EngineError;
pub use session::{EditorSession, EditorSettings, PointerInput, SelectionSignal, ViewTransform};
