pub mod camera;
pub mod celestial;
pub mod environment;
pub mod extrude;
pub mod fixtures;
pub mod interaction;
pub mod lights;
pub mod mesh;
pub mod openings;
pub mod pipeline;
pub mod roof;
pub mod scene;
pub mod season;
pub mod viewer;
pub mod walls;
pub mod weather;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum ViewerError {
        #[error("triangulation failed: {0}")]
        Triangulation(String),
        #[error("invalid extrusion: {0}")]
        InvalidExtrusion(String),
    }
}

pub use errors::ViewerError;
pub use pipeline::{GenerateOptions, GeneratedScene, Stage, generate};
pub use viewer::{Viewer, ViewerSignal};
