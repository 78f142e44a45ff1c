// scene/mod.rs

pub mod camera;
pub mod model;
pub mod transform;

pub use camera::Camera;
pub use model::{MeshData, Model};
pub use transform::ModelTransform;
