pub mod batch;
pub mod device;
pub mod ground;
pub mod lights;
pub mod material;
pub mod pipeline_builder;
pub mod primitives;
pub mod programs;
pub mod recording;
pub mod scene_renderer;
pub mod shadow_map;
pub mod uniforms;
pub mod vertex;
pub mod wgpu_backend;

pub use device::{
    ClearFlags, DepthTargetId, GeometryId, GpuResource, ProgramId, Releaser, RenderDevice,
    TextureId, TextureSource, Viewport,
};
pub use lights::{DirectionalLight, LightRegistry, PointLight, SpotLight};
pub use material::MaterialEntry;
pub use recording::RecordingDevice;
pub use scene_renderer::{FrameStats, SceneRenderer};
pub use shadow_map::ShadowMap;
pub use vertex::Vertex;
pub use wgpu_backend::WgpuDevice;
