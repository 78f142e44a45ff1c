use thiserror::Error;

/// Failures reported by a [`RenderDevice`](crate::renderer::RenderDevice).
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create GPU device: {0}")]
    RequestDevice(String),
    #[error("failed to create surface: {0}")]
    Surface(String),
    #[error("program '{label}' failed to build: {message}")]
    Program { label: String, message: String },
    #[error("depth target {width}x{height} could not be allocated: {message}")]
    DepthTarget {
        width: u32,
        height: u32,
        message: String,
    },
    #[error("texture {width}x{height} expects {expected} bytes of RGBA8, got {actual}")]
    TextureData {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("geometry has no vertices or indices")]
    EmptyGeometry,
}

#[derive(Debug, Error)]
pub enum RendererError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("renderer used before initialize()")]
    NotInitialized,
    #[error("shadow map size {width}x{height} is invalid")]
    InvalidShadowSize { width: u32, height: u32 },
}
