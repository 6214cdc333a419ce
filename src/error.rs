#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Session-level failures. The kernel itself never fails, it only produces sentinels.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,

    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("Surface does not accept copies in any supported format")]
    UnsupportedSurface,

    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("Failed to map output buffer: {0}")]
    MapOutput(#[from] wgpu::BufferAsyncError),

    #[error("Output buffer mapping was cancelled")]
    MapCancelled,

    #[error("Scene buffers were not uploaded before execution")]
    SceneNotUploaded,

    #[error("Output buffer holds {expected} pixels, got a slice of {actual}")]
    OutputSize { expected: usize, actual: usize },

    #[error("Texture image is empty ({width}x{height})")]
    EmptyTexture { width: u32, height: u32 },

    #[error("Texture error: {0}")]
    Texture(#[from] image::ImageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}
