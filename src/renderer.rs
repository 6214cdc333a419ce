use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Vector3;

use crate::backend::{CpuBackend, ExecutionMode, GpuBackend, SceneBuffers};
use crate::camera::Camera;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::scene::Scene;
use crate::texture::Texture;

/// Camera translation requested for the next update phase, in camera-local units.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Movement {
    pub right: f32,
    pub up: f32,
    pub forward: f32,
}

impl Movement {
    pub fn is_still(&self) -> bool {
        self.right == 0.0 && self.up == 0.0 && self.forward == 0.0
    }
}

impl std::ops::AddAssign for Movement {
    fn add_assign(&mut self, other: Self) {
        self.right += other.right;
        self.up += other.up;
        self.forward += other.forward;
    }
}

/// A rendering session: the authoritative scene, the camera and both execution backends.
///
/// Scene, light and texture buffers are pushed to the backends once, here. Each frame only
/// the camera and the visibility list go down and only the packed colours come back.
pub struct Renderer {
    config: RenderConfig,
    scene: Scene,
    camera: Camera,
    texture: Texture,
    shapes: Vec<f32>,
    lights: Vec<f32>,
    shape_indices: Vec<i32>,
    rgb: Vec<u32>,
    pending: Movement,

    cpu: CpuBackend,
    gpu: Option<GpuBackend>,
    mode: ExecutionMode,
    frames: u64,
}

impl Renderer {
    /// Starts a session on the host backend. Call [`Renderer::init_gpu`] to add the device one.
    pub fn new(config: RenderConfig, scene: Scene, texture: Texture) -> Result<Self, RenderError> {
        config.validate()?;

        let camera = Camera::look_at(
            Vector3::from(config.eye),
            Vector3::from(config.look_at),
            Vector3::from(config.up),
            config.view_plane_distance,
        );
        let shapes = scene.shape_buffer();
        let lights = scene.light_buffer();
        let shape_indices = scene.shape_indices();

        let mut cpu = CpuBackend::new(config.width, config.height);
        cpu.put_scene(&SceneBuffers {
            shapes: &shapes,
            lights: &lights,
            texture: &texture,
        });
        log::info!(
            "Session {}x{}: {} shapes, {} lights",
            config.width,
            config.height,
            scene.shapes().len(),
            scene.lights().len()
        );

        Ok(Self {
            rgb: vec![0; config.pixel_count()],
            mode: config.execution_mode,
            config,
            scene,
            camera,
            texture,
            shapes,
            lights,
            shape_indices,
            pending: Movement::default(),
            cpu,
            gpu: None,
            frames: 0,
        })
    }

    /// Loads the configured texture, or a checkerboard when none is set.
    pub fn load_texture(config: &RenderConfig) -> Result<Texture, RenderError> {
        match config.texture_path.as_deref() {
            Some(path) => Texture::open(path),
            None => Ok(Texture::checkerboard(256, 128, 8, 0xE0_40_30, 0xF0_E0_D0)),
        }
    }

    /// Adds a device backend on its own adapter.
    pub async fn init_gpu(&mut self) -> Result<(), RenderError> {
        let gpu = GpuBackend::new(self.config.width, self.config.height).await?;
        self.attach_gpu(gpu);
        Ok(())
    }

    /// Adds a device backend, typically one sharing the presenter's device.
    pub fn attach_gpu(&mut self, mut gpu: GpuBackend) {
        gpu.put_scene(&SceneBuffers {
            shapes: &self.shapes,
            lights: &self.lights,
            texture: &self.texture,
        });
        self.gpu = Some(gpu);
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn shape_indices(&self) -> &[i32] {
        &self.shape_indices
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The backend the next frame runs on.
    pub fn execution_mode(&self) -> ExecutionMode {
        match (self.mode, &self.gpu) {
            (ExecutionMode::Gpu, Some(_)) => ExecutionMode::Gpu,
            _ => ExecutionMode::Cpu,
        }
    }

    pub fn toggle_execution_mode(&mut self) -> ExecutionMode {
        let next = self.execution_mode().toggle();
        if next == ExecutionMode::Gpu && self.gpu.is_none() {
            log::warn!("No GPU backend available, staying on CPU");
            self.mode = ExecutionMode::Cpu;
        } else {
            self.mode = next;
            log::info!("Switched to {} execution", next);
        }
        self.execution_mode()
    }

    pub fn push_movement(&mut self, movement: Movement) {
        self.pending += movement;
    }

    /// Update phase: apply the pending movement and rebuild the visibility list.
    pub fn update(&mut self) {
        let movement = std::mem::take(&mut self.pending);
        if !movement.is_still() {
            self.camera
                .move_by(movement.right, movement.up, -movement.forward);
            log::debug!("Camera eye at {:?}", self.camera.eye());
        }
        self.scene.update_shape_indices(&mut self.shape_indices);
    }

    /// Parallel phase: push the frame inputs, run every pixel, pull the packed colours.
    pub async fn render(&mut self) -> Result<&[u32], RenderError> {
        match (self.mode, self.gpu.as_mut()) {
            (ExecutionMode::Gpu, Some(gpu)) => {
                gpu.put_frame(&self.camera, &self.shape_indices);
                gpu.execute()?;
                gpu.get_output(&mut self.rgb).await?;
            }
            _ => {
                self.cpu.put_frame(&self.camera, &self.shape_indices);
                self.cpu.execute()?;
                self.cpu.get_output(&mut self.rgb)?;
            }
        }
        self.frames += 1;
        Ok(&self.rgb)
    }

    /// Headless frame loop: alternates update and parallel phases until `keep_running`
    /// is cleared, handing each frame to `present`. The windowed viewer drives
    /// [`Renderer::update`] and [`Renderer::render`] from its redraw events instead.
    ///
    /// The flag is only checked between frames. Returns the number of frames rendered.
    pub async fn run(
        &mut self,
        keep_running: &AtomicBool,
        mut present: impl FnMut(&[u32]),
    ) -> Result<u64, RenderError> {
        let start = self.frames;
        while keep_running.load(Ordering::Acquire) {
            self.update();
            let rgb = self.render().await?;
            present(rgb);
        }
        let rendered = self.frames - start;
        log::info!("Frame loop stopped after {} frames", rendered);
        Ok(rendered)
    }
}
