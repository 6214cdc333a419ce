//! Interactive ray caster: one primary ray per pixel against planes, spheres and
//! triangles stored as tagged records in flat `f32` buffers.
//!
//! The per-pixel kernel runs either on the host thread pool or as a wgpu compute shader.

pub mod app;
pub mod backend;
pub mod binding;
pub mod camera;
pub mod config;
pub mod error;
pub mod intersection;
pub mod kernel;
pub mod renderer;
pub mod scene;
pub mod shading;
pub mod texture;

pub use backend::{CpuBackend, ExecutionMode, GpuBackend, SceneBuffers};
pub use camera::Camera;
pub use config::RenderConfig;
pub use error::{ConfigError, RenderError};
pub use intersection::{Intersection, Ray};
pub use renderer::{Movement, Renderer};
pub use scene::{Light, Scene, Shape};
pub use texture::Texture;

use std::sync::atomic::{AtomicBool, Ordering};

use winit::event_loop::EventLoop;

use crate::app::{App, AppEvent};

/// Renders `frames` frames of the demo scene without a window through
/// [`Renderer::run`] and returns the last one.
pub async fn render_headless(config: RenderConfig, frames: u64) -> Result<Vec<u32>, RenderError> {
    let texture = Renderer::load_texture(&config)?;
    let mut renderer = Renderer::new(config, Scene::demo(), texture)?;
    if renderer.config().execution_mode == ExecutionMode::Gpu {
        if let Err(e) = renderer.init_gpu().await {
            log::warn!("GPU backend unavailable ({}), rendering on CPU", e);
        }
    }

    let keep_running = AtomicBool::new(frames > 0);
    let mut remaining = frames;
    let mut last = Vec::new();
    renderer
        .run(&keep_running, |rgb| {
            last.clear();
            last.extend_from_slice(rgb);
            remaining -= 1;
            if remaining == 0 {
                keep_running.store(false, Ordering::Release);
            }
        })
        .await?;
    Ok(last)
}

/// Native entry point. The optional first argument is a TOML configuration file.
#[cfg(not(target_arch = "wasm32"))]
pub fn run() -> Result<(), RenderError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };

    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    let mut app = App::new(event_loop.create_proxy(), config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    use winit::platform::web::EventLoopExtWebSys;

    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    console_log::init_with_level(log::Level::Info).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let event_loop = EventLoop::<AppEvent>::with_user_event()
        .build()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let app = App::new(event_loop.create_proxy(), RenderConfig::default());

    event_loop.spawn_app(app);
    Ok(())
}
