use std::{cell::RefCell, rc::Rc, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::backend::GpuBackend;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::renderer::{Movement, Renderer};
use crate::scene::Scene;

/// Copies packed `0x00RRGGBB` frames into the window's surface.
pub struct Presenter {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    bgra: bool,
    bytes: Vec<u8>,
    pub window: Arc<Window>,
}

impl Presenter {
    pub async fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ray caster device"),
                    ..Default::default()
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        if !surface_caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
            return Err(RenderError::UnsupportedSurface);
        }
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| matches!(f, wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Bgra8Unorm))
            .or_else(|| {
                surface_caps.formats.iter().copied().find(|f| {
                    matches!(
                        f,
                        wgpu::TextureFormat::Rgba8UnormSrgb | wgpu::TextureFormat::Bgra8UnormSrgb
                    )
                })
            })
            .ok_or(RenderError::UnsupportedSurface)?;
        let bgra = matches!(
            format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        log::info!("Presenting to a {:?} surface", format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format,
            width,
            height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            desired_maximum_frame_latency: 2,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            bgra,
            bytes: vec![0; width as usize * height as usize * 4],
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn present(&mut self, rgb: &[u32]) -> Result<(), RenderError> {
        let output = self.surface.get_current_texture()?;

        for (texel, &color) in self.bytes.chunks_exact_mut(4).zip(rgb) {
            let [b, g, r, _] = color.to_le_bytes();
            if self.bgra {
                texel.copy_from_slice(&[b, g, r, 0xFF]);
            } else {
                texel.copy_from_slice(&[r, g, b, 0xFF]);
            }
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.config.width),
                rows_per_image: Some(self.config.height),
            },
            wgpu::Extent3d {
                width: self.config.width,
                height: self.config.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::empty());
        output.present();
        Ok(())
    }
}

/// Held movement keys, turned into a [`Movement`] every frame.
#[derive(Copy, Clone, Debug, Default)]
pub struct Controls {
    left: bool,
    right: bool,
    forward: bool,
    back: bool,
}

impl Controls {
    /// Returns true when the key is one of the movement keys.
    pub fn set(&mut self, key: KeyCode, pressed: bool) -> bool {
        match key {
            KeyCode::KeyA => self.left = pressed,
            KeyCode::KeyD => self.right = pressed,
            KeyCode::KeyW => self.forward = pressed,
            KeyCode::KeyS => self.back = pressed,
            _ => return false,
        }
        true
    }

    pub fn movement(&self, speed: f32) -> Movement {
        let axis = |negative: bool, positive: bool| (positive as i32 - negative as i32) as f32 * speed;
        Movement {
            right: axis(self.left, self.right),
            up: 0.0,
            forward: axis(self.back, self.forward),
        }
    }
}

/// Requests collected for one frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameInput {
    pub movement: Movement,
    pub toggle_backend: bool,
    pub report_backend: bool,
    pub reconfigure: bool,
}

/// Window input gathered between frames.
///
/// Kept apart from the [`Viewer`] so events are recorded even while a frame
/// holds the viewer across an await. Never borrow it across an await.
#[derive(Copy, Clone, Debug, Default)]
pub struct Input {
    controls: Controls,
    toggle_backend: bool,
    report_backend: bool,
    reconfigure: bool,
}

impl Input {
    pub fn on_key(&mut self, key: KeyCode, state: ElementState, repeat: bool) {
        let pressed = state == ElementState::Pressed;
        if self.controls.set(key, pressed) || !pressed || repeat {
            return;
        }
        match key {
            // Two presses between frames cancel out.
            KeyCode::KeyT => self.toggle_backend = !self.toggle_backend,
            KeyCode::KeyE => self.report_backend = true,
            _ => {}
        }
    }

    pub fn request_reconfigure(&mut self) {
        self.reconfigure = true;
    }

    /// Hands out the pending one-shot requests. Held keys stay held.
    pub fn take_frame(&mut self, speed: f32) -> FrameInput {
        FrameInput {
            movement: self.controls.movement(speed),
            toggle_backend: std::mem::take(&mut self.toggle_backend),
            report_backend: std::mem::take(&mut self.report_backend),
            reconfigure: std::mem::take(&mut self.reconfigure),
        }
    }
}

/// Everything one window needs: the session and its presenter.
pub struct Viewer {
    presenter: Presenter,
    renderer: Renderer,
}

impl Viewer {
    pub async fn new(window: Arc<Window>, config: RenderConfig) -> Result<Self, RenderError> {
        let texture = Renderer::load_texture(&config)?;
        let presenter = Presenter::new(window, config.width, config.height).await?;
        let gpu = GpuBackend::from_device(
            presenter.device().clone(),
            presenter.queue().clone(),
            config.width,
            config.height,
        );
        let mut renderer = Renderer::new(config, Scene::demo(), texture)?;
        renderer.attach_gpu(gpu);
        log::info!("Rendering on {}", renderer.execution_mode());
        Ok(Self { presenter, renderer })
    }

    pub fn window(&self) -> &Window {
        self.presenter.window()
    }

    pub async fn frame(&mut self, input: FrameInput) -> Result<(), RenderError> {
        if input.reconfigure {
            self.presenter.reconfigure();
        }
        if input.toggle_backend {
            self.renderer.toggle_execution_mode();
        }
        if input.report_backend {
            log::info!("Current backend: {}", self.renderer.execution_mode());
        }
        self.renderer.push_movement(input.movement);
        self.renderer.update();
        let rgb = self.renderer.render().await?;
        self.presenter.present(rgb)
    }
}

pub enum AppEvent {
    InitStateDone { window: Arc<Window> },
}

pub struct App {
    state: Rc<RefCell<Option<Viewer>>>,
    input: Rc<RefCell<Input>>,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    event_proxy: Arc<EventLoopProxy<AppEvent>>,
    config: RenderConfig,
}

impl App {
    pub fn new(event_proxy: EventLoopProxy<AppEvent>, config: RenderConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(None)),
            input: Rc::new(RefCell::new(Input::default())),
            event_proxy: Arc::new(event_proxy),
            config,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn handle_frame_result(&self, result: Result<(), RenderError>, event_loop: &ActiveEventLoop) {
        match result {
            Ok(()) => {}
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("Surface lost, reconfiguring");
                self.input.borrow_mut().request_reconfigure();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                log::warn!("Surface timeout");
            }
            Err(e) => {
                log::error!("Frame failed: {}", e);
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::InitStateDone { window } => {
                log::info!("Viewer initialisation is done");
                window.request_redraw();
            }
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !matches!(self.state.try_borrow().map(|state| state.is_none()), Ok(true)) {
            return;
        }

        let size = winit::dpi::PhysicalSize::new(self.config.width, self.config.height);
        let window_attributes = Window::default_attributes()
            .with_title("raycaster")
            .with_inner_size(size)
            .with_resizable(false);
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowExtWebSys;

            let canvas = window.canvas().map(web_sys::Element::from);
            let appended = web_sys::window()
                .and_then(|win| win.document())
                .and_then(|doc| doc.body())
                .zip(canvas)
                .and_then(|(body, canvas)| body.append_child(&canvas).ok());
            if appended.is_none() {
                log::error!("Couldn't append canvas to document body");
                return;
            }

            let state_clone = self.state.clone();
            let event_proxy_clone = self.event_proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let viewer = match Viewer::new(window.clone(), config).await {
                    Ok(viewer) => viewer,
                    Err(e) => {
                        log::error!("Failed to initialise viewer: {}", e);
                        return;
                    }
                };
                match state_clone.try_borrow_mut() {
                    Ok(mut state) => {
                        *state = Some(viewer);
                        if let Err(e) = event_proxy_clone.send_event(AppEvent::InitStateDone { window }) {
                            log::warn!("Failed to send user event: {}", e);
                        }
                    }
                    Err(_) => log::warn!("Could not borrow for initialisation"),
                }
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        match pollster::block_on(Viewer::new(window.clone(), self.config.clone())) {
            Ok(viewer) => {
                *self.state.borrow_mut() = Some(viewer);
                window.request_redraw();
            }
            Err(e) => {
                log::error!("Failed to initialise viewer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                log::info!("Exit requested");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                self.input.borrow_mut().on_key(key, state, repeat);
            }

            WindowEvent::Resized(_) => {
                self.input.borrow_mut().request_reconfigure();
            }

            WindowEvent::RedrawRequested => {
                let speed = self.config.movement_speed;

                #[cfg(not(target_arch = "wasm32"))]
                {
                    let result = match self.state.try_borrow_mut() {
                        Ok(mut viewer) => match viewer.as_mut() {
                            Some(viewer) if window_id == viewer.window().id() => {
                                let input = self.input.borrow_mut().take_frame(speed);
                                Some(pollster::block_on(viewer.frame(input)))
                            }
                            _ => None,
                        },
                        Err(_) => None,
                    };
                    if let Some(result) = result {
                        self.handle_frame_result(result, event_loop);
                    }
                }

                // The readback resolves on the browser's event loop, so the frame runs as a task.
                // Input is taken only once the viewer is ours, so a busy frame loses nothing.
                #[cfg(target_arch = "wasm32")]
                {
                    let _ = (window_id, event_loop);
                    let state_clone = self.state.clone();
                    let input_clone = self.input.clone();
                    wasm_bindgen_futures::spawn_local(async move {
                        let Ok(mut viewer) = state_clone.try_borrow_mut() else {
                            log::debug!("Previous frame still running");
                            return;
                        };
                        if let Some(viewer) = viewer.as_mut() {
                            let input = input_clone.borrow_mut().take_frame(speed);
                            match viewer.frame(input).await {
                                Ok(()) => {}
                                Err(RenderError::Surface(
                                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                                )) => input_clone.borrow_mut().request_reconfigure(),
                                Err(e) => log::error!("Frame failed: {}", e),
                            }
                        }
                    });
                }
            }
            _ => {}
        };
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Ok(viewer) = self.state.try_borrow() {
            if let Some(viewer) = viewer.as_ref() {
                viewer.window().request_redraw();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel_out() {
        let mut controls = Controls::default();
        assert!(controls.set(KeyCode::KeyA, true));
        assert!(controls.set(KeyCode::KeyD, true));
        assert!(controls.set(KeyCode::KeyW, true));
        assert!(!controls.set(KeyCode::KeyT, true));

        let movement = controls.movement(0.5);
        assert_eq!(movement.right, 0.0);
        assert_eq!(movement.forward, 0.5);

        controls.set(KeyCode::KeyA, false);
        assert_eq!(controls.movement(0.5).right, 0.5);
        assert!(Controls::default().movement(1.0).is_still());
    }

    #[test]
    fn release_between_frames_is_not_lost() {
        let mut input = Input::default();
        input.on_key(KeyCode::KeyW, ElementState::Pressed, false);
        assert_eq!(input.take_frame(1.0).movement.forward, 1.0);
        // Held keys keep moving on later frames.
        assert_eq!(input.take_frame(1.0).movement.forward, 1.0);

        // Press and release while a frame is in flight.
        input.on_key(KeyCode::KeyS, ElementState::Pressed, false);
        input.on_key(KeyCode::KeyW, ElementState::Released, false);
        input.on_key(KeyCode::KeyS, ElementState::Released, false);
        assert!(input.take_frame(1.0).movement.is_still());
    }

    #[test]
    fn one_shot_requests_are_taken_once() {
        let mut input = Input::default();
        input.on_key(KeyCode::KeyT, ElementState::Pressed, false);
        input.on_key(KeyCode::KeyT, ElementState::Released, false);
        input.on_key(KeyCode::KeyE, ElementState::Pressed, false);
        input.request_reconfigure();

        let frame = input.take_frame(1.0);
        assert!(frame.toggle_backend && frame.report_backend && frame.reconfigure);
        assert_eq!(input.take_frame(1.0), FrameInput::default());
    }

    #[test]
    fn repeated_and_doubled_toggles() {
        let mut input = Input::default();
        input.on_key(KeyCode::KeyT, ElementState::Pressed, false);
        input.on_key(KeyCode::KeyT, ElementState::Pressed, true);
        assert!(input.take_frame(1.0).toggle_backend);

        input.on_key(KeyCode::KeyT, ElementState::Pressed, false);
        input.on_key(KeyCode::KeyT, ElementState::Pressed, false);
        assert!(!input.take_frame(1.0).toggle_backend);
    }
}
