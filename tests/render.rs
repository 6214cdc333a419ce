use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Vector3;
use raycaster::{ExecutionMode, Light, RenderConfig, Renderer, Scene, Shape, Texture};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn config() -> RenderConfig {
    RenderConfig {
        width: WIDTH,
        height: HEIGHT,
        view_plane_distance: 100.0,
        eye: [0.0, 0.0, -5.0],
        look_at: [0.0, 0.0, 0.0],
        up: [0.0, 1.0, 0.0],
        execution_mode: ExecutionMode::Cpu,
        ..RenderConfig::default()
    }
}

fn lit_sphere() -> Scene {
    Scene::new()
        .with_shape(Shape::sphere(Vector3::zeros(), 1.0))
        .with_light(Light::point(Vector3::new(0.0, 5.0, -5.0)))
}

fn brightness(rgb: u32) -> u32 {
    (rgb >> 16 & 0xFF) + (rgb >> 8 & 0xFF) + (rgb & 0xFF)
}

#[test]
fn sphere_centre_is_lit_and_background_is_black() {
    let mut renderer = Renderer::new(config(), lit_sphere(), Texture::solid(0xFFFFFF)).unwrap();
    let rgb = pollster::block_on(renderer.render()).unwrap();

    let centre = rgb[(HEIGHT / 2 * WIDTH + WIDTH / 2) as usize];
    let corner = rgb[0];
    assert_ne!(centre, 0);
    assert_eq!(corner, 0x000000);
    assert!(brightness(centre) > brightness(corner));
}

#[test]
fn upper_half_of_sphere_faces_the_light() {
    let mut renderer = Renderer::new(config(), lit_sphere(), Texture::solid(0xFFFFFF)).unwrap();
    let rgb = pollster::block_on(renderer.render()).unwrap();

    // Row 0 is the top of the image.
    let column = (WIDTH / 2) as usize;
    let upper = rgb[(HEIGHT as usize / 2 - 8) * WIDTH as usize + column];
    let lower = rgb[(HEIGHT as usize / 2 + 8) * WIDTH as usize + column];
    assert_ne!(upper, 0);
    assert_ne!(lower, 0);
    assert!(brightness(upper) > brightness(lower));
}

#[test]
fn empty_scene_renders_black() {
    let mut renderer = Renderer::new(config(), Scene::new(), Texture::solid(0xFFFFFF)).unwrap();
    let rgb = pollster::block_on(renderer.render()).unwrap();
    assert_eq!(rgb.len(), (WIDTH * HEIGHT) as usize);
    assert!(rgb.iter().all(|&c| c == 0x000000));
}

#[test]
fn unlit_floor_gets_ambient_light() {
    let config = RenderConfig {
        eye: [0.0, 0.0, -5.0],
        look_at: [0.0, -3.0, 0.0],
        ..config()
    };
    let scene = Scene::new().with_shape(Shape::plane(Vector3::new(0.0, 1.0, 0.0)));
    let mut renderer = Renderer::new(config, scene, Texture::solid(0xFFFFFF)).unwrap();
    let rgb = pollster::block_on(renderer.render()).unwrap();

    let bottom = rgb[((HEIGHT - 1) * WIDTH + WIDTH / 2) as usize];
    assert_eq!(bottom, 0x191919);
}

#[test]
fn frame_loop_stops_when_flag_is_cleared() {
    let mut renderer = Renderer::new(config(), lit_sphere(), Texture::solid(0xFFFFFF)).unwrap();
    let keep_running = AtomicBool::new(true);
    let mut presented = 0;

    let frames = pollster::block_on(renderer.run(&keep_running, |rgb| {
        assert_eq!(rgb.len(), (WIDTH * HEIGHT) as usize);
        presented += 1;
        if presented == 3 {
            keep_running.store(false, Ordering::Release);
        }
    }))
    .unwrap();

    assert_eq!(frames, 3);
    assert_eq!(presented, 3);
    assert_eq!(renderer.frames(), 3);
}

#[test]
fn stopped_flag_renders_nothing() {
    let mut renderer = Renderer::new(config(), lit_sphere(), Texture::solid(0xFFFFFF)).unwrap();
    let keep_running = AtomicBool::new(false);
    let frames = pollster::block_on(renderer.run(&keep_running, |_| panic!("no frame expected"))).unwrap();
    assert_eq!(frames, 0);
}

#[test]
fn headless_render_runs_the_frame_loop() {
    let config = RenderConfig {
        width: 32,
        height: 24,
        view_plane_distance: 40.0,
        execution_mode: ExecutionMode::Cpu,
        ..RenderConfig::default()
    };
    let last = pollster::block_on(raycaster::render_headless(config, 2)).unwrap();
    assert_eq!(last.len(), 32 * 24);
    assert!(last.iter().any(|&c| c != 0));

    let none = pollster::block_on(raycaster::render_headless(RenderConfig { execution_mode: ExecutionMode::Cpu, ..RenderConfig::default() }, 0)).unwrap();
    assert!(none.is_empty());
}
