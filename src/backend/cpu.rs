#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::SceneBuffers;
use crate::camera::Camera;
use crate::error::RenderError;
use crate::intersection::{Intersection, Ray};
use crate::kernel::{self, KernelInputs};
use crate::texture::Texture;

/// Runs the kernel on the host, one rayon task per pixel.
pub struct CpuBackend {
    width: u32,
    height: u32,
    // Inputs
    camera: Camera,
    shape_indices: Vec<i32>,
    shapes: Vec<f32>,
    lights: Vec<f32>,
    texture: Option<Texture>,
    // Per-pixel slots
    rays: Vec<Ray>,
    intersections: Vec<Intersection>,
    pixels: Vec<[f32; 3]>,
    rgb: Vec<u32>,
}

impl CpuBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            camera: Camera::default(),
            shape_indices: Vec::new(),
            shapes: Vec::new(),
            lights: Vec::new(),
            texture: None,
            rays: Vec::new(),
            intersections: Vec::new(),
            pixels: Vec::new(),
            rgb: Vec::new(),
        }
    }

    pub fn num_rays(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn put_scene(&mut self, scene: &SceneBuffers<'_>) {
        let num_rays = self.num_rays();
        self.shapes = scene.shapes.to_vec();
        self.lights = scene.lights.to_vec();
        self.texture = Some(scene.texture.clone());
        self.rays = vec![Ray::default(); num_rays];
        self.intersections = vec![Intersection::MISS; num_rays];
        self.pixels = vec![[0.0; 3]; num_rays];
        self.rgb = vec![0; num_rays];
    }

    pub fn put_frame(&mut self, camera: &Camera, shape_indices: &[i32]) {
        self.camera = *camera;
        self.shape_indices.clear();
        self.shape_indices.extend_from_slice(shape_indices);
    }

    pub fn execute(&mut self) -> Result<(), RenderError> {
        let texture = self.texture.as_ref().ok_or(RenderError::SceneNotUploaded)?;
        let inputs = KernelInputs {
            camera: &self.camera,
            shape_indices: &self.shape_indices,
            shapes: &self.shapes,
            lights: &self.lights,
            texture,
            width: self.width,
            height: self.height,
        };

        #[cfg(not(target_arch = "wasm32"))]
        let slots = self
            .rays
            .par_iter_mut()
            .zip(self.intersections.par_iter_mut())
            .zip(self.pixels.par_iter_mut())
            .zip(self.rgb.par_iter_mut());
        #[cfg(target_arch = "wasm32")]
        let slots = self
            .rays
            .iter_mut()
            .zip(self.intersections.iter_mut())
            .zip(self.pixels.iter_mut())
            .zip(self.rgb.iter_mut());

        slots
            .enumerate()
            .for_each(|(index, (((ray, intersection), color), rgb))| {
                *rgb = kernel::run(index, &inputs, ray, intersection, color);
            });
        Ok(())
    }

    pub fn get_output(&self, rgb: &mut [u32]) -> Result<(), RenderError> {
        if self.texture.is_none() {
            return Err(RenderError::SceneNotUploaded);
        }
        if rgb.len() != self.rgb.len() {
            return Err(RenderError::OutputSize {
                expected: self.rgb.len(),
                actual: rgb.len(),
            });
        }
        rgb.copy_from_slice(&self.rgb);
        Ok(())
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }
}
