//! The per-pixel routine.
//!
//! [`run`] is a pure function of the pixel index and the read-only
//! [`KernelInputs`]; it writes only the slots belonging to that pixel. It never
//! allocates and dispatches on numeric type tags only, which is what lets the
//! same routine run over thousands of pixels at once (see `shaders/raycast.wgsl`
//! for its GPU twin).

use crate::camera::Camera;
use crate::config::MAXIMUM_DISTANCE;
use crate::intersection::{nearest_hit, Intersection, Ray};
use crate::scene::{
    vec3_at, RELATIVE_OFFSET_OF_SPHERE_CENTER, RELATIVE_OFFSET_OF_TYPE, TYPE_PLANE, TYPE_SPHERE,
    TYPE_TRIANGLE,
};
use crate::shading::{shade, spherical_texel, to_rgb};
use crate::texture::Texture;

/// Placeholder base colour for untextured shapes.
const FLAT_WHITE: [f32; 3] = [255.0, 255.0, 255.0];

/// Everything the kernel reads. Nothing here changes during a parallel phase.
#[derive(Copy, Clone, Debug)]
pub struct KernelInputs<'a> {
    pub camera: &'a Camera,
    pub shape_indices: &'a [i32],
    pub shapes: &'a [f32],
    pub lights: &'a [f32],
    pub texture: &'a Texture,
    pub width: u32,
    pub height: u32,
}

/// Traces pixel `index` and returns its packed `0x00RRGGBB` colour.
///
/// `ray`, `intersection` and `color` are this pixel's own slots.
pub fn run(
    index: usize,
    inputs: &KernelInputs<'_>,
    ray: &mut Ray,
    intersection: &mut Intersection,
    color: &mut [f32; 3],
) -> u32 {
    let width = inputs.width as usize;
    let x = (index % width) as u32;
    let y = (index / width) as u32;

    *ray = Ray::new(
        inputs.camera.eye(),
        inputs
            .camera
            .ray_direction(x, y, inputs.width, inputs.height),
    );
    *intersection = nearest_hit(ray, inputs.shape_indices, inputs.shapes);

    let distance = intersection.distance;
    if !(distance > 0.0 && distance < MAXIMUM_DISTANCE) {
        return 0;
    }
    let Some(shape_offset) = intersection.shape() else {
        return 0;
    };

    let point = intersection.point();
    let shading = shade(&point, &intersection.normal(), inputs.lights);

    let shape_type = inputs.shapes[shape_offset + RELATIVE_OFFSET_OF_TYPE];
    if shape_type == TYPE_PLANE || shape_type == TYPE_TRIANGLE {
        *color = FLAT_WHITE;
    } else if shape_type == TYPE_SPHERE {
        let center = vec3_at(inputs.shapes, shape_offset + RELATIVE_OFFSET_OF_SPHERE_CENTER);
        *color = spherical_texel(&point, &center, inputs.texture);
    }

    to_rgb(
        (color[0] * shading) as i32,
        (color[1] * shading) as i32,
        (color[2] * shading) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Light, Scene, Shape};
    use nalgebra::Vector3;

    fn render_pixel(scene: &Scene, camera: &Camera, x: u32, y: u32, size: u32) -> (u32, Intersection) {
        render_textured_pixel(scene, camera, &Texture::solid(0xFFFFFF), x, y, size)
    }

    fn render_textured_pixel(
        scene: &Scene,
        camera: &Camera,
        texture: &Texture,
        x: u32,
        y: u32,
        size: u32,
    ) -> (u32, Intersection) {
        let shapes = scene.shape_buffer();
        let lights = scene.light_buffer();
        let indices = scene.shape_indices();
        let inputs = KernelInputs {
            camera,
            shape_indices: &indices,
            shapes: &shapes,
            lights: &lights,
            texture,
            width: size,
            height: size,
        };
        let mut ray = Ray::default();
        let mut intersection = Intersection::default();
        let mut color = [0.0; 3];
        let rgb = run((y * size + x) as usize, &inputs, &mut ray, &mut intersection, &mut color);
        (rgb, intersection)
    }

    #[test]
    fn miss_is_black() {
        let scene = Scene::new().with_light(Light::point(Vector3::new(0.0, 5.0, -5.0)));
        let (rgb, intersection) = render_pixel(&scene, &Camera::default(), 4, 4, 9);
        assert_eq!(rgb, 0);
        assert_eq!(intersection, Intersection::MISS);
    }

    #[test]
    fn plane_without_lights_gets_ambient_white() {
        let scene = Scene::new().with_shape(Shape::plane(Vector3::new(0.0, 0.0, -1.0)));
        // Plane z == 2, facing the camera.
        let (rgb, intersection) = render_pixel(&scene, &Camera::default(), 4, 4, 9);
        assert!(intersection.is_hit());
        let ambient = (255.0_f32 * 0.1) as u32;
        assert_eq!(rgb, ambient << 16 | ambient << 8 | ambient);
    }

    #[test]
    fn lit_triangle_is_full_white() {
        let scene = Scene::new()
            .with_shape(Shape::triangle(
                Vector3::new(-1.0, -1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(1.0, -1.0, 0.0),
            ))
            .with_light(Light::point(Vector3::new(0.0, 0.0, -1000.0)));
        let (rgb, intersection) = render_pixel(&scene, &Camera::default(), 4, 4, 9);
        assert!(intersection.is_hit());
        assert_eq!(rgb, 0xFFFFFF);
    }

    #[test]
    fn sphere_samples_texel_under_the_hit_point() {
        let mut data = vec![0x0000FF; 16 * 8];
        data[6 * 16 + 12] = 0xFF0000;
        let texture = Texture::new(16, 8, data);
        let scene = Scene::new().with_shape(Shape::sphere(Vector3::zeros(), 1.0));

        // The centre ray hits (0, 0, -1), which maps to texel (12, 6). No lights, so ambient.
        let (rgb, intersection) = render_textured_pixel(&scene, &Camera::default(), &texture, 4, 4, 9);
        approx::assert_relative_eq!(intersection.point(), Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        assert_eq!(rgb, 0x190000);

        // Off-centre pixels land on the blue texels.
        let wide = Camera::look_at(Vector3::new(0.0, 0.0, -5.0), Vector3::zeros(), Vector3::y(), 16.0);
        let (rgb, intersection) = render_textured_pixel(&scene, &wide, &texture, 2, 4, 9);
        assert!(intersection.is_hit());
        assert_eq!(rgb, 0x000019);
    }
}
