use std::f32::consts::PI;

use nalgebra::Vector3;

use crate::scene::{
    vec3_at, RELATIVE_OFFSET_OF_POINT_LIGHT_POSITION, RELATIVE_OFFSET_OF_SIZE,
    RELATIVE_OFFSET_OF_TYPE, SIZE_OF_HEADER, TYPE_POINT_LIGHT,
};
use crate::texture::Texture;

type Vector3f = Vector3<f32>;

pub const MINIMUM_SHADING: f32 = 0.1;
pub const MAXIMUM_SHADING: f32 = 1.0;

/// Diffuse factor in `[0.1, 1.0]` for a surface point lit by every light in `lights`.
///
/// Each point light contributes the raw cosine between the surface normal and
/// the direction to the light. Contributions are summed unclamped, so a light
/// behind the surface darkens it, and only the total is clamped.
pub fn shade(point: &Vector3f, normal: &Vector3f, lights: &[f32]) -> f32 {
    let mut shading = 0.0_f32;
    let mut offset = 0;
    while offset + SIZE_OF_HEADER <= lights.len() {
        let light_type = lights[offset + RELATIVE_OFFSET_OF_TYPE];
        let light_size = lights[offset + RELATIVE_OFFSET_OF_SIZE] as usize;
        if light_size < SIZE_OF_HEADER {
            break;
        }
        if light_type == TYPE_POINT_LIGHT {
            let position = vec3_at(lights, offset + RELATIVE_OFFSET_OF_POINT_LIGHT_POSITION);
            let to_light = (position - point).normalize();
            shading += to_light.dot(normal);
        }
        offset += light_size;
    }
    shading.clamp(MINIMUM_SHADING, MAXIMUM_SHADING)
}

/// Texel coordinates for `point` on the sphere centred at `center`.
pub fn spherical_texture_coordinates(
    point: &Vector3f,
    center: &Vector3f,
    texture_width: u32,
    texture_height: u32,
) -> (i32, i32) {
    let radial = (center - point).normalize();
    let u = 0.5 + radial.x.atan2(radial.z) / (2.0 * PI);
    let v = 0.5 + radial.y.asin() / PI;
    let x = (texture_width as f32 * ((u + 1.0) * 0.5)) as i32;
    let y = (texture_height as f32 * ((v + 1.0) * 0.5)) as i32;
    (x, y)
}

/// Base colour of a textured sphere at `point`, as float channels in `[0, 255]`.
pub fn spherical_texel(point: &Vector3f, center: &Vector3f, texture: &Texture) -> [f32; 3] {
    let (x, y) = spherical_texture_coordinates(point, center, texture.width(), texture.height());
    texture.texel_rgb(x, y)
}

pub fn to_r(rgb: u32) -> u32 {
    (rgb >> 16) & 0xFF
}

pub fn to_g(rgb: u32) -> u32 {
    (rgb >> 8) & 0xFF
}

pub fn to_b(rgb: u32) -> u32 {
    rgb & 0xFF
}

/// Packs channels as `0x00RRGGBB`, keeping only the low byte of each.
pub fn to_rgb(r: i32, g: i32, b: i32) -> u32 {
    (((r & 0xFF) << 16) | ((g & 0xFF) << 8) | (b & 0xFF)) as u32
}
