//! Flat tagged-record encoding of shapes and lights.
//!
//! Every record is `[type, size, payload...]` where `size` counts the whole
//! record, header included. A reader can walk any buffer by hopping `size`
//! floats at a time without knowing the variants it skips over, which is the
//! only form of dispatch the per-pixel kernel can afford.

use nalgebra::Vector3;

type Vector3f = Vector3<f32>;

pub const RELATIVE_OFFSET_OF_TYPE: usize = 0;
pub const RELATIVE_OFFSET_OF_SIZE: usize = 1;
pub const SIZE_OF_HEADER: usize = 2;

pub const TYPE_PLANE: f32 = 1.0;
pub const TYPE_SPHERE: f32 = 2.0;
pub const TYPE_TRIANGLE: f32 = 3.0;

pub const SIZE_OF_PLANE: usize = SIZE_OF_HEADER + 3;
pub const SIZE_OF_SPHERE: usize = SIZE_OF_HEADER + 4;
pub const SIZE_OF_TRIANGLE: usize = SIZE_OF_HEADER + 12;

pub const RELATIVE_OFFSET_OF_PLANE_NORMAL: usize = 2;
pub const RELATIVE_OFFSET_OF_SPHERE_CENTER: usize = 2;
pub const RELATIVE_OFFSET_OF_SPHERE_RADIUS: usize = 5;
pub const RELATIVE_OFFSET_OF_TRIANGLE_A: usize = 2;
pub const RELATIVE_OFFSET_OF_TRIANGLE_B: usize = 5;
pub const RELATIVE_OFFSET_OF_TRIANGLE_C: usize = 8;
pub const RELATIVE_OFFSET_OF_TRIANGLE_NORMAL: usize = 11;

pub const TYPE_POINT_LIGHT: f32 = 1.0;
pub const SIZE_OF_POINT_LIGHT: usize = SIZE_OF_HEADER + 4;
pub const RELATIVE_OFFSET_OF_POINT_LIGHT_POSITION: usize = 2;
pub const RELATIVE_OFFSET_OF_POINT_LIGHT_FALLOFF: usize = 5;

/// Terminates a visibility list.
pub const SHAPE_INDEX_SENTINEL: i32 = -1;

#[inline]
pub(crate) fn vec3_at(buffer: &[f32], offset: usize) -> Vector3f {
    Vector3f::new(buffer[offset], buffer[offset + 1], buffer[offset + 2])
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    Plane {
        normal: Vector3f,
    },
    Sphere {
        center: Vector3f,
        radius: f32,
    },
    Triangle {
        a: Vector3f,
        b: Vector3f,
        c: Vector3f,
        normal: Vector3f,
    },
}

impl Shape {
    pub fn plane(normal: Vector3f) -> Self {
        Shape::Plane {
            normal: normal.normalize(),
        }
    }

    pub fn sphere(center: Vector3f, radius: f32) -> Self {
        Shape::Sphere { center, radius }
    }

    /// The normal is precomputed from the winding `a -> b -> c`.
    pub fn triangle(a: Vector3f, b: Vector3f, c: Vector3f) -> Self {
        let normal = (b - a).cross(&(c - a)).normalize();
        Shape::Triangle { a, b, c, normal }
    }

    pub fn type_tag(&self) -> f32 {
        match self {
            Shape::Plane { .. } => TYPE_PLANE,
            Shape::Sphere { .. } => TYPE_SPHERE,
            Shape::Triangle { .. } => TYPE_TRIANGLE,
        }
    }

    /// Record length in floats, header included.
    pub fn size(&self) -> usize {
        match self {
            Shape::Plane { .. } => SIZE_OF_PLANE,
            Shape::Sphere { .. } => SIZE_OF_SPHERE,
            Shape::Triangle { .. } => SIZE_OF_TRIANGLE,
        }
    }

    pub fn encode_into(&self, buffer: &mut Vec<f32>) {
        buffer.push(self.type_tag());
        buffer.push(self.size() as f32);
        match self {
            Shape::Plane { normal } => buffer.extend_from_slice(normal.as_slice()),
            Shape::Sphere { center, radius } => {
                buffer.extend_from_slice(center.as_slice());
                buffer.push(*radius);
            }
            Shape::Triangle { a, b, c, normal } => {
                for v in [a, b, c, normal] {
                    buffer.extend_from_slice(v.as_slice());
                }
            }
        }
    }

    pub fn decode(buffer: &[f32], offset: usize) -> Option<Self> {
        let (tag, record) = record_at(buffer, offset)?;
        let shape = if tag == TYPE_PLANE && record.len() == SIZE_OF_PLANE {
            Shape::Plane {
                normal: vec3_at(record, RELATIVE_OFFSET_OF_PLANE_NORMAL),
            }
        } else if tag == TYPE_SPHERE && record.len() == SIZE_OF_SPHERE {
            Shape::Sphere {
                center: vec3_at(record, RELATIVE_OFFSET_OF_SPHERE_CENTER),
                radius: record[RELATIVE_OFFSET_OF_SPHERE_RADIUS],
            }
        } else if tag == TYPE_TRIANGLE && record.len() == SIZE_OF_TRIANGLE {
            Shape::Triangle {
                a: vec3_at(record, RELATIVE_OFFSET_OF_TRIANGLE_A),
                b: vec3_at(record, RELATIVE_OFFSET_OF_TRIANGLE_B),
                c: vec3_at(record, RELATIVE_OFFSET_OF_TRIANGLE_C),
                normal: vec3_at(record, RELATIVE_OFFSET_OF_TRIANGLE_NORMAL),
            }
        } else {
            return None;
        };
        Some(shape)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Light {
    /// `distance_falloff` is carried in the record but not used by shading yet.
    Point {
        position: Vector3f,
        distance_falloff: f32,
    },
}

impl Light {
    pub fn point(position: Vector3f) -> Self {
        Light::Point {
            position,
            distance_falloff: 1.0,
        }
    }

    pub fn type_tag(&self) -> f32 {
        match self {
            Light::Point { .. } => TYPE_POINT_LIGHT,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Light::Point { .. } => SIZE_OF_POINT_LIGHT,
        }
    }

    pub fn encode_into(&self, buffer: &mut Vec<f32>) {
        buffer.push(self.type_tag());
        buffer.push(self.size() as f32);
        match self {
            Light::Point {
                position,
                distance_falloff,
            } => {
                buffer.extend_from_slice(position.as_slice());
                buffer.push(*distance_falloff);
            }
        }
    }

    pub fn decode(buffer: &[f32], offset: usize) -> Option<Self> {
        let (tag, record) = record_at(buffer, offset)?;
        if tag == TYPE_POINT_LIGHT && record.len() == SIZE_OF_POINT_LIGHT {
            Some(Light::Point {
                position: vec3_at(record, RELATIVE_OFFSET_OF_POINT_LIGHT_POSITION),
                distance_falloff: record[RELATIVE_OFFSET_OF_POINT_LIGHT_FALLOFF],
            })
        } else {
            None
        }
    }
}

/// Reads the header at `offset` and returns the tag and the whole record.
fn record_at(buffer: &[f32], offset: usize) -> Option<(f32, &[f32])> {
    let header = buffer.get(offset..offset + SIZE_OF_HEADER)?;
    let size = header[RELATIVE_OFFSET_OF_SIZE];
    if !(size >= SIZE_OF_HEADER as f32) {
        return None;
    }
    let record = buffer.get(offset..offset + size as usize)?;
    Some((header[RELATIVE_OFFSET_OF_TYPE], record))
}

/// Walks a tagged buffer record by record, yielding `(offset, tag, record)`.
pub struct Records<'a> {
    buffer: &'a [f32],
    offset: usize,
}

impl<'a> Records<'a> {
    pub fn new(buffer: &'a [f32]) -> Self {
        Self { buffer, offset: 0 }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (usize, f32, &'a [f32]);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        let (tag, record) = record_at(self.buffer, offset)?;
        self.offset += record.len();
        Some((offset, tag, record))
    }
}

/// The authoritative shape and light collections of a session.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    shapes: Vec<Shape>,
    shape_offsets: Vec<usize>,
    shape_len: usize,
    lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a shape and returns its stable index, the float offset of its record.
    pub fn add_shape(&mut self, shape: Shape) -> usize {
        let offset = self.shape_len;
        self.shape_len += shape.size();
        self.shapes.push(shape);
        self.shape_offsets.push(offset);
        offset
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.add_shape(shape);
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.add_light(light);
        self
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn shape_offset(&self, shape: usize) -> Option<usize> {
        self.shape_offsets.get(shape).copied()
    }

    pub fn shape_buffer(&self) -> Vec<f32> {
        let mut buffer = Vec::with_capacity(self.shape_len);
        for shape in &self.shapes {
            shape.encode_into(&mut buffer);
        }
        buffer
    }

    pub fn light_buffer(&self) -> Vec<f32> {
        let mut buffer = Vec::with_capacity(self.lights.iter().map(Light::size).sum());
        for light in &self.lights {
            light.encode_into(&mut buffer);
        }
        buffer
    }

    /// A fresh visibility list: every shape offset, then the sentinel.
    pub fn shape_indices(&self) -> Vec<i32> {
        let mut indices = vec![SHAPE_INDEX_SENTINEL; self.shapes.len() + 1];
        self.update_shape_indices(&mut indices);
        indices
    }

    /// Rebuilds the visibility list in place. No culling is performed yet, every shape stays visible.
    pub fn update_shape_indices(&self, indices: &mut [i32]) {
        let mut slots = indices.iter_mut();
        // Offsets lead the zip so no slot is consumed past the last offset.
        for (&offset, slot) in self.shape_offsets.iter().zip(slots.by_ref()) {
            *slot = offset as i32;
        }
        if let Some(slot) = slots.next() {
            *slot = SHAPE_INDEX_SENTINEL;
        }
    }

    pub fn demo() -> Self {
        Scene::new()
            .with_shape(Shape::plane(Vector3f::new(0.0, 1.0, 0.0)))
            .with_shape(Shape::sphere(Vector3f::new(0.0, -0.5, 0.0), 1.5))
            .with_shape(Shape::sphere(Vector3f::new(-4.0, -1.0, 3.0), 1.0))
            .with_shape(Shape::sphere(Vector3f::new(4.0, 0.0, 5.0), 2.0))
            .with_shape(Shape::triangle(
                Vector3f::new(-3.0, -2.0, 8.0),
                Vector3f::new(0.0, 4.0, 8.0),
                Vector3f::new(3.0, -2.0, 8.0),
            ))
            .with_light(Light::point(Vector3f::new(-6.0, 8.0, -6.0)))
            .with_light(Light::point(Vector3f::new(6.0, 4.0, -2.0)))
    }
}
