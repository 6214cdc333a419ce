use nalgebra::Vector3;

use crate::config::{EPSILON, MAXIMUM_DISTANCE, PLANE_CONSTANT, SIZE_OF_INTERSECTION, SIZE_OF_RAY};
use crate::scene::{
    vec3_at, RELATIVE_OFFSET_OF_PLANE_NORMAL, RELATIVE_OFFSET_OF_SPHERE_CENTER,
    RELATIVE_OFFSET_OF_SPHERE_RADIUS, RELATIVE_OFFSET_OF_TRIANGLE_A, RELATIVE_OFFSET_OF_TRIANGLE_B,
    RELATIVE_OFFSET_OF_TRIANGLE_C, RELATIVE_OFFSET_OF_TRIANGLE_NORMAL, RELATIVE_OFFSET_OF_TYPE,
    TYPE_PLANE, TYPE_SPHERE, TYPE_TRIANGLE,
};

type Vector3f = Vector3<f32>;

/// Per-pixel ray slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Ray {
    pub origin: [f32; 3],
    pub direction: [f32; 3],
}

/// Per-pixel intersection slot. The shape offset is stored as a float like
/// every other field so the slot stays a flat run of floats.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Intersection {
    pub shape_offset: f32,
    pub distance: f32,
    pub point: [f32; 3],
    pub normal: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<Ray>() == SIZE_OF_RAY * 4);
const _: () = assert!(std::mem::size_of::<Intersection>() == SIZE_OF_INTERSECTION * 4);

impl Ray {
    pub fn new(origin: Vector3f, direction: Vector3f) -> Self {
        Self {
            origin: origin.into(),
            direction: direction.into(),
        }
    }

    pub fn origin(&self) -> Vector3f {
        self.origin.into()
    }

    pub fn direction(&self) -> Vector3f {
        self.direction.into()
    }

    pub fn at(&self, t: f32) -> Vector3f {
        self.origin() + self.direction() * t
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Self::MISS
    }
}

impl Intersection {
    pub const MISS: Self = Self {
        shape_offset: -1.0,
        distance: MAXIMUM_DISTANCE,
        point: [0.0; 3],
        normal: [0.0; 3],
    };

    /// Offset of the hit shape, or `None` when the ray hit nothing.
    pub fn shape(&self) -> Option<usize> {
        (self.shape_offset >= 0.0).then_some(self.shape_offset as usize)
    }

    pub fn is_hit(&self) -> bool {
        self.shape().is_some() && self.distance > 0.0 && self.distance < MAXIMUM_DISTANCE
    }

    pub fn point(&self) -> Vector3f {
        self.point.into()
    }

    pub fn normal(&self) -> Vector3f {
        self.normal.into()
    }
}

/// Distance to the plane at `shape_offset`, or `0.0` when the ray runs parallel to it.
pub fn intersect_plane(ray: &Ray, shapes: &[f32], shape_offset: usize) -> f32 {
    let normal = vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_PLANE_NORMAL);
    let denom = ray.direction().dot(&normal);
    if denom.abs() < EPSILON {
        return 0.0;
    }
    (PLANE_CONSTANT - ray.origin().dot(&normal)) / denom
}

/// Distance to the nearest sphere surface strictly in front of the origin, or `0.0`.
pub fn intersect_sphere(ray: &Ray, shapes: &[f32], shape_offset: usize) -> f32 {
    let center = vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_SPHERE_CENTER);
    let radius = shapes[shape_offset + RELATIVE_OFFSET_OF_SPHERE_RADIUS];

    let d = center - ray.origin();
    let b = d.dot(&ray.direction());
    let discriminant = b * b - d.dot(&d) + radius * radius;
    if discriminant < 0.0 {
        return 0.0;
    }

    let discriminant = discriminant.sqrt();
    let mut t = b - discriminant;
    if t <= EPSILON {
        // Origin inside the sphere, try the far side.
        t = b + discriminant;
        if t <= EPSILON {
            return 0.0;
        }
    }
    t
}

/// Möller–Trumbore. Returns `0.0` for a miss or a ray in the triangle's plane.
pub fn intersect_triangle(ray: &Ray, shapes: &[f32], shape_offset: usize) -> f32 {
    let a = vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_TRIANGLE_A);
    let b = vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_TRIANGLE_B);
    let c = vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_TRIANGLE_C);
    let direction = ray.direction();

    let edge0 = b - a;
    let edge1 = c - a;
    let p = direction.cross(&edge1);
    let determinant = edge0.dot(&p);
    if determinant == 0.0 {
        return 0.0;
    }
    let determinant_reciprocal = 1.0 / determinant;

    let to_origin = ray.origin() - a;
    let u = to_origin.dot(&p) * determinant_reciprocal;
    if !(0.0..=1.0).contains(&u) {
        return 0.0;
    }

    let q = to_origin.cross(&edge0);
    let v = direction.dot(&q) * determinant_reciprocal;
    if !(v >= 0.0 && u + v <= 1.0) {
        return 0.0;
    }

    edge1.dot(&q) * determinant_reciprocal
}

/// Dispatches on the record's type tag. Unknown tags never hit.
pub fn intersect_shape(ray: &Ray, shapes: &[f32], shape_offset: usize) -> f32 {
    let shape_type = shapes[shape_offset + RELATIVE_OFFSET_OF_TYPE];
    if shape_type == TYPE_PLANE {
        intersect_plane(ray, shapes, shape_offset)
    } else if shape_type == TYPE_SPHERE {
        intersect_sphere(ray, shapes, shape_offset)
    } else if shape_type == TYPE_TRIANGLE {
        intersect_triangle(ray, shapes, shape_offset)
    } else {
        0.0
    }
}

/// Surface normal of the shape at `point`. Planes and triangles return
/// their stored normal; a point at a sphere's centre gets the zero vector.
pub fn surface_normal(shapes: &[f32], shape_offset: usize, point: &Vector3f) -> Vector3f {
    let shape_type = shapes[shape_offset + RELATIVE_OFFSET_OF_TYPE];
    if shape_type == TYPE_PLANE {
        vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_PLANE_NORMAL)
    } else if shape_type == TYPE_SPHERE {
        let center = vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_SPHERE_CENTER);
        let delta = point - center;
        let length = delta.norm();
        if length > 0.0 {
            delta / length
        } else {
            Vector3f::zeros()
        }
    } else if shape_type == TYPE_TRIANGLE {
        vec3_at(shapes, shape_offset + RELATIVE_OFFSET_OF_TRIANGLE_NORMAL)
    } else {
        Vector3f::zeros()
    }
}

/// Linear scan over the visibility list, stopping at the first negative entry.
pub fn nearest_hit(ray: &Ray, shape_indices: &[i32], shapes: &[f32]) -> Intersection {
    let mut closest_offset = -1;
    let mut closest_distance = MAXIMUM_DISTANCE;

    for &shape_offset in shape_indices.iter().take_while(|&&offset| offset >= 0) {
        let distance = intersect_shape(ray, shapes, shape_offset as usize);
        if distance > 0.0 && distance < closest_distance {
            closest_distance = distance;
            closest_offset = shape_offset;
        }
    }

    if closest_offset < 0 {
        return Intersection::MISS;
    }

    let point = ray.at(closest_distance);
    let normal = surface_normal(shapes, closest_offset as usize, &point);
    Intersection {
        shape_offset: closest_offset as f32,
        distance: closest_distance,
        point: point.into(),
        normal: normal.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, Shape};
    use approx::assert_relative_eq;

    fn single(shape: Shape) -> (Vec<f32>, Vec<i32>) {
        let scene = Scene::new().with_shape(shape);
        (scene.shape_buffer(), scene.shape_indices())
    }

    #[test]
    fn sphere_hit_through_centre() {
        let (shapes, _) = single(Shape::sphere(Vector3f::new(0.0, 0.0, 10.0), 2.0));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::z());
        assert_relative_eq!(intersect_sphere(&ray, &shapes, 0), 8.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_from_inside_hits_far_side() {
        let (shapes, _) = single(Shape::sphere(Vector3f::zeros(), 3.0));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::x());
        assert_relative_eq!(intersect_sphere(&ray, &shapes, 0), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_behind_origin_is_missed() {
        let (shapes, _) = single(Shape::sphere(Vector3f::new(0.0, 0.0, -10.0), 2.0));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::z());
        assert_eq!(intersect_sphere(&ray, &shapes, 0), 0.0);
    }

    #[test]
    fn sphere_beside_ray_is_missed() {
        let (shapes, _) = single(Shape::sphere(Vector3f::new(5.0, 0.0, 10.0), 1.0));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::z());
        assert_eq!(intersect_sphere(&ray, &shapes, 0), 0.0);
    }

    #[test]
    fn plane_parallel_ray_is_missed() {
        let (shapes, _) = single(Shape::plane(Vector3f::y()));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::x());
        assert_eq!(intersect_plane(&ray, &shapes, 0), 0.0);
    }

    #[test]
    fn plane_sits_at_constant_offset() {
        let (shapes, _) = single(Shape::plane(Vector3f::y()));
        let ray = Ray::new(Vector3f::new(0.0, 3.0, 0.0), -Vector3f::y());
        // The plane is y == -2.
        assert_relative_eq!(intersect_plane(&ray, &shapes, 0), 5.0, epsilon = 1e-6);

        let away = Ray::new(Vector3f::new(0.0, 3.0, 0.0), Vector3f::y());
        assert!(intersect_plane(&away, &shapes, 0) < 0.0);
    }

    #[test]
    fn triangle_centroid_is_hit() {
        let a = Vector3f::new(-1.0, -1.0, 5.0);
        let b = Vector3f::new(1.0, -1.0, 5.0);
        let c = Vector3f::new(0.0, 1.0, 5.0);
        let (shapes, _) = single(Shape::triangle(a, b, c));
        let centroid = (a + b + c) / 3.0;
        let origin = Vector3f::new(0.3, -0.2, -1.0);
        let ray = Ray::new(origin, (centroid - origin).normalize());

        let t = intersect_triangle(&ray, &shapes, 0);
        assert_relative_eq!(t, (centroid - origin).norm(), epsilon = 1e-4);
    }

    #[test]
    fn triangle_outside_edges_is_missed() {
        let (shapes, _) = single(Shape::triangle(
            Vector3f::new(-1.0, -1.0, 5.0),
            Vector3f::new(1.0, -1.0, 5.0),
            Vector3f::new(0.0, 1.0, 5.0),
        ));
        let ray = Ray::new(Vector3f::new(2.0, 2.0, 0.0), Vector3f::z());
        assert_eq!(intersect_triangle(&ray, &shapes, 0), 0.0);

        let edge_on = Ray::new(Vector3f::new(-5.0, 0.0, 5.0), Vector3f::x());
        assert_eq!(intersect_triangle(&edge_on, &shapes, 0), 0.0);
    }

    #[test]
    fn triangle_nan_inputs_never_hit() {
        let (mut shapes, _) = single(Shape::triangle(
            Vector3f::new(-1.0, -1.0, 5.0),
            Vector3f::new(1.0, -1.0, 5.0),
            Vector3f::new(0.0, 1.0, 5.0),
        ));
        let nan_ray = Ray::new(Vector3f::zeros(), Vector3f::new(0.0, f32::NAN, 1.0));
        assert_eq!(intersect_triangle(&nan_ray, &shapes, 0), 0.0);

        shapes[RELATIVE_OFFSET_OF_TRIANGLE_C + 1] = f32::NAN;
        let ray = Ray::new(Vector3f::zeros(), Vector3f::z());
        assert_eq!(intersect_triangle(&ray, &shapes, 0), 0.0);
    }

    #[test]
    fn nearest_of_two_spheres_wins() {
        let scene = Scene::new()
            .with_shape(Shape::sphere(Vector3f::new(0.0, 0.0, 20.0), 1.0))
            .with_shape(Shape::sphere(Vector3f::new(0.0, 0.0, 10.0), 1.0));
        let shapes = scene.shape_buffer();
        let ray = Ray::new(Vector3f::zeros(), Vector3f::z());

        let hit = nearest_hit(&ray, &scene.shape_indices(), &shapes);
        assert!(hit.is_hit());
        assert_eq!(hit.shape(), scene.shape_offset(1));
        assert_relative_eq!(hit.distance, 9.0, epsilon = 1e-5);
        assert_relative_eq!(hit.point(), Vector3f::new(0.0, 0.0, 9.0), epsilon = 1e-5);
        assert_relative_eq!(hit.normal(), -Vector3f::z(), epsilon = 1e-5);
    }

    #[test]
    fn ray_pointing_away_misses_everything() {
        let scene = Scene::new()
            .with_shape(Shape::sphere(Vector3f::new(0.0, 0.0, 10.0), 1.0))
            .with_shape(Shape::triangle(
                Vector3f::new(-1.0, -1.0, 5.0),
                Vector3f::new(1.0, -1.0, 5.0),
                Vector3f::new(0.0, 1.0, 5.0),
            ))
            .with_shape(Shape::plane(Vector3f::y()));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::new(0.0, 1.0, -1.0).normalize());

        let hit = nearest_hit(&ray, &scene.shape_indices(), &scene.shape_buffer());
        assert_eq!(hit, Intersection::MISS);
        assert_eq!(hit.shape(), None);
        assert!(!hit.is_hit());
    }

    #[test]
    fn sentinel_stops_the_scan() {
        let scene = Scene::new().with_shape(Shape::sphere(Vector3f::new(0.0, 0.0, 10.0), 1.0));
        let ray = Ray::new(Vector3f::zeros(), Vector3f::z());
        let hit = nearest_hit(&ray, &[-1, 0], &scene.shape_buffer());
        assert_eq!(hit, Intersection::MISS);
    }

    #[test]
    fn normals_per_shape_type() {
        let scene = Scene::new()
            .with_shape(Shape::sphere(Vector3f::new(1.0, 1.0, 1.0), 2.0))
            .with_shape(Shape::plane(Vector3f::new(0.0, 0.0, -3.0)));
        let shapes = scene.shape_buffer();

        let on_sphere = Vector3f::new(1.0, 3.0, 1.0);
        assert_relative_eq!(surface_normal(&shapes, 0, &on_sphere), Vector3f::y(), epsilon = 1e-6);
        let centre = Vector3f::new(1.0, 1.0, 1.0);
        assert_eq!(surface_normal(&shapes, 0, &centre), Vector3f::zeros());

        let plane = scene.shape_offset(1).unwrap();
        assert_eq!(surface_normal(&shapes, plane, &centre), -Vector3f::z());
    }
}
