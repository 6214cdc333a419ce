use nalgebra::Vector3;

use crate::config::SIZE_OF_CAMERA;

type Vector3f = Vector3<f32>;

/// Camera as the kernel sees it: 19 tightly packed floats.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Camera {
    /// matrix parameters
    eye: [f32; 3],
    up: [f32; 3],
    look_at: [f32; 3],

    /// orthonormal basis
    // draw toward +X of the picture
    u: [f32; 3],
    // draw toward the bottom row of the picture
    v: [f32; 3],
    // points back, away from the look-at point
    w: [f32; 3],

    view_plane_distance: f32,
}

const _: () = assert!(std::mem::size_of::<Camera>() == SIZE_OF_CAMERA * 4);

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(
            Vector3f::new(0.0, 0.0, -5.0),
            Vector3f::zeros(),
            Vector3f::y(),
            800.0,
        )
    }
}

impl Camera {
    pub const ABSOLUTE_OFFSET_OF_EYE: usize = 0;
    pub const ABSOLUTE_OFFSET_OF_U: usize = 9;
    pub const ABSOLUTE_OFFSET_OF_V: usize = 12;
    pub const ABSOLUTE_OFFSET_OF_W: usize = 15;
    pub const ABSOLUTE_OFFSET_OF_VIEW_PLANE_DISTANCE: usize = 18;

    pub fn look_at(eye: Vector3f, target: Vector3f, up: Vector3f, view_plane_distance: f32) -> Self {
        let mut camera = Self {
            eye: eye.into(),
            up: up.into(),
            look_at: target.into(),
            u: [0.0; 3],
            v: [0.0; 3],
            w: [0.0; 3],
            view_plane_distance,
        };
        camera.update_basis();
        camera
    }

    pub fn eye(&self) -> Vector3f {
        self.eye.into()
    }

    pub fn u(&self) -> Vector3f {
        self.u.into()
    }

    pub fn v(&self) -> Vector3f {
        self.v.into()
    }

    pub fn w(&self) -> Vector3f {
        self.w.into()
    }

    pub fn view_plane_distance(&self) -> f32 {
        self.view_plane_distance
    }

    pub fn set_view_plane_distance(&mut self, view_plane_distance: f32) {
        self.view_plane_distance = view_plane_distance;
    }

    /// Translates eye and look-at along the local basis. `-dz` moves forward.
    pub fn move_by(&mut self, dx: f32, dy: f32, dz: f32) {
        let delta = self.u() * dx + self.v() * dy + self.w() * dz;
        self.eye = (self.eye() + delta).into();
        self.look_at = (Vector3f::from(self.look_at) + delta).into();
    }

    /// Unit direction of the primary ray through the centre of pixel `(x, y)`.
    pub fn ray_direction(&self, x: u32, y: u32, width: u32, height: u32) -> Vector3f {
        let u = x as f32 - width as f32 / 2.0 + 0.5;
        let v = y as f32 - height as f32 / 2.0 + 0.5;
        (self.u() * u + self.v() * v - self.w() * self.view_plane_distance).normalize()
    }

    pub fn as_slice(&self) -> &[f32] {
        bytemuck::cast_slice(std::slice::from_ref(self))
    }

    fn update_basis(&mut self) {
        let eye = self.eye();
        let w = (eye - Vector3f::from(self.look_at)).normalize();
        let u = Vector3f::from(self.up).cross(&w).normalize();
        let v = u.cross(&w);
        self.u = u.into();
        self.v = v.into();
        self.w = w.into();
    }
}
