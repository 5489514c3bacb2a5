use glam::{Mat4, Vec3};

use crate::frame::Frame;

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub frame: Frame,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            frame: Frame::IDENTITY,
            fov_y: 70.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn position(&self) -> Vec3 {
        self.frame.position
    }

    pub fn forward(&self) -> Vec3 {
        self.frame.forward()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.frame.position, self.frame.forward(), self.frame.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Same lens, different pose. Used to mirror the viewer camera through a
    /// portal pair without copying lens parameters by hand.
    pub fn with_frame(&self, frame: Frame) -> Self {
        Self { frame, ..*self }
    }
}
