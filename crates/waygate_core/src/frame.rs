use glam::{Mat4, Quat, Vec3};

/// Rigid world transform: position plus orientation. Scale is deliberately
/// excluded; portal planes, travellers and cameras are all rigid frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Frame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Frame {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Extracts the rigid part of a transform matrix. Any scale the matrix
    /// carries is discarded.
    pub fn from_matrix(mat: Mat4) -> Self {
        let (_, rotation, position) = mat.to_scale_rotation_translation();
        Self {
            position,
            rotation: rotation.normalize(),
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn world_from_local(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn local_from_world(&self) -> Mat4 {
        self.world_from_local().inverse()
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.position
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse() * vector
    }
}

/// World transform a subject would have if the space on `from`'s side were
/// continued through the gateway onto `to`'s side:
/// `to.world_from_local * from.local_from_world * subject.world_from_local`.
pub fn through_portal_matrix(from: &Frame, to: &Frame, subject: &Frame) -> Mat4 {
    to.world_from_local() * from.local_from_world() * subject.world_from_local()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec3};

    use super::{through_portal_matrix, Frame};

    #[test]
    fn identity_frame_basis() {
        let frame = Frame::IDENTITY;
        assert_eq!(frame.forward(), Vec3::Z);
        assert_eq!(frame.up(), Vec3::Y);
        assert_eq!(frame.right(), Vec3::X);
    }

    #[test]
    fn matrix_round_trip() {
        let frame = Frame::new(
            Vec3::new(3.0, -1.0, 7.5),
            Quat::from_rotation_y(0.8) * Quat::from_rotation_x(-0.3),
        );
        let recovered = Frame::from_matrix(frame.world_from_local());
        assert!(recovered.position.abs_diff_eq(frame.position, 1e-5));
        // Compare the rotation's action, not its components, to sidestep the
        // quaternion sign ambiguity.
        assert!(recovered.forward().abs_diff_eq(frame.forward(), 1e-5));
        assert!(recovered.up().abs_diff_eq(frame.up(), 1e-5));
    }

    #[test]
    fn transform_vector_inverts() {
        let frame = Frame::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(1.1));
        let v = Vec3::new(0.2, -4.0, 1.5);
        let back = frame.inverse_transform_vector(frame.transform_vector(v));
        assert!(back.abs_diff_eq(v, 1e-6));
    }

    #[test]
    fn through_portal_maps_local_offsets() {
        // Gateway at the origin facing +Z, exit at (10, 0, 0) facing +X.
        let from = Frame::new(Vec3::ZERO, Quat::IDENTITY);
        let to = Frame::new(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_y(FRAC_PI_2));

        // Subject two units behind the entry plane.
        let subject = Frame::new(Vec3::new(0.0, 0.0, -2.0), Quat::IDENTITY);
        let mapped = Frame::from_matrix(through_portal_matrix(&from, &to, &subject));

        // Two units behind the exit plane, along the exit's local -Z (+X world rotated).
        let expected = to.transform_point(Vec3::new(0.0, 0.0, -2.0));
        assert!(mapped.position.abs_diff_eq(expected, 1e-5));
        assert!(mapped.forward().abs_diff_eq(to.forward(), 1e-5));
    }
}
