use glam::Vec3;

/// Per-material parameter block consumed by the slice shader. The shader
/// discards fragments on the positive side of the plane; a zero normal means
/// the mesh is drawn whole.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SliceMaterial {
    pub slice_centre: Vec3,
    pub slice_normal: Vec3,
}

impl SliceMaterial {
    pub fn set_slice(&mut self, centre: Vec3, normal: Vec3) {
        self.slice_centre = centre;
        self.slice_normal = normal;
    }

    pub fn clear_slice(&mut self) {
        self.slice_normal = Vec3::ZERO;
    }

    pub fn is_sliced(&self) -> bool {
        self.slice_normal != Vec3::ZERO
    }
}
