use glam::{Mat4, Vec3, Vec4};

/// Six view-frustum planes as (a, b, c, d) with normals pointing inward.
pub type FrustumPlanes = [[f32; 4]; 6];

pub fn extract_frustum_planes(vp: Mat4) -> FrustumPlanes {
    let m = vp.to_cols_array_2d();
    let row0 = [m[0][0], m[1][0], m[2][0], m[3][0]];
    let row1 = [m[0][1], m[1][1], m[2][1], m[3][1]];
    let row2 = [m[0][2], m[1][2], m[2][2], m[3][2]];
    let row3 = [m[0][3], m[1][3], m[2][3], m[3][3]];

    let planes = [
        [row3[0] + row0[0], row3[1] + row0[1], row3[2] + row0[2], row3[3] + row0[3]],
        [row3[0] - row0[0], row3[1] - row0[1], row3[2] - row0[2], row3[3] - row0[3]],
        [row3[0] + row1[0], row3[1] + row1[1], row3[2] + row1[2], row3[3] + row1[3]],
        [row3[0] - row1[0], row3[1] - row1[1], row3[2] - row1[2], row3[3] - row1[3]],
        [row3[0] + row2[0], row3[1] + row2[1], row3[2] + row2[2], row3[3] + row2[3]],
        [row3[0] - row2[0], row3[1] - row2[1], row3[2] - row2[2], row3[3] - row2[3]],
    ];

    let mut result = [[0.0f32; 4]; 6];
    for (i, p) in planes.iter().enumerate() {
        let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        if len > 0.0001 {
            result[i] = [p[0] / len, p[1] / len, p[2] / len, p[3] / len];
        }
    }
    result
}

pub fn sphere_in_frustum(planes: &FrustumPlanes, center: Vec3, radius: f32) -> bool {
    for plane in planes {
        let distance = plane[0] * center.x + plane[1] * center.y + plane[2] * center.z + plane[3];
        if distance < -radius {
            return false;
        }
    }
    true
}

/// Replaces the near plane of `proj` with an arbitrary view-space clip plane
/// (Lengyel's oblique-frustum construction). Returns `proj` unchanged when the
/// plane is near-degenerate with respect to the projection.
pub fn oblique_projection(proj: Mat4, clip_plane_camera: Vec4) -> Mat4 {
    let q = proj.inverse()
        * Vec4::new(
            clip_plane_camera.x.signum(),
            clip_plane_camera.y.signum(),
            1.0,
            1.0,
        );
    let denom = clip_plane_camera.dot(q);
    if denom.abs() < 1e-5 {
        return proj;
    }

    let c = clip_plane_camera * (2.0 / denom);
    let mut m = proj.to_cols_array_2d();
    m[0][2] = c.x - m[0][3];
    m[1][2] = c.y - m[1][3];
    m[2][2] = c.z - m[2][3];
    m[3][2] = c.w - m[3][3];
    Mat4::from_cols_array_2d(&m)
}
