use glam::Mat4;
use waygate_core::camera::Camera;

/// Opaque handle to an off-screen colour buffer owned by the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub u64);

/// Stable identity of a portal screen quad within the pipeline's scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenId(pub u64);

#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    pub id: TargetId,
    pub width: u32,
    pub height: u32,
}

/// Virtual-camera view handed to the render pipeline for one portal pass:
/// the mirrored camera plus its (possibly oblique-clipped) view-projection.
#[derive(Debug, Clone, Copy)]
pub struct PortalView {
    pub camera: Camera,
    pub view_proj: Mat4,
}

/// Seam to the render pipeline collaborator. The core decides when targets
/// are (re)created and released and which view to draw; the pipeline owns the
/// actual GPU resources and draw calls.
pub trait SceneRenderer {
    fn create_target(&mut self, width: u32, height: u32) -> TargetId;
    fn release_target(&mut self, target: TargetId);
    /// Shows or hides a portal screen in the pipeline's scene. The core
    /// brackets every `render_view` with these so a portal's own screen is
    /// invisible for the duration of its own render and cannot occlude its
    /// render target's geometry.
    fn set_screen_visible(&mut self, screen: ScreenId, visible: bool);
    fn render_view(&mut self, view: &PortalView, target: TargetId);
}
