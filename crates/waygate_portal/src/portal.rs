use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec2, Vec3};
use rustc_hash::FxHashMap;
use tracing::debug;

use waygate_core::camera::Camera;
use waygate_core::frame::{through_portal_matrix, Frame};
use waygate_core::projection::{oblique_projection, sphere_in_frustum, FrustumPlanes};

use crate::render::{PortalView, RenderTarget, SceneRenderer, ScreenId, TargetId};
use crate::settings::PortalSettings;
use crate::traveller::{Traveller, TravellerId, TravellerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalEnd {
    A,
    B,
}

impl PortalEnd {
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Signed side of a plane from a dot product: -1, 0 or +1. Zero (exactly on
/// the plane) never equals a nonzero previous side, so a traveller that
/// grazes the plane counts as crossed. Deliberate tie-break, no epsilon.
pub fn plane_side(value: f32) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

static NEXT_SCREEN_ID: AtomicU64 = AtomicU64::new(1);

/// The portal's visual surface: a thin quad in portal-local space. It is
/// temporarily thickened into a slab while a character straddles the plane
/// so the viewer's near plane and collider cannot clip through it. Every
/// quad gets a unique `ScreenId` at construction so the render pipeline can
/// address it across the `SceneRenderer` seam.
#[derive(Debug)]
pub struct ScreenQuad {
    id: ScreenId,
    baseline_local_position: Vec3,
    baseline_local_scale: Vec3,
    pub local_position: Vec3,
    pub local_scale: Vec3,
    pub half_extents: Vec2,
    pub visible: bool,
    pub bound_target: Option<TargetId>,
}

impl ScreenQuad {
    pub fn new(local_position: Vec3, local_scale: Vec3, half_extents: Vec2) -> Self {
        Self {
            id: ScreenId(NEXT_SCREEN_ID.fetch_add(1, Ordering::Relaxed)),
            baseline_local_position: local_position,
            baseline_local_scale: local_scale,
            local_position,
            local_scale,
            half_extents,
            visible: true,
            bound_target: None,
        }
    }

    pub fn id(&self) -> ScreenId {
        self.id
    }

    /// Grows the quad into a slab away from the viewer, keeping the
    /// viewer-side face on the visual plane.
    fn thicken(&mut self, viewer_side: i8, size: f32) {
        self.local_position =
            self.baseline_local_position - Vec3::Z * viewer_side as f32 * (size * 0.5);
        self.local_scale = Vec3::new(
            self.baseline_local_scale.x,
            self.baseline_local_scale.y,
            size,
        );
    }

    fn reset(&mut self) {
        self.local_position = self.baseline_local_position;
        self.local_scale = self.baseline_local_scale;
    }

    pub fn is_thickened(&self) -> bool {
        self.local_position != self.baseline_local_position
            || self.local_scale != self.baseline_local_scale
    }

    pub fn baseline(&self) -> (Vec3, Vec3) {
        (self.baseline_local_position, self.baseline_local_scale)
    }
}

#[derive(Debug)]
pub struct Portal {
    pub frame: Frame,
    pub screen: ScreenQuad,
    tracked: Vec<TravellerId>,
    target: Option<RenderTarget>,
    virtual_camera: Camera,
}

impl Portal {
    pub fn new(frame: Frame, screen: ScreenQuad) -> Self {
        Self {
            frame,
            screen,
            tracked: Vec::new(),
            target: None,
            virtual_camera: Camera::default(),
        }
    }

    /// Travellers currently inside this portal's trigger zone, insertion
    /// order.
    pub fn tracked(&self) -> &[TravellerId] {
        &self.tracked
    }

    pub fn render_target(&self) -> Option<RenderTarget> {
        self.target
    }

    pub fn virtual_camera(&self) -> &Camera {
        &self.virtual_camera
    }

    pub fn side_of(&self, position: Vec3) -> i8 {
        plane_side((position - self.frame.position).dot(self.frame.forward()))
    }
}

/// One teleport executed during a crossing pass, reported to the orchestrator
/// so it can notify the physics collaborator.
#[derive(Debug, Clone, Copy)]
pub struct Crossing {
    pub traveller: TravellerId,
    pub from: PortalEnd,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Two portals with a symmetric, fixed link. The pairing is structural, so
/// the "linked portal missing" failure mode cannot arise; both ends exist
/// for the pair's whole lifetime.
#[derive(Debug)]
pub struct PortalPair {
    portals: [Portal; 2],
}

impl PortalPair {
    pub fn new(a: Portal, b: Portal) -> Self {
        Self { portals: [a, b] }
    }

    pub fn portal(&self, end: PortalEnd) -> &Portal {
        &self.portals[end.index()]
    }

    pub fn portal_mut(&mut self, end: PortalEnd) -> &mut Portal {
        &mut self.portals[end.index()]
    }

    fn ends_mut(&mut self, end: PortalEnd) -> (&mut Portal, &mut Portal) {
        let [a, b] = &mut self.portals;
        match end {
            PortalEnd::A => (a, b),
            PortalEnd::B => (b, a),
        }
    }

    /// Trigger-zone entry delivered by the physics collaborator. Already
    /// tracked or unknown travellers are ignored.
    pub fn trigger_enter(
        &mut self,
        end: PortalEnd,
        id: TravellerId,
        travellers: &mut FxHashMap<TravellerId, Traveller>,
        viewer_pos: Vec3,
        settings: &PortalSettings,
    ) {
        self.admit(end, id, travellers, viewer_pos, settings);
    }

    /// Trigger-zone exit. A traveller that was never tracked is ignored.
    pub fn trigger_exit(
        &mut self,
        end: PortalEnd,
        id: TravellerId,
        travellers: &mut FxHashMap<TravellerId, Traveller>,
        viewer_pos: Vec3,
        settings: &PortalSettings,
    ) {
        let portal = &mut self.portals[end.index()];
        let Some(index) = portal.tracked.iter().position(|t| *t == id) else {
            return;
        };
        portal.tracked.remove(index);
        if let Some(traveller) = travellers.get_mut(&id) {
            traveller.exit_portal_threshold();
        }
        self.refresh_thickening(end, travellers, viewer_pos, settings);
    }

    fn admit(
        &mut self,
        end: PortalEnd,
        id: TravellerId,
        travellers: &mut FxHashMap<TravellerId, Traveller>,
        viewer_pos: Vec3,
        settings: &PortalSettings,
    ) {
        if self.portals[end.index()].tracked.contains(&id) {
            return;
        }
        let Some(traveller) = travellers.get_mut(&id) else {
            return;
        };

        traveller.enter_portal_threshold();
        let portal = &mut self.portals[end.index()];
        traveller.last_side = portal.side_of(traveller.frame.position);
        portal.tracked.push(id);
        self.refresh_thickening(end, travellers, viewer_pos, settings);
    }

    /// Thickening invariant: the screen is thickened iff at least one tracked
    /// traveller is a character. Called after every tracked-set change.
    fn refresh_thickening(
        &mut self,
        end: PortalEnd,
        travellers: &FxHashMap<TravellerId, Traveller>,
        viewer_pos: Vec3,
        settings: &PortalSettings,
    ) {
        let portal = &mut self.portals[end.index()];
        let has_character = portal.tracked.iter().any(|id| {
            travellers
                .get(id)
                .is_some_and(|t| t.kind == TravellerKind::Character)
        });
        if has_character {
            let viewer_side =
                plane_side((viewer_pos - portal.frame.position).dot(portal.frame.forward()));
            portal.screen.thicken(viewer_side, settings.thickening_size);
        } else {
            portal.screen.reset();
        }
    }

    /// Per-frame crossing pass for both ends. For each tracked traveller:
    /// unchanged plane side updates the clone to the through-portal pose;
    /// a side flip teleports the traveller, leaves the clone on the old pose
    /// to hide the swap, and hands the traveller to the other end. Removals
    /// go through a pending buffer applied after the sweep, preserving the
    /// insertion order of survivors.
    pub fn update_travellers(
        &mut self,
        travellers: &mut FxHashMap<TravellerId, Traveller>,
        viewer_pos: Vec3,
        settings: &PortalSettings,
    ) -> Vec<Crossing> {
        let mut crossings = Vec::new();
        let mut handoffs: Vec<(PortalEnd, TravellerId)> = Vec::new();

        for end in [PortalEnd::A, PortalEnd::B] {
            let entry_frame = self.portals[end.index()].frame;
            let exit_frame = self.portals[end.other().index()].frame;
            let mut departed: Vec<TravellerId> = Vec::new();

            for &id in &self.portals[end.index()].tracked {
                let Some(traveller) = travellers.get_mut(&id) else {
                    // Torn down externally while tracked.
                    departed.push(id);
                    continue;
                };

                let side = plane_side(
                    (traveller.frame.position - entry_frame.position).dot(entry_frame.forward()),
                );
                let mat = through_portal_matrix(&entry_frame, &exit_frame, &traveller.frame);

                if side != traveller.last_side {
                    let old_pose = traveller.frame;
                    let (_, rotation, position) = mat.to_scale_rotation_translation();
                    traveller.teleport(&entry_frame, &exit_frame, position, rotation);
                    if let Some(clone) = &mut traveller.graphics_clone {
                        // The clone keeps drawing exactly where the body just
                        // was, so the swap is invisible for this frame.
                        clone.frame = old_pose;
                    }
                    debug!(traveller = id.0, "traveller crossed portal plane");
                    crossings.push(Crossing {
                        traveller: id,
                        from: end,
                        position,
                        rotation,
                    });
                    departed.push(id);
                    handoffs.push((end.other(), id));
                } else {
                    if let Some(clone) = &mut traveller.graphics_clone {
                        clone.frame = Frame::from_matrix(mat);
                    }
                    traveller.last_side = side;
                }
            }

            if !departed.is_empty() {
                self.portals[end.index()]
                    .tracked
                    .retain(|id| !departed.contains(id));
                self.refresh_thickening(end, travellers, viewer_pos, settings);
            }
        }

        // Hand-offs run after both sweeps so a traveller teleports at most
        // once per frame.
        for (end, id) in handoffs {
            self.admit(end, id, travellers, viewer_pos, settings);
        }

        crossings
    }

    /// Culling test for the render step: is the *linked* portal's screen
    /// (whose surface samples this end's texture) inside the viewer frustum?
    pub fn linked_screen_visible(&self, end: PortalEnd, planes: &FrustumPlanes) -> bool {
        let linked = self.portal(end.other());
        let centre = linked.frame.transform_point(linked.screen.local_position);
        let radius = linked.screen.half_extents.length().max(0.5);
        sphere_in_frustum(planes, centre, radius)
    }

    /// Renders the view seen "through" the linked portal into this end's
    /// off-screen target. The viewer camera is injected by the orchestrator.
    pub fn render_end<R: SceneRenderer>(
        &mut self,
        end: PortalEnd,
        renderer: &mut R,
        viewer: &Camera,
        resolution: (u32, u32),
        settings: &PortalSettings,
    ) {
        let (portal, linked) = self.ends_mut(end);

        let width = scaled_dimension(resolution.0, settings.texture_scale);
        let height = scaled_dimension(resolution.1, settings.texture_scale);
        let stale = portal
            .target
            .map_or(true, |t| t.width != width || t.height != height);
        if stale {
            if let Some(previous) = portal.target.take() {
                renderer.release_target(previous.id);
            }
            let id = renderer.create_target(width, height);
            portal.target = Some(RenderTarget { id, width, height });
            // This end's texture is sampled on the linked portal's screen.
            linked.screen.bound_target = Some(id);
            debug!(width, height, "recreated portal render target");
        }
        let Some(target) = portal.target else {
            return;
        };

        // The portal's own screen must not occlude its render target's
        // geometry; hidden in the pipeline's scene for this render only.
        portal.screen.visible = false;
        renderer.set_screen_visible(portal.screen.id, false);

        let mat = portal.frame.world_from_local()
            * linked.frame.local_from_world()
            * viewer.frame.world_from_local();
        portal.virtual_camera = viewer.with_frame(Frame::from_matrix(mat));

        let view = portal.virtual_camera.view_matrix();
        let projection = clipped_projection(&portal.frame, &portal.virtual_camera, settings);

        renderer.render_view(
            &PortalView {
                camera: portal.virtual_camera,
                view_proj: projection * view,
            },
            target.id,
        );

        renderer.set_screen_visible(portal.screen.id, true);
        portal.screen.visible = true;
    }

    /// Pre-/post-render hook: refresh every tracked traveller's slice planes.
    /// The primary is cut at this portal's plane facing into the portal; the
    /// clone is cut at the linked plane on the matching side.
    pub fn update_slice_params(
        &mut self,
        end: PortalEnd,
        travellers: &mut FxHashMap<TravellerId, Traveller>,
    ) {
        let (portal, linked) = self.ends_mut(end);
        for &id in &portal.tracked {
            let Some(traveller) = travellers.get_mut(&id) else {
                continue;
            };

            let side = portal.side_of(traveller.frame.position) as f32;
            let slice_normal = portal.frame.forward() * -side;
            let clone_normal = linked.frame.forward() * side;

            for material in &mut traveller.graphics.materials {
                material.set_slice(portal.frame.position, slice_normal);
            }
            if let Some(clone) = &mut traveller.graphics_clone {
                for material in &mut clone.materials {
                    material.set_slice(linked.frame.position, clone_normal);
                }
            }
        }
    }
}

fn scaled_dimension(dimension: u32, scale: f32) -> u32 {
    ((dimension.max(1) as f32) * scale).round().max(1.0) as u32
}

/// Oblique near-clip projection for a portal's virtual camera: the portal
/// plane, expressed in view space with its normal flipped toward the camera,
/// replaces the near plane so nothing behind the portal surface is drawn.
/// Below `near_clip_limit` the override is skipped; this is the designed
/// fallback, not an error path.
fn clipped_projection(plane: &Frame, camera: &Camera, settings: &PortalSettings) -> Mat4 {
    let base = camera.projection_matrix();
    let flip = plane_side(plane.forward().dot(plane.position - camera.position())) as f32;

    let view = camera.view_matrix();
    let cam_space_pos = view.transform_point3(plane.position);
    let cam_space_normal = view.transform_vector3(plane.forward()) * flip;
    let cam_space_dist = -cam_space_pos.dot(cam_space_normal) + settings.near_clip_offset;

    if cam_space_dist.abs() > settings.near_clip_limit {
        oblique_projection(base, cam_space_normal.extend(cam_space_dist))
    } else {
        base
    }
}
