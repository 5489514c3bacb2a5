use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use tracing::debug;

use waygate_core::camera::Camera;
use waygate_core::events::{channel, EventReceiver, EventSender};
use waygate_core::projection::extract_frustum_planes;

use crate::portal::{PortalEnd, PortalPair};
use crate::render::SceneRenderer;
use crate::settings::PortalSettings;
use crate::traveller::{Traveller, TravellerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub u32);

/// Published to the physics collaborator whenever a traveller is teleported;
/// at most one per traveller per frame.
#[derive(Debug, Clone, Copy)]
pub struct TeleportEvent {
    pub traveller: TravellerId,
    pub pair: PairId,
    pub from: PortalEnd,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Frame-synchronous orchestrator over every portal pair and traveller.
/// All mutation happens on the update/render thread in a fixed per-frame
/// order: the crossing pass (`update`), then the render pass (`render`) with
/// slice-parameter hooks bracketing each portal view.
pub struct PortalWorld {
    settings: PortalSettings,
    pairs: Vec<PortalPair>,
    travellers: FxHashMap<TravellerId, Traveller>,
    next_traveller_id: u32,
    teleport_tx: EventSender<TeleportEvent>,
    teleport_rx: EventReceiver<TeleportEvent>,
}

impl PortalWorld {
    pub fn new(settings: PortalSettings) -> Self {
        let (teleport_tx, teleport_rx) = channel();
        Self {
            settings: settings.sanitize(),
            pairs: Vec::new(),
            travellers: FxHashMap::default(),
            next_traveller_id: 0,
            teleport_tx,
            teleport_rx,
        }
    }

    pub fn settings(&self) -> &PortalSettings {
        &self.settings
    }

    pub fn add_pair(&mut self, pair: PortalPair) -> PairId {
        self.pairs.push(pair);
        let id = PairId(self.pairs.len() as u32 - 1);
        debug!(pair = id.0, "registered portal pair");
        id
    }

    pub fn add_traveller(&mut self, traveller: Traveller) -> TravellerId {
        let id = TravellerId(self.next_traveller_id);
        self.next_traveller_id += 1;
        self.travellers.insert(id, traveller);
        id
    }

    /// External teardown. Any tracked-list entry left behind is pruned on the
    /// next crossing pass.
    pub fn remove_traveller(&mut self, id: TravellerId) -> Option<Traveller> {
        self.travellers.remove(&id)
    }

    pub fn pair(&self, id: PairId) -> Option<&PortalPair> {
        self.pairs.get(id.0 as usize)
    }

    pub fn pair_mut(&mut self, id: PairId) -> Option<&mut PortalPair> {
        self.pairs.get_mut(id.0 as usize)
    }

    pub fn traveller(&self, id: TravellerId) -> Option<&Traveller> {
        self.travellers.get(&id)
    }

    pub fn traveller_mut(&mut self, id: TravellerId) -> Option<&mut Traveller> {
        self.travellers.get_mut(&id)
    }

    /// Trigger-volume entry reported by the physics collaborator.
    pub fn trigger_enter(
        &mut self,
        pair: PairId,
        end: PortalEnd,
        traveller: TravellerId,
        viewer_pos: Vec3,
    ) {
        let Some(pair) = self.pairs.get_mut(pair.0 as usize) else {
            return;
        };
        pair.trigger_enter(end, traveller, &mut self.travellers, viewer_pos, &self.settings);
    }

    /// Trigger-volume exit reported by the physics collaborator.
    pub fn trigger_exit(
        &mut self,
        pair: PairId,
        end: PortalEnd,
        traveller: TravellerId,
        viewer_pos: Vec3,
    ) {
        let Some(pair) = self.pairs.get_mut(pair.0 as usize) else {
            return;
        };
        pair.trigger_exit(end, traveller, &mut self.travellers, viewer_pos, &self.settings);
    }

    /// Crossing/teleport pass. Pairs run in registration order, which keeps
    /// multi-pair frames deterministic and reproducible.
    pub fn update(&mut self, viewer_pos: Vec3) {
        for (index, pair) in self.pairs.iter_mut().enumerate() {
            let crossings = pair.update_travellers(&mut self.travellers, viewer_pos, &self.settings);
            for crossing in crossings {
                self.teleport_tx.send(TeleportEvent {
                    traveller: crossing.traveller,
                    pair: PairId(index as u32),
                    from: crossing.from,
                    position: crossing.position,
                    rotation: crossing.rotation,
                });
            }
        }
    }

    /// Render pass: per pair, per end, strictly visibility test, pre-render
    /// hook, render, post-render hook. Each portal view is rendered once per
    /// frame; portal-in-portal recursion is not attempted.
    pub fn render<R: SceneRenderer>(
        &mut self,
        renderer: &mut R,
        viewer: &Camera,
        resolution: (u32, u32),
    ) {
        let frustum = extract_frustum_planes(viewer.view_projection_matrix());
        for pair in &mut self.pairs {
            for end in [PortalEnd::A, PortalEnd::B] {
                if !pair.linked_screen_visible(end, &frustum) {
                    continue;
                }
                // Hooks bracket the render so slicing reflects the view about
                // to be drawn, independent of any teleport later this frame.
                pair.update_slice_params(end, &mut self.travellers);
                pair.render_end(end, renderer, viewer, resolution, &self.settings);
                pair.update_slice_params(end, &mut self.travellers);
            }
        }
    }

    /// Teleport notifications for the physics collaborator; drain once per
    /// frame after `update`.
    pub fn teleport_events(&self) -> &EventReceiver<TeleportEvent> {
        &self.teleport_rx
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec2, Vec3};

    use waygate_core::camera::Camera;
    use waygate_core::frame::Frame;

    use super::{PairId, PortalWorld};
    use crate::portal::{Portal, PortalEnd, PortalPair, ScreenQuad};
    use crate::render::{PortalView, SceneRenderer, ScreenId, TargetId};
    use crate::settings::PortalSettings;
    use crate::traveller::{Traveller, TravellerId, TravellerKind};

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Create(u32, u32),
        Release(TargetId),
        SetVisible(ScreenId, bool),
        Render(TargetId),
    }

    #[derive(Default)]
    struct RecordingRenderer {
        next_id: u64,
        calls: Vec<Call>,
    }

    impl SceneRenderer for RecordingRenderer {
        fn create_target(&mut self, width: u32, height: u32) -> TargetId {
            self.next_id += 1;
            self.calls.push(Call::Create(width, height));
            TargetId(self.next_id)
        }

        fn release_target(&mut self, target: TargetId) {
            self.calls.push(Call::Release(target));
        }

        fn set_screen_visible(&mut self, screen: ScreenId, visible: bool) {
            self.calls.push(Call::SetVisible(screen, visible));
        }

        fn render_view(&mut self, _view: &PortalView, target: TargetId) {
            self.calls.push(Call::Render(target));
        }
    }

    fn screen() -> ScreenQuad {
        ScreenQuad::new(Vec3::ZERO, Vec3::new(2.0, 2.5, 0.05), Vec2::new(1.0, 1.25))
    }

    /// Both portals ahead of a viewer at the origin looking down +Z.
    fn facing_world() -> (PortalWorld, PairId, Camera) {
        let mut world = PortalWorld::new(PortalSettings::default());
        let a = Portal::new(Frame::new(Vec3::new(0.0, 0.0, 10.0), Quat::IDENTITY), screen());
        let b = Portal::new(Frame::new(Vec3::new(4.0, 0.0, 20.0), Quat::IDENTITY), screen());
        let pair = world.add_pair(PortalPair::new(a, b));
        let viewer = Camera::default();
        (world, pair, viewer)
    }

    fn screen_ids(world: &PortalWorld, pair: PairId) -> (ScreenId, ScreenId) {
        let pair = world.pair(pair).unwrap();
        (
            pair.portal(PortalEnd::A).screen.id(),
            pair.portal(PortalEnd::B).screen.id(),
        )
    }

    #[test]
    fn render_creates_and_binds_targets_once() {
        let (mut world, pair, viewer) = facing_world();
        let (screen_a, screen_b) = screen_ids(&world, pair);
        let mut renderer = RecordingRenderer::default();

        world.render(&mut renderer, &viewer, (1280, 720));
        assert_eq!(
            renderer.calls,
            vec![
                Call::Create(1280, 720),
                Call::SetVisible(screen_a, false),
                Call::Render(TargetId(1)),
                Call::SetVisible(screen_a, true),
                Call::Create(1280, 720),
                Call::SetVisible(screen_b, false),
                Call::Render(TargetId(2)),
                Call::SetVisible(screen_b, true),
            ]
        );

        // A's texture is sampled on B's screen and vice versa.
        let pair = world.pair(pair).unwrap();
        assert_eq!(
            pair.portal(PortalEnd::B).screen.bound_target,
            Some(pair.portal(PortalEnd::A).render_target().unwrap().id)
        );
        assert_eq!(
            pair.portal(PortalEnd::A).screen.bound_target,
            Some(pair.portal(PortalEnd::B).render_target().unwrap().id)
        );

        // Screens were hidden for their own render only.
        assert!(pair.portal(PortalEnd::A).screen.visible);
        assert!(pair.portal(PortalEnd::B).screen.visible);

        // Steady state: no recreation, just two more bracketed views.
        renderer.calls.clear();
        world.render(&mut renderer, &viewer, (1280, 720));
        assert_eq!(
            renderer.calls,
            vec![
                Call::SetVisible(screen_a, false),
                Call::Render(TargetId(1)),
                Call::SetVisible(screen_a, true),
                Call::SetVisible(screen_b, false),
                Call::Render(TargetId(2)),
                Call::SetVisible(screen_b, true),
            ]
        );
    }

    #[test]
    fn resolution_change_releases_before_recreating() {
        let (mut world, pair, viewer) = facing_world();
        let (screen_a, screen_b) = screen_ids(&world, pair);
        let mut renderer = RecordingRenderer::default();

        world.render(&mut renderer, &viewer, (1280, 720));
        renderer.calls.clear();

        world.render(&mut renderer, &viewer, (1920, 1080));
        assert_eq!(
            renderer.calls,
            vec![
                Call::Release(TargetId(1)),
                Call::Create(1920, 1080),
                Call::SetVisible(screen_a, false),
                Call::Render(TargetId(3)),
                Call::SetVisible(screen_a, true),
                Call::Release(TargetId(2)),
                Call::Create(1920, 1080),
                Call::SetVisible(screen_b, false),
                Call::Render(TargetId(4)),
                Call::SetVisible(screen_b, true),
            ]
        );
    }

    #[test]
    fn own_screen_is_hidden_exactly_during_its_render() {
        struct VisibilityRenderer {
            next_id: u64,
            hidden: Vec<ScreenId>,
            observed: Vec<(TargetId, Vec<ScreenId>)>,
        }

        impl SceneRenderer for VisibilityRenderer {
            fn create_target(&mut self, _width: u32, _height: u32) -> TargetId {
                self.next_id += 1;
                TargetId(self.next_id)
            }

            fn release_target(&mut self, _target: TargetId) {}

            fn set_screen_visible(&mut self, screen: ScreenId, visible: bool) {
                if visible {
                    self.hidden.retain(|s| *s != screen);
                } else if !self.hidden.contains(&screen) {
                    self.hidden.push(screen);
                }
            }

            fn render_view(&mut self, _view: &PortalView, target: TargetId) {
                self.observed.push((target, self.hidden.clone()));
            }
        }

        let (mut world, pair, viewer) = facing_world();
        let (screen_a, screen_b) = screen_ids(&world, pair);
        let mut renderer = VisibilityRenderer {
            next_id: 0,
            hidden: Vec::new(),
            observed: Vec::new(),
        };

        world.render(&mut renderer, &viewer, (1280, 720));

        // At the moment each view is drawn, the rendering portal's own screen
        // is the one and only hidden quad in the pipeline's scene.
        assert_eq!(
            renderer.observed,
            vec![
                (TargetId(1), vec![screen_a]),
                (TargetId(2), vec![screen_b]),
            ]
        );
        assert!(renderer.hidden.is_empty());
    }

    #[test]
    fn texture_scale_shrinks_the_target() {
        let settings = PortalSettings {
            texture_scale: 0.5,
            ..PortalSettings::default()
        };
        let mut world = PortalWorld::new(settings);
        let a = Portal::new(Frame::new(Vec3::new(0.0, 0.0, 10.0), Quat::IDENTITY), screen());
        let b = Portal::new(Frame::new(Vec3::new(4.0, 0.0, 20.0), Quat::IDENTITY), screen());
        world.add_pair(PortalPair::new(a, b));

        let mut renderer = RecordingRenderer::default();
        world.render(&mut renderer, &Camera::default(), (1280, 720));
        assert!(renderer.calls.contains(&Call::Create(640, 360)));
    }

    #[test]
    fn offscreen_portals_are_not_rendered() {
        let (mut world, _, _) = facing_world();
        let mut renderer = RecordingRenderer::default();

        // Viewer looking away from both screens.
        let viewer = Camera {
            frame: Frame::new(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::PI)),
            ..Camera::default()
        };
        world.render(&mut renderer, &viewer, (1280, 720));
        assert!(renderer.calls.is_empty());
    }

    #[test]
    fn render_pass_slices_tracked_travellers() {
        let (mut world, pair, viewer) = facing_world();
        let id = world.add_traveller(Traveller::new(
            Frame::new(Vec3::new(0.0, 0.0, 9.5), Quat::IDENTITY),
            TravellerKind::Prop,
            1,
        ));
        world.trigger_enter(pair, PortalEnd::A, id, viewer.position());

        let mut renderer = RecordingRenderer::default();
        world.render(&mut renderer, &viewer, (1280, 720));

        let traveller = world.traveller(id).unwrap();
        assert!(traveller.graphics.materials.iter().all(|m| m.is_sliced()));
        assert!(traveller
            .graphics_clone
            .as_ref()
            .unwrap()
            .materials
            .iter()
            .all(|m| m.is_sliced()));
    }

    #[test]
    fn culled_portals_skip_the_slice_hooks() {
        let (mut world, pair, viewer) = facing_world();
        let id = world.add_traveller(Traveller::new(
            Frame::new(Vec3::new(0.0, 0.0, 9.5), Quat::IDENTITY),
            TravellerKind::Prop,
            1,
        ));
        world.trigger_enter(pair, PortalEnd::A, id, viewer.position());

        // Viewer looking away: the whole per-portal sequence is skipped, the
        // hooks included, so nothing gets sliced.
        let away = Camera {
            frame: Frame::new(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::PI)),
            ..Camera::default()
        };
        let mut renderer = RecordingRenderer::default();
        world.render(&mut renderer, &away, (1280, 720));

        assert!(renderer.calls.is_empty());
        let traveller = world.traveller(id).unwrap();
        assert!(traveller.graphics.materials.iter().all(|m| !m.is_sliced()));
    }

    #[test]
    fn slicing_is_written_by_the_render_pass_not_the_crossing_pass() {
        let (mut world, pair, viewer) = facing_world();
        let id = world.add_traveller(Traveller::new(
            Frame::new(Vec3::new(0.0, 0.0, 9.5), Quat::IDENTITY),
            TravellerKind::Prop,
            1,
        ));
        world.trigger_enter(pair, PortalEnd::A, id, viewer.position());

        // The render pass cuts the primary at A's plane facing the traveller's
        // far side (side -1 at z = 9.5, normal +forward).
        let mut renderer = RecordingRenderer::default();
        world.render(&mut renderer, &viewer, (1280, 720));
        let entry = world.pair(pair).unwrap().portal(PortalEnd::A).frame;
        {
            let material = &world.traveller(id).unwrap().graphics.materials[0];
            assert!(material.slice_normal.abs_diff_eq(entry.forward(), 1e-6));
            assert_eq!(material.slice_centre, entry.position);
        }

        // A later crossing in the same frame leaves the rendered slicing
        // untouched; the hooks only run inside the render pass.
        world
            .traveller_mut(id)
            .unwrap()
            .set_frame(Frame::new(Vec3::new(0.0, 0.0, 10.5), Quat::IDENTITY));
        world.update(viewer.position());
        assert_eq!(world.teleport_events().drain().len(), 1);

        let material = &world.traveller(id).unwrap().graphics.materials[0];
        assert!(material.slice_normal.abs_diff_eq(entry.forward(), 1e-6));
        assert_eq!(material.slice_centre, entry.position);
    }

    #[test]
    fn update_publishes_one_teleport_event_per_crossing() {
        let (mut world, pair, viewer) = facing_world();
        let id = world.add_traveller(Traveller::new(
            Frame::new(Vec3::new(0.0, 0.0, 9.5), Quat::IDENTITY),
            TravellerKind::Prop,
            0,
        ));
        world.trigger_enter(pair, PortalEnd::A, id, viewer.position());

        world.update(viewer.position());
        assert!(world.teleport_events().drain().is_empty());

        world
            .traveller_mut(id)
            .unwrap()
            .set_frame(Frame::new(Vec3::new(0.0, 0.0, 10.5), Quat::IDENTITY));
        world.update(viewer.position());

        let events = world.teleport_events().drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].traveller, id);
        assert_eq!(events[0].pair, pair);
        assert_eq!(events[0].from, PortalEnd::A);

        world.update(viewer.position());
        assert!(world.teleport_events().drain().is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored_defensively() {
        let (mut world, pair, viewer) = facing_world();
        world.trigger_enter(pair, PortalEnd::A, TravellerId(7), viewer.position());
        world.trigger_enter(PairId(9), PortalEnd::A, TravellerId(0), viewer.position());
        world.trigger_exit(PairId(9), PortalEnd::B, TravellerId(0), viewer.position());
        world.update(viewer.position());
        assert!(world
            .pair(pair)
            .unwrap()
            .portal(PortalEnd::A)
            .tracked()
            .is_empty());
    }
}
