//! Headless frame-loop demo: one portal pair, one character flying through.
//! No window, no GPU; the render pipeline is a logging stub.

use std::path::Path;

use glam::{Quat, Vec2, Vec3};
use tracing::{info, trace};

use waygate_core::camera::Camera;
use waygate_core::frame::Frame;
use waygate_portal::portal::{Portal, PortalEnd, PortalPair, ScreenQuad};
use waygate_portal::render::{PortalView, SceneRenderer, ScreenId, TargetId};
use waygate_portal::settings::PortalSettings;
use waygate_portal::traveller::{RigidBody, Traveller, TravellerKind};
use waygate_portal::world::PortalWorld;

const SETTINGS_PATH: &str = "portal_settings.toml";
const DT: f32 = 1.0 / 60.0;
const FRAME_COUNT: u32 = 240;
const RESOLUTION: (u32, u32) = (1280, 720);

struct LoggingRenderer {
    next_target: u64,
    views_rendered: u64,
}

impl SceneRenderer for LoggingRenderer {
    fn create_target(&mut self, width: u32, height: u32) -> TargetId {
        self.next_target += 1;
        info!(width, height, id = self.next_target, "created portal render target");
        TargetId(self.next_target)
    }

    fn release_target(&mut self, target: TargetId) {
        info!(id = target.0, "released portal render target");
    }

    fn set_screen_visible(&mut self, screen: ScreenId, visible: bool) {
        trace!(screen = screen.0, visible, "toggled portal screen");
    }

    fn render_view(&mut self, view: &PortalView, target: TargetId) {
        self.views_rendered += 1;
        trace!(
            target = target.0,
            position = ?view.camera.position(),
            "rendered portal view"
        );
    }
}

fn inside_trigger(portal: &Frame, position: Vec3, half_extents: Vec2) -> bool {
    let local = portal.local_from_world().transform_point3(position);
    local.z.abs() < 1.5 && local.x.abs() < half_extents.x && local.y.abs() < half_extents.y
}

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let settings = match PortalSettings::load(Path::new(SETTINGS_PATH)) {
        Ok(settings) => settings,
        Err(_) => PortalSettings::default(),
    };
    let mut world = PortalWorld::new(settings);

    let screen =
        || ScreenQuad::new(Vec3::ZERO, Vec3::new(2.0, 2.5, 0.05), Vec2::new(1.0, 1.25));
    let a = Portal::new(Frame::new(Vec3::new(0.0, 0.0, 0.0), Quat::IDENTITY), screen());
    let b = Portal::new(Frame::new(Vec3::new(0.0, 0.0, 40.0), Quat::IDENTITY), screen());
    let pair = world.add_pair(PortalPair::new(a, b));

    let traveller = world.add_traveller(
        Traveller::new(
            Frame::new(Vec3::new(0.0, 0.0, -6.0), Quat::IDENTITY),
            TravellerKind::Character,
            1,
        )
        .with_body(RigidBody {
            velocity: Vec3::Z * 4.0,
            angular_velocity: Vec3::ZERO,
        }),
    );

    let viewer = Camera {
        frame: Frame::new(Vec3::new(0.0, 1.0, -12.0), Quat::IDENTITY),
        ..Camera::default()
    };
    let mut renderer = LoggingRenderer {
        next_target: 0,
        views_rendered: 0,
    };

    let mut inside = [false, false];
    for frame_index in 0..FRAME_COUNT {
        // External movement integration stands in for the physics step.
        if let Some(t) = world.traveller_mut(traveller) {
            let velocity = t.body.map_or(Vec3::ZERO, |b| b.velocity);
            let mut frame = t.frame;
            frame.position += velocity * DT;
            t.set_frame(frame);
        }

        // Trigger volumes, normally owned by the physics collaborator.
        for end in [PortalEnd::A, PortalEnd::B] {
            let Some(pair_ref) = world.pair(pair) else {
                continue;
            };
            let portal = pair_ref.portal(end);
            let position = match world.traveller(traveller) {
                Some(t) => t.frame.position,
                None => continue,
            };
            let now_inside =
                inside_trigger(&portal.frame, position, portal.screen.half_extents);
            let was_inside = inside[end.index()];
            inside[end.index()] = now_inside;
            if now_inside && !was_inside {
                world.trigger_enter(pair, end, traveller, viewer.position());
            } else if !now_inside && was_inside {
                world.trigger_exit(pair, end, traveller, viewer.position());
            }
        }

        world.update(viewer.position());
        for event in world.teleport_events().drain() {
            info!(
                frame = frame_index,
                traveller = event.traveller.0,
                from = ?event.from,
                position = ?event.position,
                "traveller teleported"
            );
            // The hand-off moved tracking to the other end's trigger zone.
            inside[event.from.index()] = false;
            inside[event.from.other().index()] = true;
        }

        world.render(&mut renderer, &viewer, RESOLUTION);
    }

    info!(
        frames = FRAME_COUNT,
        views = renderer.views_rendered,
        "headless portal run complete"
    );
}
