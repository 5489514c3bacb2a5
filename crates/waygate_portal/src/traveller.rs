use glam::{Quat, Vec3};
use waygate_core::frame::Frame;

use crate::material::SliceMaterial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TravellerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravellerKind {
    /// Capsule/character body; triggers screen thickening while straddling.
    Character,
    /// Free rigid prop.
    Prop,
}

/// One visual representation of a traveller: the primary mesh instance or its
/// through-portal clone. Materials are flattened across all surfaces in a
/// stable order so primary and clone lists stay index-aligned.
#[derive(Debug, Clone)]
pub struct VisualInstance {
    pub frame: Frame,
    pub local_scale: Vec3,
    pub visible: bool,
    pub materials: Vec<SliceMaterial>,
}

impl VisualInstance {
    pub fn new(frame: Frame, material_count: usize) -> Self {
        Self {
            frame,
            local_scale: Vec3::ONE,
            visible: true,
            materials: vec![SliceMaterial::default(); material_count],
        }
    }
}

/// Optional velocity-aware capability. Travellers that carry one get their
/// velocities re-expressed on teleport; purely kinematic travellers do not.
#[derive(Debug, Clone, Copy, Default)]
pub struct RigidBody {
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl RigidBody {
    /// Maps both velocity vectors from `from`'s local frame into `to`'s, so
    /// "forward through the entry" becomes "forward through the exit".
    /// Magnitudes are preserved; frames are rigid.
    pub fn reproject_through(&mut self, from: &Frame, to: &Frame) {
        self.velocity = to.transform_vector(from.inverse_transform_vector(self.velocity));
        self.angular_velocity =
            to.transform_vector(from.inverse_transform_vector(self.angular_velocity));
    }
}

#[derive(Debug, Clone)]
pub struct Traveller {
    /// Physical/gameplay truth. The clone is only ever a visual mirror.
    pub frame: Frame,
    pub kind: TravellerKind,
    pub graphics: VisualInstance,
    pub graphics_clone: Option<VisualInstance>,
    pub body: Option<RigidBody>,
    /// Signed side of the tracking portal's plane last frame: -1, 0 or +1.
    pub last_side: i8,
}

impl Traveller {
    pub fn new(frame: Frame, kind: TravellerKind, material_count: usize) -> Self {
        Self {
            frame,
            kind,
            graphics: VisualInstance::new(frame, material_count),
            graphics_clone: None,
            body: None,
            last_side: 0,
        }
    }

    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Moves the traveller; the primary visual follows the physical frame.
    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = frame;
        self.graphics.frame = frame;
    }

    /// Called when the traveller enters a portal's trigger zone. The clone is
    /// created once, as a sibling copy of the primary (same scale, same
    /// material list, index-aligned), and only re-shown on re-entry.
    pub fn enter_portal_threshold(&mut self) {
        if let Some(clone) = &mut self.graphics_clone {
            clone.visible = true;
        } else {
            let mut clone = self.graphics.clone();
            clone.visible = true;
            self.graphics_clone = Some(clone);
        }
    }

    /// Called when the traveller leaves the trigger zone: hide the clone and
    /// un-slice the primary. Tolerates being called before any enter.
    pub fn exit_portal_threshold(&mut self) {
        if let Some(clone) = &mut self.graphics_clone {
            clone.visible = false;
        }
        for material in &mut self.graphics.materials {
            material.clear_slice();
        }
    }

    /// Discontinuous transform jump through a portal pair. Velocity
    /// re-projection happens iff the traveller carries a body capability.
    pub fn teleport(&mut self, from: &Frame, to: &Frame, position: Vec3, rotation: Quat) {
        self.set_frame(Frame::new(position, rotation));
        if let Some(body) = &mut self.body {
            body.reproject_through(from, to);
        }
    }
}
