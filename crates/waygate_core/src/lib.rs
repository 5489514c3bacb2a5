pub mod camera;
pub mod events;
pub mod frame;
pub mod projection;
