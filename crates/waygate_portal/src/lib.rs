pub mod material;
pub mod portal;
pub mod render;
pub mod settings;
pub mod traveller;
pub mod world;
