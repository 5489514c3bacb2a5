use std::io;
use std::path::Path;
use std::fs;

use serde::{Deserialize, Serialize};

const MIN_THICKENING_SIZE: f32 = 0.05;
const MAX_THICKENING_SIZE: f32 = 2.0;
const MIN_NEAR_CLIP_OFFSET: f32 = 0.0;
const MAX_NEAR_CLIP_OFFSET: f32 = 0.5;
const MIN_NEAR_CLIP_LIMIT: f32 = 0.01;
const MAX_NEAR_CLIP_LIMIT: f32 = 1.0;
const MIN_TEXTURE_SCALE: f32 = 0.25;
const MAX_TEXTURE_SCALE: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSettings {
    /// Depth given to a portal screen while a character straddles it, so the
    /// viewer's near plane cannot poke through the quad.
    #[serde(default = "default_thickening_size")]
    pub thickening_size: f32,
    /// Outward bias applied to the oblique clip plane.
    #[serde(default = "default_near_clip_offset")]
    pub near_clip_offset: f32,
    /// Below this camera-to-plane distance the oblique override is skipped;
    /// the construction degenerates and produces artifacts when the camera
    /// sits almost on the plane.
    #[serde(default = "default_near_clip_limit")]
    pub near_clip_limit: f32,
    /// Render-target resolution as a fraction of the output resolution.
    #[serde(default = "default_texture_scale")]
    pub texture_scale: f32,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            thickening_size: default_thickening_size(),
            near_clip_offset: default_near_clip_offset(),
            near_clip_limit: default_near_clip_limit(),
            texture_scale: default_texture_scale(),
        }
    }
}

impl PortalSettings {
    pub fn sanitize(mut self) -> Self {
        self.thickening_size = self
            .thickening_size
            .clamp(MIN_THICKENING_SIZE, MAX_THICKENING_SIZE);
        self.near_clip_offset = self
            .near_clip_offset
            .clamp(MIN_NEAR_CLIP_OFFSET, MAX_NEAR_CLIP_OFFSET);
        self.near_clip_limit = self
            .near_clip_limit
            .clamp(MIN_NEAR_CLIP_LIMIT, MAX_NEAR_CLIP_LIMIT);
        self.texture_scale = self.texture_scale.clamp(MIN_TEXTURE_SCALE, MAX_TEXTURE_SCALE);
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize portal settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize portal settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }
}

fn default_thickening_size() -> f32 {
    0.5
}

fn default_near_clip_offset() -> f32 {
    0.05
}

fn default_near_clip_limit() -> f32 {
    0.2
}

fn default_texture_scale() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::PortalSettings;

    #[test]
    fn empty_document_yields_defaults() {
        let parsed: PortalSettings = toml::from_str("").unwrap();
        let defaults = PortalSettings::default();
        assert_eq!(parsed.thickening_size, defaults.thickening_size);
        assert_eq!(parsed.near_clip_offset, defaults.near_clip_offset);
        assert_eq!(parsed.near_clip_limit, defaults.near_clip_limit);
        assert_eq!(parsed.texture_scale, defaults.texture_scale);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let settings = PortalSettings {
            thickening_size: 100.0,
            near_clip_offset: -1.0,
            near_clip_limit: 0.0,
            texture_scale: 8.0,
        }
        .sanitize();

        assert_eq!(settings.thickening_size, 2.0);
        assert_eq!(settings.near_clip_offset, 0.0);
        assert_eq!(settings.near_clip_limit, 0.01);
        assert_eq!(settings.texture_scale, 1.0);
    }

    #[test]
    fn partial_document_keeps_remaining_defaults() {
        let parsed: PortalSettings = toml::from_str("thickening_size = 0.75").unwrap();
        assert_eq!(parsed.thickening_size, 0.75);
        assert_eq!(parsed.near_clip_limit, PortalSettings::default().near_clip_limit);
    }
}
