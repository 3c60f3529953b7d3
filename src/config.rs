//! Viewer settings. Everything has a default matching the published viewer; build
//! a [`ViewerConfig`] in code and pass it to [`crate::app::run`].

use crate::{
    pipeline::LoadSettings,
    pipelines::light::LightUniform,
    resources::base_path::BasePathStrategy,
};

/// Environment variable overriding where native builds read assets from.
pub const ASSET_DIR_ENV: &str = "GREEN_APPLE_ASSET_DIR";

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub clear_colour: wgpu::Color,
    pub fovy: cgmath::Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    /// Requested MSAA sample count. Lowered to what the adapter supports, 1 disables it.
    pub msaa_samples: u32,
    /// Initial distance of the camera from the origin, along +z.
    pub camera_distance: f32,
    pub damping_factor: f32,
    pub ambient_intensity: f32,
    /// Position the directional light shines from, towards the origin.
    pub light_direction: [f32; 3],
    pub light_intensity: f32,
    pub load: LoadSettings,
    pub base_path: BasePathStrategy,
    #[cfg(not(target_arch = "wasm32"))]
    pub asset_root: std::path::PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Green Apple".to_string(),
            clear_colour: srgb_hex(0xf0f0f0),
            fovy: cgmath::Deg(75.0),
            znear: 0.1,
            zfar: 1000.0,
            msaa_samples: 4,
            camera_distance: 5.0,
            damping_factor: 0.05,
            ambient_intensity: 0.5,
            light_direction: [1.0, 1.0, 1.0],
            light_intensity: 0.8,
            load: LoadSettings::default(),
            base_path: BasePathStrategy::default(),
            #[cfg(not(target_arch = "wasm32"))]
            asset_root: default_asset_root(),
        }
    }
}

impl ViewerConfig {
    pub fn light(&self) -> LightUniform {
        LightUniform::new(
            self.ambient_intensity,
            self.light_direction,
            self.light_intensity,
        )
    }
}

/// `$GREEN_APPLE_ASSET_DIR` if set, otherwise the `assets/` directory of this crate.
#[cfg(not(target_arch = "wasm32"))]
pub fn default_asset_root() -> std::path::PathBuf {
    std::env::var_os(ASSET_DIR_ENV)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from(env!("GREEN_APPLE_ASSET_DIR")))
}

/// Converts a `0xRRGGBB` sRGB colour to the linear colour wgpu expects for clears.
pub fn srgb_hex(hex: u32) -> wgpu::Color {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f64 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    wgpu::Color {
        r: channel(16),
        g: channel(8),
        b: channel(0),
        a: 1.0,
    }
}
