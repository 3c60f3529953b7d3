//! green-apple
//!
//! A small cross-platform viewer that loads one textured OBJ model (a green apple),
//! shades it with a metal/roughness material and lets the user orbit around it.
//! Runs natively and in the browser (WebGL through wgpu).
//!
//! High-level modules
//! - `app`: window, event loop and the glue between loads and rendering
//! - `camera`: orbit camera with damping, projection and camera uniform
//! - `config`: viewer settings with their defaults
//! - `context`: central GPU and window context that owns device/queue/pipeline
//! - `data_structures`: CPU side models and their GPU counterparts
//! - `pipeline`: load sequencing, the load state machine and its post-load steps
//! - `pipelines`: the PBR render pipeline and the light
//! - `render`: the scene and how a frame is drawn
//! - `resources`: base paths, fetching and decoding of textures and models
//! - `status`: the loading status text
//!

pub mod app;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod pipeline;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod status;

pub use app::run;
pub use config::ViewerConfig;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Entry point of the web build.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}
