//! Viewer data structures: loaded models, their GPU counterparts and textures.
//!
//! - `object` holds the CPU-side model as it comes out of the loader, with its transform
//! - `model` contains the vertex layout, GPU meshes, PBR materials and draw helpers
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod model;
pub mod object;
pub mod texture;
