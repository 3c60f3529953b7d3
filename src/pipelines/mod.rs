//! Render pipelines: the PBR forward pipeline for models and the light uniform it reads.

pub mod light;
pub mod pbr;
