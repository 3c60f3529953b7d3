//! Everything needed to get the viewer's assets from wherever they are deployed
//! into CPU-side data: base path policies, byte fetchers, the texture batch and
//! the OBJ model loader.

pub mod base_path;
pub mod fetch;
pub mod mesh;
pub mod texture;

use crate::resources::{base_path::BasePath, texture::TextureSet};

/// Model file, relative to the base path.
pub const MODEL_FILE: &str = "img/green-apple3d/apple02.obj";

/// Directory of the model's texture maps, relative to the base path.
pub const TEXTURE_DIR: &str = "img/green-apple3d/apple02";

/// The fixed set of files the viewer loads, anchored at a resolved [`BasePath`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetManifest {
    base_path: BasePath,
    model_url: String,
    texture_urls: TextureSet<String>,
}

impl AssetManifest {
    pub fn new(base_path: BasePath) -> Self {
        let texture_urls = TextureSet {
            base_color: "apple02_baseColor.png",
            normal: "apple02_normal.png",
            metallic: "apple02_metallic.png",
            roughness: "apple02_roughness.png",
        }
        .map(|file| base_path.join(&format!("{TEXTURE_DIR}/{file}")));
        Self {
            model_url: base_path.join(MODEL_FILE),
            texture_urls,
            base_path,
        }
    }

    pub fn base_path(&self) -> &BasePath {
        &self.base_path
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }

    pub fn texture_urls(&self) -> &TextureSet<String> {
        &self.texture_urls
    }

    /// All URLs the viewer will request, model last.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<_> = self.texture_urls.clone().into_iter().collect();
        urls.push(self.model_url.clone());
        urls
    }
}
