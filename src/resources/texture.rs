use futures::future::try_join4;

use crate::resources::{AssetManifest, fetch::AssetFetcher, mesh::LoadError};

/// Which map of the material a texture feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    Metallic,
    Roughness,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] = [
        TextureSlot::BaseColor,
        TextureSlot::Normal,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
    ];

    /// Only the base colour holds colour data; the other maps are sampled as linear values.
    pub fn is_srgb(self) -> bool {
        matches!(self, TextureSlot::BaseColor)
    }
}

/// One value per material map. A material can only be built from a complete set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSet<T> {
    pub base_color: T,
    pub normal: T,
    pub metallic: T,
    pub roughness: T,
}

impl<T> TextureSet<T> {
    pub fn as_ref(&self) -> TextureSet<&T> {
        TextureSet {
            base_color: &self.base_color,
            normal: &self.normal,
            metallic: &self.metallic,
            roughness: &self.roughness,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> TextureSet<U> {
        TextureSet {
            base_color: f(self.base_color),
            normal: f(self.normal),
            metallic: f(self.metallic),
            roughness: f(self.roughness),
        }
    }

}

impl<T> IntoIterator for TextureSet<T> {
    type Item = T;
    type IntoIter = std::array::IntoIter<T, 4>;

    fn into_iter(self) -> Self::IntoIter {
        [self.base_color, self.normal, self.metallic, self.roughness].into_iter()
    }
}

/// A texture decoded to RGBA8 on the CPU, waiting for GPU upload.
#[derive(Clone, Debug)]
pub struct DecodedTexture {
    pub url: String,
    pub slot: TextureSlot,
    pub image: image::RgbaImage,
}

impl DecodedTexture {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Decodes image file contents (PNG, JPEG) into a [`DecodedTexture`].
pub fn decode_texture(
    url: &str,
    slot: TextureSlot,
    bytes: &[u8],
) -> Result<DecodedTexture, LoadError> {
    let image = image::load_from_memory(bytes).map_err(|source| LoadError::Decode {
        url: url.to_string(),
        source,
    })?;
    Ok(DecodedTexture {
        url: url.to_string(),
        slot,
        image: image.to_rgba8(),
    })
}

pub async fn load_texture<F: AssetFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    slot: TextureSlot,
) -> Result<DecodedTexture, LoadError> {
    let bytes = fetcher
        .fetch(url)
        .await
        .map_err(|source| LoadError::Fetch {
            url: url.to_string(),
            source,
        })?;
    log::debug!("fetched {:?} texture {} ({} bytes)", slot, url, bytes.len());
    decode_texture(url, slot, &bytes)
}

/// Fetches and decodes all four maps concurrently.
///
/// Resolves with the set in slot order once every texture succeeded, or with the
/// first error that occurs. Nothing is cached; every call fetches again.
pub async fn load_texture_set<F: AssetFetcher + ?Sized>(
    fetcher: &F,
    manifest: &AssetManifest,
) -> Result<TextureSet<DecodedTexture>, LoadError> {
    let urls = manifest.texture_urls();
    let (base_color, normal, metallic, roughness) = try_join4(
        load_texture(fetcher, &urls.base_color, TextureSlot::BaseColor),
        load_texture(fetcher, &urls.normal, TextureSlot::Normal),
        load_texture(fetcher, &urls.metallic, TextureSlot::Metallic),
        load_texture(fetcher, &urls.roughness, TextureSlot::Roughness),
    )
    .await?;
    Ok(TextureSet {
        base_color,
        normal,
        metallic,
        roughness,
    })
}
