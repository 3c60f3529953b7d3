use std::io::Cursor;

use green_apple::{
    data_structures::{
        model::MaterialParams,
        object::{MaterialId, ModelObject},
    },
    pipeline::{PipelineDriver, PipelineEvent, PipelineState, SceneSink, load_assets},
    resources::{
        AssetManifest,
        fetch::{AssetFetcher, MemoryFetcher},
        texture::{DecodedTexture, TextureSet},
    },
    status::{LoadStatus, MemoryStatus, StatusDisplay},
};
use futures::StreamExt;

/// A unit cube spanning 2..4 on every axis, so centering has something to do.
pub const CUBE_OBJ: &str = "\
o apple
v 2 2 2
v 4 2 2
v 4 4 2
v 2 4 2
v 2 2 4
v 4 2 4
v 4 4 4
v 2 4 4
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
f 5/1/1 6/2/1 7/3/1 8/4/1
f 1/1/1 2/2/1 6/3/1 5/4/1
f 4/1/1 3/2/1 7/3/1 8/4/1
";

/// Records what the pipeline does to the scene instead of touching a GPU.
#[derive(Default)]
pub struct RecordingScene {
    pub materials: Vec<(TextureSet<(u32, u32)>, MaterialParams)>,
    pub models: Vec<ModelObject>,
    pub distance_limits: Option<(f32, f32)>,
}

impl SceneSink for RecordingScene {
    fn create_material(
        &mut self,
        textures: TextureSet<DecodedTexture>,
        params: MaterialParams,
    ) -> anyhow::Result<MaterialId> {
        self.materials
            .push((textures.map(|texture| texture.dimensions()), params));
        Ok(MaterialId(self.materials.len() - 1))
    }

    fn add_model(&mut self, model: ModelObject) -> anyhow::Result<()> {
        self.models.push(model);
        Ok(())
    }

    fn set_camera_distance_limits(&mut self, min: f32, max: f32) {
        self.distance_limits = Some((min, max));
    }
}

/// Keeps every status shown, in order.
#[derive(Default)]
pub struct StatusHistory {
    pub shown: Vec<LoadStatus>,
    pub latest: MemoryStatus,
}

impl StatusDisplay for StatusHistory {
    fn show(&mut self, status: &LoadStatus) {
        self.shown.push(status.clone());
        self.latest.show(status);
    }
}

impl StatusHistory {
    pub fn texts(&self) -> Vec<String> {
        self.shown.iter().map(LoadStatus::text).collect()
    }
}

pub fn png(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(colour));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Serves every asset of `manifest`.
pub fn complete_deployment(manifest: &AssetManifest) -> MemoryFetcher {
    let urls = manifest.texture_urls();
    MemoryFetcher::new()
        .with_asset(urls.base_color.clone(), png(4, 4, [40, 160, 40, 255]))
        .with_asset(urls.normal.clone(), png(2, 2, [128, 128, 255, 255]))
        .with_asset(urls.metallic.clone(), png(2, 2, [0, 0, 0, 255]))
        .with_asset(urls.roughness.clone(), png(2, 2, [0, 200, 0, 255]))
        .with_asset(manifest.model_url().to_string(), CUBE_OBJ)
}

/// Runs all loads to completion and feeds every event through the driver, the way
/// the event loop does.
pub async fn drive<F: AssetFetcher + ?Sized>(
    fetcher: &F,
    manifest: &AssetManifest,
    driver: &mut PipelineDriver,
    scene: &mut RecordingScene,
    status: &mut StatusHistory,
) -> (Vec<&'static str>, PipelineState) {
    let events: Vec<PipelineEvent> = load_assets(fetcher, manifest).collect().await;
    let mut kinds = Vec::with_capacity(events.len());
    for event in events {
        kinds.push(match &event {
            PipelineEvent::Started => "started",
            PipelineEvent::TexturesReady(_) => "textures",
            PipelineEvent::Progress(_) => "progress",
            PipelineEvent::ModelReady(_) => "model",
            PipelineEvent::Failed(_) => "failed",
        });
        driver.handle(event, scene, status);
    }
    (kinds, driver.state())
}
