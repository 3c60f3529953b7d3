//! Sequencing of the asset loads and what happens to the scene as they finish.
//!
//! [`load_assets`] produces the events: textures first (all four concurrently),
//! then the model, whose download only starts once the texture batch resolved.
//! [`PipelineDriver`] consumes them on the event loop thread, walks the state
//! machine `Idle -> LoadingTextures -> LoadingModel -> Ready` (or `Failed`), updates
//! the status display and hands the finished model to the scene.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{
    FutureExt, StreamExt,
    future,
    stream::{self, LocalBoxStream},
};

use crate::{
    data_structures::{
        model::MaterialParams,
        object::{MaterialId, ModelObject},
    },
    resources::{
        AssetManifest,
        base_path::Location,
        fetch::AssetFetcher,
        mesh::{LoadError, ModelEvent, load_model},
        texture::{DecodedTexture, TextureSet, load_texture_set},
    },
    status::{LoadStatus, StatusDisplay},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    LoadingTextures,
    LoadingModel,
    Ready,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Ready | PipelineState::Failed)
    }
}

#[derive(Debug)]
pub enum PipelineEvent {
    Started,
    TexturesReady(TextureSet<DecodedTexture>),
    Progress(u8),
    ModelReady(ModelObject),
    Failed(LoadError),
}

impl From<ModelEvent> for PipelineEvent {
    fn from(event: ModelEvent) -> Self {
        match event {
            ModelEvent::Progress(percent) => PipelineEvent::Progress(percent),
            ModelEvent::Success(model) => PipelineEvent::ModelReady(model),
            ModelEvent::Failure(error) => PipelineEvent::Failed(error),
        }
    }
}

/// All loads of one viewer start as a single stream of events.
///
/// The stream always begins with `Started` and ends after `ModelReady` or the first
/// `Failed`. A texture failure ends it before the model is requested.
pub fn load_assets<'a, F: AssetFetcher + ?Sized>(
    fetcher: &'a F,
    manifest: &'a AssetManifest,
) -> LocalBoxStream<'a, PipelineEvent> {
    let loads = load_texture_set(fetcher, manifest)
        .into_stream()
        .flat_map(move |textures| match textures {
            Ok(textures) => stream::once(future::ready(PipelineEvent::TexturesReady(textures)))
                .chain(load_model(fetcher, manifest.model_url()).map(PipelineEvent::from))
                .left_stream(),
            Err(error) => stream::once(future::ready(PipelineEvent::Failed(error))).right_stream(),
        });
    stream::once(future::ready(PipelineEvent::Started))
        .chain(loads)
        .boxed_local()
}

/// Tells a running load that nobody listens anymore. Shared between the event loop,
/// which cancels once the driver reached a terminal state, and the loader.
#[derive(Clone, Debug, Default)]
pub struct LoadCancel(Arc<AtomicBool>);

impl LoadCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Ends `events` once `cancel` is set. Checked before every poll, so no further
/// download work happens after cancellation.
pub fn cancellable<'a>(
    events: LocalBoxStream<'a, PipelineEvent>,
    cancel: LoadCancel,
) -> LocalBoxStream<'a, PipelineEvent> {
    stream::unfold((events, cancel), |(mut events, cancel)| async move {
        if cancel.is_cancelled() {
            log::debug!("asset loads cancelled");
            return None;
        }
        let event = events.next().await?;
        Some((event, (events, cancel)))
    })
    .boxed_local()
}

/// Where loaded assets end up.
pub trait SceneSink {
    /// Builds the material shared by every mesh of the model.
    fn create_material(
        &mut self,
        textures: TextureSet<DecodedTexture>,
        params: MaterialParams,
    ) -> anyhow::Result<MaterialId>;

    /// Takes ownership of the post-processed model.
    fn add_model(&mut self, model: ModelObject) -> anyhow::Result<()>;

    /// Limits how close and how far the orbit camera may get.
    fn set_camera_distance_limits(&mut self, min: f32, max: f32);
}

/// What to do with the model once it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSettings {
    pub model_scale: f32,
    pub distance_limits: (f32, f32),
    pub material: MaterialParams,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            model_scale: 0.5,
            distance_limits: (3.0, 20.0),
            material: MaterialParams::default(),
        }
    }
}

#[derive(Debug)]
pub struct PipelineDriver {
    state: PipelineState,
    material: Option<MaterialId>,
    settings: LoadSettings,
    host: String,
    base_path: String,
}

impl PipelineDriver {
    pub fn new(manifest: &AssetManifest, location: &Location, settings: LoadSettings) -> Self {
        Self {
            state: PipelineState::Idle,
            material: None,
            settings,
            host: location.hostname.clone(),
            base_path: manifest.base_path().to_string(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    /// Applies one event and returns the resulting state.
    pub fn handle<S, D>(&mut self, event: PipelineEvent, scene: &mut S, status: &mut D) -> PipelineState
    where
        S: SceneSink + ?Sized,
        D: StatusDisplay + ?Sized,
    {
        if self.state.is_terminal() {
            log::warn!("ignoring {} after loading ended ({:?})", describe(&event), self.state);
            return self.state;
        }

        match (self.state, event) {
            (PipelineState::Idle, PipelineEvent::Started) => {
                log::info!("loading assets from {} (host {})", self.base_path, self.host);
                self.state = PipelineState::LoadingTextures;
                status.show(&LoadStatus::Loading(None));
            }
            (PipelineState::LoadingTextures, PipelineEvent::TexturesReady(textures)) => {
                match scene.create_material(textures, self.settings.material) {
                    Ok(id) => {
                        log::debug!("material {:?} ready, loading model", id);
                        self.material = Some(id);
                        self.state = PipelineState::LoadingModel;
                    }
                    Err(e) => self.fail(None, &format!("{e:#}"), status),
                }
            }
            (PipelineState::LoadingModel, PipelineEvent::Progress(percent)) => {
                status.show(&LoadStatus::Loading(Some(percent)));
            }
            (PipelineState::LoadingModel, PipelineEvent::ModelReady(model)) => {
                self.finish(model, scene, status);
            }
            (_, PipelineEvent::Failed(error)) => {
                self.fail(Some(error.url()), &error.to_string(), status);
            }
            (state, event) => {
                log::warn!("ignoring unexpected {} while {:?}", describe(&event), state);
            }
        }
        self.state
    }

    fn finish<S, D>(&mut self, mut model: ModelObject, scene: &mut S, status: &mut D)
    where
        S: SceneSink + ?Sized,
        D: StatusDisplay + ?Sized,
    {
        let Some(material) = self.material else {
            self.fail(Some(&model.name), "model arrived without a material", status);
            return;
        };
        model.assign_material(material);
        match model.fit_to_origin(self.settings.model_scale) {
            Some(bounds) => log::info!(
                "placed {} at {:?} with size {:?}",
                model.name,
                model.transform.position,
                bounds.size()
            ),
            None => log::warn!("{} has no vertices to center", model.name),
        }

        let name = model.name.clone();
        if let Err(e) = scene.add_model(model) {
            self.fail(Some(&name), &format!("{e:#}"), status);
            return;
        }
        let (min, max) = self.settings.distance_limits;
        scene.set_camera_distance_limits(min, max);
        status.show(&LoadStatus::Hidden);
        self.state = PipelineState::Ready;
    }

    fn fail<D: StatusDisplay + ?Sized>(&mut self, url: Option<&str>, reason: &str, status: &mut D) {
        log::error!(
            "loading failed: host={} base_path={} url={} reason={}",
            self.host,
            self.base_path,
            url.unwrap_or("-"),
            reason
        );
        self.state = PipelineState::Failed;
        status.show(&LoadStatus::Failed {
            reason: reason.to_string(),
        });
    }
}

fn describe(event: &PipelineEvent) -> &'static str {
    match event {
        PipelineEvent::Started => "start",
        PipelineEvent::TexturesReady(_) => "textures",
        PipelineEvent::Progress(_) => "progress",
        PipelineEvent::ModelReady(_) => "model",
        PipelineEvent::Failed(_) => "failure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resources::{
            base_path::BasePath,
            fetch::{FetchError, MemoryFetcher},
        },
        status::MemoryStatus,
    };

    #[derive(Default)]
    struct CountingScene {
        materials: usize,
        models: Vec<ModelObject>,
        limits: Option<(f32, f32)>,
    }

    impl SceneSink for CountingScene {
        fn create_material(
            &mut self,
            _textures: TextureSet<DecodedTexture>,
            _params: MaterialParams,
        ) -> anyhow::Result<MaterialId> {
            self.materials += 1;
            Ok(MaterialId(self.materials - 1))
        }

        fn add_model(&mut self, model: ModelObject) -> anyhow::Result<()> {
            self.models.push(model);
            Ok(())
        }

        fn set_camera_distance_limits(&mut self, min: f32, max: f32) {
            self.limits = Some((min, max));
        }
    }

    fn driver() -> PipelineDriver {
        let manifest = AssetManifest::new(BasePath::current_dir());
        PipelineDriver::new(&manifest, &Location::local(), LoadSettings::default())
    }

    /// Rejects every material, like a device with a tiny texture size limit.
    #[derive(Default)]
    struct RejectingScene {
        models: usize,
    }

    impl SceneSink for RejectingScene {
        fn create_material(
            &mut self,
            _textures: TextureSet<DecodedTexture>,
            _params: MaterialParams,
        ) -> anyhow::Result<MaterialId> {
            anyhow::bail!("texture too large")
        }

        fn add_model(&mut self, _model: ModelObject) -> anyhow::Result<()> {
            self.models += 1;
            Ok(())
        }

        fn set_camera_distance_limits(&mut self, _min: f32, _max: f32) {}
    }

    fn png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 255, 0, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn failure() -> PipelineEvent {
        PipelineEvent::Failed(LoadError::Fetch {
            url: "./img/green-apple3d/apple02.obj".to_string(),
            source: FetchError::NotFound("apple02.obj".to_string()),
        })
    }

    #[test]
    fn start_shows_loading() {
        let (mut scene, mut status) = (CountingScene::default(), MemoryStatus::default());
        let mut driver = driver();
        assert_eq!(driver.state(), PipelineState::Idle);
        let state = driver.handle(PipelineEvent::Started, &mut scene, &mut status);
        assert_eq!(state, PipelineState::LoadingTextures);
        assert_eq!(status.current, Some(LoadStatus::Loading(None)));
    }

    #[test]
    fn failure_is_terminal() {
        let (mut scene, mut status) = (CountingScene::default(), MemoryStatus::default());
        let mut driver = driver();
        driver.handle(PipelineEvent::Started, &mut scene, &mut status);
        assert_eq!(driver.handle(failure(), &mut scene, &mut status), PipelineState::Failed);
        assert_eq!(status.current.as_ref().map(LoadStatus::text).as_deref(), Some("Load failed"));

        let updates = status.updates;
        driver.handle(PipelineEvent::Progress(50), &mut scene, &mut status);
        driver.handle(PipelineEvent::Started, &mut scene, &mut status);
        assert_eq!(driver.state(), PipelineState::Failed);
        assert_eq!(status.updates, updates);
    }

    #[test]
    fn model_before_textures_is_ignored() {
        let (mut scene, mut status) = (CountingScene::default(), MemoryStatus::default());
        let mut driver = driver();
        driver.handle(PipelineEvent::Started, &mut scene, &mut status);
        let state = driver.handle(
            PipelineEvent::ModelReady(ModelObject::default()),
            &mut scene,
            &mut status,
        );
        assert_eq!(state, PipelineState::LoadingTextures);
        assert!(scene.models.is_empty());
    }

    #[test]
    fn progress_is_ignored_until_the_model_loads() {
        let (mut scene, mut status) = (CountingScene::default(), MemoryStatus::default());
        let mut driver = driver();
        driver.handle(PipelineEvent::Started, &mut scene, &mut status);
        driver.handle(PipelineEvent::Progress(30), &mut scene, &mut status);
        assert_eq!(status.current, Some(LoadStatus::Loading(None)));
    }

    #[tokio::test]
    async fn cancelled_loads_stop_before_the_model_download() {
        let manifest = AssetManifest::new(BasePath::current_dir());
        let urls = manifest.texture_urls();
        let fetcher = MemoryFetcher::new()
            .with_asset(urls.base_color.clone(), png())
            .with_asset(urls.normal.clone(), png())
            .with_asset(urls.metallic.clone(), png())
            .with_asset(urls.roughness.clone(), png())
            .with_asset(manifest.model_url(), "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
            .with_chunk_size(4);
        let (mut scene, mut status) = (RejectingScene::default(), MemoryStatus::default());
        let mut driver = driver();
        let cancel = LoadCancel::new();

        let mut events = cancellable(load_assets(&fetcher, &manifest), cancel.clone());
        let mut seen = Vec::new();
        while let Some(event) = events.next().await {
            seen.push(describe(&event));
            if driver.handle(event, &mut scene, &mut status).is_terminal() {
                cancel.cancel();
            }
        }

        assert_eq!(seen, vec!["start", "textures"]);
        assert_eq!(driver.state(), PipelineState::Failed);
        assert_eq!(scene.models, 0);
        assert_eq!(status.current.as_ref().map(LoadStatus::text).as_deref(), Some("Load failed"));
    }

    #[tokio::test]
    async fn uncancelled_stream_runs_to_completion() {
        let manifest = AssetManifest::new(BasePath::current_dir());
        let fetcher = MemoryFetcher::new();
        let events: Vec<_> = cancellable(load_assets(&fetcher, &manifest), LoadCancel::new())
            .map(|event| describe(&event))
            .collect()
            .await;
        assert_eq!(events, vec!["start", "failure"]);
    }
}
