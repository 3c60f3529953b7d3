use green_apple::{
    config::ViewerConfig,
    data_structures::object::MaterialId,
    pipeline::{LoadSettings, PipelineDriver, PipelineState},
    resources::{
        AssetManifest,
        base_path::{BasePathPolicy, BasePathStrategy, Location},
        fetch::MemoryFetcher,
    },
    status::LoadStatus,
};

use crate::common::test_utils::{
    CUBE_OBJ, RecordingScene, StatusHistory, complete_deployment, drive,
};

mod common;

fn setup(location: &Location) -> (AssetManifest, PipelineDriver) {
    let base_path = BasePathStrategy::default().resolve(location).unwrap();
    let manifest = AssetManifest::new(base_path);
    let driver = PipelineDriver::new(&manifest, location, LoadSettings::default());
    (manifest, driver)
}

#[tokio::test]
async fn apple_is_centered_and_scaled_on_localhost() {
    let (manifest, mut driver) = setup(&Location::local());
    assert_eq!(manifest.model_url(), "./img/green-apple3d/apple02.obj");
    let fetcher = complete_deployment(&manifest);
    let (mut scene, mut status) = (RecordingScene::default(), StatusHistory::default());

    let (events, state) = drive(&fetcher, &manifest, &mut driver, &mut scene, &mut status).await;

    assert_eq!(events.first(), Some(&"started"));
    assert_eq!(events.get(1), Some(&"textures"));
    assert_eq!(events.last(), Some(&"model"));
    assert_eq!(state, PipelineState::Ready);
    assert_eq!(status.latest.current, Some(LoadStatus::Hidden));

    assert_eq!(scene.materials.len(), 1);
    let (sizes, params) = &scene.materials[0];
    assert_eq!(sizes.base_color, (4, 4));
    assert_eq!(sizes.normal, (2, 2));
    assert_eq!(*params, ViewerConfig::default().load.material);

    assert_eq!(scene.models.len(), 1);
    let model = &scene.models[0];
    assert!(model.meshes.iter().all(|mesh| mesh.material == Some(MaterialId(0))));
    assert_eq!(model.transform.scale, 0.5);
    let bounds = model.world_bounds().unwrap();
    let center = bounds.center();
    assert!(center.x.abs() < 1e-5 && center.y.abs() < 1e-5 && center.z.abs() < 1e-5);
    assert!((bounds.size().x - 1.0).abs() < 1e-5);

    assert_eq!(scene.distance_limits, Some((3.0, 20.0)));
}

#[tokio::test]
async fn missing_model_shows_load_failed() {
    let (manifest, mut driver) = setup(&Location::local());
    let fetcher = complete_deployment(&manifest).with_failure(manifest.model_url(), "404 Not Found");
    let (mut scene, mut status) = (RecordingScene::default(), StatusHistory::default());

    let (events, state) = drive(&fetcher, &manifest, &mut driver, &mut scene, &mut status).await;

    assert_eq!(events, vec!["started", "textures", "failed"]);
    assert_eq!(state, PipelineState::Failed);
    assert_eq!(status.texts().last().map(String::as_str), Some("Load failed"));
    assert_eq!(scene.materials.len(), 1);
    assert!(scene.models.is_empty());
    assert_eq!(scene.distance_limits, None);
}

#[tokio::test]
async fn texture_failure_never_requests_the_model() {
    let (manifest, mut driver) = setup(&Location::local());
    // Without a model on the server a model request would also fail; the event
    // sequence tells which load actually ran.
    let urls = manifest.texture_urls();
    let fetcher = MemoryFetcher::new()
        .with_asset(urls.base_color.clone(), common::test_utils::png(2, 2, [0, 255, 0, 255]))
        .with_asset(urls.normal.clone(), common::test_utils::png(2, 2, [128, 128, 255, 255]))
        .with_asset(urls.metallic.clone(), common::test_utils::png(2, 2, [0, 0, 0, 255]));
    let (mut scene, mut status) = (RecordingScene::default(), StatusHistory::default());

    let (events, state) = drive(&fetcher, &manifest, &mut driver, &mut scene, &mut status).await;

    assert_eq!(events, vec!["started", "failed"]);
    assert_eq!(state, PipelineState::Failed);
    assert!(scene.materials.is_empty());
    assert!(scene.models.is_empty());
    assert_eq!(status.texts(), vec!["Loading...", "Load failed"]);
}

#[tokio::test]
async fn download_progress_is_shown() {
    let (manifest, mut driver) = setup(&Location::local());
    let fetcher = complete_deployment(&manifest).with_chunk_size(CUBE_OBJ.len() / 4 + 1);
    let (mut scene, mut status) = (RecordingScene::default(), StatusHistory::default());

    let (_, state) = drive(&fetcher, &manifest, &mut driver, &mut scene, &mut status).await;
    assert_eq!(state, PipelineState::Ready);

    let texts = status.texts();
    assert_eq!(texts.first().map(String::as_str), Some("Loading..."));
    let percentages: Vec<u8> = status
        .shown
        .iter()
        .filter_map(|s| match s {
            LoadStatus::Loading(Some(p)) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(percentages.len(), 4);
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percentages.last(), Some(&100));
    assert!(texts.contains(&"Loading... 100%".to_string()));
}

#[tokio::test]
async fn project_pages_load_from_the_project_prefix() {
    let location = Location::new("someone.github.io", "/orchard/index.html");
    let (manifest, mut driver) = setup(&location);
    assert_eq!(manifest.model_url(), "/orchard/img/green-apple3d/apple02.obj");
    assert_eq!(
        manifest.texture_urls().roughness,
        "/orchard/img/green-apple3d/apple02/apple02_roughness.png"
    );

    // Assets deployed at the root are not found from a project page.
    let root = AssetManifest::new(BasePathStrategy::CurrentDir.resolve(&location).unwrap());
    let misplaced = complete_deployment(&root);
    let (mut scene, mut status) = (RecordingScene::default(), StatusHistory::default());
    let (_, state) = drive(&misplaced, &manifest, &mut driver, &mut scene, &mut status).await;
    assert_eq!(state, PipelineState::Failed);

    let (_, mut driver) = setup(&location);
    let deployed = complete_deployment(&manifest);
    let (mut scene, mut status) = (RecordingScene::default(), StatusHistory::default());
    let (_, state) = drive(&deployed, &manifest, &mut driver, &mut scene, &mut status).await;
    assert_eq!(state, PipelineState::Ready);
    assert_eq!(scene.models.len(), 1);
}

#[test]
fn project_host_without_project_segment_is_an_error() {
    let location = Location::new("someone.github.io", "/");
    assert!(BasePathStrategy::default().resolve(&location).is_err());
}
