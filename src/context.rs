use std::sync::Arc;

use anyhow::{Context as _, bail};
use winit::window::Window;

use crate::{
    camera::{Camera, CameraController, CameraResources, Projection},
    config::ViewerConfig,
    data_structures::{
        model::{MaterialParams, Material, Model},
        object::{MaterialId, ModelObject},
        texture,
    },
    pipeline::SceneSink,
    pipelines::{
        light::LightResources,
        pbr::{PbrLayouts, mk_pbr_pipeline},
    },
    render::SceneContext,
    resources::texture::{DecodedTexture, TextureSet},
};

/// GPU state of the viewer: surface, device, camera, light, the PBR pipeline and the
/// scene drawn with it. Created once when the window exists.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    /// Multisampled colour target, resolved into the surface. `None` without MSAA.
    pub(crate) msaa_target: Option<texture::Texture>,
    pub sample_count: u32,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub layouts: PbrLayouts,
    pub pipeline: wgpu::RenderPipeline,
    pub clear_colour: wgpu::Color,
    pub scene: SceneContext,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("cannot create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("cannot open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour and relies on an sRGB surface to encode it.
        let Some(&first_format) = surface_caps.formats.first() else {
            bail!("the surface supports no texture formats");
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(first_format);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let layouts = PbrLayouts::new(&device);

        let camera = Camera::new((0.0, 0.0, viewer.camera_distance), (0.0, 0.0, 0.0));
        let projection = Projection::new(
            config.width,
            config.height,
            viewer.fovy,
            viewer.znear,
            viewer.zfar,
        );
        let controller = CameraController::new(viewer.damping_factor, config.height);
        let camera = CameraResources::new(&device, camera, controller, &projection, &layouts.camera);

        let light = LightResources::new(viewer.light(), &device, &layouts.light);

        let surface_features = adapter.get_texture_format_features(config.format);
        let depth_features = adapter.get_texture_format_features(texture::Texture::DEPTH_FORMAT);
        let sample_count = pick_sample_count(viewer.msaa_samples, |count| {
            surface_features.flags.sample_count_supported(count)
                && depth_features.flags.sample_count_supported(count)
        });
        if sample_count != viewer.msaa_samples {
            log::warn!(
                "{}x MSAA is not supported, using {}x",
                viewer.msaa_samples,
                sample_count
            );
        }
        let (depth_texture, msaa_target) = create_render_targets(&device, &config, sample_count);

        let pipeline = mk_pbr_pipeline(&device, &config, &layouts, sample_count);

        Ok(Self {
            window,
            depth_texture,
            msaa_target,
            sample_count,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            layouts,
            pipeline,
            clear_colour: viewer.clear_colour,
            scene: SceneContext::new(),
            is_surface_configured: false,
        })
    }

    pub fn is_surface_configured(&self) -> bool {
        self.is_surface_configured
    }

    /// Resizes the surface, depth buffer and projection right away. A zero-sized
    /// window (e.g. minimized) is ignored and returns false.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.is_surface_configured = true;
        self.projection.resize(width, height);
        self.camera.controller.resize(height);
        (self.depth_texture, self.msaa_target) =
            create_render_targets(&self.device, &self.config, self.sample_count);
        true
    }

    /// Per-frame update: orbit controls and the camera uniform.
    pub fn update(&mut self) {
        self.camera.update(&self.queue, &self.projection);
    }
}

/// The largest count from `requested` down to 1 (halving) that `supported` accepts.
fn pick_sample_count(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    let mut count = requested.max(1).next_power_of_two();
    while count > 1 && !supported(count) {
        count /= 2;
    }
    count
}

/// Depth buffer and, with MSAA, the colour target, both sized like the surface.
fn create_render_targets(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> (texture::Texture, Option<texture::Texture>) {
    let size = [config.width, config.height];
    let depth = texture::Texture::create_depth_texture(device, size, sample_count, "depth_texture");
    let msaa = (sample_count > 1).then(|| {
        texture::Texture::create_msaa_target(device, size, sample_count, config.format, "msaa_target")
    });
    (depth, msaa)
}

impl SceneSink for Context {
    fn create_material(
        &mut self,
        textures: TextureSet<DecodedTexture>,
        params: MaterialParams,
    ) -> anyhow::Result<MaterialId> {
        let limit = self.device.limits().max_texture_dimension_2d;
        for texture in textures.as_ref() {
            let (width, height) = texture.dimensions();
            if width == 0 || height == 0 || width > limit || height > limit {
                bail!(
                    "texture {} has unsupported size {}x{} (limit {})",
                    texture.url,
                    width,
                    height,
                    limit
                );
            }
        }
        let material = Material::new(
            &self.device,
            &self.queue,
            "apple material",
            &textures,
            params,
            &self.layouts.material,
        );
        Ok(self.scene.add_material(material))
    }

    fn add_model(&mut self, model: ModelObject) -> anyhow::Result<()> {
        let mut default_material = None;
        for mesh in &model.meshes {
            let Some(id) = mesh.material else { continue };
            if self.scene.material(id).is_none() {
                bail!("mesh {} of {} references unknown material {:?}", mesh.name, model.name, id);
            }
            default_material.get_or_insert(id);
        }
        let Some(default_material) = default_material else {
            bail!("{} has no material assigned", model.name);
        };
        let model = Model::upload(&self.device, &model, default_material, &self.layouts.model);
        log::info!("{} added to the scene with {} meshes", model.name, model.meshes.len());
        self.scene.add_model(model);
        self.window.request_redraw();
        Ok(())
    }

    fn set_camera_distance_limits(&mut self, min: f32, max: f32) {
        self.camera.controller.set_distance_limits(min, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_prefers_the_request() {
        assert_eq!(pick_sample_count(4, |_| true), 4);
        assert_eq!(pick_sample_count(1, |_| true), 1);
    }

    #[test]
    fn sample_count_falls_back_to_supported() {
        assert_eq!(pick_sample_count(8, |count| count <= 4), 4);
        assert_eq!(pick_sample_count(4, |count| count == 2), 2);
        assert_eq!(pick_sample_count(4, |_| false), 1);
        assert_eq!(pick_sample_count(0, |_| false), 1);
    }
}
