//! Application event loop.
//!
//! The [`App`] owns the GPU [`Context`] and the [`PipelineDriver`]. Asset loads run
//! off the event loop (a helper thread natively, `spawn_local` on the web) and report
//! back through the event loop proxy, so every scene mutation happens here, between
//! two frames.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window and the context
//! 2. once the context exists the base path is resolved and the loads are started
//! 3. each [`ViewerEvent::Pipeline`] is handed to the driver; once it reports a
//!    terminal state the remaining loads are cancelled
//! 4. every redraw updates the orbit controls and renders, then requests the next one

use std::sync::Arc;

use futures::{StreamExt, stream::LocalBoxStream};
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    pipeline::{LoadCancel, PipelineDriver, PipelineEvent, cancellable, load_assets},
    render::render,
    resources::{
        AssetManifest,
        base_path::{BasePathPolicy, Location},
    },
    status::{LoadStatus, StatusDisplay},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Events delivered to the event loop from outside of it.
#[derive(Debug)]
pub enum ViewerEvent {
    /// The context finished its async setup (web only; native blocks on it).
    #[cfg(target_arch = "wasm32")]
    Initialized(Box<Context>),
    Pipeline(PipelineEvent),
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    ctx: Option<Context>,
    driver: Option<PipelineDriver>,
    cancel: LoadCancel,
    status: Box<dyn StatusDisplay>,
    frames: FrameCounter,
}

impl App {
    pub fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        #[cfg(not(target_arch = "wasm32"))]
        let status: Box<dyn StatusDisplay> = Box::new(crate::status::LogStatus::default());
        #[cfg(target_arch = "wasm32")]
        let status: Box<dyn StatusDisplay> = Box::new(crate::status::DomStatus::new());
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            ctx: None,
            driver: None,
            cancel: LoadCancel::new(),
            status,
            frames: FrameCounter::new(),
        })
    }

    /// Takes the finished context and kicks off the asset loads.
    fn start(&mut self, mut ctx: Context) {
        let size = ctx.window.inner_size();
        ctx.resize(size.width, size.height);
        ctx.window.request_redraw();
        self.ctx = Some(ctx);

        #[cfg(target_arch = "wasm32")]
        let location = Location::from_window().unwrap_or_else(Location::local);
        #[cfg(not(target_arch = "wasm32"))]
        let location = Location::local();

        let base_path = match self.config.base_path.resolve(&location) {
            Ok(base_path) => base_path,
            Err(e) => {
                log::error!(
                    "loading failed: host={} path={} reason={}",
                    location.hostname,
                    location.pathname,
                    e
                );
                self.status.show(&LoadStatus::Failed {
                    reason: e.to_string(),
                });
                return;
            }
        };
        log::info!("host {} uses base path {}", location.hostname, base_path);

        let manifest = AssetManifest::new(base_path);
        self.driver = Some(PipelineDriver::new(
            &manifest,
            &location,
            self.config.load,
        ));
        self.spawn_loads(manifest);
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn spawn_loads(&mut self, manifest: AssetManifest) {
        use crate::resources::fetch::FsFetcher;

        let handle = self.async_runtime.handle().clone();
        let proxy = self.proxy.clone();
        let cancel = self.cancel.clone();
        let fetcher = FsFetcher::new(self.config.asset_root.clone());
        log::debug!("reading assets from {}", self.config.asset_root.display());
        // The load stream is not Send, so it gets a thread of its own that borrows
        // the runtime for IO.
        let spawned = std::thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                handle.block_on(forward(cancellable(load_assets(&fetcher, &manifest), cancel), proxy))
            });
        if let Err(e) = spawned {
            log::error!("cannot start the asset loader: {e}");
            self.status.show(&LoadStatus::Failed {
                reason: e.to_string(),
            });
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn spawn_loads(&mut self, manifest: AssetManifest) {
        use crate::resources::fetch::HttpFetcher;

        let proxy = self.proxy.clone();
        let cancel = self.cancel.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let fetcher = HttpFetcher::new();
            forward(cancellable(load_assets(&fetcher, &manifest), cancel), proxy).await;
        });
    }
}

/// Sends every event to the event loop until the stream ends, the loads are
/// cancelled or the loop is gone.
async fn forward(mut events: LocalBoxStream<'_, PipelineEvent>, proxy: EventLoopProxy<ViewerEvent>) {
    while let Some(event) = events.next().await {
        if proxy.send_event(ViewerEvent::Pipeline(event)).is_err() {
            log::warn!("event loop closed, dropping remaining asset loads");
            break;
        }
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.ctx.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.title);

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .and_then(|canvas| canvas.dyn_into::<web_sys::HtmlCanvasElement>().ok());
            if canvas.is_none() {
                log::warn!("no #{CANVAS_ID} canvas on the page, winit will create one");
            }
            window_attributes = window_attributes.with_canvas(canvas);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create the window: {e}");
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self
                .async_runtime
                .block_on(Context::new(window, &self.config))
            {
                Ok(ctx) => self.start(ctx),
                Err(e) => {
                    log::error!("App initialization failed. Cannot create the main context: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Context::new(window, &config).await {
                    Ok(ctx) => {
                        if proxy
                            .send_event(ViewerEvent::Initialized(Box::new(ctx)))
                            .is_err()
                        {
                            log::error!("event loop closed before the context was ready");
                        }
                    }
                    Err(e) => log::error!(
                        "App initialization failed. Cannot create the main context: {e:#}"
                    ),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            ViewerEvent::Initialized(ctx) => self.start(*ctx),
            ViewerEvent::Pipeline(event) => {
                let (Some(ctx), Some(driver)) = (self.ctx.as_mut(), self.driver.as_mut()) else {
                    log::warn!("dropping {event:?}, the viewer is not initialized");
                    return;
                };
                if driver.handle(event, ctx, self.status.as_mut()).is_terminal() {
                    self.cancel.cancel();
                }
                ctx.window.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let ctx = match &mut self.ctx {
            Some(ctx) => ctx,
            None => return,
        };

        ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if !ctx.resize(size.width, size.height) {
                    log::debug!("ignoring resize to {}x{}", size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                // invoke main render loop
                ctx.window.request_redraw();
                ctx.update();
                match render(ctx) {
                    Ok(()) => self.frames.tick(),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = ctx.window.inner_size();
                        ctx.resize(size.width, size.height);
                    }
                    Err(e) => log::error!("Unable to render {}", e),
                }
            }
            _ => {}
        }
    }
}

/// Logs the frame rate every few seconds at debug level.
struct FrameCounter {
    frames: u32,
    since: Instant,
}

impl FrameCounter {
    const INTERVAL: Duration = Duration::from_secs(5);

    fn new() -> Self {
        Self {
            frames: 0,
            since: Instant::now(),
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let elapsed = self.since.elapsed();
        if elapsed >= Self::INTERVAL {
            log::debug!("{:.1} fps", self.frames as f64 / elapsed.as_secs_f64());
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

/// Opens the viewer window and runs until it is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            eprintln!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).expect_throw("Could not initialize logger");
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
