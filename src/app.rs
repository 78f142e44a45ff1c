// app.rs
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::error::RendererError;
use crate::renderer::device::{GpuResource, RenderDevice, TextureId};
use crate::renderer::primitives::{checker_pixels, demo_mesh};
use crate::renderer::{SceneRenderer, WgpuDevice};
use crate::scene::{Camera, Model};
use crate::settings::RenderSettings;
use crate::time::FrameClock;

const CHECKER_SIZE: u32 = 256;
const CHECKER_CELLS: u32 = 8;
const STATS_INTERVAL: u64 = 600;

struct Viewer {
    window: Arc<Window>,
    renderer: SceneRenderer<WgpuDevice>,
    model: Model,
    _checker: GpuResource<TextureId>,
}

impl Viewer {
    fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self, RendererError> {
        let mut device = WgpuDevice::new(window.clone(), settings)?;

        let pixels = checker_pixels(CHECKER_SIZE, CHECKER_CELLS);
        let checker = device.create_texture_rgba8(CHECKER_SIZE, CHECKER_SIZE, &pixels)?;
        let checker = GpuResource::new(checker, device.releaser());
        let model = Model::new(&mut device, demo_mesh(Some(checker.handle())))?;

        let mut renderer = SceneRenderer::new(device, settings);
        renderer.initialize()?;

        Ok(Self {
            window,
            renderer,
            model,
            _checker: checker,
        })
    }
}

pub struct App {
    settings: RenderSettings,
    viewer: Option<Viewer>,
    camera: Camera,
    clock: FrameClock,
    dragging: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            viewer: None,
            camera: Camera::default(),
            clock: FrameClock::new(),
            dragging: false,
            last_cursor: None,
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: &Key) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        match key {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Character(c) if c.eq_ignore_ascii_case("s") => {
                let enabled = !viewer.renderer.shadows_enabled();
                viewer.renderer.set_shadows_enabled(enabled);
                log::info!("Shadows {}", if enabled { "on" } else { "off" });
            }
            Key::Character(c) if c.eq_ignore_ascii_case("r") => {
                let enabled = !viewer.renderer.auto_rotation();
                viewer.renderer.set_auto_rotation(enabled);
                log::info!("Auto rotation {}", if enabled { "on" } else { "off" });
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        let resolution = &self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title("forward-viewer")
            .with_inner_size(LogicalSize::new(resolution.width, resolution.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match Viewer::new(window, &self.settings) {
            Ok(viewer) => {
                log::info!("Renderer initialized");
                viewer.window.request_redraw();
                self.clock.reset();
                self.viewer = Some(viewer);
            }
            Err(err) => {
                log::error!("Renderer initialization failed: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.viewer.as_ref().map(|v| v.window.id()) != Some(id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.renderer.device_mut().resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                self.handle_key(event_loop, &logical_key);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = state == ElementState::Pressed;
                if !self.dragging {
                    self.last_cursor = None;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.dragging {
                    if let Some(last) = self.last_cursor {
                        self.camera
                            .orbit((position.x - last.x) as f32, (position.y - last.y) as f32);
                    }
                    self.last_cursor = Some(position);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 50.0) as f32,
                };
                self.camera.zoom(steps);
            }
            WindowEvent::RedrawRequested => {
                let delta = self.clock.tick();
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                viewer
                    .renderer
                    .render_scene(&mut viewer.model, &self.camera, delta);

                let frame = viewer.renderer.frame_count();
                if frame % STATS_INTERVAL == 0 {
                    let stats = viewer.renderer.last_frame_stats();
                    log::debug!(
                        "frame {frame}: {} draws ({} shadow, {} material uploads, {} texture binds)",
                        stats.total_draw_calls(),
                        stats.shadow_draw_calls,
                        stats.material_uploads,
                        stats.texture_binds
                    );
                }

                viewer.window.request_redraw();
            }
            _ => {}
        }
    }
}
