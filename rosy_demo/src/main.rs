//! Rosy demo - a free-flight walk around a procedural scene
//!
//! WASD/QE to move, hold the right mouse button to look around, F1 toggles
//! wireframe, Escape quits. Shaders are read from `rosy_demo/shaders/*.spv`.

mod demo_asset;

use std::path::PathBuf;
use std::time::Instant;

use glam::{Mat4, Vec3};
use rosy_engine::rosy::scene::{parse_model_id, Camera, DYNAMIC_ROOT_NAME};
use rosy_engine::rosy::{Config, Error, Result};
use rosy_engine::{engine_error, engine_info, engine_warn};
use rosy_engine_renderer_vulkan::{GraphScene, Rhi, Scene, UiFrame};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// GraphScene plus the mob animation
struct DemoScene {
    inner: GraphScene,
    mobs: Vec<usize>,
    time: f32,
}

impl DemoScene {
    fn new() -> Self {
        let shader_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders");
        let mut inner = GraphScene::new(demo_asset::build(), shader_dir);
        let mut camera = Camera::new(Vec3::new(0.0, 3.0, 12.0));
        camera.pitch = -0.2;
        *inner.camera_mut() = camera;
        inner.set_light_direction(Vec3::new(0.5, 1.0, 0.35));
        Self { inner, mobs: Vec::new(), time: 0.0 }
    }
}

impl Scene for DemoScene {
    fn build(&mut self, rhi: &mut Rhi) -> Result<()> {
        self.inner.build(rhi)?;
        self.mobs.clear();
        for i in 0..demo_asset::MOB_COUNT {
            let id = parse_model_id(&format!(
                "{}:{}:{}",
                demo_asset::ASSET_NAME,
                DYNAMIC_ROOT_NAME,
                demo_asset::mob_name(i)
            ))?;
            self.mobs.push(self.inner.graph().resolve_model_id(&id)?);
        }
        Ok(())
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> Result<()> {
        self.inner.handle_window_event(event)
    }

    fn handle_mouse_motion(&mut self, delta: (f64, f64)) -> Result<()> {
        self.inner.handle_mouse_motion(delta)
    }

    fn update(&mut self, rhi: &mut Rhi, dt: f32) -> Result<()> {
        self.time += dt;
        let scale = Mat4::from_scale(Vec3::splat(0.6));
        let count = self.mobs.len();
        for (i, &node) in self.mobs.iter().enumerate() {
            let transform = demo_asset::mob_transform(i, count, self.time) * scale;
            self.inner.graph_mut().set_local_transform(node, transform)?;
        }
        self.inner.update(rhi, dt)
    }

    fn draw_shadows(&mut self, rhi: &mut Rhi, pass: u32) -> Result<()> {
        self.inner.draw_shadows(rhi, pass)
    }

    fn draw(&mut self, rhi: &mut Rhi) -> Result<()> {
        self.inner.draw(rhi)
    }

    fn draw_ui(&mut self, ui: &mut UiFrame) -> Result<()> {
        self.inner.draw_ui(ui)
    }

    fn deinit(&mut self, rhi: &mut Rhi) -> Result<()> {
        self.mobs.clear();
        self.inner.deinit(rhi)
    }
}

struct App {
    config: Config,
    window: Option<Window>,
    rhi: Option<Rhi>,
    scene: Option<DemoScene>,
    mouse_look: bool,
    last_frame: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            window: None,
            rhi: None,
            scene: None,
            mouse_look: false,
            last_frame: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("Rosy")
            .with_inner_size(winit::dpi::LogicalSize::new(1600, 900));
        let window = event_loop
            .create_window(attributes)
            .map_err(|e| Error::InitializationFailed(format!("Failed to create window: {}", e)))?;

        let mut rhi = Rhi::new(&window, self.config.clone())?;
        let mut scene = DemoScene::new();
        if let Err(e) = scene.build(&mut rhi) {
            rhi.deinit();
            return Err(e);
        }

        engine_info!("rosy::demo", "Initialization complete, entering main loop");
        self.window = Some(window);
        self.rhi = Some(rhi);
        self.scene = Some(scene);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(window), Some(rhi), Some(scene)) = (&self.window, &mut self.rhi, &mut self.scene) else {
            return Ok(());
        };
        if rhi.resize_requested() {
            rhi.resize_swapchain(window)?;
            if rhi.resize_requested() {
                // Minimized
                return Ok(());
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        match rhi.draw_frame(scene, dt) {
            // The resize flag is already set
            Err(Error::SwapchainOutOfDate) => Ok(()),
            other => other,
        }
    }

    fn shutdown(&mut self) {
        if let (Some(mut scene), Some(rhi)) = (self.scene.take(), self.rhi.as_mut()) {
            if let Err(e) = scene.deinit(rhi) {
                engine_warn!("rosy::demo", "Scene deinit failed: {}", e);
            }
        }
        if let Some(mut rhi) = self.rhi.take() {
            rhi.deinit();
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                engine_error!("rosy::demo", "Initialization failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(_) => {
                if let Some(rhi) = self.rhi.as_mut() {
                    rhi.request_resize();
                }
            }
            WindowEvent::KeyboardInput { event: key, .. }
                if key.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                event_loop.exit();
                return;
            }
            WindowEvent::MouseInput { state, button: MouseButton::Right, .. } => {
                self.mouse_look = *state == ElementState::Pressed;
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    engine_error!("rosy::demo", "Frame failed: {}", e);
                    event_loop.exit();
                }
                return;
            }
            _ => {}
        }

        if let Some(scene) = self.scene.as_mut() {
            if let Err(e) = scene.handle_window_event(&event) {
                engine_error!("rosy::demo", "Event handling failed: {}", e);
                event_loop.exit();
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let (DeviceEvent::MouseMotion { delta }, true) = (event, self.mouse_look) {
            if let Some(scene) = self.scene.as_mut() {
                if let Err(e) = scene.handle_mouse_motion(delta) {
                    engine_warn!("rosy::demo", "Mouse motion ignored: {}", e);
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
        engine_info!("rosy::demo", "Shut down");
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        app_name: "Rosy demo".to_string(),
        ..Config::default()
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}
