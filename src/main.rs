//! Interactive forward-rendering demo binary

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use forward_demo::backend::RenderBackend;
use forward_demo::backend::WgpuBackend;
use forward_demo::controls::{ControlPanel, EguiOverlay};
use forward_demo::renderer::Renderer;
use forward_demo::scene::{Camera, Scene};
use forward_demo::shader::ShaderLibrary;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;

struct AppState {
    backend: WgpuBackend,
    renderer: Renderer,
    library: ShaderLibrary,
    scene: Scene,
    camera: Camera,
    overlay: EguiOverlay,
    panel: ControlPanel,
    start: Instant,
    last_frame: Instant,
    fps: f32,
}

fn main() {
    env_logger::init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            eprintln!("Failed to create event loop: {e}");
            return;
        }
    };

    let window = match WindowBuilder::new()
        .with_title("Forward Rendering Demo")
        .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
        .build(&event_loop)
    {
        Ok(window) => Arc::new(window),
        Err(e) => {
            eprintln!("Failed to create window: {e}");
            return;
        }
    };

    let mut backend = match WgpuBackend::new(Arc::clone(&window), true) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Failed to initialize graphics backend: {e}");
            return;
        }
    };

    let (width, height) = backend.surface_size();
    let mut renderer = match Renderer::new(&mut backend, width, height) {
        Ok(renderer) => renderer,
        Err(e) => {
            eprintln!("Failed to create renderer: {e}");
            return;
        }
    };
    renderer.set_clear_color(0.2, 0.2, 0.2, 1.0);

    let library = ShaderLibrary::build(&mut backend);
    if library.is_empty() {
        eprintln!("No shader variant could be built, aborting");
        return;
    }

    let panel = ControlPanel::default();
    let scene = Scene::load(&mut backend, panel.tessellation);

    let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
    camera.set_aspect_ratio(width as f32 / height as f32);
    camera.update_projection_matrix();

    let overlay = EguiOverlay::new(&backend, &window);

    let now = Instant::now();
    let mut state = AppState {
        backend,
        renderer,
        library,
        scene,
        camera,
        overlay,
        panel,
        start: now,
        last_frame: now,
        fps: 0.0,
    };

    let window_clone = Arc::clone(&window);
    let result = event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                let consumed = state.overlay.on_window_event(&window_clone, &event);
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        state
                            .renderer
                            .set_size(&mut state.backend, size.width, size.height);
                        if size.height > 0 {
                            state
                                .camera
                                .set_aspect_ratio(size.width as f32 / size.height as f32);
                            state.camera.update_projection_matrix();
                        }
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                state: ElementState::Pressed,
                                ..
                            },
                        ..
                    } if !consumed && !state.overlay.wants_keyboard_input() => elwt.exit(),
                    WindowEvent::RedrawRequested => render_frame(&mut state, &window_clone),
                    _ => {}
                }
            }
            Event::AboutToWait => window_clone.request_redraw(),
            _ => {}
        }
    });

    if let Err(e) = result {
        eprintln!("Event loop error: {e}");
    }
}

fn render_frame(state: &mut AppState, window: &Window) {
    let dt = state.last_frame.elapsed().as_secs_f32();
    state.last_frame = Instant::now();
    if dt > 0.0 {
        state.fps = if state.fps == 0.0 {
            1.0 / dt
        } else {
            state.fps * 0.9 + (1.0 / dt) * 0.1
        };
    }

    state.camera.update();

    if state.panel.load_scene_requested {
        state.panel.load_scene_requested = false;
        state.scene = Scene::load(&mut state.backend, state.panel.tessellation);
    } else {
        state
            .scene
            .sync_tessellation(&mut state.backend, state.panel.tessellation);
    }
    state.scene.update_model_matrices();

    let frame = match state.backend.begin_frame() {
        Ok(frame) => frame,
        Err(e) => {
            log::error!("failed to begin frame: {e}");
            return;
        }
    };

    let available = state.library.available();
    state.overlay.begin_frame(window);
    let ctx = state.overlay.context().clone();
    state.panel.ui(&ctx, &available, state.fps);
    state.overlay.end_frame(window);

    // Fall back to any usable variant when the selected one failed to build
    if state.library.get_mut(state.panel.shader).is_none() {
        if let Some(fallback) = state.library.first_available() {
            log::warn!(
                "shader variant '{}' unavailable, using '{}'",
                state.panel.shader.label(),
                fallback.label()
            );
            state.panel.shader = fallback;
        }
    }

    let time = state.start.elapsed().as_secs_f32();
    let color = state.panel.resolved_color();
    if let Some(program) = state.library.get_mut(state.panel.shader) {
        let result = state.renderer.render(
            &mut state.backend,
            &frame,
            &state.camera,
            program,
            state.scene.drawables(),
            state.scene.model_matrices(),
            color,
            time,
        );
        if let Err(e) = result {
            log::error!("frame skipped: {e}");
        }
    }

    state.overlay.render(
        &mut state.backend,
        frame.swapchain_view,
        frame.width,
        frame.height,
    );

    if let Err(e) = state.backend.end_frame() {
        log::error!("failed to present frame: {e}");
    }
}
