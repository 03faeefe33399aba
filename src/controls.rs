//! Interactive controls: the egui overlay and the demo's control panel

use crate::backend::traits::TextureViewHandle;
use crate::backend::wgpu_backend::WgpuBackend;
use crate::shader::ShaderVariant;
use egui::ViewportId;
use egui_wgpu::ScreenDescriptor;
use glam::{Vec3, Vec4};
use winit::event::WindowEvent;
use winit::window::Window;

pub const DEFAULT_COLOR_HEX: &str = "#ffae23";
pub const DEFAULT_TESSELLATION: u32 = 5;
pub const MAX_TESSELLATION: u32 = 8;

/// Parse a `#rrggbb` color string into normalized RGB.
///
/// Channels are scaled by 1/256, matching the values the controls have
/// always produced. Returns `None` for anything that is not exactly six
/// hex digits after the optional `#`.
pub fn hex_to_rgb(hex: &str) -> Option<Vec3> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| -> Option<f32> {
        u8::from_str_radix(&digits[range], 16)
            .ok()
            .map(|v| v as f32 / 256.0)
    };
    Some(Vec3::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// UI-editable rendering parameters
pub struct ControlPanel {
    pub tessellation: u32,
    pub color_hex: String,
    pub shader: ShaderVariant,
    pub load_scene_requested: bool,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            tessellation: DEFAULT_TESSELLATION,
            color_hex: DEFAULT_COLOR_HEX.to_string(),
            shader: ShaderVariant::ModifiedLambert,
            load_scene_requested: false,
        }
    }
}

impl ControlPanel {
    /// Draw the panel. `available` is the list of shader variants that
    /// actually built; the combo box offers nothing else.
    pub fn ui(&mut self, ctx: &egui::Context, available: &[ShaderVariant], fps: f32) {
        egui::Window::new("Controls")
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("fps: {fps:.0}"));
                ui.separator();

                ui.add(
                    egui::Slider::new(&mut self.tessellation, 0..=MAX_TESSELLATION)
                        .text("tessellation"),
                );

                ui.horizontal(|ui| {
                    ui.label("color");
                    let edit = ui.text_edit_singleline(&mut self.color_hex);
                    if edit.changed() && hex_to_rgb(&self.color_hex).is_none() {
                        ui.colored_label(egui::Color32::LIGHT_RED, "?");
                    }
                });

                if !available.is_empty() {
                    egui::ComboBox::from_label("shader")
                        .selected_text(self.shader.label())
                        .show_ui(ui, |ui| {
                            for &variant in available {
                                ui.selectable_value(&mut self.shader, variant, variant.label());
                            }
                        });
                }

                if ui.button("Load Scene").clicked() {
                    self.load_scene_requested = true;
                }
            });
    }

    /// Geometry color resolved from the hex field, falling back to the
    /// default when the field does not parse
    pub fn resolved_color(&self) -> Vec4 {
        hex_to_rgb(&self.color_hex)
            .or_else(|| hex_to_rgb(DEFAULT_COLOR_HEX))
            .unwrap_or(Vec3::ONE)
            .extend(1.0)
    }
}

/// egui overlay plumbing: winit input, tessellation, and wgpu rendering
pub struct EguiOverlay {
    ctx: egui::Context,
    winit_state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
}

impl EguiOverlay {
    pub fn new(backend: &WgpuBackend, window: &Window) -> Self {
        let ctx = egui::Context::default();

        let winit_state = egui_winit::State::new(
            ctx.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
        );

        let renderer =
            egui_wgpu::Renderer::new(backend.device(), backend.wgpu_surface_format(), None, 1);

        Self {
            ctx,
            winit_state,
            renderer,
            paint_jobs: Vec::new(),
            textures_delta: egui::TexturesDelta::default(),
        }
    }

    /// Feed a window event to egui; returns whether egui consumed it
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    pub fn begin_frame(&mut self, window: &Window) {
        let raw_input = self.winit_state.take_egui_input(window);
        self.ctx.begin_frame(raw_input);
    }

    pub fn end_frame(&mut self, window: &Window) {
        let full_output = self.ctx.end_frame();
        self.winit_state
            .handle_platform_output(window, full_output.platform_output);
        self.paint_jobs = self
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        self.textures_delta = full_output.textures_delta;
    }

    /// Render the overlay on top of the scene already in the swapchain
    pub fn render(
        &mut self,
        backend: &mut WgpuBackend,
        swapchain_view: TextureViewHandle,
        screen_width: u32,
        screen_height: u32,
    ) {
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [screen_width, screen_height],
            pixels_per_point: self.ctx.pixels_per_point(),
        };

        let (device, queue, encoder) = backend.device_queue_encoder();

        for (id, image_delta) in &self.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        if let Some(encoder) = encoder {
            self.renderer.update_buffers(
                device,
                queue,
                encoder,
                &self.paint_jobs,
                &screen_descriptor,
            );
        }

        backend.render_egui(
            &self.renderer,
            &self.paint_jobs,
            &screen_descriptor,
            swapchain_view,
        );

        for id in &self.textures_delta.free {
            self.renderer.free_texture(id);
        }
        self.textures_delta = egui::TexturesDelta::default();
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn wants_pointer_input(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    pub fn wants_keyboard_input(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }
}
