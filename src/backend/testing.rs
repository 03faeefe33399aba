//! Recording backend for tests
//!
//! Implements [`RenderBackend`] without touching a GPU: resource creation
//! hands out fresh handles and every command is appended to a log that
//! tests assert against.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTexture { width: u32, height: u32 },
    BeginRenderPass { clear_color: Option<[f32; 4]> },
    EndRenderPass,
    SetViewport,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, offsets: Vec<u32> },
    SetVertexBuffer(BufferHandle),
    SetIndexBuffer(BufferHandle),
    WriteBuffer { buffer: BufferHandle, offset: u64, data: Vec<u8> },
    DrawIndexed { indices: Range<u32> },
}

/// Texture-dimension cap, mirroring a real device limit
pub const MAX_DIMENSION: u32 = 8192;

pub struct RecordingBackend {
    next_handle: u64,
    width: u32,
    height: u32,
    pub commands: Vec<Command>,
    /// When set, buffer creation fails; used to provoke not-ready drawables
    pub fail_buffer_creation: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            next_handle: 0,
            width: 800,
            height: 600,
            commands: Vec::new(),
            fail_buffer_creation: false,
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }

    pub fn uniform_writes(&self) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::WriteBuffer { .. }))
            .collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.min(MAX_DIMENSION);
        self.height = height.min(MAX_DIMENSION);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn surface_format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(u64::MAX),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn create_buffer(&mut self, _desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if self.fail_buffer_creation {
            return Err(BackendError::BufferCreationFailed("test".to_string()));
        }
        Ok(BufferHandle(self.next()))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        _data: &[u8],
    ) -> BackendResult<BufferHandle> {
        self.create_buffer(desc)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        self.commands.push(Command::WriteBuffer {
            buffer,
            offset,
            data: data.to_vec(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        self.commands.push(Command::CreateTexture {
            width: desc.width,
            height: desc.height,
        });
        Ok(TextureHandle(self.next()))
    }

    fn create_texture_view(&mut self, _texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        Ok(TextureViewHandle(self.next()))
    }

    fn destroy_texture(&mut self, _texture: TextureHandle) {}

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.next()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        Ok(BindGroupHandle(self.next()))
    }

    fn create_render_pipeline(
        &mut self,
        _desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        Ok(RenderPipelineHandle(self.next()))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        let clear_color = desc.color_attachments.first().and_then(|a| match a.load_op {
            LoadOp::Clear(color) => Some(color),
            LoadOp::Load => None,
        });
        self.commands.push(Command::BeginRenderPass { clear_color });
    }

    fn end_render_pass(&mut self) {
        self.commands.push(Command::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(Command::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, _bind_group: BindGroupHandle, dynamic_offsets: &[u32]) {
        self.commands.push(Command::SetBindGroup {
            index,
            offsets: dynamic_offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, _slot: u32, buffer: BufferHandle, _offset: u64) {
        self.commands.push(Command::SetVertexBuffer(buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, _format: IndexFormat) {
        self.commands.push(Command::SetIndexBuffer(buffer));
    }

    fn set_viewport(
        &mut self,
        _x: f32,
        _y: f32,
        _width: f32,
        _height: f32,
        _min_depth: f32,
        _max_depth: f32,
    ) {
        self.commands.push(Command::SetViewport);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.commands.push(Command::DrawIndexed { indices });
    }
}
