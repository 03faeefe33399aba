//! Interactive forward-rendering demo
//!
//! A small real-time renderer: a perspective [`scene::Camera`], a set of
//! procedurally generated [`geometry`] drawables, a
//! [`shader::ShaderProgram`] abstraction with reflected uniform bindings,
//! and a [`renderer::Renderer`] that orchestrates the per-frame draw
//! sequence. GPU access goes through the object-safe
//! [`backend::RenderBackend`] trait, implemented for wgpu.

pub mod backend;
pub mod controls;
pub mod geometry;
pub mod renderer;
pub mod scene;
pub mod shader;

pub use backend::{RenderBackend, WgpuBackend};
pub use renderer::Renderer;
pub use scene::{Camera, Scene};
pub use shader::{ShaderLibrary, ShaderProgram, ShaderVariant};
