// lib.rs - 全景球查看器：视角控制核心 + wgpu 渲染

pub mod camera;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod mesh;
pub mod panorama;
pub mod renderer;
