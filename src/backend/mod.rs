//! Execution backends for the per-pixel kernel.
//!
//! Both backends keep their own "device-resident" copy of every buffer and
//! follow the same staging contract: `put_scene` once per session,
//! `put_frame` before every parallel phase, `execute` to run the kernel over
//! all pixels, then `get_output` to pull the packed colours back.

mod cpu;
mod gpu;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::texture::Texture;

pub use cpu::CpuBackend;
pub use gpu::GpuBackend;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Gpu,
    /// Data-parallel on the host's thread pool.
    Cpu,
}

impl ExecutionMode {
    pub fn toggle(self) -> Self {
        match self {
            ExecutionMode::Gpu => ExecutionMode::Cpu,
            ExecutionMode::Cpu => ExecutionMode::Gpu,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Gpu => write!(f, "GPU"),
            ExecutionMode::Cpu => write!(f, "CPU"),
        }
    }
}

/// Buffers pushed once at session start.
#[derive(Copy, Clone, Debug)]
pub struct SceneBuffers<'a> {
    pub shapes: &'a [f32],
    pub lights: &'a [f32],
    pub texture: &'a Texture,
}
