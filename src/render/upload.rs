use crate::audio::shared::{SharedFeatures, SpectralSnapshot};

use super::gpu::GpuContext;
use super::uniforms::VizUniforms;

const F32_SIZE: u64 = std::mem::size_of::<f32>() as u64;

/// GPU-side copies of the published features.
///
/// Nothing is uploaded implicitly: the renderer calls `upload` once per
/// frame, and unchanged history (same snapshot sequence) is not re-sent.
pub struct FeatureBuffers {
    /// `@binding(1)`: one f32 loudness value.
    pub loudness: wgpu::Buffer,
    /// `@binding(2)`: flattened spectral history, row-major, oldest first.
    pub history: wgpu::Buffer,
    /// `@binding(3)`: `VizUniforms`.
    pub uniforms: wgpu::Buffer,
    history_size: u64,
    last_sequence: Option<u64>,
    fixed_max: Option<f32>,
}

impl FeatureBuffers {
    pub fn new(gpu: &GpuContext, bins: usize, frames: usize, fixed_max: Option<f32>) -> Self {
        let loudness = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("loudness_buffer"),
            size: F32_SIZE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let history_size = history_bytes(bins * frames);
        let history = create_history_buffer(gpu, history_size);

        let uniforms = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viz_uniforms_buffer"),
            size: std::mem::size_of::<VizUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            loudness,
            history,
            uniforms,
            history_size,
            last_sequence: None,
            fixed_max,
        }
    }

    /// Copies the latest shared state into the GPU buffers. Returns true if
    /// the history buffer was rewritten.
    pub fn upload(&mut self, gpu: &GpuContext, shared: &SharedFeatures) -> bool {
        gpu.queue.write_buffer(&self.loudness, 0, &shared.loudness_bytes());

        let snapshot = shared.spectral();
        if self.last_sequence == Some(snapshot.sequence) {
            return false;
        }
        self.last_sequence = Some(snapshot.sequence);

        self.write_history(gpu, &snapshot);
        let uniforms = VizUniforms::from_snapshot(&snapshot, self.fixed_max);
        gpu.queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
        true
    }

    fn write_history(&mut self, gpu: &GpuContext, snapshot: &SpectralSnapshot) {
        if snapshot.is_empty() {
            return;
        }
        let needed = history_bytes(snapshot.data.len());
        if needed > self.history_size {
            log::debug!(
                "Growing history buffer {} -> {} bytes",
                self.history_size,
                needed
            );
            self.history = create_history_buffer(gpu, needed);
            self.history_size = needed;
        }
        gpu.queue.write_buffer(&self.history, 0, snapshot.as_bytes());
    }

    pub fn history_size(&self) -> u64 {
        self.history_size
    }
}

// storage bindings may not be zero-sized
fn history_bytes(values: usize) -> u64 {
    (values as u64).max(1) * F32_SIZE
}

fn create_history_buffer(gpu: &GpuContext, size: u64) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("spectral_history_buffer"),
        size,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
