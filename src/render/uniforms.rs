use bytemuck::{Pod, Zeroable};

use crate::audio::shared::SpectralSnapshot;

/// Shape of the spectral history buffer, as the fragment stage sees it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct VizUniforms {
    pub bins_count: f32,
    pub buffers_count: f32,
    /// Ceiling the shader divides magnitudes by.
    pub max_frequency: f32,
    pub _padding: f32,
}

impl VizUniforms {
    /// `fixed_max` wins over the observed maximum when set.
    pub fn from_snapshot(snapshot: &SpectralSnapshot, fixed_max: Option<f32>) -> Self {
        Self {
            bins_count: snapshot.bins as f32,
            buffers_count: snapshot.frames as f32,
            max_frequency: fixed_max.unwrap_or(snapshot.max_magnitude),
            _padding: 0.0,
        }
    }
}
