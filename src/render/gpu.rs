use anyhow::{Context, Result};

/// Headless wgpu device used as the upload target for published features.
/// No surface is needed: the core only writes buffers.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::AdapterInfo,
}

impl GpuContext {
    /// A missing adapter or device is logged and reported as `None` so
    /// analysis can carry on without a GPU target.
    pub fn try_new() -> Option<Self> {
        match pollster::block_on(Self::request()) {
            Ok(gpu) => {
                log::info!("GPU upload target: {}", gpu.describe());
                Some(gpu)
            }
            Err(err) => {
                log::warn!("No GPU upload target, continuing without one: {:#}", err);
                None
            }
        }
    }

    async fn request() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        // buffer uploads only, so any adapter will do
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                ..Default::default()
            })
            .await
            .context("No GPU adapter available")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tapviz_upload"),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    ..Default::default()
                },
                None,
            )
            .await
            .context("GPU device request failed")?;

        Ok(Self {
            device,
            queue,
            adapter: adapter.get_info(),
        })
    }

    pub fn describe(&self) -> String {
        format!("{} ({:?})", self.adapter.name, self.adapter.backend)
    }
}
