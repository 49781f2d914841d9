pub mod gpu;
pub mod uniforms;
pub mod upload;
