pub mod analyzer;
pub mod decode;
pub mod history;
pub mod loudness;
pub mod publish;
pub mod shared;
pub mod smoothing;
pub mod spectrum;
pub mod window;
