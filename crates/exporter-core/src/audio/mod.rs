//! Audio processing utilities shared by the encoders

pub mod convert;
mod resample;

pub use resample::StreamResampler;
