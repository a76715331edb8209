//! Interpolation kernels used by the interval sampler and the pose mixer.

pub mod functions;

pub use functions::{lerp_f32, lerp_vec4, slerp_quat};
