//! Volume utilities shared by the derivative backends
//!
//! - Separable Gaussian smoothing with border renormalisation
//! - Central-difference derivatives

pub mod smoothing;

pub use smoothing::*;
