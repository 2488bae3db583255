//! facebank-hw — Camera capture for live recognition.
//!
//! Provides V4L2-based camera access with frames converted to RGB.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CaptureSession, PixelFormat};
pub use frame::Frame;
