//! faceops-hw: camera capture for registration and face tests.
//!
//! Opens a V4L2 device, lets auto-exposure settle and hands back one
//! JPEG-encoded still. The device is released before the call returns.

pub mod camera;
pub mod frame;

pub use camera::{capture_jpeg, Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::FrameError;
