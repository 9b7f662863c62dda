//! V4L2 still capture via the `v4l` crate.

use crate::frame::{self, FrameError, DARK_THRESHOLD};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Requested capture size; drivers may negotiate something else.
const REQUEST_WIDTH: u32 = 640;
const REQUEST_HEIGHT: u32 = 480;

/// Frames tried after warmup before giving up on a dark scene.
const CAPTURE_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("every frame was dark after {attempts} attempts")]
    TooDark { attempts: u32 },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
}

/// Negotiated pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, converted to RGB in software.
    Yuyv,
    /// Motion JPEG; each buffer is a complete JPEG.
    Mjpeg,
}

impl PixelFormat {
    fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Yuyv => FourCC::new(b"YUYV"),
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
        }
    }

    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"YUYV") {
            Some(PixelFormat::Yuyv)
        } else if fourcc == FourCC::new(b"MJPG") {
            Some(PixelFormat::Mjpeg)
        } else {
            None
        }
    }
}

/// An open V4L2 camera. Closed when dropped.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub pixel_format: PixelFormat,
}

impl Camera {
    /// Open a capture device (e.g. "/dev/video0") and negotiate YUYV, falling
    /// back to MJPEG.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.raw_os_error() == Some(16) {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }
        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let mut negotiated = None;
        for wanted in [PixelFormat::Yuyv, PixelFormat::Mjpeg] {
            let mut fmt = device.format().map_err(|e| {
                CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
            })?;
            fmt.fourcc = wanted.fourcc();
            fmt.width = REQUEST_WIDTH;
            fmt.height = REQUEST_HEIGHT;

            let got = device.set_format(&fmt).map_err(|e| {
                CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
            })?;
            if let Some(pixel_format) = PixelFormat::from_fourcc(got.fourcc) {
                negotiated = Some((got, pixel_format));
                break;
            }
            tracing::debug!(wanted = ?wanted, got = ?got.fourcc, "format not accepted");
        }

        let Some((fmt, pixel_format)) = negotiated else {
            return Err(CameraError::FormatNegotiationFailed(
                "device offers neither YUYV nor MJPG".to_string(),
            ));
        };

        tracing::info!(
            width = fmt.width,
            height = fmt.height,
            format = ?pixel_format,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: fmt.width,
            height: fmt.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// Discard `warmup_frames`, then return the first non-dark frame as JPEG.
    ///
    /// The mmap stream lives only for this call.
    pub fn capture_jpeg(&self, warmup_frames: usize) -> Result<Vec<u8>, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        for _ in 0..warmup_frames {
            stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        }

        for _ in 0..CAPTURE_ATTEMPTS {
            let (buf, meta) = stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
            let used = (meta.bytesused as usize).min(buf.len());

            let (rgb, width, height) = self.to_rgb(&buf[..used])?;
            if frame::is_dark_frame(&frame::rgb_luma(&rgb), DARK_THRESHOLD) {
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }

            let jpeg = frame::encode_jpeg(&rgb, width, height)?;
            tracing::info!(
                device = %self.device_path,
                seq = meta.sequence,
                bytes = jpeg.len(),
                "captured still"
            );
            return Ok(jpeg);
        }

        Err(CameraError::TooDark {
            attempts: CAPTURE_ATTEMPTS,
        })
    }

    fn to_rgb(&self, buf: &[u8]) -> Result<(Vec<u8>, u32, u32), CameraError> {
        match self.pixel_format {
            PixelFormat::Yuyv => Ok((
                frame::yuyv_to_rgb(buf, self.width, self.height)?,
                self.width,
                self.height,
            )),
            PixelFormat::Mjpeg => Ok(frame::decode_mjpeg(buf)?),
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();
        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card,
                driver: caps.driver,
            });
        }
        devices
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::debug!(device = %self.device_path, "camera released");
    }
}

/// Open `device_path`, take one still and close the device again.
pub fn capture_jpeg(device_path: &str, warmup_frames: usize) -> Result<Vec<u8>, CameraError> {
    let camera = Camera::open(device_path)?;
    camera.capture_jpeg(warmup_frames)
}
