//! Camera device implementation

use crate::camera::{FocusDevice, V4L2_CID_FOCUS_ABSOLUTE, V4L2_CID_FOCUS_AUTO};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use v4l::Device;
use v4l::control::{Control, Value};

/// Range of the absolute focus control reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusRange {
    /// Lowest accepted focus value
    pub minimum: i64,
    /// Highest accepted focus value
    pub maximum: i64,
    /// Step between accepted values
    pub step: u64,
    /// Driver default
    pub default: i64,
}

/// Information about a camera device
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Device index (e.g., 0 for /dev/video0)
    pub index: usize,
    /// Device path (e.g., "/dev/video0")
    pub path: String,
    /// Device name reported by the driver
    pub name: String,
    /// Driver name
    pub driver: String,
    /// Bus information
    pub bus_info: String,
    /// Absolute focus control, if the device has one
    pub focus: Option<FocusRange>,
}

/// List V4L2 capture devices together with their focus capabilities
pub fn list_devices() -> Result<Vec<CameraDevice>> {
    let mut devices = Vec::new();

    for index in 0..64 {
        let path = format!("/dev/video{index}");
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::new(index) else {
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

        let focus = dev.query_controls().ok().and_then(|controls| {
            controls
                .into_iter()
                .find(|c| c.id == V4L2_CID_FOCUS_ABSOLUTE)
                .map(|c| FocusRange {
                    minimum: c.minimum,
                    maximum: c.maximum,
                    step: c.step,
                    default: c.default,
                })
        });

        devices.push(CameraDevice {
            index,
            path,
            name: caps.card,
            driver: caps.driver,
            bus_info: caps.bus,
            focus,
        });
    }

    Ok(devices)
}

/// Handle to a V4L2 camera used only for control ioctls
pub struct Camera {
    device: Device,
    path: PathBuf,
}

impl Camera {
    /// Open the device node at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path)
            .map_err(|e| Error::Camera(format!("Unable to open camera {}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), "Opened camera");

        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }
}

impl FocusDevice for Camera {
    fn set_manual_focus_mode(&mut self) -> Result<()> {
        self.device
            .set_control(Control {
                id: V4L2_CID_FOCUS_AUTO,
                value: Value::Boolean(false),
            })
            .map_err(|e| {
                tracing::debug!(error = %e, "Disabling autofocus failed");
                Error::FocusUnsupported(self.path.display().to_string())
            })
    }

    fn set_focus(&mut self, value: i32) -> Result<()> {
        self.device
            .set_control(Control {
                id: V4L2_CID_FOCUS_ABSOLUTE,
                value: Value::Integer(i64::from(value)),
            })
            .map_err(|e| Error::Camera(format!("Unable to set focus to {value}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Only lists something when V4L2 devices are present
        let devices = list_devices().expect("enumeration never fails");
        for dev in devices {
            println!("  - {} at {} (focus: {:?})", dev.name, dev.path, dev.focus);
        }
    }

    #[test]
    fn test_open_missing_device() {
        let err = Camera::open("/dev/does-not-exist-gcfocus").err().unwrap();
        assert!(matches!(err, Error::Camera(_)));
    }
}
