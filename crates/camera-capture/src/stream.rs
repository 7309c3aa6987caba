//! Scoped camera stream

use crate::{CameraBackend, CameraConfig, CameraError, FrameSource, VideoFrame};
use tracing::{debug, info};

/// An acquired camera. The device is released on [`CameraStream::release`]
/// or when the stream is dropped, whichever comes first.
pub struct CameraStream {
    source: Option<Box<dyn FrameSource>>,
    config: CameraConfig,
}

impl CameraStream {
    /// Acquire the configured device from a backend
    pub fn open(backend: &mut dyn CameraBackend, config: CameraConfig) -> Result<Self, CameraError> {
        let source = backend.open(&config)?;
        info!(device = %config.device, "Camera acquired");
        Ok(Self {
            source: Some(source),
            config,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Whether the stream is held and producing frames
    pub fn is_ready(&self) -> bool {
        self.source.as_ref().map_or(false, |s| s.is_ready())
    }

    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }

    /// Read the current frame
    pub fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        match self.source.as_mut() {
            Some(source) => source.read_frame(),
            None => Err(CameraError::NotInitialized),
        }
    }

    /// Stop capture and release the device. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            info!(device = %self.config.device, "Camera released");
        } else {
            debug!("Camera already released");
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PermissionState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        stops: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn is_ready(&self) -> bool {
            true
        }

        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            Ok(VideoFrame::blank(4, 4))
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingBackend {
        stops: Arc<AtomicUsize>,
        fail: Option<CameraError>,
    }

    impl CameraBackend for CountingBackend {
        fn permission(&self) -> Option<PermissionState> {
            None
        }

        fn open(&mut self, _config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
            if let Some(e) = self.fail.clone() {
                return Err(e);
            }
            Ok(Box::new(CountingSource {
                stops: self.stops.clone(),
            }))
        }
    }

    #[test]
    fn test_release_is_idempotent_and_drop_safe() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut backend = CountingBackend {
            stops: stops.clone(),
            fail: None,
        };

        let mut stream = CameraStream::open(&mut backend, CameraConfig::default()).unwrap();
        assert!(stream.is_ready());
        assert!(stream.read_frame().is_ok());

        stream.release();
        stream.release();
        assert!(stream.is_released());
        assert!(matches!(stream.read_frame(), Err(CameraError::NotInitialized)));
        drop(stream);

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_device() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut backend = CountingBackend {
            stops: stops.clone(),
            fail: None,
        };

        {
            let _stream = CameraStream::open(&mut backend, CameraConfig::default()).unwrap();
        }

        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_propagates() {
        let mut backend = CountingBackend {
            stops: Arc::new(AtomicUsize::new(0)),
            fail: Some(CameraError::NotFound),
        };
        assert!(matches!(
            CameraStream::open(&mut backend, CameraConfig::default()),
            Err(CameraError::NotFound)
        ));
    }
}
