//! FFmpeg subprocess frame source.
//!
//! Decodes any input FFmpeg understands to raw RGB24 on stdout at a fixed
//! output size, and reads exactly `width * height * 3` bytes per frame.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};

use parkwatch_models::{CameraStream, SourceLocator};
use tracing::{debug, info};

use super::{CaptureReleaser, FrameSource, FrameSourceFactory};
use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

/// Output geometry and binary location for FFmpeg sources.
#[derive(Debug, Clone)]
pub struct FfmpegSourceConfig {
    pub ffmpeg_path: String,
    pub width: u32,
    pub height: u32,
}

impl Default for FfmpegSourceConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Frame source backed by an `ffmpeg` child process.
pub struct FfmpegFrameSource {
    stdout: ChildStdout,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    releaser: CaptureReleaser,
}

impl FfmpegFrameSource {
    pub fn open(locator: &SourceLocator, config: &FfmpegSourceConfig) -> VisionResult<Self> {
        let args = build_args(locator, config);
        debug!(args = ?args, "Spawning FFmpeg frame source");

        let mut child = Command::new(&config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                VisionError::camera_open(locator.redacted(), format!("Failed to spawn FFmpeg: {}", e))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            VisionError::camera_open(locator.redacted(), "Failed to capture FFmpeg stdout")
        })?;

        if let Ok(Some(status)) = child.try_wait() {
            return Err(VisionError::camera_open(
                locator.redacted(),
                format!("FFmpeg exited immediately: {}", status),
            ));
        }

        let child = Arc::new(Mutex::new(child));
        let releaser = CaptureReleaser::new(move || kill_child(&child));

        info!(
            source = %locator.redacted(),
            width = config.width,
            height = config.height,
            "FFmpeg frame source opened"
        );

        Ok(Self {
            stdout,
            width: config.width,
            height: config.height,
            buffer: vec![0u8; (config.width as usize) * (config.height as usize) * 3],
            releaser,
        })
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read_frame(&mut self) -> VisionResult<Frame> {
        if self.releaser.is_released() {
            return Err(VisionError::Released);
        }

        self.stdout.read_exact(&mut self.buffer).map_err(|e| {
            if self.releaser.is_released() {
                VisionError::Released
            } else {
                VisionError::frame_read(format!("FFmpeg stream read failed: {}", e))
            }
        })?;

        Frame::from_raw(self.width, self.height, self.buffer.clone())
    }

    fn releaser(&self) -> CaptureReleaser {
        self.releaser.clone()
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.releaser.release();
    }
}

fn kill_child(child: &Mutex<Child>) {
    if let Ok(mut child) = child.lock() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// FFmpeg arguments for decoding `locator` to raw RGB24 on stdout.
pub(crate) fn build_args(locator: &SourceLocator, config: &FfmpegSourceConfig) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

    match locator {
        SourceLocator::Url(url) => {
            if locator.is_rtsp() {
                args.extend(["-rtsp_transport".into(), "tcp".into()]);
            }
            args.extend(["-i".into(), url.clone()]);
        }
        SourceLocator::Device(index) => {
            args.extend([
                "-f".into(),
                "v4l2".into(),
                "-i".into(),
                format!("/dev/video{}", index),
            ]);
        }
    }

    args.extend([
        "-an".into(),
        "-vf".into(),
        format!("scale={}:{}", config.width, config.height),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "pipe:1".into(),
    ]);

    args
}

/// Opens an [`FfmpegFrameSource`] per camera.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSourceFactory {
    config: FfmpegSourceConfig,
}

impl FfmpegSourceFactory {
    pub fn new(config: FfmpegSourceConfig) -> Self {
        Self { config }
    }
}

impl FrameSourceFactory for FfmpegSourceFactory {
    fn open(&self, camera: &CameraStream) -> VisionResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::open(&camera.source, &self.config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtsp_args_use_tcp_transport() {
        let locator = SourceLocator::Url("rtsp://10.0.0.5/stream1".to_string());
        let args = build_args(&locator, &FfmpegSourceConfig::default());

        let transport = args.iter().position(|a| a == "-rtsp_transport").unwrap();
        assert_eq!(args[transport + 1], "tcp");
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "rtsp://10.0.0.5/stream1");
        assert!(args.contains(&"scale=1280:720".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_device_args_use_v4l2() {
        let args = build_args(&SourceLocator::Device(2), &FfmpegSourceConfig::default());
        assert!(args.contains(&"v4l2".to_string()));
        assert!(args.contains(&"/dev/video2".to_string()));
        assert!(!args.contains(&"-rtsp_transport".to_string()));
    }

    #[test]
    fn test_missing_binary_is_open_failure() {
        let config = FfmpegSourceConfig {
            ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
            ..Default::default()
        };
        let result = FfmpegFrameSource::open(&SourceLocator::Device(0), &config);
        assert!(matches!(result, Err(VisionError::CameraOpen { .. })));
    }
}
