//! External decoder bridge for repaired HEVC streams.
//!
//! Pixel decoding is delegated to an `ffmpeg` binary. Frame data is handed
//! over through uniquely named temporary files that are removed when the
//! attempt ends, whatever its outcome.

use crate::config::MediaDecodeConfig;
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One bridge per decoder binary, so each binary is checked once per process.
static BRIDGES: Lazy<DashMap<PathBuf, Arc<FfmpegBridge>>> = Lazy::new(DashMap::new);

static SHARED_BRIDGE: Lazy<Arc<FfmpegBridge>> =
    Lazy::new(|| FfmpegBridge::from_config(MediaDecodeConfig::global()));

const ALPHA_GIF_FILTER: &str =
    "[0:v][1:v]alphamerge,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

/// Outcome of a failed codec call. These are values the orchestrator
/// inspects, never errors surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The decoder binary could not be started.
    #[error("external decoder unavailable")]
    Unavailable,

    /// The decoder ran but exited non-zero or produced nothing.
    #[error("external decoder failed: {0}")]
    Failure(String),
}

/// Capability to turn repaired HEVC streams into standard images.
pub trait CodecBridge: Send + Sync {
    /// Whether the decoder can be used at all.
    fn available(&self) -> bool;

    /// Decode one intra frame and re-encode it as baseline JPEG.
    fn decode_static(&self, stream: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decode paired color/mask frames, alpha-composite, and encode an animated GIF.
    fn decode_animated(
        &self,
        color_frames: &[&[u8]],
        mask_frames: &[&[u8]],
    ) -> Result<Vec<u8>, CodecError>;
}

/// `ffmpeg`-backed codec bridge.
#[derive(Debug)]
pub struct FfmpegBridge {
    binary: PathBuf,
    available: OnceCell<bool>,
}

impl FfmpegBridge {
    /// Bridge to the given decoder binary, with its own availability cache.
    ///
    /// Prefer [`FfmpegBridge::for_binary`], which shares the cache process-wide.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            available: OnceCell::new(),
        }
    }

    /// Process-wide bridge for `binary`.
    ///
    /// Every caller naming the same binary gets the same bridge, so its
    /// availability is checked at most once per process.
    pub fn for_binary(binary: &Path) -> Arc<FfmpegBridge> {
        let entry = BRIDGES
            .entry(binary.to_path_buf())
            .or_insert_with(|| Arc::new(Self::new(binary)));
        Arc::clone(entry.value())
    }

    /// Process-wide bridge for the binary named by the configuration.
    pub fn from_config(config: &MediaDecodeConfig) -> Arc<FfmpegBridge> {
        Self::for_binary(config.ffmpeg_binary())
    }

    /// Bridge for the global configuration.
    pub fn shared() -> &'static FfmpegBridge {
        SHARED_BRIDGE.as_ref()
    }

    /// Decoder binary this bridge spawns.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run(&self, args: &[String]) -> Result<Vec<u8>, CodecError> {
        debug!("Running ffmpeg {:?}", args);
        let output = Command::new(self.binary())
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CodecError::Failure(format!("failed to start ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CodecError::Failure(format!(
                "ffmpeg exited with {}: {}",
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr
            )));
        }
        if output.stdout.is_empty() {
            return Err(CodecError::Failure(
                "ffmpeg produced empty output".to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

impl CodecBridge for FfmpegBridge {
    fn available(&self) -> bool {
        if let Some(known) = self.available.get() {
            return *known;
        }
        // Racing first callers each run the check; they all reach the same answer.
        let found = has_ffmpeg(self.binary());
        let _ = self.available.set(found);
        found
    }

    fn decode_static(&self, stream: &[u8]) -> Result<Vec<u8>, CodecError> {
        if !self.available() {
            return Err(CodecError::Unavailable);
        }
        let input = write_temp_frames(&[stream])?;
        self.run(&build_static_args(input.path()))
    }

    fn decode_animated(
        &self,
        color_frames: &[&[u8]],
        mask_frames: &[&[u8]],
    ) -> Result<Vec<u8>, CodecError> {
        if !self.available() {
            return Err(CodecError::Unavailable);
        }
        let color = write_temp_frames(color_frames)?;
        let mask = write_temp_frames(mask_frames)?;
        self.run(&build_animated_args(color.path(), mask.path()))
    }
}

/// Check whether the decoder binary starts.
pub fn has_ffmpeg(binary: &Path) -> bool {
    let found = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .map(|output| output.status.success());

    match found {
        Ok(true) => {
            info!("FFmpeg detected: {}", binary.display());
            true
        }
        Ok(false) => {
            warn!("FFmpeg unavailable: {} -version failed", binary.display());
            false
        }
        Err(e) => {
            warn!("FFmpeg unavailable: {}: {}", binary.display(), e);
            false
        }
    }
}

/// Write frames back to back into a fresh temporary file.
///
/// The file is deleted when the returned handle is dropped.
pub fn write_temp_frames(frames: &[&[u8]]) -> Result<NamedTempFile, CodecError> {
    let mut file = tempfile::Builder::new()
        .prefix("wxgf_")
        .suffix(".bin")
        .tempfile()
        .map_err(|e| CodecError::Failure(format!("failed to create temp file: {}", e)))?;

    for frame in frames {
        file.write_all(frame)
            .map_err(|e| CodecError::Failure(format!("failed to write temp file: {}", e)))?;
    }
    file.flush()
        .map_err(|e| CodecError::Failure(format!("failed to flush temp file: {}", e)))?;
    Ok(file)
}

fn base_args() -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

fn build_static_args(input_path: &Path) -> Vec<String> {
    let mut args = base_args();
    args.push("-f".to_string());
    args.push("hevc".to_string());
    args.push("-i".to_string());
    args.push(input_path.to_string_lossy().to_string());
    args.push("-vframes".to_string());
    args.push("1".to_string());
    args.push("-c:v".to_string());
    args.push("mjpeg".to_string());
    args.push("-q:v".to_string());
    args.push("4".to_string());
    args.push("-f".to_string());
    args.push("image2".to_string());
    args.push("pipe:1".to_string());
    args
}

fn build_animated_args(color_path: &Path, mask_path: &Path) -> Vec<String> {
    let mut args = base_args();
    for path in [color_path, mask_path] {
        args.push("-f".to_string());
        args.push("hevc".to_string());
        args.push("-i".to_string());
        args.push(path.to_string_lossy().to_string());
    }
    args.push("-filter_complex".to_string());
    args.push(ALPHA_GIF_FILTER.to_string());
    args.push("-f".to_string());
    args.push("gif".to_string());
    args.push("-".to_string());
    args
}
