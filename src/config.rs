use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::overlay::DisplayMode;

const DEFAULT_MODEL_PATH: &str = "models/roadseg.onnx";
const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_FRAME_INTERVAL: u32 = 15;
const DEFAULT_CONFIDENCE: f32 = 0.3;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_TARGET_FPS: u32 = 60;
const DEFAULT_MASK_DECAY: f32 = 0.94;
const DEFAULT_OVERLAY_ALPHA: f32 = 0.25;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    model_path: Option<PathBuf>,
    device: Option<String>,
    frame_interval: Option<u32>,
    confidence: Option<f32>,
    input_size: Option<u32>,
    target_fps: Option<u32>,
    mask_decay: Option<f32>,
    overlay_alpha: Option<f32>,
    display_mode: Option<DisplayMode>,
}

/// Tunables for the detection pipeline. Defaults mirror the daytime camera
/// deployment; a JSON file (`ROADSIGHT_CONFIG`) and `ROADSIGHT_*` variables
/// override them.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Serialized trained-model artifact, consumed opaquely by the backend.
    pub model_path: PathBuf,
    /// Camera device for the live loop.
    pub device: String,
    /// Run the detector every Nth frame.
    pub frame_interval: u32,
    /// Confidence threshold handed to the model.
    pub confidence: f32,
    /// Square inference resolution.
    pub input_size: u32,
    /// Display rate ceiling for the live loop.
    pub target_fps: u32,
    /// Per-tick multiplicative mask attenuation.
    pub mask_decay: f32,
    /// Tint opacity for the live overlay.
    pub overlay_alpha: f32,
    /// Decoration mode for batch outputs.
    pub display_mode: DisplayMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            device: DEFAULT_DEVICE.to_string(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            confidence: DEFAULT_CONFIDENCE,
            input_size: DEFAULT_INPUT_SIZE,
            target_fps: DEFAULT_TARGET_FPS,
            mask_decay: DEFAULT_MASK_DECAY,
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
            display_mode: DisplayMode::Draw,
        }
    }
}

impl PipelineConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROADSIGHT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(Path::new(path))?,
            None => PipelineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            model_path: file.model_path.unwrap_or(defaults.model_path),
            device: file.device.unwrap_or(defaults.device),
            frame_interval: file.frame_interval.unwrap_or(defaults.frame_interval),
            confidence: file.confidence.unwrap_or(defaults.confidence),
            input_size: file.input_size.unwrap_or(defaults.input_size),
            target_fps: file.target_fps.unwrap_or(defaults.target_fps),
            mask_decay: file.mask_decay.unwrap_or(defaults.mask_decay),
            overlay_alpha: file.overlay_alpha.unwrap_or(defaults.overlay_alpha),
            display_mode: file.display_mode.unwrap_or(defaults.display_mode),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ROADSIGHT_MODEL") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(device) = std::env::var("ROADSIGHT_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(interval) = std::env::var("ROADSIGHT_FRAME_INTERVAL") {
            self.frame_interval = interval
                .parse()
                .map_err(|_| anyhow!("ROADSIGHT_FRAME_INTERVAL must be an integer"))?;
        }
        if let Ok(confidence) = std::env::var("ROADSIGHT_CONFIDENCE") {
            self.confidence = confidence
                .parse()
                .map_err(|_| anyhow!("ROADSIGHT_CONFIDENCE must be a number"))?;
        }
        if let Ok(fps) = std::env::var("ROADSIGHT_TARGET_FPS") {
            self.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("ROADSIGHT_TARGET_FPS must be an integer"))?;
        }
        if let Ok(decay) = std::env::var("ROADSIGHT_MASK_DECAY") {
            self.mask_decay = decay
                .parse()
                .map_err(|_| anyhow!("ROADSIGHT_MASK_DECAY must be a number"))?;
        }
        if let Ok(alpha) = std::env::var("ROADSIGHT_OVERLAY_ALPHA") {
            self.overlay_alpha = alpha
                .parse()
                .map_err(|_| anyhow!("ROADSIGHT_OVERLAY_ALPHA must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(anyhow!("frame_interval must be at least 1"));
        }
        if !(self.confidence >= 0.0 && self.confidence <= 1.0) {
            return Err(anyhow!("confidence must be within [0, 1]"));
        }
        if self.input_size == 0 {
            return Err(anyhow!("input_size must be nonzero"));
        }
        if self.target_fps == 0 {
            return Err(anyhow!("target_fps must be at least 1"));
        }
        if !(self.mask_decay > 0.0 && self.mask_decay <= 1.0) {
            return Err(anyhow!("mask_decay must be within (0, 1]"));
        }
        if !(self.overlay_alpha >= 0.0 && self.overlay_alpha <= 1.0) {
            return Err(anyhow!("overlay_alpha must be within [0, 1]"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_camera_deployment() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.frame_interval, 15);
        assert_eq!(cfg.target_fps, 60);
        assert!((cfg.mask_decay - 0.94).abs() < 1e-6);
        assert!((cfg.overlay_alpha - 0.25).abs() < 1e-6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let file: PipelineConfigFile = serde_json::from_str(
            r#"{"frame_interval": 5, "display_mode": "highlight", "mask_decay": 0.8}"#,
        )
        .unwrap();
        let cfg = PipelineConfig::from_file(file);
        assert_eq!(cfg.frame_interval, 5);
        assert_eq!(cfg.display_mode, DisplayMode::Highlight);
        assert!((cfg.mask_decay - 0.8).abs() < 1e-6);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.target_fps, 60);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = PipelineConfig::default();
        cfg.frame_interval = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.mask_decay = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.mask_decay = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.overlay_alpha = 1.5;
        assert!(cfg.validate().is_err());
    }
}
