// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::{Path, PathBuf};

use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::OrtEP;
use crate::{Error, Result};

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLO object detection over a video file", long_about = None)]
pub struct Args {
    /// Network configuration (.json, or a Darknet .cfg)
    #[arg(long)]
    pub config: PathBuf,

    /// ONNX network weights
    #[arg(long)]
    pub weights: PathBuf,

    /// Newline-delimited class names
    #[arg(long)]
    pub classes: PathBuf,

    /// Video file to process
    #[arg(long)]
    pub video: String,

    /// Per-candidate confidence threshold
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// Minimum score a candidate needs to enter suppression
    #[arg(long, default_value_t = 0.5)]
    pub score: f32,

    /// IoU threshold for non-max suppression
    #[arg(long, default_value_t = 0.4)]
    pub nms: f32,

    /// Keep at most this many candidates before suppression
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Only suppress boxes of the same class
    #[arg(long)]
    pub class_aware_nms: bool,

    /// Seed for the per-class color palette
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// TTF/OTF font used for labels, overriding the system default
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Use the CUDA execution provider
    #[arg(long)]
    pub cuda: bool,

    /// Use the TensorRT execution provider
    #[arg(long)]
    pub trt: bool,

    /// Device for CUDA/TensorRT
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// Run without a window; Ctrl-C quits
    #[arg(long)]
    pub headless: bool,

    #[arg(long, default_value_t = 1280)]
    pub window_width: i32,

    #[arg(long, default_value_t = 720)]
    pub window_height: i32,

    /// Log preprocess/inference/postprocess timings
    #[arg(long)]
    pub profile: bool,
}

impl Args {
    pub fn execution_provider(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            network_config: self.config.clone(),
            network_weights: self.weights.clone(),
            class_list: self.classes.clone(),
            thresholds: Thresholds {
                confidence: self.conf,
                score: self.score,
                nms: self.nms,
                top_k: self.top_k,
                class_aware: self.class_aware_nms,
            },
            seed: self.seed,
            font: self.font.clone(),
            ep: self.execution_provider(),
            profile: self.profile,
        }
    }
}

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// A candidate's top class score must be strictly greater than this.
    pub confidence: f32,
    /// Suppression ignores candidates whose score is not greater than this.
    pub score: f32,
    /// IoU above which the lower-scored box is suppressed.
    pub nms: f32,
    pub top_k: Option<usize>,
    pub class_aware: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            score: 0.5,
            nms: 0.4,
            top_k: None,
            class_aware: false,
        }
    }
}

/// Everything `Detector::new` needs.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub network_config: PathBuf,
    pub network_weights: PathBuf,
    pub class_list: PathBuf,
    pub thresholds: Thresholds,
    pub seed: u64,
    pub font: Option<PathBuf>,
    pub ep: OrtEP,
    pub profile: bool,
}

// ========== Network configuration ==========

/// How candidates are laid out in an output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// One candidate per row: `[.., N, 4 + k + classes]` (Darknet / YOLOv3).
    #[default]
    Rows,
    /// One candidate per column: `[.., 4 + classes, N]` (YOLOv8).
    Columns,
}

/// Unit of the box values in a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoxCoordinates {
    /// Fractions of the image size.
    #[default]
    Normalized,
    /// Pixels of the network input.
    InputPixels,
}

/// Tensor contract of a detection network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub input_width: u32,
    pub input_height: u32,
    /// Multiplier applied to `pixel - mean`.
    pub scale: f32,
    pub mean: [f32; 3],
    /// Feed BGR instead of RGB.
    pub swap_rb: bool,
    pub layout: OutputLayout,
    pub coordinates: BoxCoordinates,
    /// Index of the first class score within a candidate.
    pub class_offset: usize,
    /// Outputs to read; empty reads every model output.
    pub output_layers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_width: 416,
            input_height: 416,
            scale: 0.00392,
            mean: [0.0; 3],
            swap_rb: false,
            layout: OutputLayout::Rows,
            coordinates: BoxCoordinates::Normalized,
            class_offset: 5,
            output_layers: Vec::new(),
        }
    }
}

static CFG_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\s*([A-Za-z_]+)\s*\]$").unwrap());
static CFG_KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)$").unwrap());

impl NetworkConfig {
    /// Load from `.cfg` (Darknet) or JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::configuration(path, e))?;
        let is_darknet = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("cfg"))
            .unwrap_or(false);
        let config = if is_darknet {
            Self::from_darknet_cfg(&text)
        } else {
            serde_json::from_str::<Self>(&text).map_err(|e| e.to_string())
        }
        .map_err(|reason| Error::configuration(path, reason))?;
        config
            .validate()
            .map_err(|reason| Error::configuration(path, reason))?;
        Ok(config)
    }

    /// Reads the `[net]` section's `width` and `height`; everything else keeps its default.
    pub fn from_darknet_cfg(text: &str) -> std::result::Result<Self, String> {
        let mut config = Self::default();
        let mut section: Option<String> = None;
        let mut saw_net = false;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if let Some(caps) = CFG_SECTION.captures(line) {
                let name = caps[1].to_ascii_lowercase();
                saw_net |= name == "net" || name == "network";
                section = Some(name);
                continue;
            }
            let Some(caps) = CFG_KEY_VALUE.captures(line) else {
                return Err(format!("line {}: cannot parse `{}`", lineno + 1, line));
            };
            if !matches!(section.as_deref(), Some("net") | Some("network")) {
                continue;
            }
            let value = caps[2].trim();
            match &caps[1] {
                "width" => config.input_width = parse_dim("width", value, lineno)?,
                "height" => config.input_height = parse_dim("height", value, lineno)?,
                _ => {}
            }
        }

        if !saw_net {
            return Err("missing [net] section".to_string());
        }
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(format!(
                "input size must be positive, got {}x{}",
                self.input_width, self.input_height
            ));
        }
        if self.class_offset < 4 {
            return Err(format!(
                "class_offset must leave room for cx, cy, w, h (got {})",
                self.class_offset
            ));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(format!("scale must be a positive number (got {})", self.scale));
        }
        Ok(())
    }
}

fn parse_dim(key: &str, value: &str, lineno: usize) -> std::result::Result<u32, String> {
    value
        .parse::<u32>()
        .map_err(|_| format!("line {}: `{}` is not a valid {}", lineno + 1, value, key))
}
