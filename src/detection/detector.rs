// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// Detector: preprocess → forward → decode → NMS, and box/label drawing

use std::path::{Path, PathBuf};
use std::time::Instant;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::imageops::FilterType;
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use ndarray::{s, Array4, ArrayD};

use super::catalog::{ClassCatalog, ColorPalette};
use super::observer::{DetectionObserver, LogObserver};
use super::types::{Bbox, DetectionSet, Frame};
use crate::config::{BoxCoordinates, DetectorConfig, NetworkConfig, OutputLayout, Thresholds};
use crate::models::{Network, OrtEP, OrtNetwork};
use crate::{non_max_suppression_with, Error, Result};

const CXYWH_OFFSET: usize = 4;
const LABEL_SCALE: f32 = 16.0;
const LABEL_LIFT: i32 = 10;

/// Tried in order when no `--font` is given.
pub const DEFAULT_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::configuration(path, e))?;
    FontVec::try_from_vec(bytes).map_err(|e| Error::configuration(path, e))
}

/// First of `DEFAULT_FONTS` that exists and parses.
pub fn default_font() -> Option<(PathBuf, FontVec)> {
    DEFAULT_FONTS
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .find_map(|p| match load_font(&p) {
            Ok(font) => Some((p, font)),
            Err(e) => {
                log::debug!("skipping font: {}", e);
                None
            }
        })
}

pub struct Detector {
    network: Box<dyn Network>,
    net_config: NetworkConfig,
    catalog: ClassCatalog,
    palette: ColorPalette,
    thresholds: Thresholds,
    font: Option<FontVec>,
    observer: Box<dyn DetectionObserver>,
    profile: bool,
}

impl Detector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let net_config = NetworkConfig::from_path(&config.network_config)?;
        let network = OrtNetwork::load(
            &config.network_weights,
            &net_config.output_layers,
            config.ep,
        )?;
        let ep = network.ep();
        let catalog = ClassCatalog::from_path(&config.class_list)?;

        let mut detector = Self::with_network(
            Box::new(network),
            net_config,
            catalog,
            config.thresholds,
            config.seed,
        );
        match &config.font {
            Some(path) => detector.set_font(load_font(path)?),
            None => {
                if let Some((path, font)) = default_font() {
                    log::info!("label font: {}", path.display());
                    detector.set_font(font);
                }
            }
        }
        detector.profile = config.profile;

        log::info!(
            "detector ready: {} ({:?}{}), input {}x{}, {} classes, outputs [{}], conf {} score {} nms {}",
            detector.network.name(),
            ep,
            if ep == OrtEP::CPU { "" } else { ", may still fall back to CPU" },
            detector.net_config.input_width,
            detector.net_config.input_height,
            detector.catalog.len(),
            detector.network.output_names().join(", "),
            detector.thresholds.confidence,
            detector.thresholds.score,
            detector.thresholds.nms,
        );
        if detector.font.is_none() {
            log::warn!("no usable font found, drawing boxes without labels (pass --font)");
        }
        Ok(detector)
    }

    /// Detector over an already built network.
    pub fn with_network(
        network: Box<dyn Network>,
        net_config: NetworkConfig,
        catalog: ClassCatalog,
        thresholds: Thresholds,
        seed: u64,
    ) -> Self {
        let palette = ColorPalette::seeded(catalog.len(), seed);
        Self {
            network,
            net_config,
            catalog,
            palette,
            thresholds,
            font: None,
            observer: Box::new(LogObserver),
            profile: false,
        }
    }

    pub fn set_font(&mut self, font: FontVec) {
        self.font = Some(font);
    }

    pub fn set_observer(&mut self, observer: impl DetectionObserver + 'static) {
        self.observer = Box::new(observer);
    }

    pub fn set_profile(&mut self, profile: bool) {
        self.profile = profile;
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.net_config
    }

    /// Run the network over one frame and suppress overlapping candidates.
    pub fn detect_objects(&mut self, frame: &Frame) -> Result<DetectionSet> {
        let t_pre = Instant::now();
        let blob = self.preprocess(frame)?;
        if self.profile {
            log::debug!("[Preprocess]: {:?}", t_pre.elapsed());
        }

        let t_run = Instant::now();
        let outputs = self.network.forward(&blob)?;
        if self.profile {
            log::debug!("[Inference]: {:?}", t_run.elapsed());
        }

        let t_post = Instant::now();
        let (boxes, confidences, class_ids) = self.decode(&outputs, frame.width(), frame.height())?;
        let indices = non_max_suppression_with(&boxes, &confidences, Some(&class_ids), &self.thresholds);
        if self.profile {
            log::debug!(
                "[Postprocess]: {:?} ({} candidates, {} kept)",
                t_post.elapsed(),
                boxes.len(),
                indices.len()
            );
        }

        Ok(DetectionSet {
            indices,
            boxes,
            confidences,
            class_ids,
        })
    }

    /// Frame → `[1, 3, H, W]` blob of `(pixel - mean) * scale`.
    pub fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::inference("empty frame"));
        }
        let (w, h) = (self.net_config.input_width, self.net_config.input_height);
        let resized;
        let img = if frame.dimensions() == (w, h) {
            frame
        } else {
            resized = image::imageops::resize(frame, w, h, FilterType::Triangle);
            &resized
        };

        let NetworkConfig {
            scale, mean, swap_rb, ..
        } = self.net_config;
        let mut blob = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            let [r, g, b] = pixel.0;
            let channels = if swap_rb { [b, g, r] } else { [r, g, b] };
            for (c, v) in channels.into_iter().enumerate() {
                blob[[0, c, y, x]] = (v as f32 - mean[c]) * scale;
            }
        }
        Ok(blob)
    }

    /// Raw outputs → candidates above the confidence threshold, in frame pixels.
    pub fn decode(
        &self,
        outputs: &[ArrayD<f32>],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<(Vec<Bbox>, Vec<f32>, Vec<usize>)> {
        let mut boxes = Vec::new();
        let mut confidences = Vec::new();
        let mut class_ids = Vec::new();

        for output in outputs {
            for row in candidate_rows(output, self.net_config.layout)? {
                let Some((class_id, confidence, [cx, cy, w, h])) = self.score_candidate(&row)? else {
                    continue;
                };
                boxes.push(Bbox::from_normalized_center(
                    cx,
                    cy,
                    w,
                    h,
                    frame_width,
                    frame_height,
                ));
                confidences.push(confidence);
                class_ids.push(class_id);
            }
        }
        Ok((boxes, confidences, class_ids))
    }

    /// Top class of one candidate, with its box as image fractions.
    fn score_candidate(&self, row: &[f32]) -> Result<Option<(usize, f32, [f32; 4])>> {
        let offset = self.net_config.class_offset;
        if row.len() <= offset {
            return Err(Error::inference(format!(
                "candidate has {} values, class scores start at {}",
                row.len(),
                offset
            )));
        }

        let (class_id, confidence) = row[offset..].iter().enumerate().fold(
            (0, f32::NEG_INFINITY),
            |(best_id, best), (id, &score)| {
                if score > best {
                    (id, score)
                } else {
                    (best_id, best)
                }
            },
        );
        if confidence.is_nan() || confidence <= self.thresholds.confidence {
            return Ok(None);
        }

        let mut cxywh = [0f32; CXYWH_OFFSET];
        cxywh.copy_from_slice(&row[..CXYWH_OFFSET]);
        if let BoxCoordinates::InputPixels = self.net_config.coordinates {
            let (iw, ih) = (
                self.net_config.input_width as f32,
                self.net_config.input_height as f32,
            );
            cxywh[0] /= iw;
            cxywh[1] /= ih;
            cxywh[2] /= iw;
            cxywh[3] /= ih;
        }
        Ok(Some((class_id, confidence, cxywh)))
    }

    /// Draw every surviving detection onto the frame and report it to the observer.
    pub fn draw_labels(&mut self, frame: &mut Frame, detections: &DetectionSet) {
        for det in detections.iter() {
            let b = det.bbox;
            if b.is_empty() {
                continue;
            }
            let color = Rgb(self.palette.color(det.class_id));
            let label = self.catalog.label(det.class_id);

            // 2px stroke: outer rect plus one inset
            draw_hollow_rect_mut(
                frame,
                Rect::at(b.x(), b.y()).of_size(b.width() as u32, b.height() as u32),
                color,
            );
            if b.width() > 2 && b.height() > 2 {
                draw_hollow_rect_mut(
                    frame,
                    Rect::at(b.x() + 1, b.y() + 1)
                        .of_size(b.width() as u32 - 2, b.height() as u32 - 2),
                    color,
                );
            }

            if let Some(font) = &self.font {
                let scale = PxScale::from(LABEL_SCALE);
                // baseline sits LABEL_LIFT px above the box
                let ascent = font.as_scaled(scale).ascent().ceil() as i32;
                let top = b.y() - LABEL_LIFT - ascent;
                draw_text_mut(frame, color, b.x(), top, scale, font, &label);
            }

            self.observer.on_detection(&label, &det);
        }
    }
}

/// View an output tensor as a list of candidate rows.
fn candidate_rows(output: &ArrayD<f32>, layout: OutputLayout) -> Result<Vec<Vec<f32>>> {
    let shape = output.shape();
    if output.is_empty() {
        return Ok(Vec::new());
    }
    match layout {
        OutputLayout::Rows => {
            let row_len = shape.last().copied().unwrap_or(0);
            if row_len == 0 {
                return Err(Error::inference(format!(
                    "row layout needs at least 1 axis, got shape {:?}",
                    shape
                )));
            }
            let data: Vec<f32> = output.iter().copied().collect();
            Ok(data.chunks_exact(row_len).map(<[f32]>::to_vec).collect())
        }
        OutputLayout::Columns => {
            if shape.len() < 2 {
                return Err(Error::inference(format!(
                    "column layout needs at least 2 axes, got shape {:?}",
                    shape
                )));
            }
            let (features, n) = (shape[shape.len() - 2], shape[shape.len() - 1]);
            let lead = output.len() / (features * n);
            let view = output
                .to_shape((lead, features, n))
                .map_err(Error::inference)?;
            let mut rows = Vec::with_capacity(lead * n);
            for batch in 0..lead {
                for j in 0..n {
                    rows.push(view.slice(s![batch, .., j]).to_vec());
                }
            }
            Ok(rows)
        }
    }
}
