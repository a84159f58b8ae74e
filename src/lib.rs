#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // CLI + network configuration
pub mod detection; // detector, catalog, palette, drawing
pub mod error;
pub mod input; // video decoding
pub mod models; // network backends
pub mod pipeline; // stream runner + sinks
pub mod renderer; // macroquad window sink

use std::cmp::Ordering;

pub use crate::config::{Args, BoxCoordinates, DetectorConfig, NetworkConfig, OutputLayout, Thresholds};
pub use crate::detection::{
    Bbox, ClassCatalog, ColorPalette, Detection, DetectionObserver, DetectionSet, Detector, Frame,
    LogObserver,
};
pub use crate::error::{Error, Result};
pub use crate::input::{FfmpegSource, FrameSource};
pub use crate::models::{Network, OrtEP, OrtNetwork};
pub use crate::pipeline::{FrameSink, HeadlessSink, RunSummary, StopReason, StreamRunner};

/// Greedy non-max suppression over all candidates, class-agnostic.
///
/// Returns the indices of the surviving boxes in descending score order.
pub fn non_max_suppression(
    boxes: &[Bbox],
    scores: &[f32],
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    let thresholds = Thresholds {
        score: score_threshold,
        nms: iou_threshold,
        ..Default::default()
    };
    non_max_suppression_with(boxes, scores, None, &thresholds)
}

/// Non-max suppression with the full threshold set.
///
/// Candidates scoring at or below `score` never enter. The rest are visited
/// by descending score (ties keep input order) and a box is kept when its
/// IoU with every kept box is at most `nms`. With `class_aware` set and
/// `class_ids` given, only boxes of the same class suppress each other.
pub fn non_max_suppression_with(
    boxes: &[Bbox],
    scores: &[f32],
    class_ids: Option<&[usize]>,
    thresholds: &Thresholds,
) -> Vec<usize> {
    let n = boxes.len().min(scores.len());
    let mut order: Vec<usize> = (0..n).filter(|&i| scores[i] > thresholds.score).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    if let Some(k) = thresholds.top_k.filter(|&k| k > 0) {
        order.truncate(k);
    }

    let classes = class_ids.filter(|_| thresholds.class_aware);
    let same_class = |a: usize, b: usize| match classes {
        Some(ids) => ids.get(a) == ids.get(b),
        None => true,
    };

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for index in order {
        let drop = kept
            .iter()
            .any(|&prev| same_class(prev, index) && boxes[prev].iou(&boxes[index]) > thresholds.nms);
        if !drop {
            kept.push(index);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_confidence_wins_overlap() {
        let boxes = [Bbox::new(100, 100, 100, 100), Bbox::new(110, 110, 100, 100)];
        assert!(boxes[0].iou(&boxes[1]) > 0.4);
        let kept = non_max_suppression(&boxes, &[0.6, 0.9], 0.5, 0.4);
        assert_eq!(kept, vec![1]);
    }

    #[test]
    fn disjoint_boxes_all_survive_in_score_order() {
        let boxes = [
            Bbox::new(0, 0, 10, 10),
            Bbox::new(50, 50, 10, 10),
            Bbox::new(100, 100, 10, 10),
        ];
        let kept = non_max_suppression(&boxes, &[0.7, 0.95, 0.8], 0.5, 0.4);
        assert_eq!(kept, vec![1, 2, 0]);
    }

    #[test]
    fn scores_at_threshold_are_dropped() {
        let boxes = [Bbox::new(0, 0, 10, 10), Bbox::new(50, 50, 10, 10)];
        let kept = non_max_suppression(&boxes, &[0.5, 0.51], 0.5, 0.4);
        assert_eq!(kept, vec![1]);
    }

    #[test]
    fn overlap_equal_to_threshold_is_kept() {
        // IoU exactly 1/3 with threshold 1/3 → not strictly greater, both survive
        let boxes = [Bbox::new(0, 0, 10, 10), Bbox::new(5, 0, 10, 10)];
        let t = boxes[0].iou(&boxes[1]);
        let kept = non_max_suppression(&boxes, &[0.9, 0.8], 0.5, t);
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn suppression_is_idempotent() {
        let boxes = [
            Bbox::new(10, 10, 100, 100),
            Bbox::new(15, 12, 100, 100),
            Bbox::new(200, 200, 50, 50),
            Bbox::new(205, 198, 50, 50),
            Bbox::new(400, 10, 30, 60),
        ];
        let scores = [0.91, 0.88, 0.73, 0.79, 0.55];
        let first = non_max_suppression(&boxes, &scores, 0.5, 0.4);
        let second = non_max_suppression(&boxes, &scores, 0.5, 0.4);
        assert_eq!(first, second);
        assert_eq!(first, vec![0, 3, 4]);

        // survivors fed back in are all kept
        let kept_boxes: Vec<Bbox> = first.iter().map(|&i| boxes[i]).collect();
        let kept_scores: Vec<f32> = first.iter().map(|&i| scores[i]).collect();
        let again = non_max_suppression(&kept_boxes, &kept_scores, 0.5, 0.4);
        assert_eq!(again, (0..first.len()).collect::<Vec<_>>());
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let boxes = [Bbox::new(0, 0, 10, 10), Bbox::new(1, 1, 10, 10)];
        let kept = non_max_suppression(&boxes, &[0.7, 0.7], 0.5, 0.4);
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn class_aware_mode_keeps_overlapping_boxes_of_different_classes() {
        let boxes = [Bbox::new(0, 0, 100, 100), Bbox::new(5, 5, 100, 100)];
        let scores = [0.9, 0.8];
        let classes = [0usize, 1];
        let agnostic = non_max_suppression_with(&boxes, &scores, Some(&classes), &Thresholds::default());
        assert_eq!(agnostic, vec![0]);

        let aware = Thresholds {
            class_aware: true,
            ..Default::default()
        };
        assert_eq!(
            non_max_suppression_with(&boxes, &scores, Some(&classes), &aware),
            vec![0, 1]
        );
    }

    #[test]
    fn top_k_limits_candidates() {
        let boxes = [
            Bbox::new(0, 0, 10, 10),
            Bbox::new(50, 50, 10, 10),
            Bbox::new(100, 100, 10, 10),
        ];
        let t = Thresholds {
            top_k: Some(2),
            ..Default::default()
        };
        assert_eq!(
            non_max_suppression_with(&boxes, &[0.6, 0.9, 0.8], None, &t),
            vec![1, 2]
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(non_max_suppression(&[], &[], 0.5, 0.4).is_empty());
    }
}
