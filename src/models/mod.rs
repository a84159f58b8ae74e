// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Network backends
//!
//! ## Network Trait
//! A backend runs one forward pass over a preprocessed NCHW blob and returns
//! the raw tensors of its resolved output layers, in resolution order.
//!
//! ```text
//! frame → Detector::preprocess → [1, 3, H, W] blob
//!          ↓
//!     Network::forward
//!          ↓
//!     raw outputs → Detector::decode → candidates → NMS
//! ```
//!
//! `OrtNetwork` is the ONNX Runtime implementation; anything else that can
//! produce the same tensors (a scripted network in tests, another runtime)
//! plugs in through `Detector::with_network`.
use ndarray::{Array4, ArrayD};

use crate::Result;

pub trait Network {
    /// Output layer names the forward pass reads, in the order `forward` returns them.
    fn output_names(&self) -> &[String];

    /// Forward pass over one `[1, 3, H, W]` blob.
    fn forward(&mut self, blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>>;

    /// Backend identifier for logs.
    fn name(&self) -> &str {
        "network"
    }
}

pub mod ort_network;

pub use ort_network::{resolve_output_layers, OrtEP, OrtNetwork};
