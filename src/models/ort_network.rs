// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime backend: session build, output resolution, forward pass

use std::path::Path;

use ndarray::{Array4, ArrayD, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::Network;
use crate::{Error, Result};

/// Execution provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrtEP {
    #[default]
    CPU,
    CUDA(i32),
    Trt(i32),
}

pub struct OrtNetwork {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
    ep: OrtEP,
}

impl OrtNetwork {
    /// Build a session from an ONNX file and resolve the outputs to read.
    ///
    /// `requested` empty means every model output, in model order.
    pub fn load(weights: impl AsRef<Path>, requested: &[String], ep: OrtEP) -> Result<Self> {
        let weights = weights.as_ref();
        if !weights.is_file() {
            return Err(Error::configuration(weights, "weights file not found"));
        }

        let builder = Session::builder().map_err(|e| Error::configuration(weights, e))?;
        let builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::configuration(weights, e))?;
        let builder = match ep {
            OrtEP::CPU => builder,
            OrtEP::CUDA(device_id) => builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build()])
                .map_err(|e| Error::configuration(weights, e))?,
            OrtEP::Trt(device_id) => builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_device_id(device_id)
                        .build(),
                    CUDAExecutionProvider::default()
                        .with_device_id(device_id)
                        .build(),
                ])
                .map_err(|e| Error::configuration(weights, e))?,
        };
        let session = builder
            .commit_from_file(weights)
            .map_err(|e| Error::configuration(weights, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| Error::configuration(weights, "model has no inputs"))?;
        let available: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let output_names = resolve_output_layers(&available, requested)
            .map_err(|reason| Error::configuration(weights, reason))?;

        Ok(Self {
            session,
            input_name,
            output_names,
            ep,
        })
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

/// Pick the outputs a forward pass reads.
///
/// Requested names must all exist; none requested means all outputs, the
/// way the network's unconnected layers are read.
pub fn resolve_output_layers(
    available: &[String],
    requested: &[String],
) -> std::result::Result<Vec<String>, String> {
    if available.is_empty() {
        return Err("model has no outputs".to_string());
    }
    if requested.is_empty() {
        return Ok(available.to_vec());
    }
    let missing: Vec<&str> = requested
        .iter()
        .filter(|name| !available.contains(name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(format!(
            "unknown output layers [{}], model provides [{}]",
            missing.join(", "),
            available.join(", ")
        ));
    }
    Ok(requested.to_vec())
}

impl Network for OrtNetwork {
    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn forward(&mut self, blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
        let (n, c, h, w) = blob.dim();
        let shape = [n, c, h, w];
        let data = blob.iter().copied().collect::<Vec<f32>>();
        let input = Tensor::from_array((shape, data)).map_err(Error::inference)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(Error::inference)?;

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let value = outputs
                .get(name.as_str())
                .ok_or_else(|| Error::inference(format!("output `{}` missing", name)))?;
            let (dims, data) = value
                .try_extract_tensor::<f32>()
                .map_err(Error::inference)?;
            let dims: Vec<usize> = dims.iter().map(|&d| d.max(0) as usize).collect();
            let y = ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
                .map_err(Error::inference)?;
            ys.push(y);
        }
        Ok(ys)
    }

    fn name(&self) -> &str {
        "onnxruntime"
    }
}
