#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::classify::backend::Classifier;
use crate::classify::LabelSet;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Tract-based backend for ONNX image classifiers.
///
/// The model takes one NCHW f32 tensor and returns one logit per label, in
/// label-set order. The image is read from disk, resized to the model input,
/// and normalized with ImageNet statistics.
pub struct TractClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
}

impl TractClassifier {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, image_path: &Path) -> Result<Tensor> {
        let image = image::open(image_path)
            .with_context(|| format!("decode captured image {}", image_path.display()))?
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .into_rgb8();

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| {
                let value = image.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0;
                (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            },
        );

        Ok(input.into_tensor())
    }

    fn best_index(outputs: TVec<TValue>) -> Result<usize> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let scores = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        scores
            .iter()
            .enumerate()
            .filter(|(_, score)| score.is_finite())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(index, _)| index)
            .ok_or_else(|| anyhow!("model produced no finite scores"))
    }
}

impl Classifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, image_path: &Path, labels: &LabelSet) -> Result<String> {
        let input = self.build_input(image_path)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let index = Self::best_index(outputs)?;
        labels.get(index).map(str::to_string).ok_or_else(|| {
            anyhow!(
                "model output index {} outside label set of {}",
                index,
                labels.len()
            )
        })
    }
}
