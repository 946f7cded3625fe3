//! Capture action: latest frame -> image file -> classifier -> nutrition lookup.
//!
//! The pipeline is linear with one branch (is there a frame?) and one error
//! escape (anything failing while processing). A prediction and its nutrition
//! record are always produced together as a `CaptureResult`.

mod store;

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::classify::{Classifier, LabelSet};
use crate::frame::{Frame, FrameSlot, DEFAULT_JPEG_QUALITY};
use crate::nutrition::{NutritionLookup, NutritionRecord};

pub use store::{ResultStore, DEFAULT_RESULT_CAPACITY, DEFAULT_RESULT_TTL};

/// File name of the hand-off image inside the uploads directory.
pub const CAPTURED_IMAGE_NAME: &str = "captured_image.jpg";

/// User-visible capture failures.
#[derive(Debug)]
pub enum CaptureError {
    /// Capture requested before the live feed produced any frame.
    NoFrameAvailable,
    /// Writing the image, classifying it, or looking up nutrition failed.
    Processing(anyhow::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoFrameAvailable => f.write_str("No frame to capture"),
            CaptureError::Processing(err) => write!(f, "Error during capture: {:#}", err),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::NoFrameAvailable => None,
            CaptureError::Processing(err) => Some(&**err),
        }
    }
}

/// Prediction plus the nutrition record looked up for it.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureResult {
    pub prediction: String,
    pub image_path: PathBuf,
    pub nutrition: NutritionRecord,
}

pub struct CapturePipeline {
    slot: Arc<FrameSlot>,
    image_path: PathBuf,
    labels: LabelSet,
    classifier: Arc<Mutex<dyn Classifier>>,
    nutrition: Arc<dyn NutritionLookup>,
    jpeg_quality: u8,
}

impl CapturePipeline {
    pub fn new(
        slot: Arc<FrameSlot>,
        upload_dir: &Path,
        labels: LabelSet,
        classifier: Arc<Mutex<dyn Classifier>>,
        nutrition: Arc<dyn NutritionLookup>,
    ) -> Self {
        Self {
            slot,
            image_path: upload_dir.join(CAPTURED_IMAGE_NAME),
            labels,
            classifier,
            nutrition,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Fixed path the captured image is written to.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Run the capture action against the latest frame.
    ///
    /// With an empty slot nothing else happens: no file write, no
    /// classification, no lookup.
    pub fn capture(&self) -> Result<CaptureResult, CaptureError> {
        let frame = self.slot.latest().ok_or(CaptureError::NoFrameAvailable)?;
        self.process(&frame).map_err(CaptureError::Processing)
    }

    fn process(&self, frame: &Frame) -> Result<CaptureResult> {
        let jpeg = frame.to_jpeg(self.jpeg_quality)?;

        // The classifier lock also guards the image file: the write and the
        // classification of that file happen under one lock.
        let prediction = {
            let mut classifier = self
                .classifier
                .lock()
                .map_err(|_| anyhow!("classifier lock poisoned"))?;
            write_atomically(&self.image_path, &jpeg)?;
            classifier
                .classify(&self.image_path, &self.labels)
                .with_context(|| format!("classifier '{}' failed", classifier.name()))?
        };
        if !self.labels.contains(&prediction) {
            return Err(anyhow!(
                "classifier returned '{}', which is not a known label",
                prediction
            ));
        }

        let nutrition = self
            .nutrition
            .lookup(&prediction)
            .with_context(|| format!("nutrition lookup for '{}'", prediction))?;

        log::info!(
            "captured {}x{} frame: prediction={} calories={}",
            frame.width,
            frame.height,
            prediction,
            nutrition.calories
        );

        Ok(CaptureResult {
            prediction,
            image_path: self.image_path.clone(),
            nutrition,
        })
    }
}

/// Write to a sibling temp file, then rename over `path`, so readers of the
/// image never see a truncated file.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("jpg.tmp");
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("write captured image {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("move captured image into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::NutrientValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        label: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Classifier for CountingClassifier {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn classify(&mut self, image_path: &Path, _labels: &LabelSet) -> Result<String> {
            assert!(image_path.exists(), "image written before classification");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.label.to_string())
        }
    }

    struct FixedLookup {
        record: Option<NutritionRecord>,
        calls: Arc<AtomicUsize>,
    }

    impl NutritionLookup for FixedLookup {
        fn lookup(&self, _food_label: &str) -> Result<NutritionRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.record
                .clone()
                .ok_or_else(|| anyhow!("connection refused"))
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        slot: Arc<FrameSlot>,
        pipeline: CapturePipeline,
        classify_calls: Arc<AtomicUsize>,
        lookup_calls: Arc<AtomicUsize>,
    }

    fn harness(label: &'static str, record: Option<NutritionRecord>) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let slot = Arc::new(FrameSlot::new());
        let classify_calls = Arc::new(AtomicUsize::new(0));
        let lookup_calls = Arc::new(AtomicUsize::new(0));
        let pipeline = CapturePipeline::new(
            slot.clone(),
            dir.path(),
            LabelSet::food(),
            Arc::new(Mutex::new(CountingClassifier {
                label,
                calls: classify_calls.clone(),
            })),
            Arc::new(FixedLookup {
                record,
                calls: lookup_calls.clone(),
            }),
        );
        Harness {
            _dir: dir,
            slot,
            pipeline,
            classify_calls,
            lookup_calls,
        }
    }

    fn apple_record() -> NutritionRecord {
        NutritionRecord {
            calories: NutrientValue::Amount(52.0),
            carbohydrates: NutrientValue::Amount(14.0),
            protein: NutrientValue::Amount(0.3),
            fat: NutrientValue::Amount(0.2),
            fiber: NutrientValue::Amount(2.4),
            sugar: NutrientValue::Amount(10.0),
        }
    }

    #[test]
    fn empty_slot_fails_without_side_effects() {
        let h = harness("Apple", Some(apple_record()));
        let err = h.pipeline.capture().expect_err("no frame yet");
        assert!(matches!(err, CaptureError::NoFrameAvailable));
        assert_eq!(err.to_string(), "No frame to capture");
        assert!(!h.pipeline.image_path().exists());
        assert_eq!(h.classify_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.lookup_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn red_frame_yields_prediction_and_record_together() -> Result<()> {
        let h = harness("Apple", Some(apple_record()));
        h.slot.publish(Frame::solid(100, 100, [255, 0, 0]));

        let result = h.pipeline.capture()?;
        assert_eq!(result.prediction, "Apple");
        assert_eq!(result.nutrition, apple_record());
        assert_eq!(result.image_path, h.pipeline.image_path());
        assert!(result.image_path.ends_with(CAPTURED_IMAGE_NAME));

        let written = image::open(&result.image_path)?;
        assert_eq!((written.width(), written.height()), (100, 100));
        Ok(())
    }

    #[test]
    fn capturing_twice_rewrites_identical_bytes() -> Result<()> {
        let h = harness("Apple", Some(apple_record()));
        h.slot.publish(Frame::solid(32, 32, [0, 128, 255]));

        h.pipeline.capture()?;
        let first = std::fs::read(h.pipeline.image_path())?;
        h.pipeline.capture()?;
        let second = std::fs::read(h.pipeline.image_path())?;
        assert_eq!(first, second);
        assert_eq!(h.classify_calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn lookup_failure_is_a_processing_error() {
        let h = harness("Apple", None);
        h.slot.publish(Frame::solid(8, 8, [1, 2, 3]));

        let err = h.pipeline.capture().expect_err("lookup fails");
        assert!(matches!(err, CaptureError::Processing(_)));
        let message = err.to_string();
        assert!(message.starts_with("Error during capture: "));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn unknown_label_is_rejected_before_lookup() {
        let h = harness("Sushi", Some(apple_record()));
        h.slot.publish(Frame::solid(8, 8, [1, 2, 3]));

        let err = h.pipeline.capture().expect_err("label outside set");
        assert!(err.to_string().contains("Sushi"));
        assert_eq!(h.lookup_calls.load(Ordering::SeqCst), 0);
    }

    /// Reads the image it is asked to classify and answers by its color.
    struct ColorClassifier;

    impl Classifier for ColorClassifier {
        fn name(&self) -> &'static str {
            "color"
        }

        fn classify(&mut self, image_path: &Path, _labels: &LabelSet) -> Result<String> {
            let image = image::open(image_path)?.into_rgb8();
            let [r, g, _] = image.get_pixel(0, 0).0;
            Ok(if r > g { "Tomato" } else { "Apple" }.to_string())
        }
    }

    #[test]
    fn concurrent_captures_all_succeed_and_classify_their_own_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let classifier: Arc<Mutex<dyn Classifier>> = Arc::new(Mutex::new(ColorClassifier));
        let lookup: Arc<dyn NutritionLookup> = Arc::new(FixedLookup {
            record: Some(apple_record()),
            calls: Arc::new(AtomicUsize::new(0)),
        });

        // Same upload dir and classifier, one fixed frame per worker.
        let workers: Vec<(CapturePipeline, &'static str)> = (0..4)
            .map(|worker| {
                let (rgb, label) = if worker % 2 == 0 {
                    ([255, 0, 0], "Tomato")
                } else {
                    ([0, 255, 0], "Apple")
                };
                let slot = Arc::new(FrameSlot::new());
                slot.publish(Frame::solid(640, 480, rgb));
                let pipeline = CapturePipeline::new(
                    slot,
                    dir.path(),
                    LabelSet::food(),
                    classifier.clone(),
                    lookup.clone(),
                );
                (pipeline, label)
            })
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = workers
                .iter()
                .map(|(pipeline, label)| {
                    scope.spawn(move || {
                        let mut failures = Vec::new();
                        for _ in 0..15 {
                            match pipeline.capture() {
                                Ok(result) if result.prediction == *label => {}
                                Ok(result) => failures.push(format!(
                                    "expected {}, classified {}",
                                    label, result.prediction
                                )),
                                Err(err) => failures.push(err.to_string()),
                            }
                        }
                        failures
                    })
                })
                .collect();
            for handle in handles {
                let failures = handle.join().expect("worker thread");
                assert!(failures.is_empty(), "captures failed: {:?}", failures);
            }
        });

        let image_path = dir.path().join(CAPTURED_IMAGE_NAME);
        assert!(!image_path.with_extension("jpg.tmp").exists());
        image::open(&image_path).expect("final image decodes");
    }

    #[test]
    fn missing_upload_dir_is_a_processing_error() {
        let h = harness("Apple", Some(apple_record()));
        let pipeline = CapturePipeline::new(
            h.slot.clone(),
            Path::new("/nonexistent/nutricam/uploads"),
            LabelSet::food(),
            Arc::new(Mutex::new(crate::classify::StubClassifier::new())),
            Arc::new(FixedLookup {
                record: Some(apple_record()),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        );
        h.slot.publish(Frame::solid(8, 8, [1, 2, 3]));
        assert!(matches!(
            pipeline.capture(),
            Err(CaptureError::Processing(_))
        ));
    }
}
