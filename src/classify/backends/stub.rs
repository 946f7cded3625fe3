use anyhow::{Context, Result};
use std::path::Path;

use crate::classify::backend::Classifier;
use crate::classify::LabelSet;

/// Stub backend for demos and tests. Always answers with a fixed label.
///
/// The image file must still exist, so a failed hand-off is caught the same way
/// a real model would catch it.
#[derive(Clone, Debug, Default)]
pub struct StubClassifier {
    label: Option<String>,
}

impl StubClassifier {
    /// Answers with the first label of the set.
    pub fn new() -> Self {
        Self { label: None }
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, image_path: &Path, labels: &LabelSet) -> Result<String> {
        std::fs::metadata(image_path)
            .with_context(|| format!("read captured image {}", image_path.display()))?;
        let label = match &self.label {
            Some(label) => label.clone(),
            None => labels.get(0).unwrap_or_default().to_string(),
        };
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_answers_with_configured_label() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("captured_image.jpg");
        std::fs::write(&image, b"jpeg")?;

        let mut fixed = StubClassifier::with_label("Idli");
        assert_eq!(fixed.classify(&image, &LabelSet::food())?, "Idli");

        let mut first = StubClassifier::new();
        assert_eq!(first.classify(&image, &LabelSet::food())?, "Apple");
        Ok(())
    }

    #[test]
    fn stub_fails_without_image_file() {
        let mut stub = StubClassifier::new();
        let missing = Path::new("/nonexistent/nutricam/captured_image.jpg");
        assert!(stub.classify(missing, &LabelSet::food()).is_err());
    }
}
