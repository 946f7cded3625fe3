use anyhow::Result;
use std::path::Path;

use super::LabelSet;

/// Classifier backend trait.
///
/// Implementations read the image at `image_path` and return exactly one entry
/// of `labels`. No confidence score or runner-up ranking is reported.
pub trait Classifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Classify the image stored at `image_path`.
    fn classify(&mut self, image_path: &Path, labels: &LabelSet) -> Result<String>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
