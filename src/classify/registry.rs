use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::Classifier;
use super::backends::StubClassifier;

/// Default square input edge for ONNX food models.
pub const DEFAULT_MODEL_INPUT: u32 = 224;

/// Which classifier to run and how to build it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Backend name: "stub" or "tract".
    pub backend: String,
    /// ONNX model file for the tract backend.
    pub model_path: Option<PathBuf>,
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Fixed answer for the stub backend (defaults to the first label).
    pub stub_label: Option<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: "stub".to_string(),
            model_path: None,
            input_size: DEFAULT_MODEL_INPUT,
            stub_label: None,
        }
    }
}

/// Thread-safe registry of classifier backends.
///
/// Backends are wrapped in `Mutex` because `Classifier::classify` takes `&mut self`.
pub struct ClassifierRegistry {
    backends: HashMap<String, Arc<Mutex<dyn Classifier>>>,
    default_name: Option<String>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Build the registry described by `settings` and make the selected backend
    /// the default. The stub backend is always registered.
    pub fn from_settings(settings: &ClassifierSettings) -> Result<Self> {
        let mut registry = Self::new();
        let stub = match &settings.stub_label {
            Some(label) => StubClassifier::with_label(label.clone()),
            None => StubClassifier::new(),
        };
        registry.register(stub);

        if settings.backend == "tract" {
            registry.register(tract_backend(settings)?);
        }
        registry.set_default(&settings.backend)?;
        Ok(registry)
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<C: Classifier + 'static>(&mut self, classifier: C) {
        let name = classifier.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(classifier)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("classifier '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn Classifier>>> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_classifier(&self) -> Option<Arc<Mutex<dyn Classifier>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the warm-up hook of every registered backend.
    pub fn warm_up(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("classifier '{}' lock poisoned", name))?;
            guard.warm_up()?;
        }
        Ok(())
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "backend-tract")]
fn tract_backend(settings: &ClassifierSettings) -> Result<super::backends::TractClassifier> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract classifier requires a model path"))?;
    super::backends::TractClassifier::new(model_path, settings.input_size, settings.input_size)
}

#[cfg(not(feature = "backend-tract"))]
fn tract_backend(_settings: &ClassifierSettings) -> Result<StubClassifier> {
    Err(anyhow!(
        "tract classifier requires the backend-tract feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::LabelSet;
    use std::path::Path;

    struct FixedClassifier;

    impl Classifier for FixedClassifier {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn classify(&mut self, _image_path: &Path, _labels: &LabelSet) -> Result<String> {
            Ok("Rice".to_string())
        }
    }

    #[test]
    fn first_registered_backend_is_default() -> Result<()> {
        let mut registry = ClassifierRegistry::new();
        registry.register(StubClassifier::new());
        registry.register(FixedClassifier);
        assert_eq!(registry.default_name(), Some("stub"));
        assert_eq!(registry.list(), vec!["fixed".to_string(), "stub".to_string()]);

        registry.set_default("fixed")?;
        let backend = registry.default_classifier().expect("default backend");
        let guard = backend.lock().expect("lock");
        assert_eq!(guard.name(), "fixed");
        Ok(())
    }

    #[test]
    fn unknown_default_is_rejected() {
        let mut registry = ClassifierRegistry::new();
        registry.register(StubClassifier::new());
        assert!(registry.set_default("missing").is_err());
    }

    #[test]
    fn settings_select_stub_backend() -> Result<()> {
        let settings = ClassifierSettings {
            stub_label: Some("Pizza".to_string()),
            ..ClassifierSettings::default()
        };
        let registry = ClassifierRegistry::from_settings(&settings)?;
        assert_eq!(registry.default_name(), Some("stub"));
        registry.warm_up()?;
        Ok(())
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_settings_require_feature() {
        let settings = ClassifierSettings {
            backend: "tract".to_string(),
            model_path: Some("food.onnx".into()),
            ..ClassifierSettings::default()
        };
        assert!(ClassifierRegistry::from_settings(&settings).is_err());
    }
}
