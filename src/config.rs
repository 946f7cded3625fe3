use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{ClassifierSettings, LabelSet};
use crate::frame::DEFAULT_JPEG_QUALITY;
use crate::ingest::CameraConfig;
use crate::nutrition::{UsdaConfig, DEFAULT_USDA_TIMEOUT, DEFAULT_USDA_URL};
use crate::server::DEFAULT_ADDR;

const DEFAULT_UPLOAD_DIR: &str = "static/uploads";

#[derive(Debug, Deserialize, Default)]
struct NutricamConfigFile {
    addr: Option<String>,
    upload_dir: Option<PathBuf>,
    jpeg_quality: Option<u8>,
    camera: Option<CameraConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    usda: Option<UsdaConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifierConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    stub_label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct UsdaConfigFile {
    url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NutricamConfig {
    pub addr: String,
    pub upload_dir: PathBuf,
    pub jpeg_quality: u8,
    pub camera: CameraConfig,
    pub classifier: ClassifierSettings,
    pub usda: UsdaConfig,
}

impl NutricamConfig {
    /// File named by `NUTRICAM_CONFIG` (if any), then environment overrides,
    /// then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NUTRICAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: NutricamConfigFile) -> Self {
        let camera_defaults = CameraConfig::default();
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            url: camera_file.url.unwrap_or(camera_defaults.url),
            target_fps: camera_file.target_fps.unwrap_or(camera_defaults.target_fps),
            width: camera_file.width.unwrap_or(camera_defaults.width),
            height: camera_file.height.unwrap_or(camera_defaults.height),
            max_frames: None,
        };

        let classifier_defaults = ClassifierSettings::default();
        let classifier_file = file.classifier.unwrap_or_default();
        let classifier = ClassifierSettings {
            backend: classifier_file.backend.unwrap_or(classifier_defaults.backend),
            model_path: classifier_file.model_path,
            input_size: classifier_file
                .input_size
                .unwrap_or(classifier_defaults.input_size),
            stub_label: classifier_file.stub_label,
        };

        let usda_file = file.usda.unwrap_or_default();
        let usda = UsdaConfig {
            endpoint: usda_file
                .url
                .unwrap_or_else(|| DEFAULT_USDA_URL.to_string()),
            api_key: usda_file.api_key.unwrap_or_default(),
            timeout: usda_file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_USDA_TIMEOUT),
        };

        Self {
            addr: file.addr.unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            upload_dir: file
                .upload_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            camera,
            classifier,
            usda,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = non_empty_env("NUTRICAM_ADDR") {
            self.addr = addr;
        }
        if let Some(url) = non_empty_env("NUTRICAM_CAMERA") {
            self.camera.url = url;
        }
        if let Some(fps) = non_empty_env("NUTRICAM_CAMERA_FPS") {
            self.camera.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("NUTRICAM_CAMERA_FPS must be a non-negative integer"))?;
        }
        if let Some(dir) = non_empty_env("NUTRICAM_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(backend) = non_empty_env("NUTRICAM_CLASSIFIER") {
            self.classifier.backend = backend;
        }
        if let Some(path) = non_empty_env("NUTRICAM_MODEL_PATH") {
            self.classifier.model_path = Some(PathBuf::from(path));
        }
        if let Some(label) = non_empty_env("NUTRICAM_STUB_LABEL") {
            self.classifier.stub_label = Some(label);
        }
        if let Some(url) = non_empty_env("USDA_API_URL") {
            self.usda.endpoint = url;
        }
        if let Some(key) = non_empty_env("USDA_API_KEY") {
            self.usda.api_key = key;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.addr
            .parse::<SocketAddr>()
            .map_err(|_| anyhow!("listen address '{}' is not host:port", self.addr))?;

        if self.usda.api_key.trim().is_empty() {
            return Err(anyhow!(
                "nutrition database key missing; set USDA_API_KEY or usda.api_key"
            ));
        }
        url::Url::parse(&self.usda.endpoint)
            .map_err(|e| anyhow!("invalid nutrition endpoint '{}': {}", self.usda.endpoint, e))?;
        if self.usda.timeout.is_zero() {
            return Err(anyhow!("usda.timeout_secs must be greater than zero"));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be between 1 and 100"));
        }

        self.classifier.backend = self.classifier.backend.trim().to_lowercase();
        match self.classifier.backend.as_str() {
            "stub" => {}
            "tract" => {
                if self.classifier.model_path.is_none() {
                    return Err(anyhow!(
                        "classifier backend 'tract' requires a model path (NUTRICAM_MODEL_PATH)"
                    ));
                }
            }
            other => return Err(anyhow!("unknown classifier backend '{}'", other)),
        }
        if self.classifier.input_size == 0 {
            return Err(anyhow!("classifier.input_size must be greater than zero"));
        }
        if let Some(label) = &self.classifier.stub_label {
            if !LabelSet::food().contains(label) {
                return Err(anyhow!("stub label '{}' is not a known food label", label));
            }
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<NutricamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
