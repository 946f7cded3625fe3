//! Nutricam: point a camera at food, capture a frame, get nutrition facts.
//!
//! # Pipeline
//!
//! 1. A camera source feeds the live MJPEG stream and keeps the latest frame in
//!    a shared `FrameSlot`.
//! 2. The capture action writes that frame to disk, classifies it against a
//!    closed set of food labels, and looks up six nutrients for the label.
//! 3. The result page renders the prediction and the nutrient values.
//!
//! # Module Structure
//!
//! - `frame`: RGB frames and the latest-frame slot
//! - `ingest`: camera sources (synthetic, still image, V4L2) and `FrameStream`
//! - `stream`: multipart MJPEG framing
//! - `classify`: classifier trait, label set, backends and registry
//! - `nutrition`: nutrient records and the food database client
//! - `capture`: capture pipeline and short-lived result store
//! - `view`: HTML pages
//! - `server`: HTTP routes
//! - `config`: file + environment configuration

pub mod capture;
pub mod classify;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod nutrition;
pub mod server;
pub mod stream;
pub mod view;

pub use capture::{CaptureError, CapturePipeline, CaptureResult, ResultStore};
pub use classify::{Classifier, ClassifierRegistry, LabelSet};
pub use frame::{Frame, FrameSlot};
pub use ingest::{CameraConfig, CameraSource, FrameStream};
pub use nutrition::{NutrientValue, NutritionLookup, NutritionRecord, UsdaClient};
pub use server::{AppState, ServerConfig, WebHandle, WebServer};
