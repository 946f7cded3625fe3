//! HTML pages: the index (live feed + capture button) and the result view.
//!
//! Rendering is pure. Every interpolated value is HTML-escaped.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::capture::{CaptureResult, CAPTURED_IMAGE_NAME};
use crate::nutrition::{Nutrient, UNAVAILABLE};

/// Placeholder prediction when none was supplied.
pub const UNKNOWN_PREDICTION: &str = "Unknown";

/// Public URL of the captured image.
pub fn captured_image_url() -> String {
    format!("/uploads/{}", CAPTURED_IMAGE_NAME)
}

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Food Nutrition Camera</title>
</head>
<body>
<h1>Food Nutrition Camera</h1>
<img src="/live_feed" alt="Live camera feed" width="640">
<form action="/capture" method="post">
<button type="submit">Capture</button>
</form>
</body>
</html>
"#;

/// Values shown on the result page, already in display form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultView {
    pub prediction: String,
    pub image: String,
    /// One rendered value per nutrient, in `Nutrient::ALL` order.
    pub nutrients: Vec<(Nutrient, String)>,
}

impl ResultView {
    /// Build from plain request parameters. Missing keys fall back to
    /// `Unknown`, an empty image path, and `N/A`.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let prediction = params
            .get("prediction")
            .cloned()
            .unwrap_or_else(|| UNKNOWN_PREDICTION.to_string());
        let image = params.get("image").cloned().unwrap_or_default();
        let nutrients = Nutrient::ALL
            .into_iter()
            .map(|nutrient| {
                let value = params
                    .get(nutrient.key())
                    .cloned()
                    .unwrap_or_else(|| UNAVAILABLE.to_string());
                (nutrient, value)
            })
            .collect();
        Self {
            prediction,
            image,
            nutrients,
        }
    }

    pub fn from_result(result: &CaptureResult) -> Self {
        Self {
            prediction: result.prediction.clone(),
            image: captured_image_url(),
            nutrients: result
                .nutrition
                .iter()
                .map(|(nutrient, value)| (nutrient, value.to_string()))
                .collect(),
        }
    }

    pub fn value(&self, nutrient: Nutrient) -> Option<&str> {
        self.nutrients
            .iter()
            .find(|(n, _)| *n == nutrient)
            .map(|(_, value)| value.as_str())
    }

    pub fn render(&self) -> String {
        let mut rows = String::new();
        for (nutrient, value) in &self.nutrients {
            let _ = writeln!(
                rows,
                "<tr><th>{}</th><td id=\"{}\">{}</td></tr>",
                nutrient.title(),
                nutrient.key(),
                escape_html(value)
            );
        }
        let image = if self.image.is_empty() {
            String::new()
        } else {
            format!(
                "<img src=\"{}\" alt=\"Captured food\" width=\"320\">\n",
                escape_html(&self.image)
            )
        };
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Nutrition Result</title>\n</head>\n<body>\n\
             <h1>Prediction: <span id=\"prediction\">{prediction}</span></h1>\n\
             {image}<table>\n{rows}</table>\n\
             <p><a href=\"/\">Capture another</a></p>\n</body>\n</html>\n",
            prediction = escape_html(&self.prediction),
            image = image,
            rows = rows
        )
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
