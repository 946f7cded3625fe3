//! FoodData Central search client.
//!
//! One blocking GET per lookup: `?query=<label>&api_key=<key>`. The first food
//! in the response supplies the nutrients. No retry; the agent timeout bounds
//! how long a capture request can block on the database.

use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::time::Duration;
use url::Url;

use super::{record_from_response, FoodSearchResponse, NutritionLookup, NutritionRecord};

pub const DEFAULT_USDA_URL: &str = "https://api.nal.usda.gov/fdc/v1/foods/search";
pub const DEFAULT_USDA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct UsdaConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for UsdaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_USDA_URL.to_string(),
            api_key: String::new(),
            timeout: DEFAULT_USDA_TIMEOUT,
        }
    }
}

// Keeps the key out of logs and error pages.
impl fmt::Debug for UsdaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsdaConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct UsdaClient {
    config: UsdaConfig,
    agent: ureq::Agent,
}

impl UsdaClient {
    pub fn new(config: UsdaConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    fn search_url(&self, food_label: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.config.endpoint,
            &[("query", food_label), ("api_key", self.config.api_key.as_str())],
        )
        .with_context(|| format!("invalid nutrition endpoint {}", self.config.endpoint))
    }

    /// Run one search and decode the response body.
    pub fn search(&self, food_label: &str) -> Result<FoodSearchResponse> {
        let url = self.search_url(food_label)?;
        // ureq error messages embed the full URL, key included.
        let response = self
            .agent
            .request_url("GET", &url)
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => {
                    anyhow!("nutrition database returned status {}", code)
                }
                ureq::Error::Transport(transport) => anyhow!(
                    "nutrition database unreachable ({}): {}",
                    transport.kind(),
                    transport.message().unwrap_or("no details")
                ),
            })?;
        let body = response
            .into_string()
            .context("read nutrition database response")?;
        serde_json::from_str(&body).context("decode nutrition database response")
    }
}

impl NutritionLookup for UsdaClient {
    fn lookup(&self, food_label: &str) -> Result<NutritionRecord> {
        let response = self.search(food_label)?;
        match response.foods().first() {
            None => log::info!("nutrition database has no entry for '{}'", food_label),
            Some(food) => log::debug!(
                "nutrition for '{}' taken from '{}'",
                food_label,
                food.description.as_deref().unwrap_or("-")
            ),
        }
        Ok(record_from_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_carries_query_and_key() -> Result<()> {
        let client = UsdaClient::new(UsdaConfig {
            api_key: "demo-key".to_string(),
            ..UsdaConfig::default()
        });
        let url = client.search_url("Chicken Gravy")?;
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), "Chicken Gravy".to_string()),
                ("api_key".to_string(), "demo-key".to_string()),
            ]
        );
        assert!(url.as_str().starts_with(DEFAULT_USDA_URL));
        Ok(())
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = UsdaConfig {
            api_key: "super-secret".to_string(),
            ..UsdaConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn invalid_endpoint_is_an_error() {
        let client = UsdaClient::new(UsdaConfig {
            endpoint: "not a url".to_string(),
            api_key: "k".to_string(),
            ..UsdaConfig::default()
        });
        assert!(client.lookup("Apple").is_err());
    }
}
