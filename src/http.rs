//! HTTP client for the placement predictor.
//!
//! Posts the canonical work area to the predictor and maps every failure
//! (connection, timeout, unreadable body) to [`TemplateError::Predictor`].
//! [`PredictorClient::suggest_placement`] folds those failures into the
//! local fallback, so callers always get a placement back.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;

use crate::predictor::{
    resolve_placement, HealthStatus, PlacementRequest, PlacementSuggestion, PredictionResponse,
    PredictorConfig,
};
use crate::{GeoPoint, Result, TemplateError};

const MAX_RETRIES: u32 = 2;

/// Async client for the placement predictor.
pub struct PredictorClient {
    client: Client,
    config: PredictorConfig,
}

impl PredictorClient {
    pub fn new(config: PredictorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TemplateError::Predictor {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Ask the predictor for a placement. `canonical` must already be in
    /// canonical corner order.
    ///
    /// Connection errors are retried with a short backoff; HTTP error
    /// statuses are not.
    pub async fn predict(&self, canonical: &[GeoPoint]) -> Result<PredictionResponse> {
        let request = PlacementRequest::new(canonical);
        let start = Instant::now();
        let mut retries = 0;

        loop {
            let response = self
                .client
                .post(&self.config.endpoint)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    // The server reports bad input as 400 with a JSON body
                    let body = resp.json::<PredictionResponse>().await;
                    debug!(
                        "[Predictor] HTTP {} in {:.0}ms",
                        status,
                        start.elapsed().as_secs_f64() * 1000.0
                    );

                    return match body {
                        Ok(prediction) => Ok(prediction),
                        Err(e) => Err(TemplateError::Predictor {
                            message: format!("Parse error: {}", e),
                            status_code: Some(status.as_u16()),
                        }),
                    };
                }
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES || e.is_timeout() {
                        return Err(TemplateError::Predictor {
                            message: format!("Request error: {}", e),
                            status_code: e.status().map(|s| s.as_u16()),
                        });
                    }

                    let backoff = Duration::from_millis(250 * (1 << retries));
                    warn!(
                        "[Predictor] Request failed: {}, retry {} after {:?}",
                        e, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Predictor placement, or the local fallback when the predictor fails.
    ///
    /// `None` only for an empty work area.
    pub async fn suggest_placement(&self, canonical: &[GeoPoint]) -> Option<PlacementSuggestion> {
        if canonical.is_empty() {
            return None;
        }
        let outcome = self.predict(canonical).await;
        resolve_placement(canonical, outcome)
    }

    /// Query the predictor's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        let resp = self
            .client
            .get(&self.config.health_endpoint)
            .send()
            .await
            .map_err(|e| TemplateError::Predictor {
                message: format!("Request error: {}", e),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TemplateError::Predictor {
                message: format!("HTTP {}", status),
                status_code: Some(status.as_u16()),
            });
        }

        let health = resp
            .json::<HealthStatus>()
            .await
            .map_err(|e| TemplateError::Predictor {
                message: format!("Parse error: {}", e),
                status_code: Some(status.as_u16()),
            })?;

        info!(
            "[Predictor] Health: {} (model loaded: {})",
            health.status, health.model_loaded
        );
        Ok(health)
    }
}

/// Synchronous wrapper for FFI - runs the async call on a tokio runtime
#[cfg(feature = "ffi")]
pub fn suggest_placement_sync(
    config: PredictorConfig,
    canonical: Vec<GeoPoint>,
) -> Option<PlacementSuggestion> {
    use crate::predictor::fallback_placement;
    use tokio::runtime::Runtime;

    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            warn!("[Predictor] Failed to create tokio runtime: {}", e);
            return fallback_placement(&canonical);
        }
    };

    let client = match PredictorClient::new(config) {
        Ok(c) => c,
        Err(e) => {
            warn!("[Predictor] {}", e);
            return fallback_placement(&canonical);
        }
    };

    rt.block_on(client.suggest_placement(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::SuggestionSource;
    use crate::reorder_points_for_ai;

    fn unreachable_config() -> PredictorConfig {
        // Port 9 (discard) on localhost is closed in test environments
        PredictorConfig {
            endpoint: "http://127.0.0.1:9/api/predict".to_string(),
            health_endpoint: "http://127.0.0.1:9/api/health".to_string(),
            timeout_secs: 2,
        }
    }

    fn canonical() -> Vec<GeoPoint> {
        reorder_points_for_ai(
            &[
                GeoPoint::new(49.8000, -97.0800),
                GeoPoint::new(49.8002, -97.0800),
                GeoPoint::new(49.8002, -97.0797),
                GeoPoint::new(49.8000, -97.0797),
            ],
            0,
        )
    }

    #[tokio::test]
    async fn test_unreachable_predictor_errors() {
        let client = PredictorClient::new(unreachable_config()).unwrap();
        let result = client.predict(&canonical()).await;
        assert!(matches!(result, Err(TemplateError::Predictor { .. })));
        assert!(client.health().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_predictor_falls_back() {
        let client = PredictorClient::new(unreachable_config()).unwrap();
        let suggestion = client.suggest_placement(&canonical()).await.unwrap();
        assert_eq!(suggestion.source, SuggestionSource::Fallback);
        assert!((suggestion.rotation - 90.0).abs() < 1e-9);
        assert!(client.suggest_placement(&[]).await.is_none());
    }
}
