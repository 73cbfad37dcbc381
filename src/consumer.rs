//! NATS request consumer and request routing

use crate::config::NatsConfig;
use crate::error::PipelineError;
use crate::service::RiskService;
use crate::types::{ApiResponse, LoanApplication, SyntheticRequest};
use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::stream::{self, SelectAll};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

/// Operation a request subject maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Score one application
    Predict,
    /// Generate synthetic applications
    GenerateSynthetic,
    /// Generate synthetic applications and score each one
    PredictSynthetic,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Predict => "predict",
            Route::GenerateSynthetic => "generate_synthetic",
            Route::PredictSynthetic => "predict_synthetic",
        }
    }
}

/// Subscribes to every request subject
pub struct RequestConsumer {
    client: Client,
    routes: Vec<(String, Route)>,
}

impl RequestConsumer {
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            routes: vec![
                (config.predict_subject.clone(), Route::Predict),
                (config.synthetic_subject.clone(), Route::GenerateSynthetic),
                (config.predict_synthetic_subject.clone(), Route::PredictSynthetic),
            ],
        }
    }

    /// Subscribe to all request subjects as one merged stream
    pub async fn subscribe(&self) -> Result<SelectAll<Subscriber>> {
        let mut subscribers = Vec::with_capacity(self.routes.len());
        for (subject, route) in &self.routes {
            subscribers.push(self.client.subscribe(subject.clone()).await?);
            info!(subject = %subject, route = route.as_str(), "Subscribed to request subject");
        }
        Ok(stream::select_all(subscribers))
    }

    /// Route for an incoming message subject
    pub fn route(&self, subject: &str) -> Option<Route> {
        self.routes
            .iter()
            .find(|(candidate, _)| candidate == subject)
            .map(|(_, route)| *route)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(subject, _)| subject.as_str())
    }
}

/// Handle one request payload and return the serialized reply envelope
pub fn handle_request(
    service: &RiskService,
    route: Route,
    payload: &[u8],
) -> serde_json::Result<Vec<u8>> {
    match route {
        Route::Predict => {
            let reply = decode::<LoanApplication>(service, payload)
                .and_then(|application| service.predict(&application));
            encode(reply)
        }
        Route::GenerateSynthetic => {
            let reply = decode::<SyntheticRequest>(service, payload)
                .and_then(|request| service.generate_synthetic(&request));
            encode(reply)
        }
        Route::PredictSynthetic => {
            let reply = decode::<SyntheticRequest>(service, payload)
                .and_then(|request| service.predict_synthetic(&request));
            encode(reply)
        }
    }
}

fn decode<T: DeserializeOwned>(
    service: &RiskService,
    payload: &[u8],
) -> std::result::Result<T, PipelineError> {
    serde_json::from_slice(payload).map_err(|e| {
        warn!(error = %e, "Failed to deserialize request");
        let err = PipelineError::InvalidInput(format!("malformed request: {}", e));
        service.metrics().record_failure(err.kind());
        err
    })
}

fn encode<T: Serialize>(reply: std::result::Result<T, PipelineError>) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&ApiResponse::from(reply))
}
