//! One-sentence summaries of the recent heart rate trend, written by a hosted language model.
//!
//! Failures never reach the caller: they turn into [`INSIGHT_FALLBACK`].

use std::future::Future;
use std::time::Duration;

use http::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::errors::AppError;
use crate::heart_rate::HeartRateSample;
use crate::settings::InsightSettings;

/// Fewer samples than this aren't worth a request.
pub const MIN_SAMPLES: usize = 5;
/// How many of the latest BPM values go into the prompt.
pub const TREND_LENGTH: usize = 20;

pub const NOT_ENOUGH_DATA: &str = "Not enough data points to analyze yet.";
pub const INSIGHT_FALLBACK: &str = "Unable to generate insight at this time.";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendStats {
    pub average: u16,
    pub min: u16,
    pub max: u16,
    /// Latest BPM values, oldest first
    pub trend: Vec<u16>,
}

impl TrendStats {
    /// `None` when there are fewer than [`MIN_SAMPLES`] samples.
    pub fn from_samples(samples: &[HeartRateSample]) -> Option<Self> {
        if samples.len() < MIN_SAMPLES {
            return None;
        }
        let values: Vec<u16> = samples.iter().map(HeartRateSample::bpm).collect();
        let sum: u64 = values.iter().map(|&bpm| bpm as u64).sum();
        let average = (sum as f64 / values.len() as f64).round() as u16;
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let trend = values[values.len().saturating_sub(TREND_LENGTH)..].to_vec();
        Some(Self {
            average,
            min,
            max,
            trend,
        })
    }
    pub fn trend_string(&self) -> String {
        self.trend
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn build_prompt(stats: &TrendStats) -> String {
    format!(
        "You are a fitness health assistant.\n\
         Here is a stream of heart rate data (BPM) collected over a short period: [{}].\n\
         Statistics: Average: {}, Min: {}, Max: {}.\n\
         \n\
         Please provide a very short, concise sentence (max 20 words) describing the heart rate status.\n\
         Examples: \"Heart rate is steady and resting,\" \"Elevated heart rate detected, possible exertion,\" \"Irregular fluctuations observed.\"\n\
         Do not give medical advice.",
        stats.trend_string(),
        stats.average,
        stats.min,
        stats.max
    )
}

/// Something that turns a prompt into text, usually over the network.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

#[derive(Debug, Clone)]
pub struct Summarizer<G> {
    generator: G,
}

impl<G: TextGenerator + Sync> Summarizer<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }
    /// Returns one short sentence about the samples. Never fails.
    pub async fn summarize(&self, samples: &[HeartRateSample]) -> String {
        let Some(stats) = TrendStats::from_samples(samples) else {
            return NOT_ENOUGH_DATA.into();
        };
        debug!(
            "Requesting insight: avg {} min {} max {} over {} samples",
            stats.average,
            stats.min,
            stats.max,
            samples.len()
        );
        let prompt = build_prompt(&stats);
        match self.generator.generate(&prompt).await {
            Ok(text) => text.trim().to_owned(),
            Err(e) => {
                error!("Insight API Error: {e}");
                INSIGHT_FALLBACK.into()
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn build(settings: &InsightSettings) -> Result<Self, AppError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            info!(
                "No API key in ${}, insights will fall back to a fixed message",
                settings.api_key_env
            );
        }
        let mut base = settings.endpoint.trim().to_owned();
        if !base.contains("://") {
            base = format!("http://{base}");
        }
        if base.ends_with('/') {
            base.pop();
        }
        let url = format!("{base}/models/{}:generateContent", settings.model);
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Network("No API key configured".into()))?;

        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key)?;
        key_value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key_value);

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_owned(),
                }],
            }],
        };

        let resp = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AppError::HttpStatus(resp.status().as_u16()));
        }
        let response: GenerateResponse = resp.json().await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(AppError::Network("Response contained no text".into()))
        } else {
            Ok(text)
        }
    }
}
