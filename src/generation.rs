//! # Generation Module
//!
//! ## Purpose
//! LLM collaborator for turning retrieved legal context into a grounded
//! argument. The engine talks to the `Generator` trait; the shipped backend
//! is the Ollama completion endpoint.
//!
//! ## Input/Output Specification
//! - **Input**: A fully assembled prompt string
//! - **Output**: The model's completion text, trimmed
//! - **Failure model**: any transport or decoding problem surfaces as
//!   `GenerationFailed` so the API layer can map it to a gateway error

use crate::config::GenerationConfig;
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Text completion collaborator
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier for logging
    fn name(&self) -> &str;

    /// Complete a prompt into answer text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the prompt that grounds the answer in retrieved context.
///
/// The instruction confines the model to the supplied context and forbids
/// speculation beyond it.
pub fn build_argument_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a legal defense lawyer assistant. Using only the content from the \
         retrieved legal context below, provide a well-reasoned legal argument that \
         addresses the question.\n\
         If the context partially addresses the question, use what is available and \
         avoid speculation beyond it.\n\
         \n\
         --------------------\n\
         Legal Context:\n\
         {context}\n\
         \n\
         --------------------\n\
         Legal Question:\n\
         {question}\n\
         \n\
         Answer:\n"
    )
}

/// Generator backed by the Ollama completion endpoint
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaGenerator {
    /// Create a new Ollama generator from configuration
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| RagError::GenerationFailed {
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RagError::GenerationFailed {
                details: format!("backend returned HTTP {}", response.status()),
            });
        }

        let body: OllamaGenerateResponse =
            response
                .json()
                .await
                .map_err(|e| RagError::GenerationFailed {
                    details: e.to_string(),
                })?;

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: &str) -> GenerationConfig {
        GenerationConfig {
            ollama_url: url.to_string(),
            model: "llama3.1:latest".to_string(),
            request_timeout_seconds: 5,
        }
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = build_argument_prompt("Was venue proper?", "The court sat in Ohio.");
        assert!(prompt.contains("Legal Context:\nThe court sat in Ohio."));
        assert!(prompt.contains("Legal Question:\nWas venue proper?"));
        assert!(prompt.ends_with("Answer:\n"));
    }

    #[tokio::test]
    async fn complete_returns_trimmed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "  The argument holds.  "
            })))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(&test_config(&server.uri())).unwrap();
        let answer = generator.complete("prompt").await.unwrap();
        assert_eq!(answer, "The argument holds.");
    }

    #[tokio::test]
    async fn server_error_maps_to_generation_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(&test_config(&server.uri())).unwrap();
        let err = generator.complete("prompt").await.unwrap_err();
        assert!(matches!(err, RagError::GenerationFailed { .. }));
    }
}
