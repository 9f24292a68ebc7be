//! Gemini classifier over the Generative Language REST API.
//!
//! In paragraph mode each chunk is one `generateContent` call asking for a
//! JSON array of vague sentences. In sentence mode each sentence is one
//! call asking for a single verdict, with neighbouring sentences as
//! context. Calls are bounded by a timeout and retried with exponential
//! backoff on transient failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::chunk::CONTEXT_WINDOW;
use super::{
    assign_ordinals, chunk_text, context_window, parse_findings, segment_sentences, AnalysisMode, Classification,
    Classifier, ClassifierConfig, ClassifierError, RawFinding, UnitStats,
};

const PARAGRAPH_PROMPT: &str = r#"You are an expert linguist evaluating clarity and precision in academic and technical writing.

Find every sentence in the passage below that contains vague, unclear or imprecise language, such as:
- subjective qualifiers without metrics ("very effective", "significantly better")
- imprecise quantifiers ("many", "several", "a number of")
- vague time references ("soon", "recently", "in the near future")
- hedging without justification ("might be", "could potentially")
- comparisons without a baseline ("more efficient", "better performance")
- general claims without supporting evidence or data

For each vague sentence, copy the sentence EXACTLY as it appears in the passage, explain specifically what is vague and why, and suggest a concrete, more precise rewrite.

Respond ONLY with a JSON array in this exact format:
[{"sentence": "exact sentence from the passage", "reason": "what is vague", "suggestion": "precise rewrite"}]

Respond with [] if the passage is clear and precise.

Passage:
"""
{passage}
""""#;

const SENTENCE_PROMPT: &str = r#"You are an expert linguist evaluating clarity in academic and technical writing.

Task:
1. Identify if the sentence below is vague, unclear, or imprecise.
2. If vague, explain WHY it is vague in 1-2 clear lines.
3. Suggest a more precise alternative.

A sentence is considered vague if it contains:
- Subjective qualifiers without metrics (e.g., "very good", "quite fast", "somewhat better")
- Unclear pronouns or references
- Ambiguous quantifiers (e.g., "many", "several", "some")
- Imprecise time references (e.g., "soon", "recently", "for a while")
- Hedging language without justification (e.g., "might", "possibly", "could be")

Sentence: "{sentence}"
{context}
Respond ONLY with valid JSON in this exact format:
{"is_vague": true or false, "reason": "explanation here", "suggestion": "improved version here"}"#;

/// Build the classification prompt for one paragraph chunk
pub fn build_prompt(passage: &str) -> String {
    PARAGRAPH_PROMPT.replace("{passage}", passage)
}

/// Build the verdict prompt for one sentence and its neighbours
pub fn build_sentence_prompt(sentence: &str, before: &str, after: &str) -> String {
    let context = [before, after]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" [...] ");
    let context = if context.is_empty() {
        String::new()
    } else {
        format!("Context: {}\n", context)
    };

    SENTENCE_PROMPT
        .replace("{context}", &context)
        .replace("{sentence}", sentence)
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Concatenated text of the first candidate
fn response_text(body: &str) -> Result<String, ClassifierError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| ClassifierError::MalformedResponse("response has no candidates".to_string()))?;

    Ok(content.parts.into_iter().map(|p| p.text).collect())
}

/// Gemini-backed classifier
pub struct GeminiClassifier {
    config: ClassifierConfig,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClassifier {
    /// Create a classifier; fails without an API key
    pub fn from_config(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ClassifierError::MissingApiKey)?;

        Ok(Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    /// One generateContent call, no retry
    async fn generate(&self, prompt: &str) -> Result<String, ClassifierError> {
        let request = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&serde_json::json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": 0.0,
                    "responseMimeType": "application/json",
                },
            }))
            .send();

        let response = timeout(self.config.timeout(), request)
            .await
            .map_err(|_| ClassifierError::Timeout(self.config.timeout()))??;

        let status = response.status();
        let body = timeout(self.config.timeout(), response.text())
            .await
            .map_err(|_| ClassifierError::Timeout(self.config.timeout()))??;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response_text(&body)
    }

    /// Send one prompt, retrying transient failures
    async fn classify_prompt(&self, prompt: &str) -> Result<Vec<RawFinding>, ClassifierError> {
        let policy = &self.config.retry_policy;
        let mut attempt = 1;

        loop {
            let result = match self.generate(prompt).await {
                Ok(text) => parse_findings(&text),
                Err(e) => Err(e),
            };

            match result {
                Ok(findings) => return Ok(findings),
                Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                    let delay: Duration = policy.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn classify_paragraphs(&self, text: &str) -> Result<Classification, ClassifierError> {
        let chunks = chunk_text(text, self.config.min_paragraph_chars, self.config.chunk_chars);
        info!(chunks = chunks.len(), "Classifying paragraphs");

        let mut raw = Vec::new();
        let mut vague = 0;
        for (index, chunk) in chunks.iter().enumerate() {
            let found = self.classify_prompt(&build_prompt(chunk)).await?;
            debug!(chunk = index, findings = found.len(), "Classified chunk");
            if !found.is_empty() {
                vague += 1;
            }
            raw.extend(found);
        }

        Ok(Classification {
            findings: assign_ordinals(raw, 0),
            units: Some(UnitStats {
                mode: AnalysisMode::Paragraph,
                analyzed: chunks.len(),
                vague,
            }),
        })
    }

    async fn classify_sentences(&self, text: &str) -> Result<Classification, ClassifierError> {
        let sentences = segment_sentences(text);
        info!(sentences = sentences.len(), "Classifying sentences");

        let mut raw = Vec::new();
        let mut vague = 0;
        for (index, sentence) in sentences.iter().enumerate() {
            let (before, after) = context_window(&sentences, index, CONTEXT_WINDOW);
            let found = self
                .classify_prompt(&build_sentence_prompt(sentence, &before, &after))
                .await?;
            debug!(sentence = index, vague = !found.is_empty(), "Classified sentence");

            if !found.is_empty() {
                vague += 1;
            }
            // The verdict is about the sentence sent, whatever the model echoes
            raw.extend(found.into_iter().map(|f| RawFinding {
                quoted_text: Some(sentence.clone()),
                ..f
            }));
        }

        Ok(Classification {
            findings: assign_ordinals(raw, 0),
            units: Some(UnitStats {
                mode: AnalysisMode::Sentence,
                analyzed: sentences.len(),
                vague,
            }),
        })
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip_all, fields(model = %self.config.model, mode = ?self.config.mode, chars = text.len()))]
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        match self.config.mode {
            AnalysisMode::Paragraph => self.classify_paragraphs(text).await,
            AnalysisMode::Sentence => self.classify_sentences(text).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("The results were somewhat significant.");
        assert!(prompt.contains("\"\"\"\nThe results were somewhat significant.\n\"\"\""));
        assert!(prompt.contains("JSON array"));
        assert!(!prompt.contains("{passage}"));
    }

    #[test]
    fn test_build_sentence_prompt() {
        let prompt = build_sentence_prompt("Delivery is soon.", "The order was placed.", "");
        assert!(prompt.contains("Sentence: \"Delivery is soon.\"\nContext: The order was placed.\n"));
        assert!(prompt.contains(r#"{"is_vague": true or false"#));

        let bare = build_sentence_prompt("Delivery is soon.", "", "");
        assert!(!bare.contains("Context:"));
        assert!(!bare.contains("{context}"));

        let both = build_sentence_prompt("B.", "A.", "C.");
        assert!(both.contains("Context: A. [...] C.\n"));
    }

    #[test]
    fn test_missing_api_key() {
        let result = GeminiClassifier::from_config(ClassifierConfig::default());
        assert!(matches!(result, Err(ClassifierError::MissingApiKey)));

        let blank = ClassifierConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(GeminiClassifier::from_config(blank), Err(ClassifierError::MissingApiKey)));
    }

    #[test]
    fn test_api_url() {
        let classifier = GeminiClassifier::from_config(ClassifierConfig {
            api_key: Some("key".to_string()),
            endpoint: "http://localhost:9999/v1beta/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            classifier.api_url(),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(classifier.name(), "gemini");
    }

    #[test]
    fn test_response_text() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "[{\"sentence\": "}, {"text": "\"a\"}]"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }"#;
        assert_eq!(response_text(body).unwrap(), r#"[{"sentence": "a"}]"#);
    }

    #[test]
    fn test_response_without_candidates() {
        let err = response_text(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
    }
}
