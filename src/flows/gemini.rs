//! Gemini `generateContent` client implementing both flows.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use super::dto::{image_output_schema, BarcodeFlowOutput, ImageFlowOutput};
use super::prompts::{barcode_prompt, IMAGE_PROMPT};
use super::tool::{self, BarcodeTool, LOOKUP_BARCODE};
use super::{FlowError, NutritionFlows};
use crate::config::GeminiConfig;
use crate::validation::{BarcodeQuery, ImageQuery};

/// Upper bound on model -> tool -> model exchanges in one barcode flow.
pub const MAX_TOOL_ROUNDS: usize = 4;

const NOT_FOUND_PHRASE: &str = "could not be found";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

fn user_turn(parts: Vec<Part>) -> Value {
    json!({ "role": "user", "parts": parts })
}

/// A model turn as parsed, plus the exact JSON it arrived as. The raw form
/// is what goes back in the history, so fields this client does not model
/// (`thoughtSignature` on function calls) survive the round trip.
#[derive(Debug)]
struct ModelTurn {
    content: Content,
    raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Value>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct GeminiFlows {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    tool: Arc<dyn BarcodeTool>,
}

impl GeminiFlows {
    pub fn new(config: &GeminiConfig, tool: Arc<dyn BarcodeTool>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            tool,
        })
    }

    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<ModelTurn, FlowError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "gemini request failed");
                FlowError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!(?retry_after_secs, "gemini rate limited");
            return Err(FlowError::RateLimited { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(status = status.as_u16(), %message, "gemini api error");
            return Err(FlowError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| FlowError::Parse(e.to_string()))?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(FlowError::EmptyResponse)?;
        debug!(finish_reason = ?candidate.finish_reason, "gemini candidate received");
        let raw = candidate.content.ok_or(FlowError::EmptyResponse)?;
        let content =
            Content::deserialize(&raw).map_err(|e| FlowError::Parse(e.to_string()))?;
        Ok(ModelTurn { content, raw })
    }

    async fn answer_tool_call(&self, call: &FunctionCall, fallback: &str) -> Part {
        let response = if call.name == LOOKUP_BARCODE {
            let barcode = call
                .args
                .get("barcode")
                .and_then(Value::as_str)
                .unwrap_or(fallback);
            match self.tool.lookup(barcode).await {
                Ok(product) => json!({ "name": LOOKUP_BARCODE, "content": product }),
                Err(e) => {
                    warn!(error = %e, %barcode, "lookupBarcode tool failed");
                    json!({ "name": LOOKUP_BARCODE, "error": e.to_string() })
                }
            }
        } else {
            warn!(tool = %call.name, "model called unknown tool");
            json!({ "name": call.name, "error": "unknown tool" })
        };
        Part::FunctionResponse {
            function_response: FunctionResponse {
                name: call.name.clone(),
                response,
            },
        }
    }
}

#[async_trait]
impl NutritionFlows for GeminiFlows {
    #[instrument(skip(self), fields(barcode = %query))]
    async fn extract_nutritional_data(
        &self,
        query: &BarcodeQuery,
    ) -> Result<BarcodeFlowOutput, FlowError> {
        let mut contents = vec![user_turn(vec![Part::Text {
            text: barcode_prompt(query.as_str()),
        }])];

        for round in 0..MAX_TOOL_ROUNDS {
            let request = GenerateRequest {
                contents: &contents,
                tools: Some(vec![json!({ "functionDeclarations": [tool::declaration()] })]),
                generation_config: Some(GenerationConfig {
                    response_mime_type: None,
                    response_schema: None,
                    temperature: 0.0,
                }),
            };
            let reply = self.generate(&request).await?;

            let calls: Vec<FunctionCall> = function_calls(&reply.content).cloned().collect();
            if calls.is_empty() {
                let text = joined_text(&reply.content).ok_or(FlowError::EmptyResponse)?;
                return parse_barcode_answer(&text);
            }

            debug!(round, calls = calls.len(), "model requested tool calls");
            let mut answers = Vec::with_capacity(calls.len());
            for call in &calls {
                answers.push(self.answer_tool_call(call, query.as_str()).await);
            }
            contents.push(reply.raw);
            contents.push(user_turn(answers));
        }

        Err(FlowError::ToolLoop(MAX_TOOL_ROUNDS))
    }

    #[instrument(skip(self, photo), fields(mime = %photo.mime(), size = photo.len()))]
    async fn identify_food(&self, photo: &ImageQuery) -> Result<ImageFlowOutput, FlowError> {
        let uri = photo.to_data_uri();
        let contents = [user_turn(vec![
            Part::Text {
                text: IMAGE_PROMPT.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: uri.mime,
                    data: uri.data,
                },
            },
        ])];
        let request = GenerateRequest {
            contents: &contents,
            tools: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".into()),
                response_schema: Some(image_output_schema()),
                temperature: 0.0,
            }),
        };
        let reply = self.generate(&request).await?;
        let text = joined_text(&reply.content).ok_or(FlowError::EmptyResponse)?;
        parse_json(&text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn function_calls(content: &Content) -> impl Iterator<Item = &FunctionCall> {
    content.parts.iter().filter_map(|p| match p {
        Part::FunctionCall { function_call } => Some(function_call),
        _ => None,
    })
}

fn joined_text(content: &Content) -> Option<String> {
    let text: String = content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// A free-text refusal that mentions the not-found phrase is folded into the
/// sentinel shape so callers see one trigger condition.
fn parse_barcode_answer(text: &str) -> Result<BarcodeFlowOutput, FlowError> {
    match parse_json::<BarcodeFlowOutput>(text) {
        Ok(out) => Ok(out),
        Err(e) if text.to_lowercase().contains(NOT_FOUND_PHRASE) => {
            debug!(error = %e, "model answered not-found in prose");
            Ok(BarcodeFlowOutput {
                product_name: Some(text.trim().to_string()),
                ..Default::default()
            })
        }
        Err(e) => Err(e),
    }
}

/// Pulls the first JSON object out of a model answer, tolerating code fences
/// and surrounding prose.
fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, FlowError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => return Err(FlowError::Parse("no JSON object in model output".into())),
    };
    serde_json::from_str(body).map_err(|e| FlowError::Parse(e.to_string()))
}

#[cfg(test)]
mod gemini_tests {
    use super::*;
    use crate::flows::tool::StubBarcodeTool;
    use bytes::Bytes;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn flows(server: &MockServer) -> GeminiFlows {
        let config = GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-test".into(),
            base_url: server.uri(),
            timeout_secs: 5,
        };
        GeminiFlows::new(&config, Arc::new(StubBarcodeTool)).unwrap()
    }

    fn text_reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    const ENDPOINT: &str = "/v1beta/models/gemini-test:generateContent";

    #[test]
    fn parse_json_strips_fences() {
        let out: BarcodeFlowOutput =
            parse_json("```json\n{\"productName\":\"Parle-G\"}\n```").unwrap();
        assert_eq!(out.product_name.as_deref(), Some("Parle-G"));
        assert!(parse_json::<BarcodeFlowOutput>("no json here").is_err());
    }

    #[test]
    fn prose_not_found_becomes_sentinel() {
        let out = parse_barcode_answer("Sorry, the information could not be found.").unwrap();
        assert!(out
            .product_name
            .unwrap()
            .to_lowercase()
            .contains("could not be found"));
        assert!(matches!(
            parse_barcode_answer("I am not sure"),
            Err(FlowError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn barcode_flow_runs_tool_round_trip() {
        let server = MockServer::start().await;

        // second call carries the tool answer back to the model
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_string_contains("functionResponse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
                r#"{"productName":"Example Product","calories":"200","allergens":"None"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{ "functionCall": { "name": "lookupBarcode", "args": { "barcode": "8901234" } } }]
                    }
                }]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let query = BarcodeQuery::parse("8901234").unwrap();
        let out = flows(&server).extract_nutritional_data(&query).await.unwrap();
        assert_eq!(out.product_name.as_deref(), Some("Example Product"));
        assert_eq!(out.calories.as_deref(), Some("200"));
    }

    #[tokio::test]
    async fn model_turn_is_echoed_back_verbatim() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_string_contains("functionResponse"))
            .and(body_string_contains("\"thoughtSignature\":\"c2lnLTE=\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
                r#"{"productName":"Example Product"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{
                            "functionCall": { "name": "lookupBarcode", "args": { "barcode": "5000112" } },
                            "thoughtSignature": "c2lnLTE="
                        }]
                    }
                }]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let query = BarcodeQuery::parse("5000112").unwrap();
        let out = flows(&server).extract_nutritional_data(&query).await.unwrap();
        assert_eq!(out.product_name.as_deref(), Some("Example Product"));
    }

    #[tokio::test]
    async fn image_flow_sends_inline_data_and_parses_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_string_contains("inlineData"))
            .and(body_string_contains("image/png"))
            .and(body_string_contains("iVBORw=="))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
                r#"{"foodIdentification":{"identifiedFood":"Apple","confidenceLevel":0.87},
                    "nutritionalInformation":{"calories":"52","protein":"0.3g","fat":"0.2g","carbohydrates":"14g","servingSize":"100g"},
                    "allergens":["None"]}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let photo = ImageQuery::parse(Some((Bytes::from_static(b"\x89PNG"), "image/png"))).unwrap();
        let out = flows(&server).identify_food(&photo).await.unwrap();
        let id = out.food_identification.unwrap();
        assert_eq!(id.identified_food.as_deref(), Some("Apple"));
        assert_eq!(id.confidence_level, Some(0.87));
        assert_eq!(out.allergens, vec!["None".to_string()]);
    }

    #[tokio::test]
    async fn api_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
            })))
            .mount(&server)
            .await;

        let query = BarcodeQuery::parse("12345").unwrap();
        let err = flows(&server).extract_nutritional_data(&query).await.unwrap_err();
        match err {
            FlowError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let query = BarcodeQuery::parse("12345").unwrap();
        let err = flows(&server).extract_nutritional_data(&query).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[tokio::test]
    async fn endless_tool_calls_are_cut_off() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "functionCall": { "name": "lookupBarcode", "args": {} } }] }
                }]
            })))
            .expect(MAX_TOOL_ROUNDS as u64)
            .mount(&server)
            .await;

        let query = BarcodeQuery::parse("12345").unwrap();
        let err = flows(&server).extract_nutritional_data(&query).await.unwrap_err();
        assert!(matches!(err, FlowError::ToolLoop(MAX_TOOL_ROUNDS)));
    }

    #[tokio::test]
    async fn empty_candidates_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let photo = ImageQuery::parse(Some((Bytes::from_static(b"GIF89a"), "image/gif"))).unwrap();
        let err = flows(&server).identify_food(&photo).await.unwrap_err();
        assert!(matches!(err, FlowError::EmptyResponse));
    }
}
