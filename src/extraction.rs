use crate::config::AppConfig;
use crate::error::AppError;
use crate::receipt::RawField;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Source of raw receipt fields for an encoded image.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract_fields(&self, content_b64: &str, mime_type: &str) -> Result<Vec<RawField>, AppError>;
}

#[derive(Debug, Deserialize, Default)]
struct ProcessResponse {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize, Default)]
struct Document {
    #[serde(default)]
    entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entity {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    mention_text: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl From<Entity> for RawField {
    fn from(entity: Entity) -> Self {
        RawField::new(entity.kind, entity.mention_text.unwrap_or_default(), entity.confidence)
    }
}

fn fields_from_response(response: ProcessResponse) -> Vec<RawField> {
    response
        .document
        .map(|document| document.entities.into_iter().map(RawField::from).collect())
        .unwrap_or_default()
}

/// Google Document AI processor client.
pub struct DocumentAiExtractor {
    client: reqwest::Client,
    process_url: Url,
    access_token: String,
}

impl DocumentAiExtractor {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let mut base = config.documentai_base_url();
        // Keep any path on the endpoint when joining.
        if !base.ends_with('/') {
            base.push('/');
        }
        let process_url = Url::parse(&base)
            .and_then(|base| {
                base.join(&format!(
                    "v1/projects/{}/locations/{}/processors/{}:process",
                    config.project_id, config.location, config.processor_id
                ))
            })
            .map_err(|e| AppError::Generic(format!("Invalid Document AI endpoint {}: {}", base, e)))?;
        log::debug!("Document AI process URL: {}", process_url);

        if config.access_token.is_empty() {
            log::warn!("No Document AI access token configured; requests will be unauthenticated.");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            process_url,
            access_token: config.access_token.clone(),
        })
    }

    pub fn process_url(&self) -> &Url {
        &self.process_url
    }
}

#[async_trait]
impl DocumentExtractor for DocumentAiExtractor {
    async fn extract_fields(&self, content_b64: &str, mime_type: &str) -> Result<Vec<RawField>, AppError> {
        log::info!("Sending {} document to Document AI", mime_type);
        let body = serde_json::json!({
            "rawDocument": {
                "content": content_b64,
                "mimeType": mime_type,
            }
        });

        let mut request = self.client.post(self.process_url.clone()).json(&body);
        if !self.access_token.is_empty() {
            request = request.bearer_auth(&self.access_token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("Document AI returned {}: {}", status, text);
            return Err(AppError::Extraction {
                message: format!("Document AI returned status {}", status),
                details: serde_json::from_str(&text).ok(),
            });
        }

        let parsed: ProcessResponse = response.json().await?;
        let fields = fields_from_response(parsed);
        log::debug!("Document AI returned {} entities", fields.len());
        Ok(fields)
    }
}

/// Parses a stored `documents:process` payload, for replaying responses offline.
pub fn fields_from_json(payload: &Value) -> Result<Vec<RawField>, AppError> {
    let response = ProcessResponse::deserialize(payload)?;
    Ok(fields_from_response(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use serde_json::json;

    #[test]
    fn maps_entities_to_fields() {
        let payload = json!({
            "document": {
                "text": "CORNER SHOP ...",
                "entities": [
                    { "type": "supplier_name", "mentionText": "CORNER SHOP", "confidence": 0.98 },
                    { "type": "total_amount", "mentionText": "12.40" },
                    { "type": "receipt_date" }
                ]
            }
        });

        let fields = fields_from_json(&payload).unwrap();
        assert_eq!(
            fields,
            vec![
                RawField::new("supplier_name", "CORNER SHOP", Some(0.98)),
                RawField::new("total_amount", "12.40", None),
                RawField::new("receipt_date", "", None),
            ]
        );
    }

    #[test]
    fn missing_document_or_entities_is_empty() {
        assert!(fields_from_json(&json!({})).unwrap().is_empty());
        assert!(fields_from_json(&json!({ "document": {} })).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(matches!(fields_from_json(&json!("oops")), Err(AppError::Json(_))));
    }

    #[test]
    fn builds_process_url() {
        let extractor = DocumentAiExtractor::new(&test_config()).unwrap();
        assert_eq!(
            extractor.process_url().as_str(),
            "https://eu-documentai.googleapis.com/v1/projects/demo-project/locations/eu/processors/abc123:process"
        );
    }

    #[test]
    fn keeps_endpoint_path_prefix() {
        for endpoint in ["http://proxy/docai", "http://proxy/docai/"] {
            let config = AppConfig {
                documentai_endpoint: Some(endpoint.into()),
                ..test_config()
            };
            let extractor = DocumentAiExtractor::new(&config).unwrap();
            assert_eq!(
                extractor.process_url().as_str(),
                "http://proxy/docai/v1/projects/demo-project/locations/eu/processors/abc123:process"
            );
        }
    }
}
