//! HTTP client for a LUIS-compatible intent classification service.
//!
//! Prediction calls go to `{endpoint}/luis/v2.0/apps/{model}`; model
//! management goes to the authoring API under
//! `{authoring_endpoint}/luis/api/v2.0/apps/`.  All connection details come
//! from [`ClassifierConfig`]; nothing is hardcoded.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;

use crate::classifier::client::{ClassifierError, IntentClassifier, ModelService, RemoteModel};
use crate::classifier::types::{ModelCatalog, ModelRef, ModelSummary, Recognition};
use crate::config::{ClassifierConfig, TrainingExample};

const AUTHORING_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

// ---------------------------------------------------------------------------
// Authoring API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppInfo {
    id: String,
    name: String,
    #[serde(default)]
    active_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedItem {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrainDetails {
    status: String,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrainStatus {
    details: TrainDetails,
}

// ---------------------------------------------------------------------------
// LuisClient
// ---------------------------------------------------------------------------

/// Talks to the prediction and authoring endpoints.
///
/// Cheap to clone: `reqwest::Client` is reference counted internally.
#[derive(Clone)]
pub struct LuisClient {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl LuisClient {
    /// Build a client from config.  The HTTP client carries the per-request
    /// timeout from `config.timeout_secs`.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn authoring_url(&self, path: &str) -> String {
        format!(
            "{}/luis/api/v2.0/apps/{}",
            self.config.authoring_endpoint.trim_end_matches('/'),
            path
        )
    }

    fn authoring_key(&self) -> Result<&str, ClassifierError> {
        self.config
            .effective_authoring_key()
            .ok_or(ClassifierError::MissingKey("authoring"))
    }

    fn authoring_get(&self, path: &str) -> Result<reqwest::RequestBuilder, ClassifierError> {
        let key = self.authoring_key()?;
        Ok(self
            .client
            .get(self.authoring_url(path))
            .header(AUTHORING_KEY_HEADER, key))
    }

    fn authoring_post(&self, path: &str) -> Result<reqwest::RequestBuilder, ClassifierError> {
        let key = self.authoring_key()?;
        Ok(self
            .client
            .post(self.authoring_url(path))
            .header(AUTHORING_KEY_HEADER, key))
    }
}

/// Turn a non-success status into [`ClassifierError::Status`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClassifierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClassifierError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClassifierError> {
    check(response)
        .await?
        .json::<T>()
        .await
        .map_err(|e| ClassifierError::Parse(e.to_string()))
}

#[async_trait]
impl IntentClassifier for LuisClient {
    async fn recognize(&self, model: &ModelRef, text: &str) -> Result<Recognition, ClassifierError> {
        let key = self
            .config
            .subscription_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ClassifierError::MissingKey("subscription"))?;

        let url = format!(
            "{}/luis/v2.0/apps/{}",
            self.config.endpoint.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("subscription-key", key),
                ("verbose", "true"),
                ("timezoneOffset", "0"),
                ("q", text),
            ])
            .send()
            .await?;

        parse(response).await
    }
}

#[async_trait]
impl ModelService for LuisClient {
    async fn list_models(&self) -> Result<Vec<ModelSummary>, ClassifierError> {
        let response = self.authoring_get("")?.send().await?;
        let apps: Vec<AppInfo> = parse(response).await?;

        Ok(apps
            .into_iter()
            .map(|app| ModelSummary {
                model_ref: ModelRef::new(app.id),
                name: app.name,
            })
            .collect())
    }

    async fn fetch_model(&self, model: &ModelRef) -> Result<ModelCatalog, ClassifierError> {
        let response = self.authoring_get(model.as_str())?.send().await?;
        let app: AppInfo = parse(response).await?;
        let version = app
            .active_version
            .unwrap_or_else(|| self.config.version_id.clone());

        let intents: Vec<NamedItem> = parse(
            self.authoring_get(&format!("{}/versions/{}/intents", app.id, version))?
                .send()
                .await?,
        )
        .await?;
        let entities: Vec<NamedItem> = parse(
            self.authoring_get(&format!("{}/versions/{}/entities", app.id, version))?
                .send()
                .await?,
        )
        .await?;

        log::debug!(
            "classifier: fetched model {} ({} intents, {} entities)",
            app.name,
            intents.len(),
            entities.len()
        );

        Ok(ModelCatalog {
            intents: intents.into_iter().map(|i| i.name).collect(),
            entities: entities.into_iter().map(|e| e.name).collect(),
        })
    }

    async fn create_model(&self) -> Result<Box<dyn RemoteModel>, ClassifierError> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let name = format!("{}-{}", self.config.new_model_name, stamp);

        let body = serde_json::json!({
            "name":             name,
            "culture":          self.config.culture,
            "initialVersionId": self.config.version_id,
        });

        let response = self.authoring_post("")?.json(&body).send().await?;
        let id: String = parse(response).await?;
        log::info!("classifier: created model {name} ({id})");

        Ok(Box::new(LuisModel {
            client: self.clone(),
            model_ref: ModelRef::new(id),
            version: self.config.version_id.clone(),
            training: self.config.training.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// LuisModel
// ---------------------------------------------------------------------------

/// A freshly created model on the authoring API.
struct LuisModel {
    client: LuisClient,
    model_ref: ModelRef,
    version: String,
    training: Vec<TrainingExample>,
}

impl LuisModel {
    fn version_path(&self, tail: &str) -> String {
        format!("{}/versions/{}/{}", self.model_ref, self.version, tail)
    }
}

/// Unique intents and entity types of a training set, in first-seen order.
fn catalog_of(training: &[TrainingExample]) -> ModelCatalog {
    let mut catalog = ModelCatalog::default();
    for example in training {
        if !catalog.intents.contains(&example.intent) {
            catalog.intents.push(example.intent.clone());
        }
        for label in &example.entities {
            if !catalog.entities.contains(&label.entity) {
                catalog.entities.push(label.entity.clone());
            }
        }
    }
    catalog
}

/// Inclusive character span of `phrase` inside `text`.
fn char_span(text: &str, phrase: &str) -> Option<(usize, usize)> {
    let byte = text.find(phrase)?;
    let start = text[..byte].chars().count();
    let len = phrase.chars().count();
    if len == 0 {
        return None;
    }
    Some((start, start + len - 1))
}

fn example_body(example: &TrainingExample) -> serde_json::Value {
    let labels: Vec<serde_json::Value> = example
        .entities
        .iter()
        .filter_map(|label| match char_span(&example.text, &label.phrase) {
            Some((start, end)) => Some(serde_json::json!({
                "entityName":     label.entity,
                "startCharIndex": start,
                "endCharIndex":   end,
            })),
            None => {
                log::warn!(
                    "classifier: entity phrase {:?} not found in example {:?}",
                    label.phrase,
                    example.text
                );
                None
            }
        })
        .collect();

    serde_json::json!({
        "text":         example.text,
        "intentName":   example.intent,
        "entityLabels": labels,
    })
}

#[async_trait]
impl RemoteModel for LuisModel {
    fn model_ref(&self) -> &ModelRef {
        &self.model_ref
    }

    fn catalog(&self) -> ModelCatalog {
        catalog_of(&self.training)
    }

    async fn load_data(&self) -> Result<(), ClassifierError> {
        let catalog = self.catalog();

        // "None" exists on every new model.
        for intent in catalog.intents.iter().filter(|i| *i != "None") {
            let req = self.client.authoring_post(&self.version_path("intents"))?;
            check(req.json(&serde_json::json!({ "name": intent })).send().await?).await?;
        }
        for entity in &catalog.entities {
            let req = self.client.authoring_post(&self.version_path("entities"))?;
            check(req.json(&serde_json::json!({ "name": entity })).send().await?).await?;
        }

        let examples: Vec<serde_json::Value> = self.training.iter().map(example_body).collect();
        let req = self.client.authoring_post(&self.version_path("examples"))?;
        check(req.json(&examples).send().await?).await?;

        log::info!(
            "classifier: uploaded {} examples to {}",
            examples.len(),
            self.model_ref
        );
        Ok(())
    }

    async fn start_training(&self) -> Result<(), ClassifierError> {
        let req = self.client.authoring_post(&self.version_path("train"))?;
        check(req.send().await?).await?;
        Ok(())
    }

    async fn wait_for_training_to_complete(&self) -> Result<(), ClassifierError> {
        let config = &self.client.config;
        let interval = Duration::from_millis(config.training_poll_ms);

        for attempt in 1..=config.training_max_polls {
            let response = self
                .client
                .authoring_get(&self.version_path("train"))?
                .send()
                .await?;
            let statuses: Vec<TrainStatus> = parse(response).await?;

            if let Some(failed) = statuses.iter().find(|s| s.details.status == "Fail") {
                return Err(ClassifierError::Training(
                    failed
                        .details
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "unknown reason".into()),
                ));
            }

            let done = statuses
                .iter()
                .all(|s| matches!(s.details.status.as_str(), "Success" | "UpToDate"));
            if done && !statuses.is_empty() {
                log::debug!("classifier: training finished after {attempt} polls");
                return Ok(());
            }

            tokio::time::sleep(interval).await;
        }

        Err(ClassifierError::Training(format!(
            "not finished after {} polls",
            config.training_max_polls
        )))
    }

    async fn publish(&self) -> Result<(), ClassifierError> {
        let body = serde_json::json!({
            "versionId": self.version,
            "isStaging": false,
        });
        let req = self
            .client
            .authoring_post(&format!("{}/publish", self.model_ref))?;
        check(req.json(&body).send().await?).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_builds_without_panic() {
        let _client = LuisClient::from_config(&ClassifierConfig::default());
    }

    #[test]
    fn authoring_url_trims_trailing_slash() {
        let mut config = ClassifierConfig::default();
        config.authoring_endpoint = "https://example.test/".into();
        let client = LuisClient::from_config(&config);
        assert_eq!(
            client.authoring_url("abc/versions/0.1/train"),
            "https://example.test/luis/api/v2.0/apps/abc/versions/0.1/train"
        );
    }

    #[tokio::test]
    async fn recognize_without_key_fails_before_any_request() {
        let client = LuisClient::from_config(&ClassifierConfig::default());
        let err = client
            .recognize(&ModelRef::new("app"), "help")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifierError::MissingKey("subscription")));
    }

    #[tokio::test]
    async fn listing_without_key_fails_before_any_request() {
        let client = LuisClient::from_config(&ClassifierConfig::default());
        let err = client.list_models().await.unwrap_err();
        assert!(matches!(err, ClassifierError::MissingKey("authoring")));
    }

    #[test]
    fn char_span_is_inclusive() {
        assert_eq!(char_span("pick up the crowbar", "crowbar"), Some((12, 18)));
        assert_eq!(char_span("pick up the crowbar", "lamp"), None);
        assert_eq!(char_span("anything", ""), None);
    }

    #[test]
    fn catalog_keeps_first_seen_order_without_duplicates() {
        let catalog = catalog_of(&ClassifierConfig::default().training);
        assert_eq!(
            catalog.intents,
            vec!["Pick up", "Use tool", "Describe surroundings", "Help", "None"]
        );
        assert_eq!(catalog.entities, vec!["object", "tool"]);
    }

    #[test]
    fn example_body_labels_entities() {
        let example = &ClassifierConfig::default().training[2];
        let body = example_body(example);
        assert_eq!(body["intentName"], "Use tool");
        let labels = body["entityLabels"].as_array().expect("labels");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0]["entityName"], "tool");
        assert_eq!(labels[0]["startCharIndex"], 23);
        assert_eq!(labels[0]["endCharIndex"], 29);
    }
}
