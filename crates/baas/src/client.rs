use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use mabar_core::config::BaasConfig;

use crate::query::ParseQuery;

#[derive(Debug, Error)]
pub enum BaasError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service rejected the request with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode service response: {0}")]
    Decode(String),
    #[error("invalid request input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Deserialize)]
struct ResultsEnvelope<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedEnvelope {
    object_id: String,
}

/// Thin REST client for the hosted data service. Credentials travel as the
/// service's application headers on every request.
pub struct BaasClient {
    http: Client,
    server_url: String,
    app_id: SecretString,
    api_key: SecretString,
}

impl BaasClient {
    pub fn from_config(config: &BaasConfig) -> Result<Self, BaasError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn find<T: DeserializeOwned>(
        &self,
        query: &ParseQuery,
    ) -> Result<Vec<T>, BaasError> {
        let url = self.class_url(query.class());
        debug!(
            event_name = "baas.query.find",
            class = query.class(),
            "querying hosted store"
        );

        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers())
            .query(&query.to_params())
            .send()
            .await?;

        let envelope: ResultsEnvelope<T> = decode(response).await?;
        Ok(envelope.results)
    }

    pub async fn first<T: DeserializeOwned>(
        &self,
        query: &ParseQuery,
    ) -> Result<Option<T>, BaasError> {
        let limited = query.clone().limit(1);
        Ok(self.find(&limited).await?.into_iter().next())
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        class: &str,
        object_id: &str,
    ) -> Result<Option<T>, BaasError> {
        let url = format!("{}/{object_id}", self.class_url(class));
        let response = self.http.get(&url).headers(self.auth_headers()).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(decode(response).await?))
    }

    pub async fn create(&self, class: &str, body: &Value) -> Result<String, BaasError> {
        let url = self.class_url(class);
        debug!(event_name = "baas.mutation.create", class, "creating object");

        let response =
            self.http.post(&url).headers(self.auth_headers()).json(body).send().await?;
        let created: CreatedEnvelope = decode(response).await?;
        Ok(created.object_id)
    }

    pub async fn update(
        &self,
        class: &str,
        object_id: &str,
        body: &Value,
    ) -> Result<(), BaasError> {
        let url = format!("{}/{object_id}", self.class_url(class));
        debug!(event_name = "baas.mutation.update", class, object_id, "updating object");

        let response =
            self.http.put(&url).headers(self.auth_headers()).json(body).send().await?;
        check_status(&response)?;
        // Drain the acknowledgement body ({"updatedAt": ...}).
        response.bytes().await?;
        Ok(())
    }

    fn class_url(&self, class: &str) -> String {
        format!("{}/classes/{class}", self.server_url)
    }

    fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = self.app_id.expose_secret().parse() {
            headers.insert("X-Parse-Application-Id", value);
        }
        if let Ok(value) = self.api_key.expose_secret().parse() {
            headers.insert("X-Parse-REST-API-Key", value);
        }
        headers
    }
}

fn check_status(response: &reqwest::Response) -> Result<(), BaasError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(BaasError::Status { status: status.as_u16(), body: String::new() })
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BaasError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(BaasError::Status { status: status.as_u16(), body });
    }

    serde_json::from_str(&body).map_err(|error| BaasError::Decode(error.to_string()))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use mabar_core::config::BaasConfig;

    use super::{BaasClient, CreatedEnvelope, ResultsEnvelope};

    fn config() -> BaasConfig {
        BaasConfig {
            server_url: "https://parseapi.back4app.com/".to_string(),
            app_id: SecretString::from("app".to_string()),
            api_key: SecretString::from("key".to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn class_url_strips_trailing_slash() {
        let client = BaasClient::from_config(&config()).expect("client builds");
        assert_eq!(
            client.class_url("Venue"),
            "https://parseapi.back4app.com/classes/Venue"
        );
    }

    #[test]
    fn auth_headers_carry_both_parse_keys() {
        let client = BaasClient::from_config(&config()).expect("client builds");
        let headers = client.auth_headers();
        assert_eq!(headers.get("X-Parse-Application-Id").map(|v| v.to_str().ok()), Some(Some("app")));
        assert_eq!(headers.get("X-Parse-REST-API-Key").map(|v| v.to_str().ok()), Some(Some("key")));
    }

    #[test]
    fn envelopes_decode_service_payloads() {
        let results: ResultsEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"results": [{"objectId": "abc"}]}"#).expect("decode");
        assert_eq!(results.results.len(), 1);

        let created: CreatedEnvelope =
            serde_json::from_str(r#"{"objectId": "xyz", "createdAt": "2025-01-01T00:00:00Z"}"#)
                .expect("decode");
        assert_eq!(created.object_id, "xyz");
    }
}
