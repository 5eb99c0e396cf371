//! Client for the external DCM locker controller api.
//!
//! The controller mints access tokens that open a physical locker
//! compartment. This client is deliberately thin: no retries, no caching.
//! A non-success status is returned as `ServiceError::Upstream` with the
//! response body as context, a response that does not match the expected
//! token schema as `ServiceError::UpstreamSchema`.

use chrono::{DateTime, Utc};
use log::error;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct DcmClient {
    client: Client,
    base_url: String,
    api_token: String,
}

/// Payload for minting a new locker token.
#[derive(Debug, PartialEq, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDcmToken {
    pub id_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_box: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Full token record as returned by the controller.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DcmToken {
    pub id_locker: u64,
    pub id_size: u64,
    pub id_box: u64,
    pub token1: String,
    pub created_at: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub uses: u32,
    pub confirmed: bool,
    pub mode: String,
}

impl DcmClient {
    /// Create a new client from the environment configuration.
    pub fn new() -> Self {
        Self::with_base_url(env::DCM_BASE_URL.clone(), env::DCM_API_TOKEN.clone())
    }

    pub fn with_base_url(base_url: String, api_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_token,
        }
    }

    /// Mint a token for the given locker serie.
    ///
    /// The controller answers with the token identifier as plain text.
    pub async fn create_token(
        &self,
        locker_serie: u64,
        token: &CreateDcmToken,
    ) -> ServiceResult<String> {
        let url = format!("{}/api/v2/token/{}", self.base_url, locker_serie);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("DCM token creation for locker {locker_serie} failed with {status}: {body}");
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body.trim().to_owned())
    }

    /// Fetch the full token record for the given locker serie and token
    /// identifier and validate it against the token schema.
    pub async fn get_token(&self, locker_serie: u64, token1: &str) -> ServiceResult<DcmToken> {
        let url = format!("{}/api/v2/token/{}/{}", self.base_url, locker_serie, token1);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("DCM token lookup for locker {locker_serie} failed with {status}: {body}");
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<DcmToken>(&body)
            .map_err(|err| ServiceError::UpstreamSchema(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_JSON: &str = r#"{
        "idLocker": 17,
        "idSize": 3,
        "idBox": 42,
        "token1": "A1B2C3",
        "createdAt": "2024-03-01T10:00:00Z",
        "startAt": "2024-03-01T10:00:00Z",
        "endAt": null,
        "uses": 1,
        "confirmed": true,
        "mode": "rental"
    }"#;

    #[test]
    fn token_record_parses_completely() {
        let token: DcmToken = serde_json::from_str(TOKEN_JSON).unwrap();
        assert_eq!(token.id_locker, 17);
        assert_eq!(token.id_size, 3);
        assert_eq!(token.id_box, 42);
        assert_eq!(token.token1, "A1B2C3");
        assert_eq!(token.uses, 1);
        assert!(token.confirmed);
        assert_eq!(token.mode, "rental");
        assert_eq!(token.end_at, None);
    }

    #[test]
    fn token_record_with_missing_field_is_rejected() {
        // no partially populated record, a missing field fails the parse
        let body = r#"{"idLocker": 17, "idSize": 3, "token1": "A1B2C3"}"#;
        assert!(serde_json::from_str::<DcmToken>(body).is_err());
    }

    #[test]
    fn token_record_with_wrong_type_is_rejected() {
        let body = TOKEN_JSON.replace("\"idBox\": 42", "\"idBox\": \"42\"");
        assert!(serde_json::from_str::<DcmToken>(&body).is_err());
    }

    #[test]
    fn create_payload_omits_unset_fields() {
        let payload = CreateDcmToken {
            id_size: 3,
            id_box: None,
            start_at: None,
            end_at: None,
            max_uses: None,
            confirmed: None,
            mode: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({ "idSize": 3 }));
    }
}
