// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Twilio Messaging and Lookup REST APIs.
//!
//! Twilio takes form-encoded request bodies, authenticates with HTTP basic
//! auth (account SID and auth token), and answers with JSON.

use std::time::Duration;

use parley_core::ParleyError;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use tracing::{debug, warn};

use crate::types::{ApiError, ApiMessage, LookupResponse, MessagePage, SendForm};

/// Base URL for the Messaging REST API.
pub const API_BASE_URL: &str = "https://api.twilio.com";

/// Base URL for the Lookup v2 API.
pub const LOOKUP_BASE_URL: &str = "https://lookups.twilio.com";

/// Page size ceiling Twilio accepts on list endpoints.
const MAX_PAGE_SIZE: u32 = 1000;

/// Low-level Twilio REST client for one account.
#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    api_base: String,
    lookup_base: String,
}

impl std::fmt::Debug for TwilioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioClient")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[redacted]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TwilioClient {
    /// Create a client. A `base_url` override replaces both API hosts.
    pub fn new(
        account_sid: String,
        auth_token: String,
        base_url: Option<String>,
    ) -> Result<Self, ParleyError> {
        if account_sid.is_empty() || auth_token.is_empty() {
            return Err(ParleyError::Configuration(
                "twilio requires account_id and auth_token".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ParleyError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        let (api_base, lookup_base) = match base_url {
            Some(url) => {
                let url = url.trim_end_matches('/').to_string();
                (url.clone(), url)
            }
            None => (API_BASE_URL.to_string(), LOOKUP_BASE_URL.to_string()),
        };

        Ok(Self {
            client,
            account_sid,
            auth_token,
            api_base,
            lookup_base,
        })
    }

    fn account_url(&self, suffix: &str) -> Result<Url, ParleyError> {
        parse_url(&format!(
            "{}/2010-04-01/Accounts/{}{suffix}",
            self.api_base, self.account_sid
        ))
    }

    /// Create a message resource.
    pub async fn create_message(&self, form: &SendForm<'_>) -> Result<ApiMessage, ParleyError> {
        let body = serde_urlencoded::to_string(form).map_err(|e| ParleyError::Provider {
            message: format!("failed to encode twilio form: {e}"),
            source: Some(Box::new(e)),
        })?;

        let response = self
            .client
            .post(self.account_url("/Messages.json")?)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let message: ApiMessage = parse_json(response).await?;
        debug!(sid = %message.sid, status = ?message.status, "twilio message created");
        Ok(message)
    }

    /// List message resources matching `filters`, newest first.
    ///
    /// Follows `next_page_uri` until `limit` messages are collected.
    pub async fn list_messages(
        &self,
        filters: &[(&str, &str)],
        limit: u32,
    ) -> Result<Vec<ApiMessage>, ParleyError> {
        let mut url = self.account_url("/Messages.json")?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters {
                query.append_pair(key, value);
            }
            query.append_pair("PageSize", &limit.clamp(1, MAX_PAGE_SIZE).to_string());
        }

        let mut collected = Vec::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            let response = self
                .client
                .get(page_url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .send()
                .await
                .map_err(transport_error)?;
            let page: MessagePage = parse_json(response).await?;
            collected.extend(page.messages);

            if collected.len() >= limit as usize {
                collected.truncate(limit as usize);
                break;
            }
            next = match page.next_page_uri {
                Some(uri) => Some(parse_url(&format!("{}{uri}", self.api_base))?),
                None => None,
            };
        }
        Ok(collected)
    }

    /// Fetch the account resource; the status code is the health signal.
    pub async fn fetch_account(&self) -> Result<StatusCode, ParleyError> {
        let response = self
            .client
            .get(self.account_url(".json")?)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status())
    }

    /// Caller name registered for `number`, if the Lookup API knows one.
    pub async fn lookup_caller_name(&self, number: &str) -> Result<Option<String>, ParleyError> {
        let mut url = parse_url(&format!("{}/v2/PhoneNumbers/{number}", self.lookup_base))?;
        url.query_pairs_mut().append_pair("Fields", "caller_name");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let lookup: LookupResponse = parse_json(response).await?;
        Ok(lookup
            .caller_name
            .and_then(|c| c.caller_name)
            .filter(|name| !name.trim().is_empty()))
    }
}

fn parse_url(raw: &str) -> Result<Url, ParleyError> {
    Url::parse(raw).map_err(|e| ParleyError::Configuration(format!("invalid twilio URL {raw}: {e}")))
}

fn transport_error(e: reqwest::Error) -> ParleyError {
    ParleyError::Provider {
        message: format!("twilio request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Decode a success body, or turn Twilio's error body into a provider error.
async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ParleyError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let message = match serde_json::from_str::<ApiError>(&body) {
            Ok(ApiError {
                code: Some(code),
                message,
            }) => format!("twilio returned {status} (code {code}): {message}"),
            Ok(ApiError { message, .. }) => format!("twilio returned {status}: {message}"),
            Err(_) => format!("twilio returned {status}: {body}"),
        };
        warn!(status = %status, "twilio API error");
        return Err(ParleyError::provider(message));
    }

    serde_json::from_str(&body).map_err(|e| ParleyError::Provider {
        message: format!("failed to parse twilio response: {e}"),
        source: Some(Box::new(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> TwilioClient {
        TwilioClient::new("AC123".into(), "token".into(), Some(server.uri())).unwrap()
    }

    #[test]
    fn missing_credentials_rejected() {
        let err = TwilioClient::new(String::new(), "t".into(), None).unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }

    #[tokio::test]
    async fn create_message_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15551234567"))
            .and(body_string_contains("Body=hello"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM100",
                "status": "queued",
                "direction": "outbound-api"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let form = SendForm {
            to: "+15551234567",
            from: Some("+15550000000"),
            messaging_service_sid: None,
            body: "hello",
            media_url: None,
        };
        let msg = client.create_message(&form).await.unwrap();
        assert_eq!(msg.sid, "SM100");
    }

    #[tokio::test]
    async fn api_error_body_surfaces_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let form = SendForm {
            to: "bogus",
            from: Some("+15550000000"),
            messaging_service_sid: None,
            body: "x",
            media_url: None,
        };
        let err = client.create_message(&form).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("21211"), "got: {text}");
    }

    #[tokio::test]
    async fn list_messages_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(query_param("Page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"sid": "SM3", "direction": "inbound"}],
                "next_page_uri": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(query_param("To", "+15551112222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [
                    {"sid": "SM1", "direction": "inbound"},
                    {"sid": "SM2", "direction": "inbound"}
                ],
                "next_page_uri": "/2010-04-01/Accounts/AC123/Messages.json?Page=1&PageSize=2"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let messages = client
            .list_messages(&[("To", "+15551112222")], 10)
            .await
            .unwrap();
        let sids: Vec<_> = messages.iter().map(|m| m.sid.as_str()).collect();
        assert_eq!(sids, vec!["SM1", "SM2", "SM3"]);
    }

    #[tokio::test]
    async fn lookup_returns_caller_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/PhoneNumbers/+15551112222"))
            .and(query_param("Fields", "caller_name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "phone_number": "+15551112222",
                "caller_name": {"caller_name": "ADA LOVELACE", "caller_type": "CONSUMER"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let name = client.lookup_caller_name("+15551112222").await.unwrap();
        assert_eq!(name.as_deref(), Some("ADA LOVELACE"));
    }

    #[tokio::test]
    async fn fetch_account_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client.fetch_account().await.unwrap(),
            StatusCode::UNAUTHORIZED
        );
    }
}
