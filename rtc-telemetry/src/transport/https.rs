use super::{Ack, Transport, TransportKind};
use crate::config::TelemetryConfig;
use crate::error::{Error, Result};
use crate::upload::UploadPayload;
use log::{debug, error};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

const CONTENT_TYPE_JSON: &str = "application/json;charset=UTF-8";
const API_KEY_HEADER: &str = "apikey";

#[derive(Serialize)]
struct RunRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest<'a> {
    data: &'a UploadPayload,
    is_last_chunk: bool,
}

/// JSON-over-HTTPS client of the remote collector API.
///
/// - `POST {api_url}tests/remote/run` creates the test run
/// - `POST {api_url}testruns/remote/{run}/stats` uploads a chunk
pub struct HttpsTransport {
    client: Client,
    api_url: String,
    test_run_id: Option<String>,
}

impl HttpsTransport {
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        if config.transport != TransportKind::Https {
            return Err(Error::ErrTransportNotImplemented(
                config.transport.to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&config.api_key)
                .map_err(|e| Error::ErrTransport(e.to_string()))?,
        );

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            test_run_id: None,
        })
    }

    pub fn test_run_id(&self) -> Option<&str> {
        self.test_run_id.as_deref()
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .client
            .post(&url)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            error!("{} answered {}", url, response.status());
            return Err(Error::ErrTransport(format!(
                "Error querying API. Status: {}",
                response.status().as_u16()
            )));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

impl Transport for HttpsTransport {
    async fn init(&mut self, run_name: &str) -> Result<String> {
        let response = self
            .post("tests/remote/run", &RunRequest { name: run_name })
            .await?;

        let test_run_id = match response.get("testRunId") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(Error::ErrNoTestRunId),
        };
        debug!("created test run {}", test_run_id);

        self.test_run_id = Some(test_run_id.clone());
        Ok(test_run_id)
    }

    async fn upload(&mut self, payload: &UploadPayload, is_last_chunk: bool) -> Result<Ack> {
        let Some(test_run_id) = self.test_run_id.as_deref() else {
            return Err(Error::ErrNoTestRunId);
        };

        let path = format!("testruns/remote/{test_run_id}/stats");
        let body = self
            .post(
                &path,
                &UploadRequest {
                    data: payload,
                    is_last_chunk,
                },
            )
            .await?;

        Ok(Ack { body })
    }
}
