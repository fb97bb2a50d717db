use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::adapter::{RestRequest, RestTransport};
use super::error::RemoteError;

#[derive(Debug, Clone)]
pub struct HttpRestConfig {
    pub base_url: String,
    pub token: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

/// REST transport for `2.0` backends: bearer-token JSON over HTTP.
#[derive(Clone)]
pub struct HttpRestTransport {
    client: Client,
    config: HttpRestConfig,
}

impl HttpRestTransport {
    pub fn new(config: HttpRestConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// `{base}/rest/[{storeview}/]V1/{path}`
    fn url(&self, request: &RestRequest) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match &request.storeview {
            Some(store) => format!("{base}/rest/{store}/V1/{}", request.path),
            None => format!("{base}/rest/V1/{}", request.path),
        }
    }

    async fn request_with_retry(&self, request: &RestRequest) -> Result<Value, RemoteError> {
        let url = self.url(request);
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_secs = std::cmp::min(1u64 << attempt, 30);
                tracing::warn!(attempt, backoff_secs, url = %url, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .bearer_auth(&self.config.token)
                .query(&request.query);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(RemoteError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                let body = response.text().await?;
                if body.trim().is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str(&body)
                    .map_err(|e| RemoteError::Decode(format!("invalid JSON from {url}: {e}")));
            }

            // Honor Retry-After header for 429
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, 60);
                    tracing::warn!(wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            // Fail fast on other 4xx
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::HttpError { status, body });
        }

        Err(RemoteError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }
}

#[async_trait]
impl RestTransport for HttpRestTransport {
    async fn send(&self, request: RestRequest) -> Result<Value, RemoteError> {
        self.request_with_retry(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> HttpRestConfig {
        HttpRestConfig {
            base_url: base_url.to_string(),
            token: "integration-token".to_string(),
            max_retries: 2,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/V1/categories"))
            .and(query_param("depth", "1"))
            .and(header("Authorization", "Bearer integration-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpRestTransport::new(test_config(&server.uri())).unwrap();
        let body = transport
            .send(RestRequest::get("categories").query("depth", 1))
            .await
            .unwrap();
        assert_eq!(body, json!({ "id": 2 }));
    }

    #[tokio::test]
    async fn storeview_scopes_the_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/fr/V1/categories/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpRestTransport::new(test_config(&server.uri())).unwrap();
        transport
            .send(RestRequest::get("categories/5").storeview(Some("fr")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/rest/V1/categories/5/move"))
            .and(body_json(json!({ "parent_id": 2, "after_id": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpRestTransport::new(test_config(&server.uri())).unwrap();
        let ack = transport
            .send(RestRequest::put(
                "categories/5/move",
                json!({ "parent_id": 2, "after_id": 7 }),
            ))
            .await
            .unwrap();
        assert_eq!(ack, json!(true));
    }

    #[tokio::test]
    async fn retries_on_500() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/V1/categories/5"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/V1/categories/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5 })))
            .mount(&server)
            .await;

        let transport = HttpRestTransport::new(test_config(&server.uri())).unwrap();
        let body = transport
            .send(RestRequest::get("categories/5"))
            .await
            .unwrap();
        assert_eq!(body["id"], 5);
    }

    #[tokio::test]
    async fn fails_fast_on_404() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/V1/categories/99"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such entity"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpRestTransport::new(test_config(&server.uri())).unwrap();
        let err = transport
            .send(RestRequest::get("categories/99"))
            .await
            .unwrap_err();
        match err {
            RemoteError::HttpError { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "no such entity");
            }
            other => panic!("expected HttpError, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn max_retries_exceeded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/V1/categories"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.max_retries = 1;
        let transport = HttpRestTransport::new(config).unwrap();

        let err = transport
            .send(RestRequest::get("categories"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MaxRetriesExceeded { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/rest/V1/categories/5/move"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = HttpRestTransport::new(test_config(&server.uri())).unwrap();
        let body = transport
            .send(RestRequest::put("categories/5/move", json!({})))
            .await
            .unwrap();
        assert_eq!(body, Value::Null);
    }
}
