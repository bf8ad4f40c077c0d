//! HTTP Client Bindings
//!
//! Concrete implementations of the service client traits against the
//! control plane's JSON API. This is the only module that knows about
//! the wire protocol; everything above it works through the traits.

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::clients::{
    DeploymentClient, DeploymentDescriptor, IdentityClient, InvocationClient,
    InvocationResponse, LineStream, ResponseBody, EVENT_STREAM_CONTENT_TYPE,
};
use crate::error::ClientError;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Shared HTTP transport for the control plane API.
#[derive(Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::unwrap_envelope(path, response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::unwrap_envelope(path, response).await
    }

    async fn put<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.client.put(self.url(path)).json(body).send().await?;
        Self::unwrap_envelope(path, response).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.client.delete(self.url(path)).send().await?;
        Self::unwrap_envelope(path, response).await
    }

    /// POST returning the raw response, for endpoints that do not use
    /// the envelope (runtime invocation).
    async fn post_raw(&self, path: &str, body: Vec<u8>) -> Result<reqwest::Response, ClientError> {
        let response = self.client.post(self.url(path)).body(body).send().await?;
        Ok(response)
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path.to_string()));
        }
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            return Err(ClientError::Unsupported(path.to_string()));
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if !body.success {
            return Err(match body.error {
                Some(err) if err.code == "NOT_FOUND" => ClientError::NotFound(err.message),
                Some(err) if err.code == "UNSUPPORTED" => ClientError::Unsupported(err.message),
                Some(err) => ClientError::Api {
                    code: err.code,
                    message: err.message,
                },
                None => ClientError::Api {
                    code: status.as_u16().to_string(),
                    message: format!("request to {} failed", path),
                },
            });
        }

        body.data
            .ok_or_else(|| ClientError::Decode(format!("empty response from {}", path)))
    }
}

#[derive(Debug, Deserialize)]
struct IdentityPayload {
    arn: String,
}

/// Identity service over HTTP.
pub struct HttpIdentityClient {
    api: ServiceClient,
}

impl HttpIdentityClient {
    pub fn new(api: ServiceClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn get_identity(&self, name: &str) -> Result<Option<String>, ClientError> {
        match self
            .api
            .get::<IdentityPayload>(&format!("/identities/{}", name))
            .await
        {
            Ok(payload) => Ok(Some(payload.arn)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_identity(
        &self,
        name: &str,
        trust_policy: &Value,
    ) -> Result<String, ClientError> {
        let payload: IdentityPayload = self
            .api
            .post(
                "/identities",
                &serde_json::json!({ "name": name, "trust_policy": trust_policy }),
            )
            .await?;
        Ok(payload.arn)
    }

    async fn attach_policy(
        &self,
        name: &str,
        policy_name: &str,
        document: &Value,
    ) -> Result<(), ClientError> {
        let _: Value = self
            .api
            .put(
                &format!("/identities/{}/policies/{}", name, policy_name),
                &serde_json::json!({ "document": document }),
            )
            .await?;
        Ok(())
    }

    async fn list_inline_policies(&self, name: &str) -> Result<Vec<String>, ClientError> {
        self.api
            .get(&format!("/identities/{}/policies", name))
            .await
    }

    async fn detach_policy(&self, name: &str, policy_name: &str) -> Result<(), ClientError> {
        let _: Value = self
            .api
            .delete(&format!("/identities/{}/policies/{}", name, policy_name))
            .await?;
        Ok(())
    }

    async fn delete_identity(&self, name: &str) -> Result<(), ClientError> {
        let _: Value = self.api.delete(&format!("/identities/{}", name)).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LaunchPayload {
    runtime_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

#[derive(Default)]
struct DeploySession {
    agent_name: Option<String>,
    runtime_id: Option<String>,
}

/// Deployment service over HTTP. Holds the configure-then-launch
/// session state the remote contract requires.
pub struct HttpDeploymentClient {
    api: ServiceClient,
    session: Mutex<DeploySession>,
}

impl HttpDeploymentClient {
    pub fn new(api: ServiceClient) -> Self {
        Self {
            api,
            session: Mutex::new(DeploySession::default()),
        }
    }
}

#[async_trait]
impl DeploymentClient for HttpDeploymentClient {
    async fn configure(&self, descriptor: &DeploymentDescriptor) -> Result<(), ClientError> {
        let _: Value = self.api.post("/runtimes", descriptor).await?;
        self.session.lock().agent_name = Some(descriptor.agent_name.clone());
        Ok(())
    }

    async fn launch(&self) -> Result<String, ClientError> {
        let agent_name = self
            .session
            .lock()
            .agent_name
            .clone()
            .ok_or_else(|| ClientError::Api {
                code: "NOT_CONFIGURED".to_string(),
                message: "launch called before configure".to_string(),
            })?;

        let payload: LaunchPayload = self
            .api
            .post(
                &format!("/runtimes/{}/launch", agent_name),
                &serde_json::json!({}),
            )
            .await?;
        self.session.lock().runtime_id = Some(payload.runtime_id.clone());
        Ok(payload.runtime_id)
    }

    async fn status(&self) -> Result<String, ClientError> {
        let runtime_id = self
            .session
            .lock()
            .runtime_id
            .clone()
            .ok_or_else(|| ClientError::Api {
                code: "NOT_LAUNCHED".to_string(),
                message: "status called before launch".to_string(),
            })?;

        let payload: StatusPayload = self
            .api
            .get(&format!("/runtimes/{}/status", runtime_id))
            .await?;
        Ok(payload.status)
    }

    async fn delete_runtime(&self, agent_name: &str) -> Result<(), ClientError> {
        let _: Value = self.api.delete(&format!("/runtimes/{}", agent_name)).await?;
        Ok(())
    }
}

/// Invocation service over HTTP.
pub struct HttpInvocationClient {
    api: ServiceClient,
}

impl HttpInvocationClient {
    pub fn new(api: ServiceClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl InvocationClient for HttpInvocationClient {
    async fn invoke(
        &self,
        runtime_id: &str,
        qualifier: &str,
        payload: Vec<u8>,
    ) -> Result<InvocationResponse, ClientError> {
        let response = self
            .api
            .post_raw(
                &format!("/runtimes/{}/invocations?qualifier={}", runtime_id, qualifier),
                payload,
            )
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(runtime_id.to_string()));
        }
        if !status.is_success() {
            return Err(ClientError::Api {
                code: status.as_u16().to_string(),
                message: format!("invocation of {} failed", runtime_id),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = if content_type.contains(EVENT_STREAM_CONTENT_TYPE) {
            // Hand the body over lazily; the consumer sees each line
            // as soon as its chunk arrives, not at end of body
            ResponseBody::EventStream(lines_from_chunks(response.bytes_stream()))
        } else {
            let value: Value = response
                .json()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()))?;
            let events = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| serde_json::to_vec(&item).unwrap_or_default())
                    .collect(),
                other => vec![serde_json::to_vec(&other).unwrap_or_default()],
            };
            ResponseBody::Events(events)
        };

        Ok(InvocationResponse { content_type, body })
    }
}

/// Split a chunked byte stream into lines as the chunks arrive. A
/// partial line is buffered until its terminator shows up; whatever
/// is still buffered when the upstream ends is flushed as a final
/// line. A transport error mid-stream ends the sequence after the
/// flush.
fn lines_from_chunks<S, B, E>(chunks: S) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    chunks
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan((String::new(), false), |(buffer, done), chunk| {
            if *done {
                return future::ready(None);
            }
            let mut lines = Vec::new();
            match chunk {
                Some(Ok(chunk)) => {
                    buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
                    while let Some(pos) = buffer.find('\n') {
                        lines.push(buffer[..pos].trim_end_matches('\r').to_string());
                        buffer.drain(..=pos);
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Event stream interrupted");
                    *done = true;
                    if !buffer.is_empty() {
                        lines.push(std::mem::take(buffer));
                    }
                }
                None => {
                    *done = true;
                    if !buffer.is_empty() {
                        lines.push(std::mem::take(buffer));
                    }
                }
            }
            future::ready(Some(lines))
        })
        .map(stream::iter)
        .flatten()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Result<Vec<u8>, String> {
        Ok(text.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_lines_reassembled_across_chunk_boundaries() {
        let chunks = stream::iter(vec![
            chunk("data: Hel"),
            chunk("lo\ndata: Hello, "),
            chunk("world\n"),
        ]);
        let lines: Vec<String> = lines_from_chunks(chunks).collect().await;
        assert_eq!(lines, vec!["data: Hello", "data: Hello, world"]);
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_flushed() {
        let chunks = stream::iter(vec![chunk("data: A\ndata: B")]);
        let lines: Vec<String> = lines_from_chunks(chunks).collect().await;
        assert_eq!(lines, vec!["data: A", "data: B"]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_the_stream() {
        let chunks = stream::iter(vec![
            chunk("data: A\n"),
            Err("connection reset".to_string()),
            chunk("data: B\n"),
        ]);
        let lines: Vec<String> = lines_from_chunks(chunks).collect().await;
        assert_eq!(lines, vec!["data: A"]);
    }
}
