//! HTTP client for the ProcesSieve API

use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Network client that connects to a running ProcesSieve server.
pub struct RemoteClient {
    http_base_url: String,
    http_client: Client,
}

impl RemoteClient {
    pub fn new(http_base_url: &str) -> Self {
        Self {
            http_base_url: http_base_url.trim_end_matches('/').to_string(),
            http_client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.http_base_url, path.trim_start_matches('/'))
    }

    pub async fn list(&self, path: &str) -> ClientResult<Value> {
        self.send(self.http_client.get(self.url(path))).await
    }

    pub async fn get(&self, path: &str, id: &str) -> ClientResult<Value> {
        self.send(self.http_client.get(self.url(&format!("{}/{}", path, id)))).await
    }

    pub async fn create(&self, path: &str, body: &Value) -> ClientResult<Value> {
        self.send(self.http_client.post(self.url(path)).json(body)).await
    }

    pub async fn delete(&self, path: &str, id: &str) -> ClientResult<Value> {
        self.send(self.http_client.delete(self.url(&format!("{}/{}", path, id)))).await
    }

    pub async fn evaluate_case(&self, id: &str) -> ClientResult<Value> {
        self.send(self.http_client.post(self.url(&format!("case/{}/evaluate", id)))).await
    }

    pub async fn rank(&self, text: &str, kind: &str, include_draft: bool) -> ClientResult<Value> {
        let body = json!({ "text": text, "kind": kind, "include_draft": include_draft });
        self.send(self.http_client.post(self.url("sieve/rank")).json(&body)).await
    }

    pub async fn status(&self) -> ClientResult<Value> {
        self.send(self.http_client.get(self.url("status"))).await
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.is_success() {
            Ok(body)
        } else {
            let msg = body
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            Err(format!("{} ({})", msg, status.as_u16()).into())
        }
    }
}
