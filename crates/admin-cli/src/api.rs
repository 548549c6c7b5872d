//! Thin client for the admin HTTP API

use anyhow::{anyhow, bail, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    BulkSendRequest, BulkSendResponse, Guest, GuestSummary, LoginRequest, LoginResponse,
    MessageLog, MessageTemplate, SendMessageRequest, SessionInfo,
};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    field: Option<String>,
}

/// Turns an error response body into a readable message
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.field {
            Some(field) => format!("{} ({}): {}", envelope.error.code, field, envelope.error.message),
            None => format!("{}: {}", envelope.error.code, envelope.error.message),
        },
        Err(_) if body.trim().is_empty() => format!("server returned {}", status),
        Err(_) => format!("server returned {}: {}", status, body.trim()),
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            bail!("Not logged in or session expired. Run 'wedding-admin login'.");
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!(describe_error(status, &body)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_filtered(path, &[]).await
    }

    /// GET with url-encoded query parameters
    async fn get_filtered<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self.filtered_request(path, query).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn filtered_request(&self, path: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let builder = self.request(Method::GET, path);
        if query.is_empty() {
            builder
        } else {
            builder.query(query)
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/api/admin/login", &body).await
    }

    pub async fn logout(&self) -> Result<()> {
        let response = self.request(Method::POST, "/api/admin/logout").send().await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn session(&self) -> Result<SessionInfo> {
        self.get("/api/admin/session").await
    }

    pub async fn list_guests(&self, status: Option<&str>) -> Result<Vec<Guest>> {
        let query: Vec<(&str, &str)> = status.map(|s| ("status", s)).into_iter().collect();
        self.get_filtered("/api/admin/guests", &query).await
    }

    pub async fn get_guest(&self, id: &str) -> Result<Guest> {
        self.get(&format!("/api/admin/guests/{}", id)).await
    }

    pub async fn summary(&self) -> Result<GuestSummary> {
        self.get("/api/admin/guests/summary").await
    }

    pub async fn send(&self, request: &SendMessageRequest) -> Result<MessageLog> {
        self.post("/api/admin/messages/send", request).await
    }

    pub async fn bulk(&self, request: &BulkSendRequest) -> Result<BulkSendResponse> {
        self.post("/api/admin/messages/bulk", request).await
    }

    pub async fn templates(&self) -> Result<Vec<MessageTemplate>> {
        self.get("/api/admin/templates").await
    }

    pub async fn history(&self, guest_id: Option<&str>) -> Result<Vec<MessageLog>> {
        let query: Vec<(&str, &str)> = guest_id.map(|id| ("guest_id", id)).into_iter().collect();
        self.get_filtered("/api/admin/messages", &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_describe_error_envelope() {
        let body = r#"{"error":{"code":"validation_error","message":"Email is required","field":"email"}}"#;
        assert_eq!(
            describe_error(StatusCode::UNPROCESSABLE_ENTITY, body),
            "validation_error (email): Email is required"
        );

        let body = r#"{"error":{"code":"conflict","message":"Already exists"}}"#;
        assert_eq!(describe_error(StatusCode::CONFLICT, body), "conflict: Already exists");
    }

    #[test]
    fn test_describe_error_plain_body() {
        assert_eq!(
            describe_error(StatusCode::BAD_GATEWAY, ""),
            "server returned 502 Bad Gateway"
        );
        assert_eq!(
            describe_error(StatusCode::NOT_FOUND, "nope\n"),
            "server returned 404 Not Found: nope"
        );
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", None);
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_query_values_are_encoded() {
        let client = ApiClient::new("http://localhost:8080", Some("t".to_string()));
        let request = client
            .filtered_request("/api/admin/messages", &[("guest_id", "a&status=declined #1")])
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/api/admin/messages");
        assert_eq!(request.url().query(), Some("guest_id=a%26status%3Ddeclined+%231"));
        let pairs: Vec<_> = request.url().query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "a&status=declined #1");

        let request = client.filtered_request("/api/admin/guests", &[]).build().unwrap();
        assert_eq!(request.url().query(), None);
    }
}
