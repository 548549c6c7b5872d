use async_trait::async_trait;
use serde::Deserialize;

use super::{DispatchReceipt, MessageTransport, TransportError};
use crate::config::MessagingCredentials;

/// WhatsApp delivery through Twilio's Programmable Messaging REST API
pub struct TwilioTransport {
    client: reqwest::Client,
    credentials: MessagingCredentials,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

impl TwilioTransport {
    pub fn new(credentials: MessagingCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.credentials.api_base, self.credentials.account_sid
        )
    }
}

/// `whatsapp:+<digits>` from a number that may carry separators or the prefix already
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    let number = number.strip_prefix("whatsapp:").unwrap_or(number);
    let digits: String = number.chars().filter(char::is_ascii_digit).collect();
    format!("whatsapp:+{}", digits)
}

#[async_trait]
impl MessageTransport for TwilioTransport {
    async fn send(&self, to: &str, body: &str) -> Result<DispatchReceipt, TransportError> {
        let from = whatsapp_address(&self.credentials.whatsapp_number);
        let to = whatsapp_address(to);
        tracing::debug!("Dispatching WhatsApp message {} -> {}", from, to);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[("From", from.as_str()), ("To", to.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResource>(&text) {
                Ok(ErrorResource { message, code: Some(code) }) => format!("{} (code {})", message, code),
                Ok(ErrorResource { message, code: None }) => message,
                Err(_) if text.trim().is_empty() => format!("HTTP {}", status),
                Err(_) => text,
            };
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("unreadable response: {}", e)))?;
        Ok(DispatchReceipt {
            provider_message_id: resource.sid,
            status: resource.status,
        })
    }
}
