//! Outbound WhatsApp messaging: transport seam, delivery logging, bulk send.

use async_trait::async_trait;
use shared::{
    rsvp::validate_phone, template, BulkSendResponse, BulkSendResult, DeliveryOutcome, MessageLog,
};
use thiserror::Error;

use crate::{
    db::{Database, NewMessageLog},
    error::{AppError, Result},
};

mod twilio;

pub use twilio::TwilioTransport;

/// Status recorded for a dispatch that never reached the provider or was rejected
pub const FAILED_STATUS: &str = "failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub provider_message_id: String,
    pub status: String,
}

#[derive(Error, Debug)]
pub enum TransportError {
    /// The provider answered with an error, carrying its own message
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("could not reach messaging provider: {0}")]
    Network(String),
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Sends `body` to a WhatsApp number in E.164 form
    async fn send(&self, to: &str, body: &str) -> Result<DispatchReceipt, TransportError>;
}

/// Template body if a template id is given, else the literal message
pub async fn resolve_body(
    db: &Database,
    message: Option<&str>,
    template_id: Option<&str>,
) -> Result<String> {
    if let Some(id) = template_id.filter(|id| !id.trim().is_empty()) {
        let template = db
            .get_template(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template {} not found", id)))?;
        return Ok(template.body);
    }
    match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => Ok(message.to_string()),
        None => Err(AppError::validation("message", "A message or template is required")),
    }
}

/// Dispatches one message and records exactly one log row for it
pub async fn dispatch_and_log(
    db: &Database,
    transport: &dyn MessageTransport,
    guest_id: Option<&str>,
    to: &str,
    body: &str,
) -> Result<(MessageLog, Option<TransportError>)> {
    let outcome = transport.send(to, body).await;
    let log = record_dispatch(db, guest_id, to, body, &outcome).await?;
    Ok((log, outcome.err()))
}

async fn record_dispatch(
    db: &Database,
    guest_id: Option<&str>,
    to: &str,
    body: &str,
    outcome: &Result<DispatchReceipt, TransportError>,
) -> Result<MessageLog> {
    let (status, provider_message_id, error) = match outcome {
        Ok(receipt) => (receipt.status.clone(), Some(receipt.provider_message_id.clone()), None),
        Err(e) => (FAILED_STATUS.to_string(), None, Some(e.to_string())),
    };

    let log = db
        .insert_message_log(&NewMessageLog {
            guest_id: guest_id.map(str::to_string),
            recipient: to.to_string(),
            body: body.to_string(),
            status,
            provider_message_id,
            error,
        })
        .await?;

    match outcome {
        Ok(_) => tracing::info!("Message {} sent to {}", log.id, to),
        Err(e) => tracing::error!("Message to {} failed: {}", to, e),
    }
    Ok(log)
}

/// Single send. A transport failure is logged, then surfaced as an upstream error.
pub async fn send_one(
    db: &Database,
    transport: &dyn MessageTransport,
    guest_id: Option<&str>,
    to: &str,
    body: &str,
) -> Result<MessageLog> {
    let to = to.trim();
    if to.is_empty() {
        return Err(AppError::validation("phone", "A phone number is required"));
    }
    validate_phone("phone", to)?;
    match dispatch_and_log(db, transport, guest_id, to, body).await? {
        (log, None) => Ok(log),
        (_, Some(e)) => Err(AppError::Upstream {
            service: "messaging",
            message: e.to_string(),
        }),
    }
}

/// Personalizes and sends `body` to each guest in order.
///
/// Guests without a WhatsApp number are skipped and unknown ids are reported as
/// not found. Every guest gets a result: a failed dispatch or a database error
/// is recorded against that guest and the loop moves on.
pub async fn send_bulk(
    db: &Database,
    transport: &dyn MessageTransport,
    guest_ids: &[String],
    body: &str,
) -> Result<BulkSendResponse> {
    let mut results = Vec::with_capacity(guest_ids.len());
    for guest_id in guest_ids {
        results.push(send_to_guest(db, transport, guest_id, body).await);
    }

    let response = BulkSendResponse::from_results(results);
    tracing::info!(
        "Bulk send finished: {} sent, {} failed, {} skipped",
        response.sent,
        response.failed,
        response.skipped
    );
    Ok(response)
}

async fn send_to_guest(
    db: &Database,
    transport: &dyn MessageTransport,
    guest_id: &str,
    body: &str,
) -> BulkSendResult {
    let result = |guest_name: Option<String>,
                  outcome: DeliveryOutcome,
                  log_id: Option<String>,
                  detail: Option<String>| BulkSendResult {
        guest_id: guest_id.to_string(),
        guest_name,
        outcome,
        log_id,
        detail,
    };

    let guest = match db.get_guest(guest_id).await {
        Ok(Some(guest)) => guest,
        Ok(None) => {
            tracing::warn!("Bulk send: guest {} not found", guest_id);
            return result(None, DeliveryOutcome::NotFound, None, Some("Guest not found".to_string()));
        }
        Err(e) => {
            tracing::error!("Bulk send: could not load guest {}: {}", guest_id, e);
            return result(None, DeliveryOutcome::Failed, None, Some("Could not load guest".to_string()));
        }
    };
    let name = Some(guest.full_name());

    let Some(number) = guest.whatsapp().map(str::to_string) else {
        tracing::warn!("Bulk send: skipping {} without a WhatsApp number", guest.full_name());
        return result(name, DeliveryOutcome::Skipped, None, Some("No WhatsApp number".to_string()));
    };

    let rendered = template::render(body, &guest);
    let outcome = transport.send(&number, &rendered).await;
    let logged = record_dispatch(db, Some(&guest.id), &number, &rendered, &outcome).await;

    match (outcome, logged) {
        (Ok(_), Ok(log)) => result(name, DeliveryOutcome::Sent, Some(log.id), None),
        // The provider accepted it, so it must not be reported as failed and resent
        (Ok(_), Err(e)) => {
            tracing::error!("Bulk send: message to {} sent but not logged: {}", guest.id, e);
            result(
                name,
                DeliveryOutcome::Sent,
                None,
                Some("Sent, but the message log could not be saved".to_string()),
            )
        }
        (Err(failure), Ok(log)) => result(name, DeliveryOutcome::Failed, Some(log.id), Some(failure.to_string())),
        (Err(failure), Err(e)) => {
            tracing::error!("Bulk send: failed message to {} not logged: {}", guest.id, e);
            result(name, DeliveryOutcome::Failed, None, Some(failure.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Records every send; numbers listed in `reject` fail with a provider error
    #[derive(Default)]
    pub struct FakeTransport {
        pub sent: Mutex<Vec<(String, String)>>,
        pub reject: Vec<String>,
    }

    impl FakeTransport {
        pub fn rejecting(numbers: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                reject: numbers.iter().map(|n| n.to_string()).collect(),
            }
        }

        pub fn attempts(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MessageTransport for FakeTransport {
        async fn send(&self, to: &str, body: &str) -> Result<DispatchReceipt, TransportError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((to.to_string(), body.to_string()));
            if self.reject.iter().any(|n| n == to) {
                return Err(TransportError::Rejected {
                    status: 400,
                    message: "The 'To' number is not a valid WhatsApp number".to_string(),
                });
            }
            Ok(DispatchReceipt {
                provider_message_id: format!("SM{}", sent.len()),
                status: "queued".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTransport;
    use super::*;
    use shared::{Guest, RsvpStatus, TravelDetails};

    fn guest(id: &str, first: &str, whatsapp: Option<&str>) -> Guest {
        Guest {
            id: id.to_string(),
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            email: format!("{}@example.com", id),
            phone: None,
            whatsapp_number: whatsapp.map(str::to_string),
            adult_count: 1,
            kid_count: 0,
            rsvp_status: RsvpStatus::Attending,
            requires_accommodation: false,
            travel: TravelDetails::default(),
            room_number: None,
            id_document_urls: Vec::new(),
            notes: None,
            step1_completed: true,
            step2_completed: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_bulk_skips_guest_without_whatsapp() {
        let db = Database::in_memory().await;
        db.insert_guest(&guest("g1", "Ana", Some("+15550001"))).await.unwrap();
        db.insert_guest(&guest("g2", "Ben", None)).await.unwrap();
        db.insert_guest(&guest("g3", "Cy", Some("+15550003"))).await.unwrap();
        let transport = FakeTransport::default();

        let ids: Vec<String> = ["g1", "g2", "g3"].iter().map(|s| s.to_string()).collect();
        let response = send_bulk(&db, &transport, &ids, "Hi {{firstName}}").await.unwrap();

        assert_eq!(transport.attempts(), 2);
        assert_eq!((response.sent, response.failed, response.skipped), (2, 0, 1));
        assert_eq!(response.results[1].outcome, DeliveryOutcome::Skipped);
        assert_eq!(transport.sent.lock().unwrap()[1].1, "Hi Cy");
        assert_eq!(db.list_message_logs(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_continues_after_failure_and_unknown_id() {
        let db = Database::in_memory().await;
        db.insert_guest(&guest("g1", "Ana", Some("+15550001"))).await.unwrap();
        db.insert_guest(&guest("g2", "Ben", Some("+15550002"))).await.unwrap();
        let transport = FakeTransport::rejecting(&["+15550001"]);

        let ids: Vec<String> = ["g1", "ghost", "g2"].iter().map(|s| s.to_string()).collect();
        let response = send_bulk(&db, &transport, &ids, "Hello").await.unwrap();

        let outcomes: Vec<DeliveryOutcome> = response.results.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![DeliveryOutcome::Failed, DeliveryOutcome::NotFound, DeliveryOutcome::Sent]
        );
        assert_eq!(response.failed, 1);

        let failed = db.list_message_logs(Some("g1")).await.unwrap();
        assert_eq!(failed[0].status, FAILED_STATUS);
        assert!(failed[0].error.as_deref().unwrap().contains("not a valid"));
    }

    #[tokio::test]
    async fn test_bulk_reports_every_guest_when_logging_fails() {
        let db = Database::in_memory().await;
        db.insert_guest(&guest("g1", "Ana", Some("+15550001"))).await.unwrap();
        db.insert_guest(&guest("g2", "Ben", Some("+15550002"))).await.unwrap();
        db.drop_table("message_logs").await;
        let transport = FakeTransport::default();

        let ids: Vec<String> = ["g1", "g2"].iter().map(|s| s.to_string()).collect();
        let response = send_bulk(&db, &transport, &ids, "Hello").await.unwrap();

        assert_eq!(transport.attempts(), 2);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.sent, 2);
        assert!(response.results.iter().all(|r| r.log_id.is_none()));
        assert!(response.results[0].detail.as_deref().unwrap().contains("could not be saved"));
    }

    #[tokio::test]
    async fn test_bulk_records_guest_lookup_failure() {
        let db = Database::in_memory().await;
        db.drop_table("message_logs").await;
        db.drop_table("guests").await;
        let transport = FakeTransport::default();

        let ids: Vec<String> = ["g1", "g2"].iter().map(|s| s.to_string()).collect();
        let response = send_bulk(&db, &transport, &ids, "Hello").await.unwrap();

        assert_eq!(transport.attempts(), 0);
        assert_eq!(response.failed, 2);
        assert_eq!(response.results[1].guest_id, "g2");
        assert_eq!(response.results[1].outcome, DeliveryOutcome::Failed);
    }

    #[tokio::test]
    async fn test_send_one_logs_failure_then_errors() {
        let db = Database::in_memory().await;
        let transport = FakeTransport::rejecting(&["+15550009"]);

        let err = send_one(&db, &transport, None, "+15550009", "Hi").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        let logs = db.list_message_logs(None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, FAILED_STATUS);

        let log = send_one(&db, &transport, None, " +15550001 ", "Hi").await.unwrap();
        assert_eq!(log.status, "queued");
        assert_eq!(log.recipient, "+15550001");
    }

    #[tokio::test]
    async fn test_send_one_rejects_bad_number_without_logging() {
        let db = Database::in_memory().await;
        let transport = FakeTransport::default();
        let err = send_one(&db, &transport, None, "call me", "Hi").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(transport.attempts(), 0);
        assert!(db.list_message_logs(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_body_prefers_template() {
        let db = Database::in_memory().await;
        let t = db.create_template("Welcome", "Hi {{firstName}}").await.unwrap();

        assert_eq!(resolve_body(&db, Some("ignored"), Some(&t.id)).await.unwrap(), "Hi {{firstName}}");
        assert_eq!(resolve_body(&db, Some(" plain "), None).await.unwrap(), "plain");
        assert!(matches!(
            resolve_body(&db, Some("  "), None).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            resolve_body(&db, None, Some("missing")).await,
            Err(AppError::NotFound(_))
        ));
    }
}
