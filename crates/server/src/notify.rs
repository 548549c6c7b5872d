use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use shared::Guest;

use crate::config::SmtpConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One-line summary for the couple, e.g. "Jane Doe has RSVP'd attending (2 adults, 1 kid)"
pub fn rsvp_summary(guest: &Guest) -> String {
    let plural = |n: u32, one: &str, many: &str| format!("{} {}", n, if n == 1 { one } else { many });
    format!(
        "{} has RSVP'd {} ({}, {})",
        guest.full_name(),
        guest.rsvp_status,
        plural(guest.adult_count, "adult", "adults"),
        plural(guest.kid_count, "kid", "kids"),
    )
}

fn rsvp_body(guest: &Guest) -> String {
    let mut body = rsvp_summary(guest);
    body.push_str("\n\n");
    body.push_str(&format!("Email: {}\n", guest.email));
    if let Some(number) = guest.whatsapp() {
        body.push_str(&format!("WhatsApp: {}\n", number));
    }
    if guest.requires_accommodation {
        body.push_str("Accommodation requested\n");
    }
    body
}

/// Emails the RSVP summary to every notify address in the background
pub fn spawn_rsvp_notification(config: &SmtpConfig, guest: &Guest) {
    if !config.enabled || config.notify_to.is_empty() {
        return;
    }
    let config = config.clone();
    let subject = format!("RSVP: {}", guest.full_name());
    let body = rsvp_body(guest);

    tokio::spawn(async move {
        for to in &config.notify_to {
            match send_email(&config, to, &subject, &body).await {
                Ok(()) => tracing::info!("RSVP notification sent to {}", to),
                Err(e) => tracing::error!("Failed to send RSVP notification to {}: {}", to, e),
            }
        }
    });
}

async fn send_email(config: &SmtpConfig, to: &str, subject: &str, body: &str) -> Result<(), BoxError> {
    let email = Message::builder()
        .from(format!("{} <{}>", config.from_name, config.from_email).parse()?)
        .to(to.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?;

    if config.use_sendmail {
        AsyncSendmailTransport::<Tokio1Executor>::new().send(email).await?;
    } else {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        builder.build().send(email).await?;
    }
    Ok(())
}
