//! Plain-text rendering of API responses

use shared::{BulkSendResponse, DeliveryOutcome, Guest, GuestSummary, MessageLog};

pub fn guest_line(guest: &Guest) -> String {
    let stage = if guest.step2_completed {
        "complete"
    } else if guest.step1_completed {
        "step 1"
    } else {
        "new"
    };
    format!(
        "{:<36}  {:<24}  {:<10}  {} adult(s), {} kid(s)  [{}]",
        guest.id,
        guest.full_name(),
        guest.rsvp_status.as_str(),
        guest.adult_count,
        guest.kid_count,
        stage
    )
}

pub fn guest_detail(guest: &Guest) -> String {
    let mut lines = vec![
        format!("{} <{}>", guest.full_name(), guest.email),
        format!("id:            {}", guest.id),
        format!("status:        {}", guest.rsvp_status),
        format!("party:         {} adult(s), {} kid(s)", guest.adult_count, guest.kid_count),
        format!("phone:         {}", guest.phone.as_deref().unwrap_or("-")),
        format!("whatsapp:      {}", guest.whatsapp_number.as_deref().unwrap_or("-")),
        format!("accommodation: {}", if guest.requires_accommodation { "yes" } else { "no" }),
        format!("room:          {}", guest.room_number.as_deref().unwrap_or("-")),
    ];
    if let Some(mode) = guest.travel.transport_mode {
        lines.push(format!("travel:        {}", mode));
    }
    if !guest.id_document_urls.is_empty() {
        lines.push(format!("documents:     {}", guest.id_document_urls.len()));
    }
    if let Some(notes) = &guest.notes {
        lines.push(format!("notes:         {}", notes));
    }
    lines.join("\n")
}

pub fn summary(summary: &GuestSummary) -> String {
    [
        format!("Total RSVPs:        {}", summary.total_guests),
        format!(
            "Attending:          {} ({} adults, {} kids)",
            summary.attending, summary.attending_adults, summary.attending_kids
        ),
        format!("Tentative:          {}", summary.tentative),
        format!("Declined:           {}", summary.declined),
        format!("Pending:            {}", summary.pending),
        format!("Travel details in:  {}", summary.travel_details_completed),
        format!("Need accommodation: {}", summary.accommodation_requests),
    ]
    .join("\n")
}

pub fn message_line(log: &MessageLog) -> String {
    let mut line = format!(
        "{}  {:<16}  {:<9}  {}",
        log.created_at.as_deref().unwrap_or("-"),
        log.recipient,
        log.status,
        log.body.lines().next().unwrap_or_default()
    );
    if let Some(error) = &log.error {
        line.push_str(&format!("  ({})", error));
    }
    line
}

pub fn bulk_report(response: &BulkSendResponse) -> String {
    let mut lines: Vec<String> = response
        .results
        .iter()
        .map(|r| {
            let outcome = match r.outcome {
                DeliveryOutcome::Sent => "sent",
                DeliveryOutcome::Failed => "FAILED",
                DeliveryOutcome::Skipped => "skipped",
                DeliveryOutcome::NotFound => "not found",
            };
            let who = r.guest_name.as_deref().unwrap_or(&r.guest_id);
            match &r.detail {
                Some(detail) => format!("{:<10} {}: {}", outcome, who, detail),
                None => format!("{:<10} {}", outcome, who),
            }
        })
        .collect();
    lines.push(format!(
        "{} sent, {} failed, {} skipped",
        response.sent, response.failed, response.skipped
    ));
    lines.join("\n")
}
