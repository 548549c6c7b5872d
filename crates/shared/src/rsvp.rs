//! Guest RSVP progression: step 1 (identity and headcount), then step 2
//! (travel and ID documents) for attending guests only.

use serde::{Deserialize, Serialize};

use crate::guest::{Guest, RsvpStatus, TransportMode, TravelDetails};
use crate::ValidationError;

/// Largest party a single invitation may register
pub const MAX_PARTY_MEMBERS: u32 = 20;

/// Where a guest stands in the two-step form
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStage {
    /// Nothing submitted yet
    New,
    /// Step 1 saved, status still pending
    Step1Submitted,
    /// Attending, travel details and ID documents outstanding
    Step2Pending,
    /// Nothing further is required
    Complete,
}

impl RsvpStage {
    pub fn of(guest: &Guest) -> Self {
        Self::from_flags(guest.rsvp_status, guest.step1_completed, guest.step2_completed)
    }

    pub fn from_flags(status: RsvpStatus, step1_completed: bool, step2_completed: bool) -> Self {
        if !step1_completed {
            return RsvpStage::New;
        }
        match status {
            RsvpStatus::Pending => RsvpStage::Step1Submitted,
            RsvpStatus::Attending if step2_completed => RsvpStage::Complete,
            RsvpStatus::Attending => RsvpStage::Step2Pending,
            RsvpStatus::Tentative | RsvpStatus::Declined => RsvpStage::Complete,
        }
    }

    /// Whether the form should offer step 2 next
    pub fn needs_step2(&self) -> bool {
        matches!(self, RsvpStage::Step2Pending)
    }
}

/// Step 1 payload: identity, party size, and RSVP answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step1Request {
    /// Set when a returning guest updates an existing record
    #[serde(default)]
    pub guest_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    pub adult_count: u32,
    #[serde(default)]
    pub kid_count: u32,
    pub rsvp_status: RsvpStatus,
    #[serde(default)]
    pub requires_accommodation: bool,
}

/// Response to either step, carrying what the form should show next
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsvpResponse {
    pub guest: Guest,
    pub stage: RsvpStage,
}

impl RsvpResponse {
    pub fn new(guest: Guest) -> Self {
        let stage = RsvpStage::of(&guest);
        Self { guest, stage }
    }
}

/// Returning-guest lookup by first name and email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub first_name: String,
    pub email: String,
}

pub fn validate_step1(req: &Step1Request) -> Result<(), ValidationError> {
    if req.first_name.trim().is_empty() {
        return Err(ValidationError::new("first_name", "First name is required"));
    }
    if req.last_name.trim().is_empty() {
        return Err(ValidationError::new("last_name", "Last name is required"));
    }
    validate_email(&req.email)?;
    if req.adult_count < 1 {
        return Err(ValidationError::new(
            "adult_count",
            "At least one adult must be included",
        ));
    }
    check_party_size(req.adult_count, req.kid_count)?;
    if let Some(number) = req.whatsapp_number.as_deref() {
        validate_phone("whatsapp_number", number)?;
    }
    if let Some(number) = req.phone.as_deref() {
        validate_phone("phone", number)?;
    }
    Ok(())
}

/// Rejects parties above MAX_PARTY_MEMBERS without overflowing on huge counts
pub fn check_party_size(adult_count: u32, kid_count: u32) -> Result<(), ValidationError> {
    let too_large = || {
        ValidationError::new(
            "adult_count",
            format!("A party can include at most {} people", MAX_PARTY_MEMBERS),
        )
    };
    if adult_count > MAX_PARTY_MEMBERS {
        return Err(too_large());
    }
    if kid_count > MAX_PARTY_MEMBERS {
        return Err(ValidationError::new(
            "kid_count",
            format!("A party can include at most {} people", MAX_PARTY_MEMBERS),
        ));
    }
    match adult_count.checked_add(kid_count) {
        Some(total) if total <= MAX_PARTY_MEMBERS => Ok(()),
        _ => Err(too_large()),
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::new("email", "Email is required"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(ValidationError::new("email", "Please enter a valid email address"));
    }
    Ok(())
}

/// Accepts digits with an optional leading `+` and common separators. Blank is allowed.
pub fn validate_phone(field: &str, number: &str) -> Result<(), ValidationError> {
    let number = number.trim();
    if number.is_empty() {
        return Ok(());
    }
    let digits = number.chars().filter(char::is_ascii_digit).count();
    let allowed = number
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (c == '+' && i == 0));
    if !allowed || !(7..=15).contains(&digits) {
        return Err(ValidationError::new(
            field,
            "Please enter a valid phone number, including the country code",
        ));
    }
    Ok(())
}

/// Travel details are collected from attending guests only
pub fn ensure_step2_allowed(guest: &Guest) -> Result<(), ValidationError> {
    if !guest.step1_completed {
        return Err(ValidationError::new(
            "rsvp_status",
            "Please complete the first step before adding travel details",
        ));
    }
    if guest.rsvp_status != RsvpStatus::Attending {
        return Err(ValidationError::new(
            "rsvp_status",
            format!(
                "Travel details are only collected for attending guests (current status: {})",
                guest.rsvp_status
            ),
        ));
    }
    Ok(())
}

/// Travel details must name a transport mode, and the details that mode and
/// any requested pickup or dropoff depend on.
pub fn validate_travel(travel: &TravelDetails) -> Result<(), ValidationError> {
    let Some(mode) = travel.transport_mode else {
        return Err(ValidationError::new(
            "transport_mode",
            "Please tell us how you are travelling",
        ));
    };
    let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

    match mode {
        TransportMode::Flight if missing(&travel.flight_number) => {
            return Err(ValidationError::new("flight_number", "Flight number is required"));
        }
        TransportMode::Train if missing(&travel.train_number) => {
            return Err(ValidationError::new("train_number", "Train number is required"));
        }
        _ => {}
    }

    if travel.pickup_required {
        if missing(&travel.pickup_date) {
            return Err(ValidationError::new("pickup_date", "Pickup date is required"));
        }
        if missing(&travel.pickup_location) {
            return Err(ValidationError::new("pickup_location", "Pickup location is required"));
        }
    }
    if travel.dropoff_required {
        if missing(&travel.dropoff_date) {
            return Err(ValidationError::new("dropoff_date", "Drop-off date is required"));
        }
        if missing(&travel.dropoff_location) {
            return Err(ValidationError::new("dropoff_location", "Drop-off location is required"));
        }
    }
    Ok(())
}

/// Every adult in the party needs one ID document
pub fn check_document_count(adult_count: u32, provided: usize) -> Result<(), ValidationError> {
    let required = adult_count as usize;
    if provided >= required {
        return Ok(());
    }
    Err(ValidationError::new(
        "id_documents",
        format!(
            "{} ID document{} required for {} adult{}, {} provided ({} missing)",
            required,
            plural(required),
            required,
            plural(required),
            provided,
            required - provided
        ),
    ))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

// ============================================================================
// Tests
// ============================================================================
