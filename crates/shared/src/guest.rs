use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

// ============================================================================
// Enumerations
// ============================================================================

/// RSVP answer given by a guest
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    /// Step 1 saved without a decision yet
    #[default]
    Pending,
    Attending,
    Tentative,
    Declined,
}

impl RsvpStatus {
    pub const ALL: [RsvpStatus; 4] = [
        RsvpStatus::Pending,
        RsvpStatus::Attending,
        RsvpStatus::Tentative,
        RsvpStatus::Declined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Pending => "pending",
            RsvpStatus::Attending => "attending",
            RsvpStatus::Tentative => "tentative",
            RsvpStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RsvpStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RsvpStatus::Pending),
            "attending" => Ok(RsvpStatus::Attending),
            "tentative" => Ok(RsvpStatus::Tentative),
            "declined" => Ok(RsvpStatus::Declined),
            other => Err(ValidationError::new(
                "rsvp_status",
                format!("Unknown RSVP status '{}'", other),
            )),
        }
    }
}

/// How an attending guest travels to the venue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Flight,
    Train,
    Car,
    Bus,
    Other,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Flight => "flight",
            TransportMode::Train => "train",
            TransportMode::Car => "car",
            TransportMode::Bus => "bus",
            TransportMode::Other => "other",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flight" => Ok(TransportMode::Flight),
            "train" => Ok(TransportMode::Train),
            "car" => Ok(TransportMode::Car),
            "bus" => Ok(TransportMode::Bus),
            "other" => Ok(TransportMode::Other),
            other => Err(ValidationError::new(
                "transport_mode",
                format!("Unknown transport mode '{}'", other),
            )),
        }
    }
}

// ============================================================================
// Guest
// ============================================================================

/// Travel and pickup details collected in step 2
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TravelDetails {
    pub transport_mode: Option<TransportMode>,
    pub flight_number: Option<String>,
    pub train_number: Option<String>,
    #[serde(default)]
    pub pickup_required: bool,
    pub pickup_date: Option<String>,
    pub pickup_time: Option<String>,
    pub pickup_location: Option<String>,
    /// Return trip to the station or airport
    #[serde(default)]
    pub dropoff_required: bool,
    pub dropoff_date: Option<String>,
    pub dropoff_time: Option<String>,
    pub dropoff_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guest {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub whatsapp_number: Option<String>,
    pub adult_count: u32,
    pub kid_count: u32,
    pub rsvp_status: RsvpStatus,
    pub requires_accommodation: bool,
    #[serde(flatten)]
    pub travel: TravelDetails,
    pub room_number: Option<String>,
    /// Uploaded ID documents, in upload order
    #[serde(default)]
    pub id_document_urls: Vec<String>,
    pub notes: Option<String>,
    pub step1_completed: bool,
    pub step2_completed: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Guest {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn guest_count(&self) -> u32 {
        self.adult_count.saturating_add(self.kid_count)
    }

    /// WhatsApp number if one is on file and not blank
    pub fn whatsapp(&self) -> Option<&str> {
        self.whatsapp_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Lowercased, trimmed email used for storage and comparisons
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank strings become `None`, everything else is trimmed
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_guest;

    #[test]
    fn test_rsvp_status_serialization() {
        let json = serde_json::to_string(&RsvpStatus::Attending).unwrap();
        assert_eq!(json, "\"attending\"");

        let status: RsvpStatus = serde_json::from_str("\"declined\"").unwrap();
        assert_eq!(status, RsvpStatus::Declined);
    }

    #[test]
    fn test_rsvp_status_from_str_is_case_insensitive() {
        assert_eq!("Tentative".parse::<RsvpStatus>().unwrap(), RsvpStatus::Tentative);
        let err = "maybe".parse::<RsvpStatus>().unwrap_err();
        assert_eq!(err.field, "rsvp_status");
    }

    #[test]
    fn test_full_name_is_trimmed() {
        let mut guest = sample_guest();
        guest.last_name = String::new();
        assert_eq!(guest.full_name(), "John");
    }

    #[test]
    fn test_whatsapp_ignores_blank_numbers() {
        let mut guest = sample_guest();
        assert_eq!(guest.whatsapp(), Some("+15550002"));
        guest.whatsapp_number = Some("   ".to_string());
        assert_eq!(guest.whatsapp(), None);
    }

    #[test]
    fn test_guest_serializes_travel_flat() {
        let mut guest = sample_guest();
        guest.travel.transport_mode = Some(TransportMode::Train);
        let json = serde_json::to_value(&guest).unwrap();
        assert_eq!(json["transport_mode"], "train");
        assert_eq!(json["step2_completed"], false);
    }

    #[test]
    fn test_guest_count_saturates() {
        let mut guest = crate::test_support::sample_guest();
        assert_eq!(guest.guest_count(), 3);
        guest.adult_count = u32::MAX;
        assert_eq!(guest.guest_count(), u32::MAX);
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  ".to_string())), None);
        assert_eq!(clean_optional(Some(" A12 ".to_string())), Some("A12".to_string()));
    }
}
