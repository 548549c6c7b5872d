//! Types shared by the wedding server and the admin CLI.

use thiserror::Error;

pub mod api;
pub mod guest;
pub mod rsvp;
pub mod template;

pub use api::*;
pub use guest::{clean_optional, normalize_email, Guest, RsvpStatus, TransportMode, TravelDetails};
pub use rsvp::{LookupRequest, RsvpResponse, RsvpStage, Step1Request};

/// A rejected form field, with a message fit for showing next to it
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
