//! Message templates with `{{field}}` tokens and `{{ifX}}...{{/ifX}}` blocks.
//!
//! Rendering happens in three passes over a flat token list: tokenize the
//! `{{...}}` spans, resolve conditional blocks, then substitute fields.
//! Blocks pair an opener with the first following closer of the same name and
//! never nest. Anything unrecognised is emitted exactly as written.

use crate::guest::{Guest, RsvpStatus};

const TRANSPORT_FALLBACK: &str = "not specified";
const ROOM_FALLBACK: &str = "not assigned";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    /// `inner` is the trimmed name between the braces, `raw` the full span
    Tag { inner: &'a str, raw: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Accommodation,
    Attending,
}

impl Condition {
    fn opener(name: &str) -> Option<Self> {
        match name {
            "ifAccommodation" => Some(Condition::Accommodation),
            "ifAttending" => Some(Condition::Attending),
            _ => None,
        }
    }

    fn closer(name: &str) -> Option<Self> {
        name.strip_prefix('/').and_then(Self::opener)
    }

    fn holds(&self, guest: &Guest) -> bool {
        match self {
            Condition::Accommodation => guest.requires_accommodation,
            Condition::Attending => guest.rsvp_status == RsvpStatus::Attending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FirstName,
    LastName,
    FullName,
    GuestCount,
    AdultCount,
    KidCount,
    TransportMode,
    RsvpStatus,
    WhatsappNumber,
    Phone,
    Email,
    RoomNumber,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "firstName" => Field::FirstName,
            "lastName" => Field::LastName,
            "fullName" | "name" => Field::FullName,
            "guestCount" | "totalGuests" => Field::GuestCount,
            "adultCount" => Field::AdultCount,
            "kidCount" => Field::KidCount,
            "transportMode" => Field::TransportMode,
            "rsvpStatus" => Field::RsvpStatus,
            "whatsappNumber" => Field::WhatsappNumber,
            "phone" | "smsNumber" => Field::Phone,
            "email" => Field::Email,
            "roomNumber" => Field::RoomNumber,
            _ => return None,
        };
        Some(field)
    }

    fn value(&self, guest: &Guest) -> String {
        match self {
            Field::FirstName => guest.first_name.clone(),
            Field::LastName => guest.last_name.clone(),
            Field::FullName => guest.full_name(),
            Field::GuestCount => guest.guest_count().to_string(),
            Field::AdultCount => guest.adult_count.to_string(),
            Field::KidCount => guest.kid_count.to_string(),
            Field::TransportMode => guest
                .travel
                .transport_mode
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| TRANSPORT_FALLBACK.to_string()),
            Field::RsvpStatus => guest.rsvp_status.as_str().to_string(),
            Field::WhatsappNumber => guest.whatsapp_number.clone().unwrap_or_default(),
            Field::Phone => guest.phone.clone().unwrap_or_default(),
            Field::Email => guest.email.clone(),
            Field::RoomNumber => guest
                .room_number
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| ROOM_FALLBACK.to_string()),
        }
    }
}

fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        if open > 0 {
            tokens.push(Token::Text(&rest[..open]));
        }
        let end = open + 2 + close + 2;
        tokens.push(Token::Tag {
            inner: after_open[..close].trim(),
            raw: &rest[open..end],
        });
        rest = &rest[end..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

/// Drops false blocks and the markers of true ones. Returns the surviving tokens.
fn resolve_conditionals<'a>(tokens: &[Token<'a>], guest: &Guest) -> Vec<Token<'a>> {
    let mut out = Vec::with_capacity(tokens.len());
    // Closers already paired with a kept opener, with the condition they close
    let mut open_blocks: Vec<(Condition, usize)> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let Token::Tag { inner, .. } = token else {
            out.push(token);
            i += 1;
            continue;
        };

        if let Some(pos) = open_blocks.iter().position(|&(_, idx)| idx == i) {
            open_blocks.remove(pos);
            i += 1;
            continue;
        }

        if let Some(cond) = Condition::opener(inner) {
            let already_open = open_blocks.iter().any(|&(c, _)| c == cond);
            let closer = tokens[i + 1..]
                .iter()
                .position(|t| matches!(t, Token::Tag { inner, .. } if Condition::closer(inner) == Some(cond)))
                .map(|offset| i + 1 + offset);

            match closer {
                Some(end) if !already_open => {
                    if cond.holds(guest) {
                        open_blocks.push((cond, end));
                        i += 1;
                    } else {
                        i = end + 1;
                    }
                    continue;
                }
                _ => {}
            }
        }

        out.push(token);
        i += 1;
    }
    out
}

/// Renders `template` for `guest`. Text without `{{` comes back unchanged.
pub fn render(template: &str, guest: &Guest) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    let tokens = tokenize(template);
    let resolved = resolve_conditionals(&tokens, guest);

    let mut out = String::with_capacity(template.len());
    for token in resolved {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Tag { inner, raw } => match Field::parse(inner) {
                Some(field) => out.push_str(&field.value(guest)),
                None => out.push_str(raw),
            },
        }
    }
    out
}

/// Names of the substitution tokens a template may use
pub fn supported_tokens() -> &'static [&'static str] {
    &[
        "firstName",
        "lastName",
        "fullName",
        "guestCount",
        "adultCount",
        "kidCount",
        "transportMode",
        "rsvpStatus",
        "whatsappNumber",
        "phone",
        "email",
        "roomNumber",
        "ifAccommodation",
        "ifAttending",
    ]
}

// ============================================================================
// Tests
// ============================================================================
