//! Input validation. Everything here runs before any storage I/O.

use crate::models::{
    guest::NewGuest,
    invitation::InvitationUpload,
    photo::PhotoUpload,
    timeline::NewTimelineItem,
};
use chrono::NaiveTime;
use thiserror::Error;

pub const PHOTO_CONTENT_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
];
pub const INVITATION_CONTENT_TYPE: &str = "application/pdf";

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid email address `{0}`")]
    Email(String),
    #[error("invalid phone number `{0}`")]
    Phone(String),
    #[error("party size must be at least 1 (got {0})")]
    PartySize(i64),
    #[error("unsupported file type `{0}`")]
    FileType(String),
    #[error("file is {size} bytes; the limit is {max} bytes")]
    FileTooLarge { size: usize, max: usize },
    #[error("file is empty")]
    EmptyFile,
    #[error("invalid time `{0}`, expected HH:MM")]
    Time(String),
}

/// Size limits for uploaded files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_photo_bytes: usize,
    pub max_invitation_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_photo_bytes: 10 * 1024 * 1024,      // 10 MiB
            max_invitation_bytes: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Missing(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lowercased, trimmed email, if it looks like `local@domain.tld`.
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    let email = required(email, "email")?.to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::Email(email))
    }
}

/// Digits of a phone number (separators and a leading `+` stripped).
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Whether two phone numbers name the same line. Numbers with at least
/// `MIN_PHONE_DIGITS` digits compare on their trailing national digits, so a
/// country code or trunk prefix does not prevent a match.
pub fn phones_match(a: &str, b: &str) -> bool {
    let (a, b) = (phone_digits(a), phone_digits(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.len() >= MIN_PHONE_DIGITS && b.len() >= MIN_PHONE_DIGITS {
        a[a.len() - MIN_PHONE_DIGITS..] == b[b.len() - MIN_PHONE_DIGITS..]
    } else {
        a == b
    }
}

pub fn validate_phone(phone: &str) -> Result<String, ValidationError> {
    let phone = required(phone, "phone")?;
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    let digits = phone_digits(&phone).len();
    if allowed && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        Ok(phone)
    } else {
        Err(ValidationError::Phone(phone))
    }
}

/// Validate an RSVP and return it with normalized fields.
pub fn validate_new_guest(guest: NewGuest) -> Result<NewGuest, ValidationError> {
    let name = required(&guest.name, "name")?;
    let email = normalize_email(&guest.email)?;
    let phone = validate_phone(&guest.phone)?;
    if guest.party_size < 1 {
        return Err(ValidationError::PartySize(guest.party_size));
    }
    Ok(NewGuest {
        name,
        email,
        phone,
        message: non_blank(guest.message),
        dietary_restrictions: non_blank(guest.dietary_restrictions),
        ..guest
    })
}

fn check_file(
    content_type: &str,
    len: usize,
    allowed: &[&str],
    max: usize,
) -> Result<(), ValidationError> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if !allowed.contains(&content_type.as_str()) {
        return Err(ValidationError::FileType(content_type));
    }
    if len == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if len > max {
        return Err(ValidationError::FileTooLarge { size: len, max });
    }
    Ok(())
}

pub fn validate_photo(upload: &PhotoUpload, limits: &UploadLimits) -> Result<(), ValidationError> {
    check_file(
        &upload.content_type,
        upload.bytes.len(),
        &PHOTO_CONTENT_TYPES,
        limits.max_photo_bytes,
    )
}

pub fn validate_invitation(
    upload: &InvitationUpload,
    limits: &UploadLimits,
) -> Result<(), ValidationError> {
    check_file(
        &upload.content_type,
        upload.bytes.len(),
        &[INVITATION_CONTENT_TYPE],
        limits.max_invitation_bytes,
    )
}

/// Parse a time of day and render it as zero-padded `HH:MM`, so that
/// string order is chronological order.
pub fn normalize_time(time: &str) -> Result<String, ValidationError> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| ValidationError::Time(time.to_string()))
}

pub fn validate_timeline_item(item: NewTimelineItem) -> Result<NewTimelineItem, ValidationError> {
    Ok(NewTimelineItem {
        time: normalize_time(&item.time)?,
        title: required(&item.title, "title")?,
        description: item.description.trim().to_string(),
        duration: non_blank(item.duration),
        category: item.category,
    })
}
