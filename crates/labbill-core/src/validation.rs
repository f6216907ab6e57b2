//! # Field Validation
//!
//! Checks that need nothing but the command itself. They run before any
//! registry lookup or transaction; bounds that depend on stored state
//! (balance, refundable, outstanding) live in [`crate::lifecycle`] and
//! [`crate::ledger`], and the schema's CHECK constraints back both up.

use crate::error::ValidationError;
use crate::{MAX_INVOICE_ITEMS, MAX_NOTE_LENGTH};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a required identifier (patient id, test id, invoice id).
///
/// ## Example
/// ```rust
/// use labbill_core::validation::validate_required_id;
///
/// assert!(validate_required_id("patient_id", "p-1").is_ok());
/// assert!(validate_required_id("patient_id", "  ").is_err());
/// ```
pub fn validate_required_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// A note that must say something, such as a refund reason.
pub fn validate_required_note(field: &str, note: &str) -> ValidationResult<()> {
    if note.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    validate_optional_text(field, Some(note), MAX_NOTE_LENGTH)
}

pub fn validate_optional_text(field: &str, text: Option<&str>, max: usize) -> ValidationResult<()> {
    match text {
        Some(text) if text.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Discounts and payments, where zero is allowed.
///
/// ## Example
/// ```rust
/// use labbill_core::validation::validate_non_negative_paise;
///
/// assert!(validate_non_negative_paise("discount", 0).is_ok());
/// assert!(validate_non_negative_paise("discount", -1).is_err());
/// ```
pub fn validate_non_negative_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Refunds and payouts.
pub fn validate_positive_paise(field: &str, paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// GST in basis points, 0 to 100%. Catalog slabs are 0, 5, 12, 18 and 28.
pub fn validate_gst_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "gst_percentage".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::NoItems);
    }

    if count > MAX_INVOICE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_INVOICE_ITEMS as i64,
        });
    }

    Ok(())
}

/// Invoice ids are v4 UUIDs.
///
/// ## Example
/// ```rust
/// use labbill_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}
