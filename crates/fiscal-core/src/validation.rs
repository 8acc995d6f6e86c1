//! # Validation Module
//!
//! Checks applied before anything reaches the driver.
//!
//! Caller values go to the printer verbatim. The only values refused here are
//! the ones no printer can print (NaN, infinities) and text longer than any
//! supported model accepts.

use crate::error::ValidationError;
use crate::types::{LineItem, PaymentLine};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest description accepted on an item or payment line.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Validates that a numeric field is finite.
///
/// ## Example
/// ```rust
/// use fiscal_core::validation::validate_finite;
///
/// assert!(validate_finite("amount", 121.0).is_ok());
/// assert!(validate_finite("amount", f64::NAN).is_err());
/// ```
pub fn validate_finite(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite {
            field: field.to_string(),
        })
    }
}

/// Validates a line description.
///
/// Empty descriptions are allowed (some payment lines carry none).
pub fn validate_description(field: &str, text: &str) -> ValidationResult<()> {
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(())
}

/// Validates a line item.
pub fn validate_item(item: &LineItem) -> ValidationResult<()> {
    validate_description("description", &item.description)?;
    validate_finite("quantity", item.quantity)?;
    validate_finite("amount", item.amount)?;
    validate_finite("vat_rate", item.vat_rate)?;
    Ok(())
}

/// Validates a payment line.
pub fn validate_payment(payment: &PaymentLine) -> ValidationResult<()> {
    validate_description("description", &payment.description)?;
    validate_finite("amount", payment.amount)?;
    Ok(())
}

/// Validates the brand of a connect call.
pub fn validate_brand(brand: &str) -> ValidationResult<()> {
    if brand.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "brand".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_values_pass_through() {
        // negative amounts (returns) and zero VAT are the caller's business
        assert!(validate_item(&LineItem::new("Devolución", -1.0, -121.0, 0.0)).is_ok());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let err = validate_item(&LineItem::new("Widget", 1.0, f64::INFINITY, 21.0)).unwrap_err();
        assert_eq!(err.to_string(), "amount must be a finite number");

        assert!(validate_payment(&PaymentLine::new("cash", f64::NAN)).is_err());
    }

    #[test]
    fn test_description_length() {
        assert!(validate_description("description", "").is_ok());
        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(
            validate_description("description", &long),
            Err(ValidationError::TooLong { max: MAX_DESCRIPTION_LEN, .. })
        ));
    }

    #[test]
    fn test_brand_required() {
        assert!(validate_brand("epson").is_ok());
        assert!(validate_brand("  ").is_err());
    }
}
