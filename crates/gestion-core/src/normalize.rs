//! Parsing of the model's free-text answer into an amount.

use crate::defaults::MAX_AMOUNT;
use crate::error::{Error, ErrorCode, Result};
use crate::models::ExtractedAmount;

/// Parse a model answer into a bounded, non-negative amount.
///
/// The whole trimmed text must parse as a finite decimal. The trimmed text
/// itself is returned, not a re-serialized float.
pub fn normalize_amount(raw: &str) -> Result<ExtractedAmount> {
    let text = raw.trim();

    let value = match text.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            return Err(Error::invalid(
                format!("The AI response is not a valid number: '{}'", text),
                ErrorCode::InvalidAiResponse,
            ))
        }
    };

    if value < 0.0 {
        return Err(Error::invalid(
            format!("Extracted amount cannot be negative: {}", text),
            ErrorCode::InvalidAmount,
        ));
    }

    if value > MAX_AMOUNT {
        return Err(Error::invalid(
            format!("Extracted amount exceeds the maximum allowed: {}", text),
            ErrorCode::AmountTooLarge,
        ));
    }

    Ok(ExtractedAmount::new(text.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> ErrorCode {
        normalize_amount(raw).unwrap_err().code()
    }

    #[test]
    fn test_trims_and_keeps_original_text() {
        let amount = normalize_amount(" 1234.56 ").unwrap();
        assert_eq!(amount.as_str(), "1234.56");
        assert!((amount.value() - 1234.56).abs() < f64::EPSILON);

        let amount = normalize_amount("500.00\n").unwrap();
        assert_eq!(amount.into_string(), "500.00");
    }

    #[test]
    fn test_zero_is_accepted() {
        assert_eq!(normalize_amount("0").unwrap().as_str(), "0");
    }

    #[test]
    fn test_not_a_number() {
        assert_eq!(code("abc"), ErrorCode::InvalidAiResponse);
        assert_eq!(code(""), ErrorCode::InvalidAiResponse);
        assert_eq!(code("$1,234.56"), ErrorCode::InvalidAiResponse);
        assert_eq!(code("1234.56 MXN"), ErrorCode::InvalidAiResponse);
        assert_eq!(code("NaN"), ErrorCode::InvalidAiResponse);
        assert_eq!(code("inf"), ErrorCode::InvalidAiResponse);
    }

    #[test]
    fn test_negative() {
        assert_eq!(code("-5"), ErrorCode::InvalidAmount);
        assert_eq!(code("-0.01"), ErrorCode::InvalidAmount);
    }

    #[test]
    fn test_upper_bound() {
        assert_eq!(code("2000000000"), ErrorCode::AmountTooLarge);
        assert_eq!(code("1000000000.01"), ErrorCode::AmountTooLarge);
        assert_eq!(normalize_amount("1000000000").unwrap().as_str(), "1000000000");
    }

    #[test]
    fn test_errors_are_client_errors() {
        let err = normalize_amount("abc").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
