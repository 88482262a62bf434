//! Extraction instructions sent alongside the receipt image.

use crate::models::SubmissionType;

/// Instruction for account statements: amount due.
pub const STATEMENT_PROMPT: &str = "You are an expert financial analysis assistant. Your only task is to analyze the image of this account statement. Extract the TOTAL AMOUNT DUE. Return only the numeric value, using a dot as the decimal separator and no thousands separators. Do not include currency symbols or any other text. Example of a correct answer: 1234.56";

/// Instruction for payment receipts: amount paid.
pub const PAYMENT_PROMPT: &str = "You are an expert financial analysis assistant. Your only task is to analyze the image of this receipt or proof of payment. Extract the TOTAL AMOUNT PAID. Return only the numeric value, using a dot as the decimal separator and no thousands separators. Do not include currency symbols or any other text. Example of a correct answer: 500.00";

/// Prompt for a submission type.
pub fn prompt_for(kind: SubmissionType) -> &'static str {
    match kind {
        SubmissionType::Statement => STATEMENT_PROMPT,
        SubmissionType::Payment => PAYMENT_PROMPT,
    }
}
