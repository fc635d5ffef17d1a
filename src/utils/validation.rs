//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> BillingResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(BillingError::Validation(
            "Payment amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that an amount has at most two decimal places
pub fn validate_cents(amount: &BigDecimal) -> BillingResult<()> {
    if round_to_cents(amount) != *amount {
        return Err(BillingError::Validation(format!(
            "Amount {} has more than two decimal places",
            amount
        )));
    }

    Ok(())
}

/// Validate that an identifier is valid
pub fn validate_identifier(id: &str) -> BillingResult<()> {
    if id.trim().is_empty() {
        return Err(BillingError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if id.len() > 64 {
        return Err(BillingError::Validation(
            "Identifier cannot exceed 64 characters".to_string(),
        ));
    }

    // Check for valid characters (alphanumeric, dashes, underscores)
    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BillingError::Validation(
            "Identifier can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate a payment method label
pub fn validate_payment_method(method: &str) -> BillingResult<()> {
    if method.trim().is_empty() {
        return Err(BillingError::Validation(
            "Payment method cannot be empty".to_string(),
        ));
    }

    if method.len() > 50 {
        return Err(BillingError::Validation(
            "Payment method cannot exceed 50 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate report title and description
pub fn validate_report_text(title: &str, description: &str) -> BillingResult<()> {
    if title.trim().is_empty() || description.trim().is_empty() {
        return Err(BillingError::Validation(
            "Title and description are required".to_string(),
        ));
    }

    if title.len() > 200 {
        return Err(BillingError::Validation(
            "Report title cannot exceed 200 characters".to_string(),
        ));
    }

    Ok(())
}

/// Payment validator with stricter checks on amounts and identifiers
pub struct EnhancedPaymentValidator;

impl PaymentValidator for EnhancedPaymentValidator {
    fn validate_payment(&self, transaction: &Transaction) -> BillingResult<()> {
        DefaultPaymentValidator.validate_payment(transaction)?;

        validate_identifier(&transaction.user_id)?;
        validate_payment_method(&transaction.method)?;

        if let Some(statement_id) = &transaction.statement_id {
            validate_identifier(statement_id)?;
        }

        Ok(())
    }

    fn validate_statement_ownership(
        &self,
        transaction: &Transaction,
        statement: &Statement,
    ) -> BillingResult<()> {
        DefaultPaymentValidator.validate_statement_ownership(transaction, statement)
    }
}
