//! Transaction notifications sent to homeowners

pub mod templates;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::types::*;

/// A rendered email, ready for a `Notifier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub sender_email: String,
    pub sender_name: String,
    pub recipient_email: String,
    pub recipient_name: String,
    pub subject: String,
    pub html_content: String,
    /// Plain-text fallback for clients without HTML
    pub text_content: String,
}

impl Notification {
    /// "Transaction completed" email with the payment details
    pub fn transaction_completed(
        config: &EngineConfig,
        user: &User,
        transaction: &Transaction,
    ) -> Self {
        let details = templates::TransactionDetails::from_transaction(transaction);
        Self {
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
            recipient_email: user.email.clone(),
            recipient_name: user.full_name(),
            subject: "Transaction Completed".to_string(),
            html_content: templates::completed_html(&user.first_name, &details),
            text_content: templates::completed_text(&user.first_name, &details),
        }
    }

    /// "Transaction rejected" email with the reviewer's reason
    pub fn transaction_rejected(
        config: &EngineConfig,
        user: &User,
        transaction: &Transaction,
        reason: Option<&str>,
    ) -> Self {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("No reason provided");
        Self {
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
            recipient_email: user.email.clone(),
            recipient_name: user.full_name(),
            subject: "Transaction Rejected".to_string(),
            html_content: templates::rejected_html(&user.first_name, &transaction.id, reason),
            text_content: templates::rejected_text(&user.first_name, &transaction.id, reason),
        }
    }
}
