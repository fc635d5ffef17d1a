//! Payment submission and transaction history

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::traits::*;
use crate::types::*;

/// Prefix of generated transaction identifiers
pub const TRANSACTION_ID_PREFIX: &str = "CVT";

/// Parameters for submitting a payment
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub transaction_type: TransactionType,
    pub user_id: String,
    pub statement_id: String,
    pub purpose: PaymentPurpose,
    pub method: String,
    pub amount: BigDecimal,
    /// Proof-of-payment upload
    pub image_url: Option<String>,
    /// When the payment was made; defaults to now
    pub paid_at: Option<DateTime<Utc>>,
}

/// Generate a fresh transaction identifier
pub fn generate_transaction_id() -> String {
    format!(
        "{}{}",
        TRANSACTION_ID_PREFIX,
        uuid::Uuid::new_v4().simple().to_string().to_uppercase()
    )
}

/// Transaction manager for handling payment submissions
pub struct TransactionManager<S: BillingStorage> {
    storage: S,
    validator: Box<dyn PaymentValidator>,
}

impl<S: BillingStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultPaymentValidator),
        }
    }

    /// Create a new transaction manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn PaymentValidator>) -> Self {
        Self { storage, validator }
    }

    /// Record a submitted payment as a pending transaction
    pub async fn submit_payment(&self, submission: PaymentSubmission) -> BillingResult<Transaction> {
        if self.storage.find_user(&submission.user_id).await?.is_none() {
            return Err(BillingError::not_found(EntityKind::User, &submission.user_id));
        }

        let statement = self
            .storage
            .find_statement(&submission.statement_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::Statement, &submission.statement_id))?;

        let mut transaction = Transaction::new(
            generate_transaction_id(),
            submission.transaction_type,
            submission.user_id,
            submission.purpose,
            submission.method.trim().to_string(),
            submission.amount,
            Some(submission.statement_id),
        );
        transaction.image_url = submission.image_url;
        if let Some(paid_at) = submission.paid_at {
            transaction.created_at = paid_at;
        }

        self.validator.validate_payment(&transaction)?;
        self.validator
            .validate_statement_ownership(&transaction, &statement)?;

        self.storage.save_transaction(&transaction).await?;

        info!(
            transaction_id = %transaction.id,
            statement_id = %statement.id,
            amount = %transaction.amount,
            purpose = %transaction.purpose,
            "Payment submitted"
        );

        Ok(transaction)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: &str) -> BillingResult<Option<Transaction>> {
        self.storage.find_transaction(transaction_id).await
    }

    /// Get a transaction by ID, returning an error if not found
    pub async fn get_transaction_required(&self, transaction_id: &str) -> BillingResult<Transaction> {
        self.storage
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::Transaction, transaction_id))
    }

    /// A user's transactions, newest first
    pub async fn transaction_history(&self, user_id: &str) -> BillingResult<Vec<Transaction>> {
        let mut transactions = self.storage.find_transactions_by_user(user_id).await?;
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    /// Transactions settling a statement, oldest first
    pub async fn statement_transactions(&self, statement_id: &str) -> BillingResult<Vec<Transaction>> {
        let mut transactions = self
            .storage
            .find_transactions_by_statement(statement_id)
            .await?;
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(transactions)
    }
}
