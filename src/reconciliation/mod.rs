//! Reconciliation of reviewed payment transactions
//!
//! When an administrator marks a pending transaction `completed`, the engine
//! allocates the payment onto its statement, records the collection in the
//! organization wallet, credits any advance-payment overpayment to the
//! homeowner's wallet, and finally writes the transaction status. Rejections
//! only write the status.
//!
//! Every step is idempotent on its own marker (applied transaction ids on the
//! statement, source transaction ids in the organization ledger, credited
//! overpayment per statement in the wallet) and the status write comes last,
//! so retrying after a partial failure completes the work without counting
//! anything twice.

pub mod allocation;
pub mod locks;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::notification::Notification;
use crate::traits::*;
use crate::types::*;

pub use allocation::*;
pub use locks::StatementLocks;

/// Result of applying a status to a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateOutcome {
    pub transaction_id: String,
    pub transaction_status: TransactionStatus,
    /// Payment progress of the linked statement, when there is one
    pub statement: Option<StatementSummary>,
    /// `false` when the transaction already had the requested status
    pub applied: bool,
    pub notified: bool,
}

/// Applies reviewed transaction statuses to statements and wallets
pub struct ReconciliationEngine<S: BillingStorage> {
    storage: S,
    notifier: Box<dyn Notifier>,
    config: EngineConfig,
    locks: StatementLocks,
}

impl<S: BillingStorage> ReconciliationEngine<S> {
    /// Create a new engine with the default configuration
    pub fn new(storage: S, notifier: Box<dyn Notifier>) -> Self {
        Self::with_config(storage, notifier, EngineConfig::default())
    }

    /// Create a new engine with a custom configuration
    pub fn with_config(storage: S, notifier: Box<dyn Notifier>, config: EngineConfig) -> Self {
        Self {
            storage,
            notifier,
            config,
            locks: StatementLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Move a transaction to `new_status` and apply every derived effect.
    ///
    /// Re-applying the status a transaction already has is a no-op. A
    /// transaction that is already completed or rejected cannot move to a
    /// different status.
    pub async fn apply_transaction_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        reason: Option<String>,
    ) -> BillingResult<StatusUpdateOutcome> {
        let transaction = self
            .storage
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::Transaction, transaction_id))?;

        let user = self
            .storage
            .find_user(&transaction.user_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::User, &transaction.user_id))?;

        if transaction.status.is_terminal() {
            if transaction.status != new_status {
                return Err(BillingError::InvalidTransition {
                    id: transaction.id.clone(),
                    from: transaction.status,
                    to: new_status,
                });
            }

            debug!(
                transaction_id = %transaction.id,
                status = %new_status,
                "Transaction already has the requested status"
            );
            let statement = self.statement_summary(&transaction).await?;
            return Ok(StatusUpdateOutcome {
                transaction_id: transaction.id,
                transaction_status: new_status,
                statement,
                applied: false,
                notified: false,
            });
        }

        match new_status {
            TransactionStatus::Completed => self.complete(transaction, user, reason).await,
            TransactionStatus::Rejected => self.reject(transaction, user, reason).await,
            TransactionStatus::Pending => {
                let changed = self
                    .storage
                    .update_transaction_status(&transaction.id, new_status, reason)
                    .await?;
                let statement = self.statement_summary(&transaction).await?;
                Ok(StatusUpdateOutcome {
                    transaction_id: transaction.id,
                    transaction_status: new_status,
                    statement,
                    applied: changed,
                    notified: false,
                })
            }
        }
    }

    async fn complete(
        &self,
        transaction: Transaction,
        user: User,
        reason: Option<String>,
    ) -> BillingResult<StatusUpdateOutcome> {
        transaction.validate()?;

        let statement_id = transaction.statement_id.clone().ok_or_else(|| {
            BillingError::not_found(
                EntityKind::Statement,
                format!("(none linked to transaction {})", transaction.id),
            )
        })?;

        let guard = self.locks.acquire(&statement_id).await;

        let statement = self.settle_statement(&transaction, &statement_id).await?;
        self.collect_payment(&transaction, &user).await?;
        self.credit_overpayment(&transaction, &user, &statement)
            .await?;

        let changed = self
            .storage
            .update_transaction_status(&transaction.id, TransactionStatus::Completed, reason)
            .await?;

        drop(guard);

        info!(
            transaction_id = %transaction.id,
            statement_id = %statement.id,
            amount = %transaction.amount,
            total_paid = %statement.total_paid,
            payment_status = ?statement.payment_status,
            transactions_status = ?statement.transactions_status,
            "Transaction completed"
        );

        let notified = changed
            && self
                .notify(Notification::transaction_completed(
                    &self.config,
                    &user,
                    &transaction,
                ))
                .await;

        Ok(StatusUpdateOutcome {
            transaction_id: transaction.id,
            transaction_status: TransactionStatus::Completed,
            statement: Some(statement.summary()),
            applied: changed,
            notified,
        })
    }

    async fn reject(
        &self,
        transaction: Transaction,
        user: User,
        reason: Option<String>,
    ) -> BillingResult<StatusUpdateOutcome> {
        let statement = self.statement_summary(&transaction).await?;

        let changed = self
            .storage
            .update_transaction_status(&transaction.id, TransactionStatus::Rejected, reason.clone())
            .await?;

        info!(
            transaction_id = %transaction.id,
            reason = reason.as_deref().unwrap_or(""),
            "Transaction rejected"
        );

        let notified = changed
            && self
                .notify(Notification::transaction_rejected(
                    &self.config,
                    &user,
                    &transaction,
                    reason.as_deref(),
                ))
                .await;

        Ok(StatusUpdateOutcome {
            transaction_id: transaction.id,
            transaction_status: TransactionStatus::Rejected,
            statement,
            applied: changed,
            notified,
        })
    }

    /// Allocate the payment onto its statement, once.
    ///
    /// Retries on version conflicts, re-reading the statement each time.
    async fn settle_statement(
        &self,
        transaction: &Transaction,
        statement_id: &str,
    ) -> BillingResult<Statement> {
        let mut conflicts = 0;

        loop {
            let statement = self
                .storage
                .find_statement(statement_id)
                .await?
                .ok_or_else(|| BillingError::not_found(EntityKind::Statement, statement_id))?;

            let completed_sum = self.completed_sum(statement_id, transaction).await?;

            let update = if statement.has_applied(&transaction.id) {
                // The allocation survived an earlier attempt; only the
                // transactions status can be stale.
                let transactions_status = derive_transactions_status(
                    statement.payment_status,
                    &completed_sum,
                    &statement.total_paid,
                    &statement.total_amount_due,
                );
                if transactions_status == statement.transactions_status {
                    debug!(
                        transaction_id = %transaction.id,
                        statement_id = %statement.id,
                        "Payment already allocated to statement"
                    );
                    return Ok(statement);
                }

                debug!(
                    transaction_id = %transaction.id,
                    statement_id = %statement.id,
                    transactions_status = ?transactions_status,
                    "Payment already allocated, refreshing transactions status"
                );
                BillingUpdate {
                    total_paid: statement.total_paid.clone(),
                    paid_breakdown: statement.paid_breakdown.clone(),
                    payment_status: statement.payment_status,
                    transactions_status,
                    applied_transaction_id: transaction.id.clone(),
                }
            } else {
                plan_billing_update(&statement, transaction, &completed_sum)
            };

            match self
                .storage
                .update_billing(statement_id, &update, statement.version)
                .await
            {
                Ok(updated) => return Ok(updated),
                Err(BillingError::Conflict(message))
                    if conflicts < self.config.max_conflict_retries =>
                {
                    conflicts += 1;
                    warn!(
                        statement_id = %statement_id,
                        attempt = conflicts,
                        %message,
                        "Statement changed concurrently, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sum of every completed transaction against the statement, counting
    /// `transaction` as completed
    async fn completed_sum(
        &self,
        statement_id: &str,
        transaction: &Transaction,
    ) -> BillingResult<BigDecimal> {
        let siblings = self
            .storage
            .find_transactions_by_statement(statement_id)
            .await?;

        let others: BigDecimal = siblings
            .iter()
            .filter(|t| t.id != transaction.id && t.is_completed())
            .map(|t| &t.amount)
            .sum();

        Ok(others + &transaction.amount)
    }

    /// Record the collection in the organization wallet
    async fn collect_payment(&self, transaction: &Transaction, user: &User) -> BillingResult<bool> {
        let key = &self.config.organization_wallet_key;
        let wallet = self
            .storage
            .find_organization_wallet(key)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::OrganizationWallet, key))?;

        if wallet.has_entry_for(&transaction.id) {
            debug!(transaction_id = %transaction.id, "Collection already recorded");
            return Ok(false);
        }

        let entry = LedgerEntry::collect(
            transaction.amount.clone(),
            user.id.clone(),
            format!(
                "{} payment from {} ({})",
                transaction.purpose,
                user.full_name(),
                transaction.id
            ),
            transaction.id.clone(),
        );

        self.storage.append_ledger_entry(key, &entry).await
    }

    /// Credit the homeowner with the statement's overpayment when an advance
    /// payment settled it
    async fn credit_overpayment(
        &self,
        transaction: &Transaction,
        user: &User,
        statement: &Statement,
    ) -> BillingResult<BigDecimal> {
        let zero = BigDecimal::from(0);

        if statement.transactions_status != TransactionsStatus::Completed {
            return Ok(zero);
        }

        let has_advance_payment = transaction.transaction_type == TransactionType::AdvancedPayment
            || self
                .storage
                .find_transactions_by_statement(&statement.id)
                .await?
                .iter()
                .any(|t| {
                    t.is_completed() && t.transaction_type == TransactionType::AdvancedPayment
                });
        if !has_advance_payment {
            return Ok(zero);
        }

        let overpayment = &statement.total_paid - &statement.total_amount_due;
        if overpayment <= zero {
            return Ok(zero);
        }

        let wallet = self
            .storage
            .find_wallet_by_owner(&user.id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::Wallet, &user.id))?;

        let credited = self
            .storage
            .credit_overpayment(&wallet.id, &statement.id, &overpayment)
            .await?;

        if credited > zero {
            info!(
                wallet_id = %wallet.id,
                statement_id = %statement.id,
                credited = %credited,
                "Overpayment credited to homeowner wallet"
            );
        }

        Ok(credited)
    }

    async fn statement_summary(
        &self,
        transaction: &Transaction,
    ) -> BillingResult<Option<StatementSummary>> {
        match &transaction.statement_id {
            Some(statement_id) => Ok(self
                .storage
                .find_statement(statement_id)
                .await?
                .map(|statement| statement.summary())),
            None => Ok(None),
        }
    }

    /// Send a notification; failures are logged and reported as `false`
    async fn notify(&self, notification: Notification) -> bool {
        if !self.config.notifications_enabled {
            debug!(subject = %notification.subject, "Notifications disabled, skipping");
            return false;
        }

        match self.notifier.send(&notification).await {
            Ok(()) => {
                debug!(
                    recipient = %notification.recipient_email,
                    subject = %notification.subject,
                    "Notification sent"
                );
                true
            }
            Err(error) => {
                warn!(
                    %error,
                    recipient = %notification.recipient_email,
                    subject = %notification.subject,
                    "Failed to send notification"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{MemoryNotifier, MemoryStorage};

    async fn setup() -> (ReconciliationEngine<MemoryStorage>, MemoryStorage, MemoryNotifier) {
        let storage = MemoryStorage::new();
        let notifier = MemoryNotifier::new();

        storage
            .save_user(&User::new(
                "user1".to_string(),
                "Ana".to_string(),
                "Reyes".to_string(),
                "areyes".to_string(),
                "ana@example.com".to_string(),
                UserRole::Homeowner,
            ))
            .await
            .unwrap();
        storage
            .save_statement(&Statement::new(
                "stmt1".to_string(),
                "prop1".to_string(),
                "user1".to_string(),
                CategoryCharges::new(
                    BigDecimal::from(100),
                    BigDecimal::from(200),
                    BigDecimal::from(50),
                ),
            ))
            .await
            .unwrap();
        storage
            .save_organization_wallet(&OrganizationWallet::new("organization".to_string()))
            .await
            .unwrap();

        let engine = ReconciliationEngine::new(storage.clone(), Box::new(notifier.clone()));
        (engine, storage, notifier)
    }

    async fn submit(
        storage: &MemoryStorage,
        id: &str,
        kind: TransactionType,
        purpose: PaymentPurpose,
        amount: i32,
    ) {
        storage
            .save_transaction(&Transaction::new(
                id.to_string(),
                kind,
                "user1".to_string(),
                purpose,
                "GCash".to_string(),
                BigDecimal::from(amount),
                Some("stmt1".to_string()),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_completion_updates_statement_and_organization_wallet() {
        let (engine, storage, notifier) = setup().await;
        submit(&storage, "t1", TransactionType::BillPayment, PaymentPurpose::All, 175).await;

        let outcome = engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap();

        assert!(outcome.applied);
        assert!(outcome.notified);
        let summary = outcome.statement.unwrap();
        assert_eq!(summary.total_paid, BigDecimal::from(175));
        assert_eq!(summary.payment_status, PaymentStatus::Pending);

        let org = storage
            .find_organization_wallet("organization")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.total_balance, BigDecimal::from(175));
        assert_eq!(org.history.len(), 1);
        assert_eq!(org.history[0].user_id, "user1");

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Transaction Completed");
    }

    #[tokio::test]
    async fn test_completing_twice_is_idempotent() {
        let (engine, storage, notifier) = setup().await;
        submit(&storage, "t1", TransactionType::BillPayment, PaymentPurpose::WaterBill, 60).await;

        engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap();
        let replay = engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap();

        assert!(!replay.applied);
        assert!(!replay.notified);
        let statement = storage.find_statement("stmt1").await.unwrap().unwrap();
        assert_eq!(statement.total_paid, BigDecimal::from(60));
        assert_eq!(statement.paid_for(PaymentCategory::Water), BigDecimal::from(60));
        let org = storage
            .find_organization_wallet("organization")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.total_balance, BigDecimal::from(60));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_status_cannot_change() {
        let (engine, storage, _notifier) = setup().await;
        submit(&storage, "t1", TransactionType::BillPayment, PaymentPurpose::All, 50).await;

        engine
            .apply_transaction_status("t1", TransactionStatus::Rejected, Some("Blurry receipt".to_string()))
            .await
            .unwrap();
        let err = engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidTransition { .. }));
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_completion() {
        let (engine, storage, notifier) = setup().await;
        notifier.set_failing(true);
        submit(&storage, "t1", TransactionType::BillPayment, PaymentPurpose::Garbage, 50).await;

        let outcome = engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap();

        assert!(outcome.applied);
        assert!(!outcome.notified);
        let transaction = storage.find_transaction("t1").await.unwrap().unwrap();
        assert_eq!(transaction.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_organization_wallet_leaves_transaction_pending() {
        let storage = MemoryStorage::new();
        storage
            .save_user(&User::new(
                "user1".to_string(),
                "Ana".to_string(),
                "Reyes".to_string(),
                "areyes".to_string(),
                "ana@example.com".to_string(),
                UserRole::Homeowner,
            ))
            .await
            .unwrap();
        storage
            .save_statement(&Statement::new(
                "stmt1".to_string(),
                "prop1".to_string(),
                "user1".to_string(),
                CategoryCharges::new(
                    BigDecimal::from(100),
                    BigDecimal::from(200),
                    BigDecimal::from(50),
                ),
            ))
            .await
            .unwrap();
        submit(&storage, "t1", TransactionType::BillPayment, PaymentPurpose::All, 175).await;
        let engine = ReconciliationEngine::new(storage.clone(), Box::new(MemoryNotifier::new()));

        let err = engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::NotFound {
                entity: EntityKind::OrganizationWallet,
                ..
            }
        ));
        let transaction = storage.find_transaction("t1").await.unwrap().unwrap();
        assert_eq!(transaction.status, TransactionStatus::Pending);

        // Retrying once the wallet exists finishes the work without re-allocating
        storage
            .save_organization_wallet(&OrganizationWallet::new("organization".to_string()))
            .await
            .unwrap();
        engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap();

        let statement = storage.find_statement("stmt1").await.unwrap().unwrap();
        assert_eq!(statement.total_paid, BigDecimal::from(175));
        assert_eq!(statement.paid_for(PaymentCategory::Water), BigDecimal::from(50));
    }

    #[tokio::test]
    async fn test_fractional_cent_amount_is_not_allocated() {
        let (engine, storage, notifier) = setup().await;
        storage
            .save_transaction(&Transaction::new(
                "t1".to_string(),
                TransactionType::BillPayment,
                "user1".to_string(),
                PaymentPurpose::WaterBill,
                "GCash".to_string(),
                "10.005".parse().unwrap(),
                Some("stmt1".to_string()),
            ))
            .await
            .unwrap();

        let err = engine
            .apply_transaction_status("t1", TransactionStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));

        let statement = storage.find_statement("stmt1").await.unwrap().unwrap();
        assert_eq!(statement.total_paid, BigDecimal::from(0));
        assert!(statement.applied_transactions.is_empty());
        let org = storage
            .find_organization_wallet("organization")
            .await
            .unwrap()
            .unwrap();
        assert!(org.history.is_empty());
        let transaction = storage.find_transaction("t1").await.unwrap().unwrap();
        assert_eq!(transaction.status, TransactionStatus::Pending);
        assert!(notifier.sent().is_empty());
    }
}
