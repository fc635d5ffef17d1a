//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::notification::Notification;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Storage for submitted payment transactions
///
/// All store traits take `&self`: one backend instance is shared by every
/// concurrent reconciliation, so implementations handle their own interior
/// synchronization (a database driver, or locks for the in-memory backend).
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Get a transaction by ID
    async fn find_transaction(&self, transaction_id: &str) -> BillingResult<Option<Transaction>>;

    /// Insert a new transaction; fails if the ID is already taken
    async fn save_transaction(&self, transaction: &Transaction) -> BillingResult<()>;

    /// Write status and reason onto a transaction.
    ///
    /// Returns `true` when the stored status actually changed.
    async fn update_transaction_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        reason: Option<String>,
    ) -> BillingResult<bool>;

    /// All transactions settling a statement
    async fn find_transactions_by_statement(
        &self,
        statement_id: &str,
    ) -> BillingResult<Vec<Transaction>>;

    /// All transactions submitted by a user
    async fn find_transactions_by_user(&self, user_id: &str) -> BillingResult<Vec<Transaction>>;
}

/// Storage for billing statements
#[async_trait]
pub trait StatementStore: Send + Sync {
    /// Get a statement by ID
    async fn find_statement(&self, statement_id: &str) -> BillingResult<Option<Statement>>;

    /// Insert or replace a statement
    async fn save_statement(&self, statement: &Statement) -> BillingResult<()>;

    /// Apply a billing update if the stored version still matches `expected_version`.
    ///
    /// Returns the updated statement, or `BillingError::Conflict` when another
    /// writer got there first.
    async fn update_billing(
        &self,
        statement_id: &str,
        update: &BillingUpdate,
        expected_version: u64,
    ) -> BillingResult<Statement>;

    /// Statements billed to an owner
    async fn find_statements_by_owner(&self, owner_id: &str) -> BillingResult<Vec<Statement>>;
}

/// Read access to platform users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> BillingResult<Option<User>>;

    async fn save_user(&self, user: &User) -> BillingResult<()>;

    /// List users, optionally filtered by role
    async fn list_users(&self, role: Option<UserRole>) -> BillingResult<Vec<User>>;
}

/// Storage for homeowner wallets
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn find_wallet_by_owner(&self, owner_id: &str) -> BillingResult<Option<Wallet>>;

    /// Insert or replace a wallet; a second wallet for the same owner is a
    /// validation error
    async fn save_wallet(&self, wallet: &Wallet) -> BillingResult<()>;

    /// Credit a wallet with the overpayment of a statement.
    ///
    /// `overpayment` is the statement's total overpayment so far; only the part
    /// not yet credited for that statement is added to the balance. Returns
    /// the amount actually credited.
    async fn credit_overpayment(
        &self,
        wallet_id: &str,
        statement_id: &str,
        overpayment: &BigDecimal,
    ) -> BillingResult<BigDecimal>;
}

/// Storage for the organization wallet singleton
#[async_trait]
pub trait OrganizationWalletStore: Send + Sync {
    async fn find_organization_wallet(&self, key: &str)
        -> BillingResult<Option<OrganizationWallet>>;

    async fn save_organization_wallet(&self, wallet: &OrganizationWallet) -> BillingResult<()>;

    /// Append a ledger entry and increment the total balance by its amount, atomically.
    ///
    /// Returns `false` without writing when the entry's source transaction
    /// already has an entry.
    async fn append_ledger_entry(&self, key: &str, entry: &LedgerEntry) -> BillingResult<bool>;
}

/// Storage for incident reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(&self, report: &IncidentReport) -> BillingResult<()>;

    async fn find_report(&self, report_id: &str) -> BillingResult<Option<IncidentReport>>;

    /// List reports, optionally filtered by type
    async fn list_reports(&self, report_type: Option<&str>) -> BillingResult<Vec<IncidentReport>>;

    async fn update_report_status(&self, report_id: &str, status: ReportStatus)
        -> BillingResult<()>;
}

/// Every store the billing system needs, behind one bound
pub trait BillingStorage:
    TransactionStore + StatementStore + UserStore + WalletStore + OrganizationWalletStore + ReportStore
{
}

impl<T> BillingStorage for T where
    T: TransactionStore
        + StatementStore
        + UserStore
        + WalletStore
        + OrganizationWalletStore
        + ReportStore
{
}

/// Outbound email delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> BillingResult<()>;
}

/// Trait for implementing custom payment submission rules
pub trait PaymentValidator: Send + Sync {
    /// Validate a transaction before it is stored
    fn validate_payment(&self, transaction: &Transaction) -> BillingResult<()>;

    /// Validate that the statement may be paid by the transaction's submitter
    fn validate_statement_ownership(
        &self,
        transaction: &Transaction,
        statement: &Statement,
    ) -> BillingResult<()>;
}

/// Default payment validator with basic rules
pub struct DefaultPaymentValidator;

impl PaymentValidator for DefaultPaymentValidator {
    fn validate_payment(&self, transaction: &Transaction) -> BillingResult<()> {
        transaction.validate()?;
        validate_positive_amount(&transaction.amount)
    }

    fn validate_statement_ownership(
        &self,
        transaction: &Transaction,
        statement: &Statement,
    ) -> BillingResult<()> {
        if statement.owner_id != transaction.user_id {
            return Err(BillingError::Validation(format!(
                "Statement {} is not billed to user {}",
                statement.id, transaction.user_id
            )));
        }

        Ok(())
    }
}
