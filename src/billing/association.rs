//! Main orchestrator that coordinates payments, reconciliation, wallets and reports

use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use tracing::info;

use crate::billing::{
    Dashboard, NewReport, PaymentSubmission, ReportManager, TransactionManager, WalletManager,
};
use crate::config::EngineConfig;
use crate::reconciliation::{ReconciliationEngine, StatusUpdateOutcome};
use crate::traits::*;
use crate::types::*;

/// The homeowners' association billing system
pub struct Association<S: BillingStorage> {
    storage: S,
    transaction_manager: TransactionManager<S>,
    wallet_manager: WalletManager<S>,
    report_manager: ReportManager<S>,
    engine: ReconciliationEngine<S>,
}

impl<S: BillingStorage + Clone> Association<S> {
    /// Create a new association with the given storage backend and notifier
    pub fn new(storage: S, notifier: Box<dyn Notifier>) -> Self {
        Self::with_config(storage, notifier, EngineConfig::default())
    }

    /// Create a new association with a custom configuration
    pub fn with_config(storage: S, notifier: Box<dyn Notifier>, config: EngineConfig) -> Self {
        Self {
            transaction_manager: TransactionManager::new(storage.clone()),
            wallet_manager: WalletManager::new(storage.clone()),
            report_manager: ReportManager::new(storage.clone()),
            engine: ReconciliationEngine::with_config(storage.clone(), notifier, config),
            storage,
        }
    }

    /// Create a new association with a custom payment validator
    pub fn with_validator(
        storage: S,
        notifier: Box<dyn Notifier>,
        config: EngineConfig,
        validator: Box<dyn PaymentValidator>,
    ) -> Self {
        let mut association = Self::with_config(storage, notifier, config);
        association.transaction_manager =
            TransactionManager::with_validator(association.storage.clone(), validator);
        association
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Create the organization wallet singleton if it does not exist yet
    pub async fn ensure_organization_wallet(&self) -> BillingResult<OrganizationWallet> {
        let key = &self.config().organization_wallet_key;
        if let Some(wallet) = self.storage.find_organization_wallet(key).await? {
            return Ok(wallet);
        }

        let wallet = OrganizationWallet::new(key.clone());
        self.storage.save_organization_wallet(&wallet).await?;
        Ok(wallet)
    }

    /// Get the organization wallet, returning an error if not found
    pub async fn organization_wallet(&self) -> BillingResult<OrganizationWallet> {
        let key = &self.config().organization_wallet_key;
        self.storage
            .find_organization_wallet(key)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::OrganizationWallet, key))
    }

    // User operations
    /// Add a user
    pub async fn register_user(&self, user: User) -> BillingResult<User> {
        if self.storage.find_user(&user.id).await?.is_some() {
            return Err(BillingError::Validation(format!(
                "User with ID '{}' already exists",
                user.id
            )));
        }
        self.storage.save_user(&user).await?;
        Ok(user)
    }

    /// Get a user by ID, returning an error if not found
    pub async fn get_user(&self, user_id: &str) -> BillingResult<User> {
        self.storage
            .find_user(user_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::User, user_id))
    }

    /// Replace a user's name, phone and email
    pub async fn update_profile(&self, user_id: &str, profile: ProfileUpdate) -> BillingResult<User> {
        let mut user = self.get_user(user_id).await?;

        let first_name = profile.first_name.trim();
        let email = profile.email.trim();
        if first_name.is_empty() {
            return Err(BillingError::Validation(
                "First name cannot be empty".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(BillingError::Validation(format!(
                "Invalid email address: '{}'",
                email
            )));
        }

        user.first_name = first_name.to_string();
        user.last_name = profile.last_name.trim().to_string();
        user.email = email.to_string();
        user.phone = profile
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());

        self.storage.save_user(&user).await?;

        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }

    /// List users, optionally by role
    pub async fn list_users(&self, role: Option<UserRole>) -> BillingResult<Vec<User>> {
        let mut users = self.storage.list_users(role).await?;
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    // Statement operations
    /// Issue a statement to its owner
    pub async fn issue_statement(&self, statement: Statement) -> BillingResult<Statement> {
        statement.validate()?;

        if self.storage.find_user(&statement.owner_id).await?.is_none() {
            return Err(BillingError::not_found(EntityKind::User, &statement.owner_id));
        }
        if self.storage.find_statement(&statement.id).await?.is_some() {
            return Err(BillingError::Validation(format!(
                "Statement with ID '{}' already exists",
                statement.id
            )));
        }

        self.storage.save_statement(&statement).await?;
        Ok(statement)
    }

    /// Get a statement by ID, returning an error if not found
    pub async fn get_statement(&self, statement_id: &str) -> BillingResult<Statement> {
        self.storage
            .find_statement(statement_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::Statement, statement_id))
    }

    /// Statements billed to an owner, newest first
    pub async fn statements_for(&self, owner_id: &str) -> BillingResult<Vec<Statement>> {
        let mut statements = self.storage.find_statements_by_owner(owner_id).await?;
        statements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(statements)
    }

    // Transaction operations
    /// Submit a payment for review
    pub async fn submit_payment(&self, submission: PaymentSubmission) -> BillingResult<Transaction> {
        self.transaction_manager.submit_payment(submission).await
    }

    /// Get a transaction by ID, returning an error if not found
    pub async fn get_transaction(&self, transaction_id: &str) -> BillingResult<Transaction> {
        self.transaction_manager
            .get_transaction_required(transaction_id)
            .await
    }

    /// A user's transactions, newest first
    pub async fn transaction_history(&self, user_id: &str) -> BillingResult<Vec<Transaction>> {
        self.transaction_manager.transaction_history(user_id).await
    }

    /// Transactions settling a statement, oldest first
    pub async fn statement_transactions(&self, statement_id: &str) -> BillingResult<Vec<Transaction>> {
        self.transaction_manager
            .statement_transactions(statement_id)
            .await
    }

    /// Apply a reviewed status to a transaction
    pub async fn apply_transaction_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        reason: Option<String>,
    ) -> BillingResult<StatusUpdateOutcome> {
        self.engine
            .apply_transaction_status(transaction_id, new_status, reason)
            .await
    }

    /// Apply a status given as its wire name ("pending", "completed", "rejected")
    pub async fn apply_transaction_status_str(
        &self,
        transaction_id: &str,
        new_status: &str,
        reason: Option<String>,
    ) -> BillingResult<StatusUpdateOutcome> {
        let status: TransactionStatus = new_status.parse()?;
        self.apply_transaction_status(transaction_id, status, reason)
            .await
    }

    // Wallet operations
    /// Open a homeowner wallet
    pub async fn open_wallet(
        &self,
        owner_id: &str,
        advance_payments: BTreeMap<PaymentCategory, BigDecimal>,
    ) -> BillingResult<Wallet> {
        self.wallet_manager
            .open_wallet(owner_id, advance_payments)
            .await
    }

    /// Get a homeowner wallet, returning an error if not found
    pub async fn get_wallet(&self, owner_id: &str) -> BillingResult<Wallet> {
        self.wallet_manager.get_wallet_required(owner_id).await
    }

    /// Homeowner dashboard
    pub async fn dashboard(&self, user_id: &str) -> BillingResult<Dashboard> {
        self.wallet_manager.dashboard(user_id).await
    }

    // Report operations
    /// File an incident report
    pub async fn file_report(&self, report: NewReport) -> BillingResult<IncidentReport> {
        self.report_manager.file_report(report).await
    }

    /// List incident reports, optionally by type
    pub async fn list_reports(&self, report_type: Option<&str>) -> BillingResult<Vec<IncidentReport>> {
        self.report_manager.list_reports(report_type).await
    }

    /// Close an incident report
    pub async fn close_report(&self, report_id: &str) -> BillingResult<()> {
        self.report_manager.close_report(report_id).await
    }

    /// Check the organization wallet and every statement of an owner for
    /// broken invariants
    pub async fn validate_integrity(&self, owner_id: &str) -> BillingResult<IntegrityReport> {
        let mut issues = Vec::new();

        let org = self.organization_wallet().await?;
        if !org.is_consistent() {
            issues.push(format!(
                "Organization wallet balance {} does not match its history",
                org.total_balance
            ));
        }

        for statement in self.storage.find_statements_by_owner(owner_id).await? {
            for category in PaymentCategory::ALL {
                if statement.paid_for(category) > *statement.charges.get(category) {
                    issues.push(format!(
                        "Statement {} has {} paid above its charge",
                        statement.id, category
                    ));
                }
            }

            let completed: BigDecimal = self
                .storage
                .find_transactions_by_statement(&statement.id)
                .await?
                .iter()
                .filter(|t| t.is_completed())
                .map(|t| &t.amount)
                .sum();
            if round_to_cents(&completed) != statement.total_paid {
                issues.push(format!(
                    "Statement {} records {} paid but completed transactions sum to {}",
                    statement.id, statement.total_paid, completed
                ));
            }
        }

        Ok(IntegrityReport {
            is_valid: issues.is_empty(),
            issues,
            organization_balance: org.total_balance,
        })
    }
}

/// Editable profile fields of a user
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: String,
}

/// Report on billing integrity
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub organization_balance: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{MemoryNotifier, MemoryStorage};

    #[tokio::test]
    async fn test_association_basic_operations() {
        let association = Association::new(MemoryStorage::new(), Box::new(MemoryNotifier::new()));
        association.ensure_organization_wallet().await.unwrap();

        association
            .register_user(User::new(
                "user1".to_string(),
                "Ana".to_string(),
                "Reyes".to_string(),
                "areyes".to_string(),
                "ana@example.com".to_string(),
                UserRole::Homeowner,
            ))
            .await
            .unwrap();
        association
            .issue_statement(Statement::new(
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

        let transaction = association
            .submit_payment(PaymentSubmission {
                transaction_type: TransactionType::BillPayment,
                user_id: "user1".to_string(),
                statement_id: "stmt1".to_string(),
                purpose: PaymentPurpose::HoaMaintenanceFees,
                method: "Bank Transfer".to_string(),
                amount: BigDecimal::from(200),
                image_url: None,
                paid_at: None,
            })
            .await
            .unwrap();

        association
            .apply_transaction_status(&transaction.id, TransactionStatus::Completed, None)
            .await
            .unwrap();

        let statement = association.get_statement("stmt1").await.unwrap();
        assert_eq!(
            statement.paid_for(PaymentCategory::HoaMaintenance),
            BigDecimal::from(200)
        );
        assert_eq!(statement.payment_status, PaymentStatus::Pending);

        let report = association.validate_integrity("user1").await.unwrap();
        assert!(report.is_valid, "{:?}", report.issues);
        assert_eq!(report.organization_balance, BigDecimal::from(200));
    }

    #[tokio::test]
    async fn test_issue_statement_rejects_negative_charge() {
        let association = Association::new(MemoryStorage::new(), Box::new(MemoryNotifier::new()));
        association
            .register_user(User::new(
                "user1".to_string(),
                "Ana".to_string(),
                "Reyes".to_string(),
                "areyes".to_string(),
                "ana@example.com".to_string(),
                UserRole::Homeowner,
            ))
            .await
            .unwrap();

        let err = association
            .issue_statement(Statement::new(
                "stmt1".to_string(),
                "prop1".to_string(),
                "user1".to_string(),
                CategoryCharges::new(
                    BigDecimal::from(-1),
                    BigDecimal::from(200),
                    BigDecimal::from(50),
                ),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let association = Association::new(MemoryStorage::new(), Box::new(MemoryNotifier::new()));
        association
            .register_user(User::new(
                "user1".to_string(),
                "Ana".to_string(),
                "Reyes".to_string(),
                "areyes".to_string(),
                "ana@example.com".to_string(),
                UserRole::Homeowner,
            ))
            .await
            .unwrap();

        let updated = association
            .update_profile(
                "user1",
                ProfileUpdate {
                    first_name: " Ana Marie ".to_string(),
                    last_name: "Reyes-Cruz".to_string(),
                    phone: Some("0917 555 0100".to_string()),
                    email: "ana.cruz@example.com".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name(), "Ana Marie Reyes-Cruz");

        let stored = association.get_user("user1").await.unwrap();
        assert_eq!(stored.phone.as_deref(), Some("0917 555 0100"));
        assert_eq!(stored.email, "ana.cruz@example.com");
        assert_eq!(stored.username, "areyes");

        let err = association
            .update_profile(
                "ghost",
                ProfileUpdate {
                    first_name: "Nobody".to_string(),
                    last_name: String::new(),
                    phone: None,
                    email: "nobody@example.com".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::NotFound {
                entity: EntityKind::User,
                ..
            }
        ));

        let err = association
            .update_profile(
                "user1",
                ProfileUpdate {
                    first_name: "Ana".to_string(),
                    last_name: "Reyes".to_string(),
                    phone: None,
                    email: "not-an-email".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Validation);
    }
}
