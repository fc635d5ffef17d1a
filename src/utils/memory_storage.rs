//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development
///
/// Clones share the same underlying maps.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
    statements: Arc<RwLock<HashMap<String, Statement>>>,
    users: Arc<RwLock<HashMap<String, User>>>,
    wallets: Arc<RwLock<HashMap<String, Wallet>>>,
    organization_wallets: Arc<RwLock<HashMap<String, OrganizationWallet>>>,
    reports: Arc<RwLock<HashMap<String, IncidentReport>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            statements: Arc::new(RwLock::new(HashMap::new())),
            users: Arc::new(RwLock::new(HashMap::new())),
            wallets: Arc::new(RwLock::new(HashMap::new())),
            organization_wallets: Arc::new(RwLock::new(HashMap::new())),
            reports: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryStorage {
    async fn find_transaction(&self, transaction_id: &str) -> BillingResult<Option<Transaction>> {
        Ok(self
            .transactions
            .read()
            .unwrap()
            .get(transaction_id)
            .cloned())
    }

    async fn save_transaction(&self, transaction: &Transaction) -> BillingResult<()> {
        let mut transactions = self.transactions.write().unwrap();
        if transactions.contains_key(&transaction.id) {
            return Err(BillingError::Validation(format!(
                "Transaction with ID '{}' already exists",
                transaction.id
            )));
        }
        transactions.insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        reason: Option<String>,
    ) -> BillingResult<bool> {
        let mut transactions = self.transactions.write().unwrap();
        let transaction = transactions
            .get_mut(transaction_id)
            .ok_or_else(|| BillingError::not_found(EntityKind::Transaction, transaction_id))?;

        let changed = transaction.status != status;
        transaction.status = status;
        transaction.reason = reason;
        Ok(changed)
    }

    async fn find_transactions_by_statement(
        &self,
        statement_id: &str,
    ) -> BillingResult<Vec<Transaction>> {
        let transactions = self.transactions.read().unwrap();
        let filtered: Vec<Transaction> = transactions
            .values()
            .filter(|txn| txn.statement_id.as_deref() == Some(statement_id))
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn find_transactions_by_user(&self, user_id: &str) -> BillingResult<Vec<Transaction>> {
        let transactions = self.transactions.read().unwrap();
        let filtered: Vec<Transaction> = transactions
            .values()
            .filter(|txn| txn.user_id == user_id)
            .cloned()
            .collect();
        Ok(filtered)
    }
}

#[async_trait]
impl StatementStore for MemoryStorage {
    async fn find_statement(&self, statement_id: &str) -> BillingResult<Option<Statement>> {
        Ok(self.statements.read().unwrap().get(statement_id).cloned())
    }

    async fn save_statement(&self, statement: &Statement) -> BillingResult<()> {
        self.statements
            .write()
            .unwrap()
            .insert(statement.id.clone(), statement.clone());
        Ok(())
    }

    async fn update_billing(
        &self,
        statement_id: &str,
        update: &BillingUpdate,
        expected_version: u64,
    ) -> BillingResult<Statement> {
        let mut statements = self.statements.write().unwrap();
        let statement = statements
            .get_mut(statement_id)
            .ok_or_else(|| BillingError::not_found(EntityKind::Statement, statement_id))?;

        if statement.version != expected_version {
            return Err(BillingError::Conflict(format!(
                "Statement {} is at version {}, expected {}",
                statement_id, statement.version, expected_version
            )));
        }

        statement.apply_update(update);
        Ok(statement.clone())
    }

    async fn find_statements_by_owner(&self, owner_id: &str) -> BillingResult<Vec<Statement>> {
        let statements = self.statements.read().unwrap();
        let filtered: Vec<Statement> = statements
            .values()
            .filter(|statement| statement.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(filtered)
    }
}

#[async_trait]
impl UserStore for MemoryStorage {
    async fn find_user(&self, user_id: &str) -> BillingResult<Option<User>> {
        Ok(self.users.read().unwrap().get(user_id).cloned())
    }

    async fn save_user(&self, user: &User) -> BillingResult<()> {
        self.users
            .write()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn list_users(&self, role: Option<UserRole>) -> BillingResult<Vec<User>> {
        let users = self.users.read().unwrap();
        let filtered: Vec<User> = users
            .values()
            .filter(|user| role.is_none_or(|r| user.role == r))
            .cloned()
            .collect();
        Ok(filtered)
    }
}

#[async_trait]
impl WalletStore for MemoryStorage {
    async fn find_wallet_by_owner(&self, owner_id: &str) -> BillingResult<Option<Wallet>> {
        Ok(self
            .wallets
            .read()
            .unwrap()
            .values()
            .find(|wallet| wallet.owner_id == owner_id)
            .cloned())
    }

    async fn save_wallet(&self, wallet: &Wallet) -> BillingResult<()> {
        let mut wallets = self.wallets.write().unwrap();
        if wallets
            .values()
            .any(|existing| existing.owner_id == wallet.owner_id && existing.id != wallet.id)
        {
            return Err(BillingError::Validation(format!(
                "Wallet already exists for user '{}'",
                wallet.owner_id
            )));
        }
        wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }

    async fn credit_overpayment(
        &self,
        wallet_id: &str,
        statement_id: &str,
        overpayment: &BigDecimal,
    ) -> BillingResult<BigDecimal> {
        let mut wallets = self.wallets.write().unwrap();
        let wallet = wallets
            .get_mut(wallet_id)
            .ok_or_else(|| BillingError::not_found(EntityKind::Wallet, wallet_id))?;

        let delta = overpayment - wallet.credited_for(statement_id);
        if delta <= BigDecimal::from(0) {
            return Ok(BigDecimal::from(0));
        }

        wallet.balance += &delta;
        wallet
            .credited_overpayments
            .insert(statement_id.to_string(), overpayment.clone());
        wallet.updated_at = Utc::now();
        Ok(delta)
    }
}

#[async_trait]
impl OrganizationWalletStore for MemoryStorage {
    async fn find_organization_wallet(
        &self,
        key: &str,
    ) -> BillingResult<Option<OrganizationWallet>> {
        Ok(self.organization_wallets.read().unwrap().get(key).cloned())
    }

    async fn save_organization_wallet(&self, wallet: &OrganizationWallet) -> BillingResult<()> {
        self.organization_wallets
            .write()
            .unwrap()
            .insert(wallet.key.clone(), wallet.clone());
        Ok(())
    }

    async fn append_ledger_entry(&self, key: &str, entry: &LedgerEntry) -> BillingResult<bool> {
        let mut wallets = self.organization_wallets.write().unwrap();
        let wallet = wallets
            .get_mut(key)
            .ok_or_else(|| BillingError::not_found(EntityKind::OrganizationWallet, key))?;

        if wallet.has_entry_for(&entry.source_transaction_id) {
            return Ok(false);
        }

        wallet.record(entry.clone());
        Ok(true)
    }
}

#[async_trait]
impl ReportStore for MemoryStorage {
    async fn save_report(&self, report: &IncidentReport) -> BillingResult<()> {
        self.reports
            .write()
            .unwrap()
            .insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn find_report(&self, report_id: &str) -> BillingResult<Option<IncidentReport>> {
        Ok(self.reports.read().unwrap().get(report_id).cloned())
    }

    async fn list_reports(&self, report_type: Option<&str>) -> BillingResult<Vec<IncidentReport>> {
        let reports = self.reports.read().unwrap();
        let filtered: Vec<IncidentReport> = reports
            .values()
            .filter(|report| {
                report_type.is_none_or(|t| report.report_type.as_deref() == Some(t))
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_report_status(
        &self,
        report_id: &str,
        status: ReportStatus,
    ) -> BillingResult<()> {
        let mut reports = self.reports.write().unwrap();
        let report = reports
            .get_mut(report_id)
            .ok_or_else(|| BillingError::not_found(EntityKind::Report, report_id))?;
        report.status = status;
        Ok(())
    }
}
