//! Core types and data structures for the billing system

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Round a monetary amount to cents (half-up)
pub fn round_to_cents(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Billing categories a statement charges for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    /// Water consumption
    Water,
    /// HOA maintenance dues
    HoaMaintenance,
    /// Garbage collection
    Garbage,
}

impl PaymentCategory {
    /// Every category, in allocation order
    pub const ALL: [PaymentCategory; 3] = [
        PaymentCategory::Water,
        PaymentCategory::HoaMaintenance,
        PaymentCategory::Garbage,
    ];
}

impl fmt::Display for PaymentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentCategory::Water => "water",
            PaymentCategory::HoaMaintenance => "hoa_maintenance",
            PaymentCategory::Garbage => "garbage",
        };
        f.write_str(label)
    }
}

/// What a payment is meant to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentPurpose {
    #[serde(rename = "Water Bill")]
    WaterBill,
    #[serde(rename = "HOA Maintenance Fees")]
    HoaMaintenanceFees,
    #[serde(rename = "Garbage")]
    Garbage,
    /// Spread across every category of the statement
    #[serde(rename = "All")]
    All,
}

impl PaymentPurpose {
    /// The single category this purpose targets, `None` for `All`
    pub fn category(&self) -> Option<PaymentCategory> {
        match self {
            PaymentPurpose::WaterBill => Some(PaymentCategory::Water),
            PaymentPurpose::HoaMaintenanceFees => Some(PaymentCategory::HoaMaintenance),
            PaymentPurpose::Garbage => Some(PaymentCategory::Garbage),
            PaymentPurpose::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::WaterBill => "Water Bill",
            PaymentPurpose::HoaMaintenanceFees => "HOA Maintenance Fees",
            PaymentPurpose::Garbage => "Garbage",
            PaymentPurpose::All => "All",
        }
    }
}

impl fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of payment a homeowner submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Settles the current statement
    #[serde(rename = "Bill Payment")]
    BillPayment,
    /// Prepayment that may exceed what is due; the excess becomes wallet credit
    #[serde(rename = "Advanced Payment")]
    AdvancedPayment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::BillPayment => "Bill Payment",
            TransactionType::AdvancedPayment => "Advanced Payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl TransactionStatus {
    /// Completed and rejected transactions never change status again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "rejected" => Ok(TransactionStatus::Rejected),
            other => Err(BillingError::Validation(format!(
                "Unknown transaction status '{}'",
                other
            ))),
        }
    }
}

/// Whether a statement has been paid in full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Whether the completed transactions against a statement cover it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionsStatus {
    Pending,
    Completed,
}

/// A payment submitted by a homeowner against a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,
    pub transaction_type: TransactionType,
    /// User who submitted the payment
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub purpose: PaymentPurpose,
    /// Payment channel (e.g. "GCash", "Bank Transfer")
    pub method: String,
    pub amount: BigDecimal,
    pub status: TransactionStatus,
    /// Reason given when the transaction was reviewed
    pub reason: Option<String>,
    /// Statement this payment settles
    pub statement_id: Option<String>,
    /// Proof-of-payment upload
    pub image_url: Option<String>,
}

impl Transaction {
    /// Create a new pending transaction
    pub fn new(
        id: String,
        transaction_type: TransactionType,
        user_id: String,
        purpose: PaymentPurpose,
        method: String,
        amount: BigDecimal,
        statement_id: Option<String>,
    ) -> Self {
        Self {
            id,
            transaction_type,
            user_id,
            created_at: Utc::now(),
            purpose,
            method,
            amount,
            status: TransactionStatus::Pending,
            reason: None,
            statement_id,
            image_url: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Validate the transaction amount (non-negative, whole cents) and method
    pub fn validate(&self) -> BillingResult<()> {
        if self.amount < BigDecimal::from(0) {
            return Err(BillingError::Validation(format!(
                "Transaction {} has a negative amount: {}",
                self.id, self.amount
            )));
        }

        crate::utils::validation::validate_cents(&self.amount)?;

        if self.method.trim().is_empty() {
            return Err(BillingError::Validation(format!(
                "Transaction {} has no payment method",
                self.id
            )));
        }

        Ok(())
    }
}

/// Per-category charges of a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCharges {
    pub water: BigDecimal,
    pub hoa_maintenance: BigDecimal,
    pub garbage: BigDecimal,
}

impl CategoryCharges {
    pub fn new(water: BigDecimal, hoa_maintenance: BigDecimal, garbage: BigDecimal) -> Self {
        Self {
            water,
            hoa_maintenance,
            garbage,
        }
    }

    /// Charge for a single category
    pub fn get(&self, category: PaymentCategory) -> &BigDecimal {
        match category {
            PaymentCategory::Water => &self.water,
            PaymentCategory::HoaMaintenance => &self.hoa_maintenance,
            PaymentCategory::Garbage => &self.garbage,
        }
    }

    /// Sum of every category charge
    pub fn total(&self) -> BigDecimal {
        &self.water + &self.hoa_maintenance + &self.garbage
    }
}

/// Amount paid so far, per category
pub type PaidBreakdown = BTreeMap<PaymentCategory, BigDecimal>;

/// A billing period's charges and payment progress for one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub id: String,
    pub property_id: String,
    /// Homeowner the statement is billed to
    pub owner_id: String,
    pub charges: CategoryCharges,
    pub total_amount_due: BigDecimal,
    pub total_paid: BigDecimal,
    pub paid_breakdown: PaidBreakdown,
    pub payment_status: PaymentStatus,
    pub transactions_status: TransactionsStatus,
    /// Transactions whose payment has already been allocated to this statement
    pub applied_transactions: BTreeSet<String>,
    /// Incremented on every billing update; used for compare-and-swap writes
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Statement {
    /// Create a new unpaid statement; the amount due is the sum of the charges
    pub fn new(id: String, property_id: String, owner_id: String, charges: CategoryCharges) -> Self {
        let now = Utc::now();
        Self {
            id,
            property_id,
            owner_id,
            total_amount_due: charges.total(),
            charges,
            total_paid: BigDecimal::from(0),
            paid_breakdown: PaidBreakdown::new(),
            payment_status: PaymentStatus::Pending,
            transactions_status: TransactionsStatus::Pending,
            applied_transactions: BTreeSet::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount paid so far toward a category
    pub fn paid_for(&self, category: PaymentCategory) -> BigDecimal {
        self.paid_breakdown
            .get(&category)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    /// Unpaid balance of a category, never negative
    pub fn remaining_for(&self, category: PaymentCategory) -> BigDecimal {
        let remaining = self.charges.get(category) - self.paid_for(category);
        if remaining > BigDecimal::from(0) {
            remaining
        } else {
            BigDecimal::from(0)
        }
    }

    /// Balance still owed on the statement as a whole
    pub fn outstanding(&self) -> BigDecimal {
        let outstanding = &self.total_amount_due - &self.total_paid;
        if outstanding > BigDecimal::from(0) {
            outstanding
        } else {
            BigDecimal::from(0)
        }
    }

    pub fn has_applied(&self, transaction_id: &str) -> bool {
        self.applied_transactions.contains(transaction_id)
    }

    /// Validate the statement's amounts
    pub fn validate(&self) -> BillingResult<()> {
        for category in PaymentCategory::ALL {
            if *self.charges.get(category) < BigDecimal::from(0) {
                return Err(BillingError::Validation(format!(
                    "Statement {} has a negative {} charge",
                    self.id, category
                )));
            }
        }

        if self.total_amount_due < BigDecimal::from(0) {
            return Err(BillingError::Validation(format!(
                "Statement {} has a negative amount due",
                self.id
            )));
        }

        Ok(())
    }

    /// Apply a computed billing update in place
    pub fn apply_update(&mut self, update: &BillingUpdate) {
        self.total_paid = update.total_paid.clone();
        self.paid_breakdown = update.paid_breakdown.clone();
        self.payment_status = update.payment_status;
        self.transactions_status = update.transactions_status;
        self.applied_transactions
            .insert(update.applied_transaction_id.clone());
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Summary of the statement's payment progress
    pub fn summary(&self) -> StatementSummary {
        StatementSummary {
            statement_id: self.id.clone(),
            total_paid: self.total_paid.clone(),
            total_amount_due: self.total_amount_due.clone(),
            payment_status: self.payment_status,
            transactions_status: self.transactions_status,
        }
    }
}

/// Fields written onto a statement when a transaction completes against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingUpdate {
    pub total_paid: BigDecimal,
    pub paid_breakdown: PaidBreakdown,
    pub payment_status: PaymentStatus,
    pub transactions_status: TransactionsStatus,
    /// Transaction whose allocation this update records
    pub applied_transaction_id: String,
}

/// Payment progress of a statement, as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub statement_id: String,
    pub total_paid: BigDecimal,
    pub total_amount_due: BigDecimal,
    pub payment_status: PaymentStatus,
    pub transactions_status: TransactionsStatus,
}

/// A homeowner's personal wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub owner_id: String,
    /// Credit available to the homeowner (e.g. from overpayments)
    pub balance: BigDecimal,
    /// Advance-payment trackers per category
    pub advance_payments: BTreeMap<PaymentCategory, BigDecimal>,
    /// Overpayment already credited, per statement
    pub credited_overpayments: BTreeMap<String, BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet
    pub fn new(id: String, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            balance: BigDecimal::from(0),
            advance_payments: BTreeMap::new(),
            credited_overpayments: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overpayment credited so far for a statement
    pub fn credited_for(&self, statement_id: &str) -> BigDecimal {
        self.credited_overpayments
            .get(statement_id)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    /// Advance payment tracked for a category
    pub fn advance_for(&self, category: PaymentCategory) -> BigDecimal {
        self.advance_payments
            .get(&category)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0))
    }
}

/// Types of organization ledger entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryType {
    /// Funds collected from a homeowner
    Collect,
}

/// One line in the organization wallet history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: uuid::Uuid,
    pub entry_type: LedgerEntryType,
    pub created_at: DateTime<Utc>,
    pub amount: BigDecimal,
    /// User the funds came from
    pub user_id: String,
    pub description: String,
    /// Transaction that produced this entry
    pub source_transaction_id: String,
}

impl LedgerEntry {
    /// Create a collection entry with a fresh id
    pub fn collect(
        amount: BigDecimal,
        user_id: String,
        description: String,
        source_transaction_id: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            entry_type: LedgerEntryType::Collect,
            created_at: Utc::now(),
            amount,
            user_id,
            description,
            source_transaction_id,
        }
    }
}

/// The association-wide wallet aggregating all collected funds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationWallet {
    /// Well-known key the singleton is stored under
    pub key: String,
    pub total_balance: BigDecimal,
    pub history: Vec<LedgerEntry>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationWallet {
    pub fn new(key: String) -> Self {
        Self {
            key,
            total_balance: BigDecimal::from(0),
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Whether a ledger entry was already recorded for a transaction
    pub fn has_entry_for(&self, transaction_id: &str) -> bool {
        self.history
            .iter()
            .any(|entry| entry.source_transaction_id == transaction_id)
    }

    /// Append an entry and increment the total balance by its amount
    pub fn record(&mut self, entry: LedgerEntry) {
        self.total_balance += &entry.amount;
        self.history.push(entry);
        self.updated_at = Utc::now();
    }

    /// The total balance equals the sum of the history
    pub fn is_consistent(&self) -> bool {
        let sum: BigDecimal = self.history.iter().map(|entry| &entry.amount).sum();
        sum == self.total_balance
    }
}

/// Role of a platform user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Homeowner,
    Admin,
}

/// A platform user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

impl User {
    pub fn new(
        id: String,
        first_name: String,
        last_name: String,
        username: String,
        email: String,
        role: UserRole,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            username,
            email,
            phone: None,
            role,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Lifecycle of an incident report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Closed,
}

/// An incident filed by a homeowner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Free-form category (e.g. "maintenance", "security")
    pub report_type: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Entities the billing system looks up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Transaction,
    User,
    Statement,
    Wallet,
    OrganizationWallet,
    Report,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Transaction => "Transaction",
            EntityKind::User => "User",
            EntityKind::Statement => "Statement",
            EntityKind::Wallet => "Wallet",
            EntityKind::OrganizationWallet => "Organization wallet",
            EntityKind::Report => "Report",
        };
        f.write_str(label)
    }
}

/// Caller-facing class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Internal,
}

/// Errors that can occur in the billing system
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
    #[error("Notification error: {0}")]
    Notification(String),
}

impl BillingError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        BillingError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            BillingError::NotFound { .. } => ErrorClass::NotFound,
            BillingError::Validation(_) | BillingError::InvalidTransition { .. } => {
                ErrorClass::Validation
            }
            BillingError::Storage(_)
            | BillingError::Conflict(_)
            | BillingError::Notification(_) => ErrorClass::Internal,
        }
    }

    /// HTTP-style status for the error class
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::NotFound => 404,
            ErrorClass::Validation => 400,
            ErrorClass::Internal => 500,
        }
    }
}

/// Result type for billing operations
pub type BillingResult<T> = Result<T, BillingError>;
