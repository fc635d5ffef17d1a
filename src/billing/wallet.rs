//! Homeowner wallet management

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::traits::*;
use crate::types::*;

/// Prefix of generated wallet identifiers
pub const WALLET_ID_PREFIX: &str = "CVW";

/// Homeowner overview: balances and what is still owed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub first_name: String,
    pub last_name: String,
    pub wallet_balance: BigDecimal,
    pub advance_payments: BTreeMap<PaymentCategory, BigDecimal>,
    /// Unpaid balance over all of the user's statements
    pub outstanding_balance: BigDecimal,
    pub pending_statements: usize,
}

/// Wallet manager for opening and reading homeowner wallets
pub struct WalletManager<S: BillingStorage> {
    storage: S,
}

impl<S: BillingStorage> WalletManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Open the wallet of a homeowner; each owner has at most one, enforced
    /// by the store on save
    pub async fn open_wallet(
        &self,
        owner_id: &str,
        advance_payments: BTreeMap<PaymentCategory, BigDecimal>,
    ) -> BillingResult<Wallet> {
        if self.storage.find_user(owner_id).await?.is_none() {
            return Err(BillingError::not_found(EntityKind::User, owner_id));
        }

        if self.storage.find_wallet_by_owner(owner_id).await?.is_some() {
            return Err(BillingError::Validation(format!(
                "Wallet already exists for user '{}'",
                owner_id
            )));
        }

        if advance_payments
            .values()
            .any(|amount| *amount < BigDecimal::from(0))
        {
            return Err(BillingError::Validation(
                "Advance payments cannot be negative".to_string(),
            ));
        }

        let wallet_id = format!(
            "{}{}",
            WALLET_ID_PREFIX,
            uuid::Uuid::new_v4().simple().to_string().to_uppercase()
        );
        let mut wallet = Wallet::new(wallet_id, owner_id.to_string());
        wallet.advance_payments = advance_payments;

        self.storage.save_wallet(&wallet).await?;

        info!(wallet_id = %wallet.id, owner_id = %owner_id, "Wallet opened");
        Ok(wallet)
    }

    /// Get the wallet of an owner
    pub async fn get_wallet(&self, owner_id: &str) -> BillingResult<Option<Wallet>> {
        self.storage.find_wallet_by_owner(owner_id).await
    }

    /// Get the wallet of an owner, returning an error if not found
    pub async fn get_wallet_required(&self, owner_id: &str) -> BillingResult<Wallet> {
        self.storage
            .find_wallet_by_owner(owner_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::Wallet, owner_id))
    }

    /// Build the homeowner dashboard; a missing wallet reads as zero balances
    pub async fn dashboard(&self, user_id: &str) -> BillingResult<Dashboard> {
        let user = self
            .storage
            .find_user(user_id)
            .await?
            .ok_or_else(|| BillingError::not_found(EntityKind::User, user_id))?;

        let wallet = self.storage.find_wallet_by_owner(user_id).await?;
        let statements = self.storage.find_statements_by_owner(user_id).await?;

        let pending: Vec<&Statement> = statements
            .iter()
            .filter(|statement| statement.payment_status == PaymentStatus::Pending)
            .collect();
        let outstanding_balance: BigDecimal = pending.iter().map(|s| s.outstanding()).sum();

        Ok(Dashboard {
            first_name: user.first_name,
            last_name: user.last_name,
            wallet_balance: wallet
                .as_ref()
                .map(|w| w.balance.clone())
                .unwrap_or_else(|| BigDecimal::from(0)),
            advance_payments: wallet
                .map(|w| w.advance_payments)
                .unwrap_or_default(),
            outstanding_balance: round_to_cents(&outstanding_balance),
            pending_statements: pending.len(),
        })
    }
}
