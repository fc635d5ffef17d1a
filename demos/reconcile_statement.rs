//! Walk one statement through submission, review and reconciliation.
//!
//! Run with `RUST_LOG=debug` to see every reconciliation step.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use cvconnect_core::{
    utils::{MemoryNotifier, MemoryStorage},
    Association, BillingResult, CategoryCharges, EngineConfig, PaymentPurpose, PaymentSubmission,
    Statement, TransactionStatus, TransactionType, User, UserRole,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> BillingResult<()> {
    init_tracing();

    let notifier = MemoryNotifier::new();
    let association = Association::with_config(
        MemoryStorage::new(),
        Box::new(notifier.clone()),
        EngineConfig::from_env(),
    );

    association.ensure_organization_wallet().await?;
    association
        .register_user(User::new(
            "owner1".to_string(),
            "Maria".to_string(),
            "Santos".to_string(),
            "msantos".to_string(),
            "maria@example.com".to_string(),
            UserRole::Homeowner,
        ))
        .await?;
    association.open_wallet("owner1", BTreeMap::new()).await?;
    association
        .issue_statement(Statement::new(
            "stmt-2024-05".to_string(),
            "lot-12".to_string(),
            "owner1".to_string(),
            CategoryCharges::new(
                BigDecimal::from(100),
                BigDecimal::from(200),
                BigDecimal::from(50),
            ),
        ))
        .await?;

    let submissions = [
        (TransactionType::BillPayment, PaymentPurpose::WaterBill, 100),
        (TransactionType::AdvancedPayment, PaymentPurpose::All, 300),
    ];
    for (transaction_type, purpose, amount) in submissions {
        let transaction = association
            .submit_payment(PaymentSubmission {
                transaction_type,
                user_id: "owner1".to_string(),
                statement_id: "stmt-2024-05".to_string(),
                purpose,
                method: "GCash".to_string(),
                amount: BigDecimal::from(amount),
                image_url: None,
                paid_at: None,
            })
            .await?;

        let outcome = association
            .apply_transaction_status(&transaction.id, TransactionStatus::Completed, None)
            .await?;
        if let Some(summary) = outcome.statement {
            println!(
                "{} {} -> paid {} of {} ({:?}/{:?})",
                transaction.id,
                purpose,
                summary.total_paid,
                summary.total_amount_due,
                summary.payment_status,
                summary.transactions_status
            );
        }
    }

    let dashboard = association.dashboard("owner1").await?;
    let organization = association.organization_wallet().await?;
    println!(
        "Wallet balance: {}  Outstanding: {}  Association collected: {}",
        dashboard.wallet_balance, dashboard.outstanding_balance, organization.total_balance
    );
    println!("Notifications queued: {}", notifier.sent().len());

    Ok(())
}
