//! Allocation of a completed payment across statement categories
//!
//! Pure functions: given a statement and a payment, compute the new paid
//! breakdown and the derived payment / transactions statuses. Nothing here
//! touches storage.

use bigdecimal::BigDecimal;
use std::collections::BTreeMap;

use crate::types::*;

/// Amount assigned to each category by one payment
pub type Allocation = BTreeMap<PaymentCategory, BigDecimal>;

/// Split a payment across the statement's categories according to its purpose.
///
/// No category is ever allocated more than its remaining balance.
pub fn allocate_payment(
    statement: &Statement,
    purpose: PaymentPurpose,
    amount: &BigDecimal,
) -> Allocation {
    match purpose.category() {
        Some(category) => allocate_single(statement, category, amount),
        None => allocate_proportionally(statement, amount),
    }
}

fn allocate_single(
    statement: &Statement,
    category: PaymentCategory,
    amount: &BigDecimal,
) -> Allocation {
    let mut allocation = Allocation::new();
    let share = amount.clone().min(statement.remaining_for(category));
    if share > BigDecimal::from(0) {
        allocation.insert(category, share);
    }
    allocation
}

/// Distribute `amount` proportionally to each category's remaining balance.
///
/// Shares are rounded to cents; the last category with a balance takes the
/// remainder so the shares add up to `min(amount, remaining_total)` exactly.
fn allocate_proportionally(statement: &Statement, amount: &BigDecimal) -> Allocation {
    let zero = BigDecimal::from(0);
    let mut allocation = Allocation::new();

    let remaining: Vec<(PaymentCategory, BigDecimal)> = PaymentCategory::ALL
        .iter()
        .map(|category| (*category, statement.remaining_for(*category)))
        .filter(|(_, balance)| *balance > zero)
        .collect();
    let remaining_total: BigDecimal = remaining.iter().map(|(_, balance)| balance).sum();

    if remaining_total <= zero || *amount <= zero {
        return allocation;
    }

    let to_allocate = amount.clone().min(remaining_total.clone());
    let mut allocated = BigDecimal::from(0);
    let last = remaining.len() - 1;

    for (index, (category, balance)) in remaining.into_iter().enumerate() {
        let share = if index == last {
            &to_allocate - &allocated
        } else {
            round_to_cents(&(&to_allocate * &balance / &remaining_total))
        };
        let share = share.min(balance).max(zero.clone());

        allocated += &share;
        if share > zero {
            allocation.insert(category, share);
        }
    }

    allocation
}

/// A category is paid once its paid-so-far reaches its charge
pub fn is_category_paid(
    charges: &CategoryCharges,
    breakdown: &PaidBreakdown,
    category: PaymentCategory,
) -> bool {
    let paid = breakdown
        .get(&category)
        .cloned()
        .unwrap_or_else(|| BigDecimal::from(0));
    paid >= *charges.get(category)
}

/// `Paid` iff every category is paid and the total paid covers the amount due
pub fn derive_payment_status(
    charges: &CategoryCharges,
    breakdown: &PaidBreakdown,
    total_paid: &BigDecimal,
    total_amount_due: &BigDecimal,
) -> PaymentStatus {
    let all_categories_paid = PaymentCategory::ALL
        .iter()
        .all(|category| is_category_paid(charges, breakdown, *category));

    if all_categories_paid && total_paid >= total_amount_due {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    }
}

/// `Completed` iff the statement is paid and the completed transactions cover
/// both the recorded total paid and the amount due
pub fn derive_transactions_status(
    payment_status: PaymentStatus,
    completed_sum: &BigDecimal,
    total_paid: &BigDecimal,
    total_amount_due: &BigDecimal,
) -> TransactionsStatus {
    if payment_status == PaymentStatus::Paid
        && completed_sum >= total_paid
        && completed_sum >= total_amount_due
    {
        TransactionsStatus::Completed
    } else {
        TransactionsStatus::Pending
    }
}

/// Compute every statement field that changes when `transaction` completes.
///
/// `completed_sum` is the sum of all completed transactions against the
/// statement, this one included.
pub fn plan_billing_update(
    statement: &Statement,
    transaction: &Transaction,
    completed_sum: &BigDecimal,
) -> BillingUpdate {
    let allocation = allocate_payment(statement, transaction.purpose, &transaction.amount);

    let mut paid_breakdown = statement.paid_breakdown.clone();
    for (category, share) in allocation {
        *paid_breakdown
            .entry(category)
            .or_insert_with(|| BigDecimal::from(0)) += share;
    }

    let total_paid = round_to_cents(&(&statement.total_paid + &transaction.amount));
    let payment_status = derive_payment_status(
        &statement.charges,
        &paid_breakdown,
        &total_paid,
        &statement.total_amount_due,
    );
    let transactions_status = derive_transactions_status(
        payment_status,
        completed_sum,
        &total_paid,
        &statement.total_amount_due,
    );

    BillingUpdate {
        total_paid,
        paid_breakdown,
        payment_status,
        transactions_status,
        applied_transaction_id: transaction.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> BigDecimal {
        value.parse().unwrap()
    }

    fn statement(water: i32, hoa: i32, garbage: i32) -> Statement {
        Statement::new(
            "stmt1".to_string(),
            "prop1".to_string(),
            "user1".to_string(),
            CategoryCharges::new(
                BigDecimal::from(water),
                BigDecimal::from(hoa),
                BigDecimal::from(garbage),
            ),
        )
    }

    fn payment(id: &str, purpose: PaymentPurpose, amount: BigDecimal) -> Transaction {
        Transaction::new(
            id.to_string(),
            TransactionType::BillPayment,
            "user1".to_string(),
            purpose,
            "GCash".to_string(),
            amount,
            Some("stmt1".to_string()),
        )
    }

    fn allocated_total(allocation: &Allocation) -> BigDecimal {
        allocation.values().sum()
    }

    #[test]
    fn test_half_payment_splits_evenly() {
        let statement = statement(100, 200, 50);
        let allocation = allocate_payment(&statement, PaymentPurpose::All, &BigDecimal::from(175));

        assert_eq!(allocation[&PaymentCategory::Water], BigDecimal::from(50));
        assert_eq!(allocation[&PaymentCategory::HoaMaintenance], BigDecimal::from(100));
        assert_eq!(allocation[&PaymentCategory::Garbage], BigDecimal::from(25));
    }

    #[test]
    fn test_two_half_payments_settle_statement() {
        let mut statement = statement(100, 200, 50);
        let first = payment("t1", PaymentPurpose::All, BigDecimal::from(175));
        let update = plan_billing_update(&statement, &first, &BigDecimal::from(175));
        assert_eq!(update.total_paid, dec("175.00"));
        assert_eq!(update.payment_status, PaymentStatus::Pending);
        assert_eq!(update.transactions_status, TransactionsStatus::Pending);
        statement.apply_update(&update);

        let second = payment("t2", PaymentPurpose::All, BigDecimal::from(175));
        let update = plan_billing_update(&statement, &second, &BigDecimal::from(350));
        assert_eq!(update.paid_breakdown[&PaymentCategory::Water], BigDecimal::from(100));
        assert_eq!(update.paid_breakdown[&PaymentCategory::HoaMaintenance], BigDecimal::from(200));
        assert_eq!(update.paid_breakdown[&PaymentCategory::Garbage], BigDecimal::from(50));
        assert_eq!(update.total_paid, dec("350.00"));
        assert_eq!(update.payment_status, PaymentStatus::Paid);
        assert_eq!(update.transactions_status, TransactionsStatus::Completed);
    }

    #[test]
    fn test_single_category_is_capped_at_charge() {
        let statement = statement(100, 200, 50);
        let allocation =
            allocate_payment(&statement, PaymentPurpose::WaterBill, &BigDecimal::from(500));

        assert_eq!(allocation.len(), 1);
        assert_eq!(allocation[&PaymentCategory::Water], BigDecimal::from(100));
    }

    #[test]
    fn test_single_category_already_paid_allocates_nothing() {
        let mut statement = statement(100, 200, 50);
        statement
            .paid_breakdown
            .insert(PaymentCategory::Garbage, BigDecimal::from(50));
        let allocation = allocate_payment(&statement, PaymentPurpose::Garbage, &BigDecimal::from(20));
        assert!(allocation.is_empty());
    }

    #[test]
    fn test_proportional_shares_sum_exactly_with_uneven_split() {
        let statement = statement(100, 100, 100);
        let allocation = allocate_payment(&statement, PaymentPurpose::All, &BigDecimal::from(100));

        assert_eq!(allocated_total(&allocation), BigDecimal::from(100));
        assert_eq!(allocation[&PaymentCategory::Water], dec("33.33"));
        assert_eq!(allocation[&PaymentCategory::HoaMaintenance], dec("33.33"));
        assert_eq!(allocation[&PaymentCategory::Garbage], dec("33.34"));
    }

    #[test]
    fn test_proportional_shares_cover_min_of_amount_and_remaining() {
        // (charges, already paid, amount), all per water / hoa / garbage
        let cases: [([&str; 3], [&str; 3], &str); 10] = [
            (["100", "200", "50"], ["30", "0", "49.99"], "270.00"),
            (["100", "200", "50"], ["30", "0", "49.99"], "270.01"),
            (["100", "200", "50"], ["30", "0", "49.99"], "270.02"),
            (["100", "200", "50"], ["30", "0", "49.99"], "0.01"),
            (["33.33", "66.67", "10.00"], ["0", "66.66", "0"], "43.33"),
            (["33.33", "66.67", "10.00"], ["0", "66.66", "0"], "43.35"),
            (["33.33", "66.67", "10.00"], ["0", "66.66", "0"], "1.00"),
            (["0.10", "0.10", "0.10"], ["0", "0", "0"], "0.10"),
            (["1250.75", "980.40", "75.25"], ["600.13", "0.40", "75.24"], "1000.00"),
            (["1250.75", "980.40", "75.25"], ["600.13", "0.40", "75.24"], "1630.64"),
        ];

        for (charges, paid, amount) in cases {
            let mut statement = Statement::new(
                "stmt1".to_string(),
                "prop1".to_string(),
                "user1".to_string(),
                CategoryCharges::new(dec(charges[0]), dec(charges[1]), dec(charges[2])),
            );
            for (category, value) in PaymentCategory::ALL.iter().zip(paid) {
                statement.paid_breakdown.insert(*category, dec(value));
            }
            let remaining: BigDecimal = PaymentCategory::ALL
                .iter()
                .map(|category| statement.remaining_for(*category))
                .sum();
            let amount = dec(amount);

            let allocation = allocate_payment(&statement, PaymentPurpose::All, &amount);

            assert_eq!(
                allocated_total(&allocation),
                amount.clone().min(remaining.clone()),
                "charges {:?} paid {:?} amount {}",
                charges,
                paid,
                amount
            );
            for (category, share) in &allocation {
                assert!(
                    *share <= statement.remaining_for(*category),
                    "{} share {} exceeds remaining {} (amount {})",
                    category,
                    share,
                    statement.remaining_for(*category),
                    amount
                );
                assert!(*share > BigDecimal::from(0));
            }
        }
    }

    #[test]
    fn test_overpayment_allocates_only_remaining() {
        let mut statement = statement(100, 200, 50);
        statement
            .paid_breakdown
            .insert(PaymentCategory::HoaMaintenance, BigDecimal::from(200));
        let allocation = allocate_payment(&statement, PaymentPurpose::All, &BigDecimal::from(400));

        assert_eq!(allocated_total(&allocation), BigDecimal::from(150));
        assert_eq!(allocation[&PaymentCategory::Water], BigDecimal::from(100));
        assert_eq!(allocation[&PaymentCategory::Garbage], BigDecimal::from(50));
        assert!(!allocation.contains_key(&PaymentCategory::HoaMaintenance));
    }

    #[test]
    fn test_fully_paid_statement_allocates_nothing() {
        let mut statement = statement(10, 20, 30);
        for category in PaymentCategory::ALL {
            let charge = statement.charges.get(category).clone();
            statement.paid_breakdown.insert(category, charge);
        }
        let allocation = allocate_payment(&statement, PaymentPurpose::All, &BigDecimal::from(15));
        assert!(allocation.is_empty());
    }

    #[test]
    fn test_payment_status_requires_every_category() {
        let statement = statement(100, 200, 50);
        let mut breakdown = PaidBreakdown::new();
        breakdown.insert(PaymentCategory::Water, BigDecimal::from(100));
        breakdown.insert(PaymentCategory::HoaMaintenance, BigDecimal::from(200));

        // Totals cover the amount due but garbage is still unpaid
        let status = derive_payment_status(
            &statement.charges,
            &breakdown,
            &BigDecimal::from(400),
            &statement.total_amount_due,
        );
        assert_eq!(status, PaymentStatus::Pending);

        breakdown.insert(PaymentCategory::Garbage, BigDecimal::from(50));
        let status = derive_payment_status(
            &statement.charges,
            &breakdown,
            &BigDecimal::from(349),
            &statement.total_amount_due,
        );
        assert_eq!(status, PaymentStatus::Pending);

        let status = derive_payment_status(
            &statement.charges,
            &breakdown,
            &BigDecimal::from(350),
            &statement.total_amount_due,
        );
        assert_eq!(status, PaymentStatus::Paid);
    }

    #[test]
    fn test_transactions_status_needs_completed_sum() {
        let status = derive_transactions_status(
            PaymentStatus::Paid,
            &BigDecimal::from(300),
            &BigDecimal::from(350),
            &BigDecimal::from(350),
        );
        assert_eq!(status, TransactionsStatus::Pending);

        let status = derive_transactions_status(
            PaymentStatus::Paid,
            &BigDecimal::from(400),
            &BigDecimal::from(400),
            &BigDecimal::from(350),
        );
        assert_eq!(status, TransactionsStatus::Completed);
    }
}
