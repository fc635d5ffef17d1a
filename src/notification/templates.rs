//! Email bodies for transaction notifications

use crate::types::{round_to_cents, Transaction};

/// Transaction fields shown to the homeowner
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDetails {
    pub transaction_id: String,
    pub date: String,
    pub amount: String,
    pub method: String,
    pub purpose: String,
    pub transaction_type: String,
}

impl TransactionDetails {
    pub fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            transaction_id: transaction.id.clone(),
            date: transaction.created_at.format("%B %-d, %Y").to_string(),
            amount: round_to_cents(&transaction.amount).to_string(),
            method: transaction.method.clone(),
            purpose: transaction.purpose.to_string(),
            transaction_type: transaction.transaction_type.to_string(),
        }
    }
}

const HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta http-equiv="Content-Type" content="text/html; charset=utf-8">
	<meta name="viewport" content="width=device-width, initial-scale=1.0">
	<style>
		body { margin: 0; padding: 0; color: #2b2d42; font-family: Montserrat, Arial, sans-serif; }
		p { line-height: inherit; }
		table.details td { padding: 4px 12px 4px 0; }
	</style>
</head>
<body>
"#;

const FOOTER: &str = r#"<p style="margin: 0;">Thank you,<br>CVConnect</p>
</body>
</html>
"#;

pub fn completed_html(first_name: &str, details: &TransactionDetails) -> String {
    format!(
        r#"{header}<p style="margin: 0; margin-bottom: 16px;">Good day&nbsp;{name},</p>
<p style="margin: 0; margin-bottom: 16px;">Your transaction has been completed.</p>
<table class="details">
	<tr><td>Transaction ID</td><td><strong>{id}</strong></td></tr>
	<tr><td>Date</td><td><strong>{date}</strong></td></tr>
	<tr><td>Amount</td><td><strong>{amount}</strong></td></tr>
	<tr><td>Payment Method</td><td><strong>{method}</strong></td></tr>
	<tr><td>Purpose</td><td><strong>{purpose}</strong></td></tr>
	<tr><td>Type</td><td><strong>{kind}</strong></td></tr>
</table>
{footer}"#,
        header = HEADER,
        footer = FOOTER,
        name = escape_html(first_name),
        id = escape_html(&details.transaction_id),
        date = escape_html(&details.date),
        amount = escape_html(&details.amount),
        method = escape_html(&details.method),
        purpose = escape_html(&details.purpose),
        kind = escape_html(&details.transaction_type),
    )
}

pub fn completed_text(first_name: &str, details: &TransactionDetails) -> String {
    format!(
        "Hello {},\n\nYour transaction {} has been completed.\n\nDate: {}\nAmount: {}\nPayment Method: {}\nPurpose: {}\nType: {}\n",
        first_name,
        details.transaction_id,
        details.date,
        details.amount,
        details.method,
        details.purpose,
        details.transaction_type,
    )
}

pub fn rejected_html(first_name: &str, transaction_id: &str, reason: &str) -> String {
    format!(
        r#"{header}<p style="margin: 0; margin-bottom: 16px;">Good day&nbsp;{name},</p>
<p style="margin: 0; margin-bottom: 16px;">Your transaction <strong>{id}</strong> has been rejected.</p>
<p style="margin: 0; margin-bottom: 16px;">Reason:&nbsp;{reason}</p>
{footer}"#,
        header = HEADER,
        footer = FOOTER,
        name = escape_html(first_name),
        id = escape_html(transaction_id),
        reason = escape_html(reason),
    )
}

pub fn rejected_text(first_name: &str, transaction_id: &str, reason: &str) -> String {
    format!(
        "Hello {},\n\nYour transaction {} has been rejected.\n\nReason: {}\n",
        first_name, transaction_id, reason
    )
}

/// Escape text for interpolation into HTML
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_rejected_html_escapes_reason() {
        let html = rejected_html("Ana", "CVT1", "<script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
