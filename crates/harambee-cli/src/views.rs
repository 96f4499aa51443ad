//! Plain-text rendering of the dashboard and transaction tables.

use harambee_core::aggregate::AggregateResult;
use harambee_core::models::EnrichedTransaction;
use rust_decimal::Decimal;

/// Column width for member names; longer names are truncated.
const NAME_WIDTH: usize = 24;

/// Column width for member emails.
const EMAIL_WIDTH: usize = 30;

/// Format an amount for display, e.g. "$1250" or "$12.50".
pub fn format_amount(amount: Decimal) -> String {
    format!("${}", amount.normalize())
}

/// Format a timestamp as its calendar date, e.g. "2025-03-01".
pub fn format_date(date: &chrono::DateTime<chrono::Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Print the contribution overview: the three summary figures and the
/// transaction table scoped to the viewer's role.
pub fn render_dashboard(result: &AggregateResult, viewer_name: &str, age_note: Option<&str>) {
    println!("CONTRIBUTION OVERVIEW ({})", viewer_name);
    if let Some(age) = age_note {
        println!("(offline - showing data cached {})", age);
    }
    println!();
    println!(
        "  Total Contribution:   {}",
        format_amount(result.totals.total)
    );
    println!(
        "  Your Contributions:   {}",
        format_amount(result.totals.own)
    );
    println!(
        "  No. of Contributors:  {}",
        result.totals.unique_contributors
    );
    println!();

    // Admins see every transaction; everyone else sees their own.
    let rows = if result.viewer_permission.is_admin() {
        &result.enriched
    } else {
        &result.own_only
    };
    println!("Transactions");
    render_table(rows);
}

/// Print transactions as a fixed-width table: Name, Email, Amount, Date.
pub fn render_table(rows: &[EnrichedTransaction]) {
    if rows.is_empty() {
        println!("  (no transactions)");
        return;
    }

    println!(
        "  {:<name$} {:<email$} {:>10} {:>12}",
        "Name",
        "Email",
        "Amount",
        "Date",
        name = NAME_WIDTH,
        email = EMAIL_WIDTH,
    );
    for row in rows {
        println!(
            "  {:<name$} {:<email$} {:>10} {:>12}",
            truncate_string(row.member_name(), NAME_WIDTH),
            truncate_string(row.member_email(), EMAIL_WIDTH),
            format_amount(row.amount),
            format_date(&row.created_at),
            name = NAME_WIDTH,
            email = EMAIL_WIDTH,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(1250)), "$1250");
        assert_eq!(format_amount(Decimal::new(1250, 2)), "$12.5");
        assert_eq!(format_amount(Decimal::ZERO), "$0");
    }

    #[test]
    fn test_format_date() {
        use chrono::TimeZone;
        let date = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap();
        assert_eq!(format_date(&date), "2025-03-01");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}
