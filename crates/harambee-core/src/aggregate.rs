//! Contribution aggregation.
//!
//! Merges the `members` and `transactions` collections fetched from the
//! backend into a denormalized view and derives the dashboard statistics.
//! The merge is pure and total: it never fails, never mutates its inputs,
//! and is recomputed from scratch on every fetch cycle; the source
//! collections stay authoritative.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{EnrichedTransaction, Member, MemberRef, Permission, Transaction};

/// Summary statistics over the enriched transaction sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of `amount` over all transactions.
    pub total: Decimal,
    /// Sum of `amount` over transactions whose member email matches the
    /// viewer.
    pub own: Decimal,
    /// Count of distinct resolved member names; unresolved rows count once
    /// as "Unknown".
    pub unique_contributors: usize,
}

/// Output of one merge pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Every transaction, widened with its member, in store order
    /// (newest first).
    pub enriched: Vec<EnrichedTransaction>,
    /// The viewer's own transactions, for non-admin views.
    pub own_only: Vec<EnrichedTransaction>,
    pub totals: Totals,
    /// Permission of the member matching the viewer's email, `User` when
    /// no member matches.
    pub viewer_permission: Permission,
}

/// Merge members and transactions and reduce to the dashboard statistics.
///
/// Transactions keep their input order; the store already returns them
/// descending by `created_at` and this function does not re-sort.
pub fn aggregate(
    members: &[Member],
    transactions: &[Transaction],
    viewer_email: &str,
) -> AggregateResult {
    // Index members by id before the merge pass. Duplicate ids are not
    // validated; the first occurrence wins.
    let mut by_id: HashMap<i64, &Member> = HashMap::with_capacity(members.len());
    for member in members {
        by_id.entry(member.id).or_insert(member);
    }

    let viewer_permission = members
        .iter()
        .find(|m| m.email == viewer_email)
        .map(|m| m.permission)
        .unwrap_or_default();

    let mut enriched = Vec::with_capacity(transactions.len());
    let mut own_only = Vec::new();
    let mut totals = Totals::default();
    let mut names: HashSet<&str> = HashSet::new();

    for tx in transactions {
        let resolved: Option<&Member> = by_id.get(&tx.member).copied();

        totals.total += tx.amount;
        names.insert(
            resolved
                .map(|m| m.name.as_str())
                .unwrap_or(crate::models::UNKNOWN_MEMBER),
        );

        let is_own = resolved.is_some_and(|m| m.email == viewer_email);

        let row = EnrichedTransaction {
            id: tx.id,
            amount: tx.amount,
            created_at: tx.created_at,
            member: resolved.map(MemberRef::from_member),
        };

        if is_own {
            totals.own += tx.amount;
            own_only.push(row.clone());
        }
        enriched.push(row);
    }

    totals.unique_contributors = names.len();

    AggregateResult {
        enriched,
        own_only,
        totals,
        viewer_permission,
    }
}

/// Case-insensitive substring filter on the resolved member name.
pub fn filter_by_name(rows: &[EnrichedTransaction], query: &str) -> Vec<EnrichedTransaction> {
    let query = query.to_lowercase();
    rows.iter()
        .filter(|row| row.member_name().to_lowercase().contains(&query))
        .cloned()
        .collect()
}
