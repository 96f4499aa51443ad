use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Member, Permission};

/// Display name used when a transaction's foreign key resolves to no member.
pub const UNKNOWN_MEMBER: &str = "Unknown";

/// A single recorded contribution, as returned by the `transactions` table.
/// Never mutated or deleted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// Foreign key to `Member.id`. The column is named `member` in the
    /// backing table.
    pub member: i64,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for recording a contribution. The backend assigns
/// `id` and `created_at`.
#[derive(Debug, Clone, Serialize)]
pub struct NewTransaction {
    pub member: i64,
    pub amount: Decimal,
}

/// Fields copied from the matching member at merge time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub permission: Permission,
}

impl MemberRef {
    pub fn from_member(member: &Member) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            email: member.email.clone(),
            permission: member.permission,
        }
    }
}

/// A transaction widened with its resolved member.
///
/// `member` is `None` when the foreign key matched nothing, a defined
/// fallback rather than an error. The display accessors surface the "Unknown"
/// sentinel; anything that needs the real identity must handle the
/// absent case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedTransaction {
    pub id: i64,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub member: Option<MemberRef>,
}

impl EnrichedTransaction {
    pub fn member_name(&self) -> &str {
        self.member
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or(UNKNOWN_MEMBER)
    }

    pub fn member_email(&self) -> &str {
        self.member
            .as_ref()
            .map(|m| m.email.as_str())
            .unwrap_or(UNKNOWN_MEMBER)
    }

    pub fn member_permission(&self) -> Option<Permission> {
        self.member.as_ref().map(|m| m.permission)
    }
}
