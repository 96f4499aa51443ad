//! Data models for sacco entities.
//!
//! - `Member`: a registered participant and their role
//! - `Transaction`, `NewTransaction`: recorded contributions
//! - `EnrichedTransaction`: a transaction widened with its resolved member
//!   at merge time

pub mod member;
pub mod transaction;

pub use member::{Member, Permission};
pub use transaction::{EnrichedTransaction, MemberRef, NewTransaction, Transaction, UNKNOWN_MEMBER};
