use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo;
use crate::users::types::Role;

const TIMESTAMP_ATTEMPTS: usize = 5;
const FALLBACK_ATTEMPTS: usize = 5;

/// Role prefix + last six digits of epoch-millis + three random digits.
pub fn candidate_id(role: Role) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let stamp = millis % 1_000_000;
    let random = rand::thread_rng().gen_range(0..1000);
    format!("{}{:06}{:03}", role.id_prefix(), stamp, random)
}

/// Same wire shape, but all nine digits drawn from a UUIDv4's random bits,
/// so a stuck clock cannot starve issuance.
pub fn fallback_id(role: Role) -> String {
    let digits = Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("{}{:09}", role.id_prefix(), digits)
}

/// Issue a role-scoped ID that is unique within its namespace. Bounded:
/// timestamp-based candidates first, random fallback after, hard error once
/// both budgets are exhausted.
pub async fn issue(db: &PgPool, role: Role) -> anyhow::Result<String> {
    for _ in 0..TIMESTAMP_ATTEMPTS {
        let candidate = candidate_id(role);
        if !repo::role_id_exists(db, role, &candidate).await? {
            return Ok(candidate);
        }
    }
    for _ in 0..FALLBACK_ATTEMPTS {
        let candidate = fallback_id(role);
        if !repo::role_id_exists(db, role, &candidate).await? {
            return Ok(candidate);
        }
    }
    anyhow::bail!(
        "could not issue a unique {:?} ID after {} attempts",
        role,
        TIMESTAMP_ATTEMPTS + FALLBACK_ATTEMPTS
    )
}
