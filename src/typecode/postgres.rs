use sqlx::PgConnection;

use super::{AllocationDomain, TypecodeRange, TypecodeStore};

// Lowest code of [$2, $3] not used in domain $1. The range start is returned
// when it is free; otherwise the smallest successor of a used code that is not
// itself used. Arithmetic is done in BIGINT so a used i32::MAX has a successor,
// which is then rejected as outside the range.
const LOWEST_UNUSED_SQL: &str = r#"
    WITH used AS (
        SELECT typecode
        FROM item
        WHERE allocation_domain = $1
          AND typecode BETWEEN $2 AND $3
    )
    SELECT CASE
        WHEN NOT EXISTS (SELECT 1 FROM used WHERE typecode = $2) THEN $2::BIGINT
        ELSE (
            SELECT MIN(u.typecode::BIGINT + 1)
            FROM used AS u
            WHERE NOT EXISTS (
                SELECT 1 FROM used AS n
                WHERE n.typecode::BIGINT = u.typecode::BIGINT + 1
            )
        )
    END AS next_typecode
"#;

// Two-key advisory lock: a fixed namespace plus the hashed domain key. Held
// until the enclosing transaction ends.
const LOCK_DOMAIN_SQL: &str = "SELECT pg_advisory_xact_lock($1, hashtext($2))";
const ALLOCATION_LOCK_NAMESPACE: i32 = 0x7463;

/// [`TypecodeStore`] over a Postgres connection, normally the transaction the
/// item insert runs in.
///
/// Every lookup first takes a transaction-scoped advisory lock on the
/// allocation domain, so concurrent transactions allocating in the same domain
/// run read-then-insert one at a time. Outside an explicit transaction the lock
/// is released as soon as the lookup returns.
pub struct PgTypecodeStore<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgTypecodeStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

impl TypecodeStore for PgTypecodeStore<'_> {
    async fn lowest_unused(
        &mut self,
        domain: AllocationDomain,
        range: TypecodeRange,
    ) -> Result<Option<i32>, sqlx::Error> {
        let key = domain.key();

        sqlx::query(LOCK_DOMAIN_SQL)
            .bind(ALLOCATION_LOCK_NAMESPACE)
            .bind(key.as_str())
            .execute(&mut *self.conn)
            .await?;

        let next: Option<i64> = sqlx::query_scalar(LOWEST_UNUSED_SQL)
            .bind(key.as_str())
            .bind(range.start())
            .bind(range.end())
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(next
            .filter(|code| *code <= i64::from(range.end()))
            .and_then(|code| i32::try_from(code).ok()))
    }
}
