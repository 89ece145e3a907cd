//! Ledger table definitions
//!
//! `ensure_schema` is idempotent and safe to run on every startup.

use sqlx::PgPool;

pub const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          BIGSERIAL PRIMARY KEY,
    owner       VARCHAR(255) NOT NULL,
    balance     BIGINT NOT NULL,
    currency    VARCHAR(16) NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id          BIGSERIAL PRIMARY KEY,
    account_id  BIGINT NOT NULL REFERENCES accounts (id),
    amount      BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRANSFERS: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id               BIGSERIAL PRIMARY KEY,
    from_account_id  BIGINT NOT NULL REFERENCES accounts (id),
    to_account_id    BIGINT NOT NULL REFERENCES accounts (id),
    amount           BIGINT NOT NULL CHECK (amount > 0),
    client_ref       VARCHAR(128) UNIQUE,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS idx_entries_account_id ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_from_to ON transfers (from_account_id, to_account_id)",
    "CREATE INDEX IF NOT EXISTS idx_transfers_to_account_id ON transfers (to_account_id)",
];

/// Create the ledger tables and indexes if missing
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for stmt in [CREATE_ACCOUNTS, CREATE_ENTRIES, CREATE_TRANSFERS]
        .into_iter()
        .chain(CREATE_INDEXES)
    {
        sqlx::query(stmt).execute(pool).await?;
    }

    tracing::info!("Ledger schema ready");
    Ok(())
}
