//! SQLite-backed [`MigrationStore`].

use super::{ConfirmedMint, InsertOutcome, MigrationStats, MigrationStore, MintTx, Watermark};
use crate::errors::MigrationError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nft_migration_core::{AddressMapping, MigrationRecord, NewMigrationRecord};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Migration store on a SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    destination_token_id: i64,
    burned: bool,
    origin_chain_id: i64,
    origin_block_number: Option<i64>,
    burn_timestamp: DateTime<Utc>,
    burn_transaction_hash: Option<String>,
    burn_transaction_id: Option<i64>,
    origin_token_address: String,
    origin_token_id: i64,
    from_origin_wallet: String,
    to_origin_wallet: String,
    minted: bool,
    destination_chain_id: i64,
    destination_token_address: String,
    to_destination_wallet: String,
    mint_transaction_hash: Option<String>,
    mint_transaction_id: Option<String>,
}

impl TryFrom<TokenRow> for MigrationRecord {
    type Error = MigrationError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(MigrationRecord {
            id: row.id,
            destination_token_id: from_db(row.destination_token_id)?,
            burned: row.burned,
            origin_chain_id: from_db(row.origin_chain_id)?,
            origin_block_number: row.origin_block_number.map(from_db).transpose()?,
            burn_timestamp: row.burn_timestamp,
            burn_transaction_hash: row.burn_transaction_hash,
            burn_transaction_id: row.burn_transaction_id.map(from_db).transpose()?,
            origin_token_address: row.origin_token_address,
            origin_token_id: from_db(row.origin_token_id)?,
            from_origin_wallet: row.from_origin_wallet,
            to_origin_wallet: row.to_origin_wallet,
            minted: row.minted,
            destination_chain_id: from_db(row.destination_chain_id)?,
            destination_token_address: row.destination_token_address,
            to_destination_wallet: row.to_destination_wallet,
            mint_transaction_hash: row.mint_transaction_hash,
            mint_transaction_id: row.mint_transaction_id,
        })
    }
}

fn to_db(value: u64) -> Result<i64, MigrationError> {
    i64::try_from(value)
        .map_err(|_| MigrationError::InvalidRecord(format!("{value} does not fit in an INTEGER column")))
}

fn from_db(value: i64) -> Result<u64, MigrationError> {
    u64::try_from(value)
        .map_err(|_| MigrationError::InvalidRecord(format!("negative value {value} in store")))
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url` and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self, MigrationError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database, for tests and dry runs.
    pub async fn in_memory() -> Result<Self, MigrationError> {
        // A single long-lived connection: every new connection would open an empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and run migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MigrationError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn origin_token_exists(&self, record: &NewMigrationRecord) -> Result<bool, MigrationError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM tokens
             WHERE origin_chain_id = ?1 AND origin_token_address = ?2 AND origin_token_id = ?3",
        )
        .bind(to_db(record.origin_chain_id)?)
        .bind(&record.origin_token_address)
        .bind(to_db(record.origin_token_id)?)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl MigrationStore for SqliteStore {
    async fn insert_record(&self, record: &NewMigrationRecord) -> Result<InsertOutcome, MigrationError> {
        let result = sqlx::query(
            "INSERT INTO tokens (
                destination_token_id, burned, origin_chain_id, origin_block_number,
                burn_timestamp, burn_transaction_hash, burn_transaction_id,
                origin_token_address, origin_token_id, from_origin_wallet, to_origin_wallet,
                minted, destination_chain_id, destination_token_address, to_destination_wallet
            ) VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12, ?13)",
        )
        .bind(to_db(record.destination_token_id)?)
        .bind(to_db(record.origin_chain_id)?)
        .bind(record.origin_block_number.map(to_db).transpose()?)
        .bind(record.burn_timestamp)
        .bind(&record.burn_transaction_hash)
        .bind(record.burn_transaction_id.map(to_db).transpose()?)
        .bind(&record.origin_token_address)
        .bind(to_db(record.origin_token_id)?)
        .bind(&record.from_origin_wallet)
        .bind(&record.to_origin_wallet)
        .bind(to_db(record.destination_chain_id)?)
        .bind(&record.destination_token_address)
        .bind(&record.to_destination_wallet)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) => match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    if self.origin_token_exists(record).await? {
                        Ok(InsertOutcome::Duplicate)
                    } else {
                        Ok(InsertOutcome::DestinationCollision)
                    }
                }
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                    Err(MigrationError::InvalidRecord(db_err.message().to_string()))
                }
                _ => Err(MigrationError::Store(sqlx::Error::Database(db_err))),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn unminted_records(
        &self,
        destination_chain_id: u64,
        destination_token_address: &str,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        let rows: Vec<TokenRow> = sqlx::query_as(
            "SELECT id, destination_token_id, burned, origin_chain_id, origin_block_number,
                    burn_timestamp, burn_transaction_hash, burn_transaction_id,
                    origin_token_address, origin_token_id, from_origin_wallet, to_origin_wallet,
                    minted, destination_chain_id, destination_token_address, to_destination_wallet,
                    mint_transaction_hash, mint_transaction_id
             FROM tokens
             WHERE minted = 0 AND destination_chain_id = ?1 AND destination_token_address = ?2
             ORDER BY id",
        )
        .bind(to_db(destination_chain_id)?)
        .bind(destination_token_address)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MigrationRecord::try_from).collect()
    }

    async fn mark_minted(&self, mints: &[ConfirmedMint]) -> Result<u64, MigrationError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for mint in mints {
            let (hash, id) = match &mint.tx {
                MintTx::Hash(hash) => (Some(hash.as_str()), None),
                MintTx::Id(id) => (None, Some(id.as_str())),
                MintTx::AlreadyOwned => (None, None),
            };
            let result = sqlx::query(
                "UPDATE tokens
                 SET minted = 1, mint_transaction_hash = ?1, mint_transaction_id = ?2,
                     minted_at = CURRENT_TIMESTAMP
                 WHERE destination_token_id = ?3 AND minted = 0",
            )
            .bind(hash)
            .bind(id)
            .bind(to_db(mint.destination_token_id)?)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn find_address_mapping(
        &self,
        origin_chain_id: u64,
        destination_chain_id: u64,
        origin_wallet: &str,
    ) -> Result<Option<AddressMapping>, MigrationError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT destination_wallet FROM address_mappings
             WHERE origin_chain_id = ?1 AND destination_chain_id = ?2 AND origin_wallet = ?3",
        )
        .bind(to_db(origin_chain_id)?)
        .bind(to_db(destination_chain_id)?)
        .bind(origin_wallet)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(destination_wallet,)| AddressMapping {
            origin_chain_id,
            destination_chain_id,
            origin_wallet: origin_wallet.to_string(),
            destination_wallet,
        }))
    }

    async fn upsert_address_mapping(&self, mapping: &AddressMapping) -> Result<(), MigrationError> {
        sqlx::query(
            "INSERT INTO address_mappings (origin_chain_id, destination_chain_id, origin_wallet, destination_wallet)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (origin_chain_id, destination_chain_id, origin_wallet)
             DO UPDATE SET destination_wallet = excluded.destination_wallet,
                           updated_at = CURRENT_TIMESTAMP",
        )
        .bind(to_db(mapping.origin_chain_id)?)
        .bind(to_db(mapping.destination_chain_id)?)
        .bind(&mapping.origin_wallet)
        .bind(&mapping.destination_wallet)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_watermark(
        &self,
        chain_id: u64,
        collection_address: &str,
    ) -> Result<Option<Watermark>, MigrationError> {
        let row: Option<(Option<i64>, Option<String>)> = sqlx::query_as(
            "SELECT last_polled_block, cursor FROM watermarks
             WHERE chain_id = ?1 AND collection_address = ?2",
        )
        .bind(to_db(chain_id)?)
        .bind(collection_address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(last_polled_block, cursor)| {
            Ok(Watermark {
                chain_id,
                collection_address: collection_address.to_string(),
                last_polled_block: last_polled_block.map(from_db).transpose()?,
                cursor,
            })
        })
        .transpose()
    }

    async fn save_watermark(&self, watermark: &Watermark) -> Result<(), MigrationError> {
        sqlx::query(
            "INSERT INTO watermarks (chain_id, collection_address, last_polled_block, cursor)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (chain_id, collection_address)
             DO UPDATE SET last_polled_block = excluded.last_polled_block,
                           cursor = excluded.cursor,
                           updated_at = CURRENT_TIMESTAMP",
        )
        .bind(to_db(watermark.chain_id)?)
        .bind(&watermark.collection_address)
        .bind(watermark.last_polled_block.map(to_db).transpose()?)
        .bind(&watermark.cursor)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migration_stats(&self) -> Result<MigrationStats, MigrationError> {
        let (total, minted): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), SUM(minted) FROM tokens")
                .fetch_one(&self.pool)
                .await?;
        let total = from_db(total)?;
        let minted = from_db(minted.unwrap_or(0))?;
        Ok(MigrationStats {
            total,
            minted,
            pending: total.saturating_sub(minted),
        })
    }
}
