//! Fill ingest and subaccount ownership operations.
//!
//! Fills and subaccounts are written by the upstream ingestion pipeline and
//! read by the aggregation core through the eligibility join.

use crate::domain::{Address, Fill, Subaccount, SubaccountId};

use super::Repository;

impl Repository {
    /// Upsert a subaccount ownership record.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_subaccount(&self, subaccount: &Subaccount) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO subaccounts (subaccount_id, owner_address, subaccount_number)
            VALUES (?, ?, ?)
            ON CONFLICT(subaccount_id) DO UPDATE SET
                owner_address = excluded.owner_address,
                subaccount_number = excluded.subaccount_number
            "#,
        )
        .bind(subaccount.id.as_str())
        .bind(subaccount.owner.as_str())
        .bind(subaccount.number)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up the owning address of a subaccount.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_subaccount_owner(
        &self,
        id: &SubaccountId,
    ) -> Result<Option<Address>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT owner_address FROM subaccounts WHERE subaccount_id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(owner,)| Address::new(owner)))
    }

    /// Insert a fill into the database idempotently.
    ///
    /// Returns true if the fill was new, false if the event id was already
    /// present.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_fill(&self, fill: &Fill) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO fills (
                event_id, subaccount_id, liquidity, fill_type, fee,
                affiliate_rev_share, price, size, created_at_ms, created_at_height
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_id) DO NOTHING
            "#,
        )
        .bind(fill.event_id.as_str())
        .bind(fill.subaccount_id.as_str())
        .bind(fill.liquidity.as_str())
        .bind(fill.fill_type.as_str())
        .bind(fill.fee.to_canonical_string())
        .bind(fill.affiliate_rev_share.to_canonical_string())
        .bind(fill.price.to_canonical_string())
        .bind(fill.size.to_canonical_string())
        .bind(fill.created_at.timestamp_millis())
        .bind(fill.created_at_height.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert multiple fills in a single transaction.
    ///
    /// Returns the number of newly inserted fills (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_fills_batch(&self, fills: &[Fill]) -> Result<usize, sqlx::Error> {
        if fills.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for fill in fills {
            let result = sqlx::query(
                r#"
                INSERT INTO fills (
                    event_id, subaccount_id, liquidity, fill_type, fee,
                    affiliate_rev_share, price, size, created_at_ms, created_at_height
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(event_id) DO NOTHING
                "#,
            )
            .bind(fill.event_id.as_str())
            .bind(fill.subaccount_id.as_str())
            .bind(fill.liquidity.as_str())
            .bind(fill.fill_type.as_str())
            .bind(fill.fee.to_canonical_string())
            .bind(fill.affiliate_rev_share.to_canonical_string())
            .bind(fill.price.to_canonical_string())
            .bind(fill.size.to_canonical_string())
            .bind(fill.created_at.timestamp_millis())
            .bind(fill.created_at_height.as_i64())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }
}
