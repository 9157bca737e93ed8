//! Aggregated stats reads and row mapping.
//!
//! The merge specs below are the single source of truth for how each output
//! column combines under the additive upsert: `Sum` columns accumulate run
//! deltas, `Replace` columns are snapshots overwritten every run. The
//! `MergeRow` builders must stay in declaration order with the specs.

use crate::db::upsert::{ColumnDef, MergePolicy, MergeRow, MergeValue, TableSpec};
use crate::domain::{Address, AffiliateInfo, AffiliateRefereeStats, BlockHeight, Decimal};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

/// Merge spec for the per-affiliate running totals.
pub(crate) const AFFILIATE_INFO_TABLE: TableSpec = TableSpec {
    table: "affiliate_info",
    key_column: "address",
    columns: &[
        ColumnDef {
            name: "affiliate_earnings",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_maker_trades",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_taker_trades",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "total_referred_maker_fees",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "total_referred_taker_fees",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "total_referred_maker_rebates",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "total_referred_users",
            policy: MergePolicy::Replace,
        },
        ColumnDef {
            name: "first_referral_block_height",
            policy: MergePolicy::Replace,
        },
        ColumnDef {
            name: "referred_total_volume",
            policy: MergePolicy::Sum,
        },
    ],
};

/// Merge spec for the per-referee running totals.
pub(crate) const REFEREE_STATS_TABLE: TableSpec = TableSpec {
    table: "affiliate_referee_stats",
    key_column: "referee_address",
    columns: &[
        ColumnDef {
            name: "affiliate_address",
            policy: MergePolicy::Replace,
        },
        ColumnDef {
            name: "affiliate_earnings",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_maker_trades",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_taker_trades",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_maker_fees",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_taker_fees",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_maker_rebates",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referred_liquidation_fees",
            policy: MergePolicy::Sum,
        },
        ColumnDef {
            name: "referral_block_height",
            policy: MergePolicy::Replace,
        },
        ColumnDef {
            name: "referred_total_volume",
            policy: MergePolicy::Sum,
        },
    ],
};

/// Build the merge row for an [`AffiliateInfo`] delta, value order matching
/// [`AFFILIATE_INFO_TABLE`].
pub(crate) fn affiliate_info_merge_row(info: &AffiliateInfo) -> MergeRow {
    MergeRow {
        key: info.address.as_str().to_string(),
        values: vec![
            MergeValue::Decimal(info.affiliate_earnings),
            MergeValue::Integer(info.referred_maker_trades),
            MergeValue::Integer(info.referred_taker_trades),
            MergeValue::Decimal(info.total_referred_maker_fees),
            MergeValue::Decimal(info.total_referred_taker_fees),
            MergeValue::Decimal(info.total_referred_maker_rebates),
            MergeValue::Integer(info.total_referred_users),
            MergeValue::Integer(info.first_referral_block_height.as_i64()),
            MergeValue::Decimal(info.referred_total_volume),
        ],
    }
}

/// Build the merge row for an [`AffiliateRefereeStats`] delta, value order
/// matching [`REFEREE_STATS_TABLE`].
pub(crate) fn referee_stats_merge_row(stats: &AffiliateRefereeStats) -> MergeRow {
    MergeRow {
        key: stats.referee_address.as_str().to_string(),
        values: vec![
            MergeValue::Text(stats.affiliate_address.as_str().to_string()),
            MergeValue::Decimal(stats.affiliate_earnings),
            MergeValue::Integer(stats.referred_maker_trades),
            MergeValue::Integer(stats.referred_taker_trades),
            MergeValue::Decimal(stats.referred_maker_fees),
            MergeValue::Decimal(stats.referred_taker_fees),
            MergeValue::Decimal(stats.referred_maker_rebates),
            MergeValue::Decimal(stats.referred_liquidation_fees),
            MergeValue::Integer(stats.referral_block_height.as_i64()),
            MergeValue::Decimal(stats.referred_total_volume),
        ],
    }
}

fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str_canonical(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn map_affiliate_info(row: &SqliteRow) -> Result<AffiliateInfo, sqlx::Error> {
    Ok(AffiliateInfo {
        address: Address::new(row.try_get("address")?),
        affiliate_earnings: get_decimal(row, "affiliate_earnings")?,
        referred_maker_trades: row.try_get("referred_maker_trades")?,
        referred_taker_trades: row.try_get("referred_taker_trades")?,
        total_referred_maker_fees: get_decimal(row, "total_referred_maker_fees")?,
        total_referred_taker_fees: get_decimal(row, "total_referred_taker_fees")?,
        total_referred_maker_rebates: get_decimal(row, "total_referred_maker_rebates")?,
        total_referred_users: row.try_get("total_referred_users")?,
        first_referral_block_height: BlockHeight::new(row.try_get("first_referral_block_height")?),
        referred_total_volume: get_decimal(row, "referred_total_volume")?,
    })
}

fn map_referee_stats(row: &SqliteRow) -> Result<AffiliateRefereeStats, sqlx::Error> {
    Ok(AffiliateRefereeStats {
        referee_address: Address::new(row.try_get("referee_address")?),
        affiliate_address: Address::new(row.try_get("affiliate_address")?),
        affiliate_earnings: get_decimal(row, "affiliate_earnings")?,
        referred_maker_trades: row.try_get("referred_maker_trades")?,
        referred_taker_trades: row.try_get("referred_taker_trades")?,
        referred_maker_fees: get_decimal(row, "referred_maker_fees")?,
        referred_taker_fees: get_decimal(row, "referred_taker_fees")?,
        referred_maker_rebates: get_decimal(row, "referred_maker_rebates")?,
        referred_liquidation_fees: get_decimal(row, "referred_liquidation_fees")?,
        referral_block_height: BlockHeight::new(row.try_get("referral_block_height")?),
        referred_total_volume: get_decimal(row, "referred_total_volume")?,
    })
}

impl Repository {
    /// Find the running totals for an affiliate.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is corrupt.
    pub async fn find_affiliate_info(
        &self,
        address: &Address,
    ) -> Result<Option<AffiliateInfo>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM affiliate_info WHERE address = ?")
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_affiliate_info).transpose()
    }

    /// List affiliate totals, sorted by earnings (highest first, ties by
    /// address), optionally filtered to a set of addresses.
    ///
    /// The `CAST` is for ordering only; stored values are never computed in
    /// SQL.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is corrupt.
    pub async fn list_affiliate_infos(
        &self,
        addresses: &[Address],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AffiliateInfo>, sqlx::Error> {
        let mut sql = String::from("SELECT * FROM affiliate_info");
        if !addresses.is_empty() {
            let placeholders = vec!["?"; addresses.len()].join(", ");
            sql.push_str(&format!(" WHERE address IN ({})", placeholders));
        }
        sql.push_str(
            " ORDER BY CAST(affiliate_earnings AS REAL) DESC, address ASC LIMIT ? OFFSET ?",
        );

        let mut query = sqlx::query(&sql);
        for address in addresses {
            query = query.bind(address.as_str());
        }
        let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        rows.iter().map(map_affiliate_info).collect()
    }

    /// Find the running totals for a single referee.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is corrupt.
    pub async fn find_referee_stats(
        &self,
        referee: &Address,
    ) -> Result<Option<AffiliateRefereeStats>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM affiliate_referee_stats WHERE referee_address = ?")
            .bind(referee.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_referee_stats).transpose()
    }

    /// List per-referee totals for an affiliate, largest earners first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is corrupt.
    pub async fn referee_stats_for_affiliate(
        &self,
        affiliate: &Address,
    ) -> Result<Vec<AffiliateRefereeStats>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM affiliate_referee_stats
            WHERE affiliate_address = ?
            ORDER BY CAST(affiliate_earnings AS REAL) DESC, referee_address ASC
            "#,
        )
        .bind(affiliate.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_referee_stats).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::upsert::merge_rows;
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn info(address: &str, earnings: &str) -> AffiliateInfo {
        AffiliateInfo {
            address: Address::new(address.to_string()),
            affiliate_earnings: Decimal::from_str(earnings).unwrap(),
            referred_maker_trades: 1,
            referred_taker_trades: 2,
            total_referred_maker_fees: Decimal::from_str("10").unwrap(),
            total_referred_taker_fees: Decimal::from_str("20").unwrap(),
            total_referred_maker_rebates: Decimal::from_str("-5").unwrap(),
            total_referred_users: 3,
            first_referral_block_height: BlockHeight::new(7),
            referred_total_volume: Decimal::from_str("100.5").unwrap(),
        }
    }

    async fn store_info(repo: &Repository, info: &AffiliateInfo) {
        let mut tx = repo.pool().begin().await.unwrap();
        merge_rows(
            &mut tx,
            &AFFILIATE_INFO_TABLE,
            &[affiliate_info_merge_row(info)],
        )
        .await
        .expect("merge failed");
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_affiliate_info_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let original = info("dydx1affiliate", "1000");

        store_info(&repo, &original).await;

        let found = repo
            .find_affiliate_info(&original.address)
            .await
            .expect("find failed")
            .expect("row missing");
        assert_eq!(found, original);
    }

    #[tokio::test]
    async fn test_list_sorts_numerically_not_lexicographically() {
        let (repo, _temp) = setup_test_db().await;

        // Lexicographic TEXT ordering would put "9" above "10".
        store_info(&repo, &info("dydx1a", "9")).await;
        store_info(&repo, &info("dydx1b", "10")).await;

        let listed = repo
            .list_affiliate_infos(&[], 10, 0)
            .await
            .expect("list failed");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].address.as_str(), "dydx1b");
        assert_eq!(listed[1].address.as_str(), "dydx1a");
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let (repo, _temp) = setup_test_db().await;

        for i in 0..5 {
            store_info(&repo, &info(&format!("dydx1addr{}", i), &i.to_string())).await;
        }

        let filtered = repo
            .list_affiliate_infos(&[Address::new("dydx1addr3".to_string())], 10, 0)
            .await
            .expect("list failed");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].address.as_str(), "dydx1addr3");

        let page = repo.list_affiliate_infos(&[], 2, 1).await.expect("list failed");
        assert_eq!(page.len(), 2);
        // earnings desc: 4, 3, 2, ... -> offset 1 starts at 3
        assert_eq!(page[0].address.as_str(), "dydx1addr3");
        assert_eq!(page[1].address.as_str(), "dydx1addr2");
    }

    #[tokio::test]
    async fn test_referee_stats_roundtrip() {
        let (repo, _temp) = setup_test_db().await;

        let stats = AffiliateRefereeStats {
            referee_address: Address::new("dydx1referee".to_string()),
            affiliate_address: Address::new("dydx1affiliate".to_string()),
            affiliate_earnings: Decimal::from_str("500").unwrap(),
            referred_maker_trades: 2,
            referred_taker_trades: 1,
            referred_maker_fees: Decimal::from_str("2000").unwrap(),
            referred_taker_fees: Decimal::from_str("1000").unwrap(),
            referred_maker_rebates: Decimal::from_str("-1000").unwrap(),
            referred_liquidation_fees: Decimal::from_str("1000").unwrap(),
            referral_block_height: BlockHeight::new(1),
            referred_total_volume: Decimal::from_str("6").unwrap(),
        };

        let mut tx = repo.pool().begin().await.unwrap();
        merge_rows(
            &mut tx,
            &REFEREE_STATS_TABLE,
            &[referee_stats_merge_row(&stats)],
        )
        .await
        .expect("merge failed");
        tx.commit().await.unwrap();

        let found = repo
            .find_referee_stats(&stats.referee_address)
            .await
            .expect("find failed")
            .expect("row missing");
        assert_eq!(found, stats);

        let listed = repo
            .referee_stats_for_affiliate(&stats.affiliate_address)
            .await
            .expect("list failed");
        assert_eq!(listed, vec![found]);
    }
}
