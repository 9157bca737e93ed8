//! Referral registry operations.

use crate::domain::{Address, BlockHeight, Referral};
use sqlx::Row;

use super::Repository;

impl Repository {
    /// Record a referral edge.
    ///
    /// A referee can have at most one referrer. A second referral for the
    /// same referee violates the primary key and is surfaced as a rejected
    /// write: it signals a duplicate referral event upstream and must not be
    /// silently merged.
    ///
    /// # Errors
    /// Returns an error if the insert fails, including on a duplicate
    /// referee.
    pub async fn create_referral(&self, referral: &Referral) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO affiliate_referrals (referee_address, affiliate_address, referred_at_block)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(referral.referee_address.as_str())
        .bind(referral.affiliate_address.as_str())
        .bind(referral.referred_at_block.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find the referral record for a referee, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_referral(&self, referee: &Address) -> Result<Option<Referral>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT referee_address, affiliate_address, referred_at_block
            FROM affiliate_referrals
            WHERE referee_address = ?
            "#,
        )
        .bind(referee.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Referral {
            referee_address: Address::new(r.get("referee_address")),
            affiliate_address: Address::new(r.get("affiliate_address")),
            referred_at_block: BlockHeight::new(r.get("referred_at_block")),
        }))
    }

    /// List all referrals recorded for an affiliate.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn referrals_for_affiliate(
        &self,
        affiliate: &Address,
    ) -> Result<Vec<Referral>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT referee_address, affiliate_address, referred_at_block
            FROM affiliate_referrals
            WHERE affiliate_address = ?
            ORDER BY referred_at_block ASC, referee_address ASC
            "#,
        )
        .bind(affiliate.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Referral {
                referee_address: Address::new(r.get("referee_address")),
                affiliate_address: Address::new(r.get("affiliate_address")),
                referred_at_block: BlockHeight::new(r.get("referred_at_block")),
            })
            .collect())
    }
}
