//! Per-affiliate aggregation: windowing, eligibility, additive merge.

use affidex::aggregation::affiliate_info::update_affiliate_info;
use affidex::db::init_db;
use affidex::{
    Address, AffiliateInfo, BlockHeight, Decimal, Fill, FillType, Liquidity, Referral, Repository,
    Subaccount, SubaccountId,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use std::str::FromStr;
use tempfile::TempDir;

const AFFILIATE: &str = "dydx1affiliate";
const REFEREE: &str = "dydx1referee";
const SUBACCOUNT: &str = "sub-0";

fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn minutes_before(minutes: i64) -> DateTime<Utc> {
    reference_time() - Duration::minutes(minutes)
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn fill(
    event_id: &str,
    liquidity: Liquidity,
    fill_type: FillType,
    fee: &str,
    rev_share: &str,
    created_at: DateTime<Utc>,
    height: i64,
) -> Fill {
    Fill {
        event_id: event_id.to_string(),
        subaccount_id: SubaccountId::new(SUBACCOUNT.to_string()),
        liquidity,
        fill_type,
        fee: dec(fee),
        affiliate_rev_share: dec(rev_share),
        price: dec("1"),
        size: dec("1"),
        created_at,
        created_at_height: BlockHeight::new(height),
    }
}

async fn setup() -> (SqlitePool, Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Repository::new(pool.clone());
    (pool, repo, temp_dir)
}

/// Seed the reference fixture: one referral at block 1 and six fills, two at
/// T-1min and four at T-2min.
async fn seed_reference_fixture(repo: &Repository) {
    repo.upsert_subaccount(&Subaccount {
        id: SubaccountId::new(SUBACCOUNT.to_string()),
        owner: Address::new(REFEREE.to_string()),
        number: 0,
    })
    .await
    .unwrap();

    repo.create_referral(&Referral::new(
        Address::new(AFFILIATE.to_string()),
        Address::new(REFEREE.to_string()),
        BlockHeight::new(1),
    ))
    .await
    .unwrap();

    let fills = vec![
        fill("evt-1", Liquidity::Taker, FillType::Limit, "1000", "500", minutes_before(1), 1),
        fill("evt-2", Liquidity::Maker, FillType::Limit, "-1000", "500", minutes_before(1), 1),
        fill("evt-3", Liquidity::Maker, FillType::Limit, "1000", "500", minutes_before(2), 1),
        fill("evt-4", Liquidity::Maker, FillType::Limit, "1000", "500", minutes_before(2), 1),
        fill("evt-5", Liquidity::Taker, FillType::Liquidated, "1000", "0", minutes_before(2), 1),
        fill("evt-6", Liquidity::Maker, FillType::Liquidation, "100", "5", minutes_before(2), 1),
    ];
    let inserted = repo.insert_fills_batch(&fills).await.unwrap();
    assert_eq!(inserted, 6);
}

async fn affiliate_row(repo: &Repository) -> AffiliateInfo {
    repo.find_affiliate_info(&Address::new(AFFILIATE.to_string()))
        .await
        .expect("find failed")
        .expect("affiliate row missing")
}

fn expected_after_recent_window() -> AffiliateInfo {
    // Fills at T-1min: one LIMIT taker (fee 1000), one LIMIT maker rebate.
    AffiliateInfo {
        address: Address::new(AFFILIATE.to_string()),
        affiliate_earnings: dec("1000"),
        referred_maker_trades: 1,
        referred_taker_trades: 1,
        total_referred_maker_fees: dec("0"),
        total_referred_taker_fees: dec("1000"),
        total_referred_maker_rebates: dec("-1000"),
        total_referred_users: 1,
        first_referral_block_height: BlockHeight::new(1),
        referred_total_volume: dec("2"),
    }
}

#[tokio::test]
async fn test_creates_affiliate_info_for_window() {
    let (pool, repo, _temp) = setup().await;
    seed_reference_fixture(&repo).await;

    update_affiliate_info(&pool, minutes_before(2), reference_time())
        .await
        .expect("aggregation failed");

    assert_eq!(affiliate_row(&repo).await, expected_after_recent_window());
}

#[tokio::test]
async fn test_incremental_windows_accumulate() {
    let (pool, repo, _temp) = setup().await;
    seed_reference_fixture(&repo).await;

    // First window catches the four fills at T-2min: two LIMIT maker fees,
    // one LIQUIDATED taker (excluded from taker fees, still a taker trade),
    // one LIQUIDATION maker landing in maker fees.
    update_affiliate_info(&pool, minutes_before(3), minutes_before(2))
        .await
        .expect("first window failed");

    let expected1 = AffiliateInfo {
        address: Address::new(AFFILIATE.to_string()),
        affiliate_earnings: dec("1005"),
        referred_maker_trades: 3,
        referred_taker_trades: 1,
        total_referred_maker_fees: dec("2100"),
        total_referred_taker_fees: dec("0"),
        total_referred_maker_rebates: dec("0"),
        total_referred_users: 1,
        first_referral_block_height: BlockHeight::new(1),
        referred_total_volume: dec("4"),
    };
    assert_eq!(affiliate_row(&repo).await, expected1);

    // Second window catches the two fills at T-1min and adds on top.
    update_affiliate_info(&pool, minutes_before(2), minutes_before(1))
        .await
        .expect("second window failed");

    let expected2 = AffiliateInfo {
        address: Address::new(AFFILIATE.to_string()),
        affiliate_earnings: dec("2005"),
        referred_maker_trades: 4,
        referred_taker_trades: 2,
        total_referred_maker_fees: dec("2100"),
        total_referred_taker_fees: dec("1000"),
        total_referred_maker_rebates: dec("-1000"),
        total_referred_users: 1,
        first_referral_block_height: BlockHeight::new(1),
        referred_total_volume: dec("6"),
    };
    assert_eq!(affiliate_row(&repo).await, expected2);

    // A window with no fills but a new referral still refreshes the
    // referred-user count without touching the additive fields.
    repo.create_referral(&Referral::new(
        Address::new(AFFILIATE.to_string()),
        Address::new("dydx1vault".to_string()),
        BlockHeight::new(2),
    ))
    .await
    .unwrap();

    update_affiliate_info(&pool, minutes_before(1), reference_time())
        .await
        .expect("third window failed");

    let expected3 = AffiliateInfo {
        total_referred_users: 2,
        ..expected2
    };
    assert_eq!(affiliate_row(&repo).await, expected3);
}

#[tokio::test]
async fn test_split_windows_match_single_window() {
    // Run (a, b] then (b, c] in one database, (a, c] in another: additive
    // fields must agree.
    let (pool_split, repo_split, _temp1) = setup().await;
    seed_reference_fixture(&repo_split).await;
    update_affiliate_info(&pool_split, minutes_before(3), minutes_before(2))
        .await
        .unwrap();
    update_affiliate_info(&pool_split, minutes_before(2), minutes_before(1))
        .await
        .unwrap();

    let (pool_single, repo_single, _temp2) = setup().await;
    seed_reference_fixture(&repo_single).await;
    update_affiliate_info(&pool_single, minutes_before(3), minutes_before(1))
        .await
        .unwrap();

    assert_eq!(
        affiliate_row(&repo_split).await,
        affiliate_row(&repo_single).await
    );
}

#[tokio::test]
async fn test_rerunning_same_window_keeps_user_count_stable() {
    // Additive fields double on a replayed window (which is exactly why the
    // cursor protocol must prevent replays); the referred-user snapshot must
    // not.
    let (pool, repo, _temp) = setup().await;
    seed_reference_fixture(&repo).await;

    update_affiliate_info(&pool, minutes_before(2), reference_time())
        .await
        .unwrap();
    update_affiliate_info(&pool, minutes_before(2), reference_time())
        .await
        .unwrap();

    let row = affiliate_row(&repo).await;
    assert_eq!(row.total_referred_users, 1);
    assert_eq!(row.affiliate_earnings, dec("2000"));
}

#[tokio::test]
async fn test_fills_before_referral_height_are_excluded() {
    let (pool, repo, _temp) = setup().await;

    repo.upsert_subaccount(&Subaccount {
        id: SubaccountId::new(SUBACCOUNT.to_string()),
        owner: Address::new(REFEREE.to_string()),
        number: 0,
    })
    .await
    .unwrap();

    // Referral at block 2 but the fill executed at block 1: it must not
    // contribute to any statistic, while registry membership still counts.
    repo.create_referral(&Referral::new(
        Address::new(AFFILIATE.to_string()),
        Address::new(REFEREE.to_string()),
        BlockHeight::new(2),
    ))
    .await
    .unwrap();

    repo.insert_fill(&fill(
        "evt-early",
        Liquidity::Taker,
        FillType::Limit,
        "1000",
        "500",
        minutes_before(1),
        1,
    ))
    .await
    .unwrap();

    update_affiliate_info(&pool, minutes_before(2), reference_time())
        .await
        .expect("aggregation failed");

    let expected = AffiliateInfo {
        address: Address::new(AFFILIATE.to_string()),
        affiliate_earnings: dec("0"),
        referred_maker_trades: 0,
        referred_taker_trades: 0,
        total_referred_maker_fees: dec("0"),
        total_referred_taker_fees: dec("0"),
        total_referred_maker_rebates: dec("0"),
        total_referred_users: 1,
        first_referral_block_height: BlockHeight::new(2),
        referred_total_volume: dec("0"),
    };
    assert_eq!(affiliate_row(&repo).await, expected);
}

#[tokio::test]
async fn test_fill_at_referral_height_is_included() {
    let (pool, repo, _temp) = setup().await;

    repo.upsert_subaccount(&Subaccount {
        id: SubaccountId::new(SUBACCOUNT.to_string()),
        owner: Address::new(REFEREE.to_string()),
        number: 0,
    })
    .await
    .unwrap();

    repo.create_referral(&Referral::new(
        Address::new(AFFILIATE.to_string()),
        Address::new(REFEREE.to_string()),
        BlockHeight::new(2),
    ))
    .await
    .unwrap();

    // Height boundary is inclusive: a fill at exactly the referral block
    // earns credit.
    repo.insert_fill(&fill(
        "evt-boundary",
        Liquidity::Taker,
        FillType::Limit,
        "1000",
        "500",
        minutes_before(1),
        2,
    ))
    .await
    .unwrap();

    update_affiliate_info(&pool, minutes_before(2), reference_time())
        .await
        .expect("aggregation failed");

    let row = affiliate_row(&repo).await;
    assert_eq!(row.referred_taker_trades, 1);
    assert_eq!(row.affiliate_earnings, dec("500"));
}

#[tokio::test]
async fn test_window_is_exclusive_start_inclusive_end() {
    let (pool, repo, _temp) = setup().await;
    repo.upsert_subaccount(&Subaccount {
        id: SubaccountId::new(SUBACCOUNT.to_string()),
        owner: Address::new(REFEREE.to_string()),
        number: 0,
    })
    .await
    .unwrap();
    repo.create_referral(&Referral::new(
        Address::new(AFFILIATE.to_string()),
        Address::new(REFEREE.to_string()),
        BlockHeight::new(1),
    ))
    .await
    .unwrap();

    let at = minutes_before(1);
    repo.insert_fill(&fill(
        "evt-exact",
        Liquidity::Taker,
        FillType::Limit,
        "1000",
        "500",
        at,
        1,
    ))
    .await
    .unwrap();

    // Fill exactly at window_start: excluded.
    update_affiliate_info(&pool, at, reference_time())
        .await
        .unwrap();
    assert_eq!(affiliate_row(&repo).await.referred_taker_trades, 0);

    // Fill exactly at window_end: included.
    update_affiliate_info(&pool, minutes_before(2), at)
        .await
        .unwrap();
    assert_eq!(affiliate_row(&repo).await.referred_taker_trades, 1);
}

#[tokio::test]
async fn test_no_cross_affiliate_contamination() {
    let (pool, repo, _temp) = setup().await;
    seed_reference_fixture(&repo).await;

    // Second affiliate with a referee that never trades.
    repo.create_referral(&Referral::new(
        Address::new("dydx1other".to_string()),
        Address::new("dydx1idle".to_string()),
        BlockHeight::new(3),
    ))
    .await
    .unwrap();

    update_affiliate_info(&pool, minutes_before(2), reference_time())
        .await
        .unwrap();

    assert_eq!(affiliate_row(&repo).await, expected_after_recent_window());

    let other = repo
        .find_affiliate_info(&Address::new("dydx1other".to_string()))
        .await
        .unwrap()
        .expect("other affiliate row missing");
    assert_eq!(other.affiliate_earnings, dec("0"));
    assert_eq!(other.referred_maker_trades, 0);
    assert_eq!(other.referred_taker_trades, 0);
    assert_eq!(other.total_referred_users, 1);
    assert_eq!(other.first_referral_block_height, BlockHeight::new(3));
}

#[tokio::test]
async fn test_empty_and_inverted_windows_are_noops() {
    let (pool, repo, _temp) = setup().await;
    seed_reference_fixture(&repo).await;

    update_affiliate_info(&pool, reference_time(), reference_time())
        .await
        .expect("empty window should not error");
    update_affiliate_info(&pool, reference_time(), minutes_before(5))
        .await
        .expect("inverted window should not error");

    let row = repo
        .find_affiliate_info(&Address::new(AFFILIATE.to_string()))
        .await
        .unwrap();
    assert!(row.is_none(), "no-op windows must write nothing");
}
