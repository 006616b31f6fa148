use bonustree::domain::{BonusKind, Decimal, Payout, PayoutStatus, TimeMs, UserId};
use bonustree::engine::EngineError;
use bonustree::notify::MockNotificationSink;
use bonustree::{init_db, Config, Orchestrator, Repository, ServiceError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (Orchestrator, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let env: HashMap<String, String> = [("DATABASE_PATH", db_path.as_str())]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = Config::from_env_map(env).unwrap();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let orchestrator = Orchestrator::new(repo, &config, Arc::new(MockNotificationSink::new()));
    (orchestrator, temp_dir)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed_matching(
    orch: &Orchestrator,
    payout_id: &str,
    user: &str,
    amount: &str,
    on: NaiveDate,
    status: PayoutStatus,
) {
    let mut payout = Payout::credit(
        payout_id.to_string(),
        UserId::new(user),
        BonusKind::Matching,
        Decimal::from_str(amount).unwrap(),
    );
    payout.status = status;
    payout.created_at = TimeMs::new(TimeMs::start_of_day(on).as_ms() + 3_600_000);
    let mut conn = orch.repo().pool().acquire().await.unwrap();
    assert!(Repository::insert_payout(&mut conn, &payout).await.unwrap());
}

#[tokio::test]
async fn test_second_cycle_stats() {
    let (orch, _temp) = setup().await;
    let user = UserId::new("C");
    orch.create_root(&user, Some("01-01-2024".to_string()))
        .await
        .unwrap();

    seed_matching(&orch, "m-old", "C", "500", date(2024, 2, 20), PayoutStatus::Completed).await;
    seed_matching(&orch, "m-1", "C", "500", date(2024, 3, 1), PayoutStatus::Completed).await;
    seed_matching(&orch, "m-2", "C", "500", date(2024, 3, 4), PayoutStatus::Pending).await;
    seed_matching(&orch, "m-3", "C", "500", date(2024, 3, 4), PayoutStatus::Failed).await;
    seed_matching(&orch, "m-4", "C", "250", date(2024, 3, 5), PayoutStatus::OnHold).await;

    let stats = orch.get_cycle_stats(&user, date(2024, 3, 5)).await.unwrap();
    assert_eq!(stats.cycle_index, 2);
    assert_eq!(stats.cycle_start, date(2024, 3, 1));
    assert_eq!(stats.cycle_end, date(2024, 4, 29));
    assert_eq!(stats.days_passed, 4);
    assert_eq!(stats.remaining_days, 56);
    assert_eq!(stats.match_count_in_cycle, 3);
    assert_eq!(stats.matching_bonus_in_cycle, Decimal::from_str("1250").unwrap());
}

#[tokio::test]
async fn test_first_cycle_ignores_other_bonus_kinds() {
    let (orch, _temp) = setup().await;
    let user = UserId::new("C");
    orch.create_root(&user, Some("10-06-2024".to_string()))
        .await
        .unwrap();

    let mut referral = Payout::credit(
        "ref-1".to_string(),
        user.clone(),
        BonusKind::Referral,
        Decimal::from_str("35").unwrap(),
    );
    referral.created_at = TimeMs::start_of_day(date(2024, 6, 12));
    let mut conn = orch.repo().pool().acquire().await.unwrap();
    assert!(Repository::insert_payout(&mut conn, &referral).await.unwrap());
    drop(conn);

    let stats = orch.get_cycle_stats(&user, date(2024, 6, 10)).await.unwrap();
    assert_eq!(stats.cycle_index, 1);
    assert_eq!(stats.days_passed, 0);
    assert_eq!(stats.remaining_days, 60);
    assert_eq!(stats.match_count_in_cycle, 0);
    assert!(stats.matching_bonus_in_cycle.is_zero());
}

#[tokio::test]
async fn test_cycle_stats_for_unknown_user() {
    let (orch, _temp) = setup().await;
    let result = orch
        .get_cycle_stats(&UserId::new("ghost"), date(2024, 1, 1))
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Engine(EngineError::NodeNotFound(_)))
    ));
}
