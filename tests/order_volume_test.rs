use bonustree::domain::{
    BonusKind, Decimal, NodeStatus, Order, OrderItem, OrderStatus, PayoutStatus, TeamSide, TimeMs,
    UserId,
};
use bonustree::notify::{MockNotificationSink, Notification};
use bonustree::orchestration::RecordStatus;
use bonustree::{init_db, Config, EngineError, Orchestrator, Repository, ServiceError};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

struct TestEnv {
    orch: Orchestrator,
    sink: Arc<MockNotificationSink>,
    _temp: TempDir,
}

async fn setup(extra: &[(&str, &str)]) -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let mut env: HashMap<String, String> = [
        ("DATABASE_PATH", db_path.as_str()),
        ("MATCHING_BV_PER_UNIT", "100"),
        ("MATCHING_BONUS_PER_UNIT", "500"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_env_map(env).unwrap();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let sink = Arc::new(MockNotificationSink::new());
    let orch = Orchestrator::new(repo, &config, sink.clone());
    TestEnv {
        orch,
        sink,
        _temp: temp_dir,
    }
}

fn id(s: &str) -> UserId {
    UserId::new(s)
}

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn order(order_id: &str, user: &str, bv: &str) -> Order {
    Order {
        order_id: order_id.to_string(),
        user_id: id(user),
        placed_by: id(user),
        amount: d(bv),
        items: vec![OrderItem {
            business_volume: d(bv),
        }],
        payment_ref: None,
        status: OrderStatus::Placed,
        created_at: TimeMs::now(),
    }
}

#[tokio::test]
async fn test_volume_reaches_every_ancestor_once() {
    let env = setup(&[]).await;
    let orch = &env.orch;
    orch.create_root(&id("N0"), None).await.unwrap();
    let sides = [
        TeamSide::Left,
        TeamSide::Right,
        TeamSide::Left,
        TeamSide::Right,
        TeamSide::Left,
    ];
    for (i, side) in sides.iter().enumerate() {
        orch.place(&id(&format!("N{}", i + 1)), &id(&format!("N{}", i)), *side)
            .await
            .unwrap();
    }

    let credits = orch.apply_order_volume(&id("N5"), d("40")).await.unwrap();
    assert_eq!(credits.len(), 5);
    let total: Decimal = Decimal::try_sum(credits.iter().map(|c| c.amount)).unwrap();
    assert_eq!(total, d("200"));

    for (i, side) in sides.iter().enumerate() {
        let node = orch.get_node(&id(&format!("N{}", i))).await.unwrap();
        let (expected_left, expected_right) = match side {
            TeamSide::Left => (d("40"), Decimal::zero()),
            TeamSide::Right => (Decimal::zero(), d("40")),
        };
        assert_eq!(node.left_volume, expected_left, "N{} left", i);
        assert_eq!(node.right_volume, expected_right, "N{} right", i);
    }
    let leaf = orch.get_node(&id("N5")).await.unwrap();
    assert!(leaf.left_volume.is_zero() && leaf.right_volume.is_zero());
}

#[tokio::test]
async fn test_first_order_activates_and_duplicate_is_noop() {
    let env = setup(&[]).await;
    let orch = &env.orch;
    orch.create_root(&id("R"), None).await.unwrap();
    orch.place(&id("A"), &id("R"), TeamSide::Left).await.unwrap();

    let receipt = orch.record_order(&order("o-1", "A", "250")).await.unwrap();
    assert_eq!(receipt.status, RecordStatus::Recorded);
    assert!(receipt.activated_date.is_some());
    assert_eq!(receipt.credits.len(), 1);

    let again = orch.record_order(&order("o-1", "A", "250")).await.unwrap();
    assert_eq!(again.status, RecordStatus::AlreadyRecorded);

    let root = orch.get_node(&id("R")).await.unwrap();
    assert_eq!(root.left_volume, d("250"));

    let a = orch.get_node(&id("A")).await.unwrap();
    assert_eq!(a.status, NodeStatus::Active);
    assert!(a.has_ordered);

    let second = orch.record_order(&order("o-2", "A", "10")).await.unwrap();
    assert!(second.activated_date.is_none());

    let activations: Vec<_> = env
        .sink
        .sent()
        .into_iter()
        .filter(|n| matches!(n, Notification::Activated { .. }))
        .collect();
    assert_eq!(activations.len(), 1);
    assert_eq!(activations[0].user_id(), &id("A"));
}

#[tokio::test]
async fn test_referral_and_direct_sales_paid_once_per_order() {
    let env = setup(&[("REFERRAL_BONUS_PCT", "10"), ("DIRECT_SALES_BONUS_PCT", "5")]).await;
    let orch = &env.orch;
    orch.create_root(&id("R"), None).await.unwrap();
    orch.create_root(&id("D"), None).await.unwrap();
    orch.place(&id("A"), &id("R"), TeamSide::Right).await.unwrap();

    let mut assisted = order("o-9", "A", "350");
    assisted.amount = d("1000");
    assisted.placed_by = id("D");

    let receipt = orch.record_order(&assisted).await.unwrap();
    assert_eq!(receipt.payouts.len(), 2);
    orch.record_order(&assisted).await.unwrap();

    let r_payouts = orch.list_payouts(&id("R")).await.unwrap();
    assert_eq!(r_payouts.len(), 1);
    assert_eq!(r_payouts[0].name, BonusKind::Referral);
    assert_eq!(r_payouts[0].amount, d("35"));
    assert_eq!(r_payouts[0].source_ref.as_deref(), Some("o-9"));
    assert_eq!(r_payouts[0].status, PayoutStatus::Pending);

    let d_payouts = orch.list_payouts(&id("D")).await.unwrap();
    assert_eq!(d_payouts.len(), 1);
    assert_eq!(d_payouts[0].name, BonusKind::DirectSales);
    assert_eq!(d_payouts[0].amount, d("50"));

    let wallet = orch.get_wallet(&id("R")).await.unwrap();
    assert_eq!(wallet.balance, d("35"));
    assert_eq!(wallet.total_earnings, d("35"));
}

#[tokio::test]
async fn test_order_for_unknown_user_is_rejected_without_writes() {
    let env = setup(&[]).await;
    let orch = &env.orch;
    let result = orch.record_order(&order("o-x", "ghost", "10")).await;
    assert!(result.is_err());
    assert!(orch.repo().get_order("o-x").await.unwrap().is_none());
}

#[tokio::test]
async fn test_out_of_range_volume_is_rejected_without_writes() {
    let env = setup(&[("REFERRAL_BONUS_PCT", "10")]).await;
    let orch = &env.orch;
    let big = "40000000000000000000000000000";
    orch.create_root(&id("R"), None).await.unwrap();
    orch.place(&id("A"), &id("R"), TeamSide::Left).await.unwrap();

    let receipt = orch.record_order(&order("o-1", "A", big)).await.unwrap();
    assert_eq!(receipt.payouts.len(), 1);
    assert_eq!(receipt.payouts[0].amount, d("4000000000000000000000000000"));

    let err = orch.record_order(&order("o-2", "A", big)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(EngineError::InvalidAmount(_))
    ));
    assert!(orch.repo().get_order("o-2").await.unwrap().is_none());
    assert_eq!(orch.get_node(&id("R")).await.unwrap().left_volume, d(big));
    assert_eq!(orch.list_payouts(&id("R")).await.unwrap().len(), 1);

    let mut split = order("o-3", "A", big);
    split.items.push(OrderItem {
        business_volume: d(big),
    });
    let err = orch.record_order(&split).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(EngineError::InvalidAmount(_))
    ));
    assert!(orch.repo().get_order("o-3").await.unwrap().is_none());
}
