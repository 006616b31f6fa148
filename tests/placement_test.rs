use bonustree::domain::{NodeStatus, TeamSide, UserId};
use bonustree::engine::EngineError;
use bonustree::notify::MockNotificationSink;
use bonustree::{init_db, Config, Orchestrator, Repository, ServiceError};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (Orchestrator, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let env: HashMap<String, String> = [
        ("DATABASE_PATH", db_path.as_str()),
        ("MATCHING_BV_PER_UNIT", "100"),
        ("MATCHING_BONUS_PER_UNIT", "500"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = Config::from_env_map(env).unwrap();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let orchestrator = Orchestrator::new(repo, &config, Arc::new(MockNotificationSink::new()));
    (orchestrator, temp_dir)
}

fn id(s: &str) -> UserId {
    UserId::new(s)
}

#[tokio::test]
async fn test_spillover_places_under_existing_child() {
    let (orch, _temp) = setup().await;
    orch.create_root(&id("R"), None).await.unwrap();

    let (u1, p1) = orch.place(&id("U1"), &id("R"), TeamSide::Left).await.unwrap();
    assert_eq!(u1.parent, Some(id("R")));
    assert_eq!(p1.side, TeamSide::Left);

    let (u2, p2) = orch.place(&id("U2"), &id("R"), TeamSide::Left).await.unwrap();
    assert_eq!(p2.parent, id("U1"));
    assert_eq!(u2.sponsor, Some(id("R")));

    let root = orch.get_node(&id("R")).await.unwrap();
    assert_eq!(root.left, Some(id("U1")));
    assert_eq!(root.right, None);

    let u1 = orch.get_node(&id("U1")).await.unwrap();
    assert_eq!(u1.left, Some(id("U2")));
    assert_eq!(
        orch.team_side(&id("U2"), &id("R")).await.unwrap(),
        TeamSide::Left
    );
}

#[tokio::test]
async fn test_parent_child_links_stay_consistent() {
    let (orch, _temp) = setup().await;
    orch.create_root(&id("R"), None).await.unwrap();
    let sides = [
        TeamSide::Left,
        TeamSide::Right,
        TeamSide::Left,
        TeamSide::Left,
        TeamSide::Right,
        TeamSide::Right,
        TeamSide::Left,
    ];
    for (i, side) in sides.iter().enumerate() {
        orch.place(&id(&format!("N{}", i)), &id("R"), *side)
            .await
            .unwrap();
    }

    let mut all = vec![id("R")];
    all.extend((0..sides.len()).map(|i| id(&format!("N{}", i))));
    for user in &all {
        let node = orch.get_node(user).await.unwrap();
        for child in [&node.left, &node.right].into_iter().flatten() {
            let child = orch.get_node(child).await.unwrap();
            assert_eq!(child.parent.as_ref(), Some(user));
        }
    }
}

#[tokio::test]
async fn test_placement_is_reproducible_across_stores() {
    let mut layouts = Vec::new();
    for _ in 0..2 {
        let (orch, _temp) = setup().await;
        orch.create_root(&id("R"), None).await.unwrap();
        let mut parents = Vec::new();
        for (i, side) in [TeamSide::Right, TeamSide::Right, TeamSide::Left, TeamSide::Right]
            .iter()
            .enumerate()
        {
            let (_, placement) = orch
                .place(&id(&format!("N{}", i)), &id("R"), *side)
                .await
                .unwrap();
            parents.push((placement.parent, placement.side));
        }
        layouts.push(parents);
    }
    assert_eq!(layouts[0], layouts[1]);
}

#[tokio::test]
async fn test_placement_errors() {
    let (orch, _temp) = setup().await;
    orch.create_root(&id("R"), None).await.unwrap();
    orch.place(&id("U1"), &id("R"), TeamSide::Left).await.unwrap();

    let dup = orch.place(&id("U1"), &id("R"), TeamSide::Right).await;
    assert!(matches!(
        dup,
        Err(ServiceError::Engine(EngineError::AlreadyPlaced(_)))
    ));

    let missing = orch.place(&id("U2"), &id("ghost"), TeamSide::Left).await;
    assert!(matches!(
        missing,
        Err(ServiceError::Engine(EngineError::NodeNotFound(_)))
    ));

    let root_again = orch.create_root(&id("R"), None).await;
    assert!(matches!(
        root_again,
        Err(ServiceError::Engine(EngineError::AlreadyPlaced(_)))
    ));
}

#[tokio::test]
async fn test_team_side_rejects_unrelated_nodes() {
    let (orch, _temp) = setup().await;
    orch.create_root(&id("A"), None).await.unwrap();
    orch.create_root(&id("B"), None).await.unwrap();
    orch.place(&id("A1"), &id("A"), TeamSide::Right).await.unwrap();

    let result = orch.team_side(&id("A1"), &id("B")).await;
    assert!(matches!(
        result,
        Err(ServiceError::Engine(EngineError::NotADescendant { .. }))
    ));
}

#[tokio::test]
async fn test_new_nodes_start_inactive_with_wallet() {
    let (orch, _temp) = setup().await;
    orch.create_root(&id("R"), Some("01-01-2024".to_string()))
        .await
        .unwrap();
    orch.place(&id("U1"), &id("R"), TeamSide::Left).await.unwrap();

    let node = orch.get_node(&id("U1")).await.unwrap();
    assert_eq!(node.status, NodeStatus::Inactive);
    let wallet = orch.get_wallet(&id("U1")).await.unwrap();
    assert!(wallet.balance.is_zero());

    let suspended = orch.set_status(&id("U1"), NodeStatus::Suspended).await.unwrap();
    assert_eq!(suspended.status, NodeStatus::Suspended);
    assert_eq!(
        orch.get_node(&id("U1")).await.unwrap().status,
        NodeStatus::Suspended
    );
}

#[tokio::test]
async fn test_root_rejects_malformed_activation_date() {
    let (orch, _temp) = setup().await;
    let result = orch.create_root(&id("R"), Some("2024/31/31".to_string())).await;
    assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
}
