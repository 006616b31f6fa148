//! Tree Store writes: roots, placement and status changes.

use super::{with_retry, Orchestrator, ServiceError};
use crate::db::Repository;
use crate::domain::{NodeStatus, TeamSide, TimeMs, TreeNode, UserId};
use crate::engine::{cycle, placement, EngineError, Placement, Tree};
use sqlx::sqlite::SqliteConnection;
use tracing::info;

pub(super) async fn store_node(
    conn: &mut SqliteConnection,
    node: &TreeNode,
) -> Result<(), ServiceError> {
    if Repository::update_node(conn, node).await? {
        Ok(())
    } else {
        Err(ServiceError::stale(format!("node {}", node.user_id)))
    }
}

pub(super) async fn load_node(
    conn: &mut SqliteConnection,
    user: &UserId,
) -> Result<TreeNode, ServiceError> {
    Repository::fetch_node(conn, user)
        .await?
        .ok_or_else(|| EngineError::NodeNotFound(user.clone()).into())
}

impl Orchestrator {
    /// Create a parentless node. Several roots may coexist.
    pub async fn create_root(
        &self,
        user: &UserId,
        activated_date: Option<String>,
    ) -> Result<TreeNode, ServiceError> {
        if let Some(raw) = activated_date.as_deref() {
            if cycle::parse_activation_date(raw).is_none() {
                return Err(ServiceError::InvalidInput(format!(
                    "activation date must be dd-mm-yyyy, got {}",
                    raw
                )));
            }
        }

        let node = with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            let mut node = TreeNode::new(user.clone(), TimeMs::now());
            node.activated_date = activated_date.clone();
            if !Repository::insert_node(&mut tx, &node).await? {
                return Err(EngineError::AlreadyPlaced(user.clone()).into());
            }
            Repository::ensure_wallet(&mut tx, user).await?;
            tx.commit().await?;
            Ok(node)
        })
        .await?;

        info!(user_id = %user, "Created root node");
        Ok(node)
    }

    /// Place `new_user` under `referrer`, spilling over when the requested
    /// slot is taken.
    pub async fn place(
        &self,
        new_user: &UserId,
        referrer: &UserId,
        side: TeamSide,
    ) -> Result<(TreeNode, Placement), ServiceError> {
        let (node, placement) = with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            if Repository::fetch_node(&mut tx, new_user).await?.is_some() {
                return Err(EngineError::AlreadyPlaced(new_user.clone()).into());
            }

            let subtree = Repository::fetch_subtree(&mut tx, referrer).await?;
            if subtree.is_empty() {
                return Err(EngineError::NodeNotFound(referrer.clone()).into());
            }
            let mut tree = Tree::from_nodes(subtree);
            let (node, placement) =
                placement::place(&mut tree, new_user, referrer, side, TimeMs::now())?;

            if !Repository::insert_node(&mut tx, &node).await? {
                return Err(EngineError::AlreadyPlaced(new_user.clone()).into());
            }
            store_node(&mut tx, tree.node(&placement.parent)?).await?;
            Repository::ensure_wallet(&mut tx, new_user).await?;
            tx.commit().await?;
            Ok((node, placement))
        })
        .await?;

        info!(
            user_id = %new_user,
            referrer = %referrer,
            requested_side = %side,
            parent = %placement.parent,
            side = %placement.side,
            "Placed node"
        );
        Ok((node, placement))
    }

    /// Flip a node's status; nodes are never deleted.
    ///
    /// A node turning active has its ancestors' ranks re-evaluated.
    pub async fn set_status(&self, user: &UserId, status: NodeStatus) -> Result<TreeNode, ServiceError> {
        let (node, previous) = with_retry(|| async {
            let mut tx = self.repo.begin().await?;
            let mut node = load_node(&mut tx, user).await?;
            let previous = node.status;
            node.status = status;
            store_node(&mut tx, &node).await?;
            tx.commit().await?;
            node.version += 1;
            Ok((node, previous))
        })
        .await?;

        info!(user_id = %user, status = %status, "Node status changed");
        if status == NodeStatus::Active && previous != NodeStatus::Active {
            self.refresh_ancestor_ranks(user).await;
        }
        Ok(node)
    }

    pub async fn get_node(&self, user: &UserId) -> Result<TreeNode, ServiceError> {
        self.require_node(user).await
    }

    /// Side of `ancestor` under which `descendant` sits.
    pub async fn team_side(
        &self,
        descendant: &UserId,
        ancestor: &UserId,
    ) -> Result<TeamSide, ServiceError> {
        let mut conn = self.repo.pool().acquire().await?;
        let lineage = Repository::fetch_lineage(&mut conn, descendant).await?;
        drop(conn);
        let tree = Tree::from_nodes(lineage);
        if !tree.contains(ancestor) && self.repo.get_node(ancestor).await?.is_none() {
            return Err(EngineError::NodeNotFound(ancestor.clone()).into());
        }
        Ok(tree.team_side(descendant, ancestor)?)
    }

    pub(super) async fn require_node(&self, user: &UserId) -> Result<TreeNode, ServiceError> {
        self.repo
            .get_node(user)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound(user.clone()).into())
    }
}
