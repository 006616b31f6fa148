//! Rank evaluation and leader propagation.

use super::registrar::store_node;
use super::{with_retry, Orchestrator, ServiceError};
use crate::db::Repository;
use crate::domain::{RankRecord, TimeMs, UserId};
use crate::engine::{RankEvaluation, Tree};
use sqlx::sqlite::SqliteConnection;
use tracing::{info, warn};

impl Orchestrator {
    /// Advance `user` up the rank ladder and persist newly achieved tiers.
    ///
    /// On a user's first tier, every ancestor gains a leader on the side
    /// the user's line enters it.
    pub async fn evaluate_rank(&self, user: &UserId) -> Result<RankEvaluation, ServiceError> {
        let evaluation = with_retry(|| self.evaluate_rank_once(user)).await?;
        if !evaluation.newly_achieved.is_empty() {
            info!(
                user_id = %user,
                tiers = ?evaluation.newly_achieved,
                first = evaluation.first_achievement(),
                "Rank tiers achieved"
            );
        }
        Ok(evaluation)
    }

    async fn evaluate_rank_once(&self, user: &UserId) -> Result<RankEvaluation, ServiceError> {
        let mut tx = self.repo.begin().await?;
        let subtree = Repository::fetch_subtree(&mut tx, user).await?;
        let tree = Tree::from_nodes(subtree);
        let existing = Repository::fetch_rank_record(&mut tx, user).await?;

        let evaluation = self.qualifier.evaluate(&tree, user, existing, TimeMs::now())?;
        if evaluation.newly_achieved.is_empty() {
            return Ok(evaluation);
        }

        for tier in &evaluation.newly_achieved {
            if let Some(achievement) = evaluation.record.tiers.get(tier) {
                Repository::insert_achievement(&mut tx, user, *tier, achievement)
                    .await
                    .map_err(|e| {
                        let taken = e
                            .as_database_error()
                            .map(|db| db.is_unique_violation())
                            .unwrap_or(false);
                        if taken {
                            ServiceError::stale(format!("rank record {}", user))
                        } else {
                            ServiceError::from(e)
                        }
                    })?;
            }
        }

        if evaluation.first_achievement() {
            promote_leader(&mut tx, user).await?;
        }

        tx.commit().await?;
        Ok(evaluation)
    }

    /// Re-evaluate every ancestor of `user`, nearest first, after `user`
    /// started to count towards their ranks. Failures are logged and do not
    /// stop the remaining ancestors.
    pub(super) async fn refresh_ancestor_ranks(&self, user: &UserId) {
        let ancestors = match self.ancestors_of(user).await {
            Ok(ancestors) => ancestors,
            Err(e) => {
                warn!(user_id = %user, error = %e, "Could not load lineage for rank refresh");
                return;
            }
        };
        for ancestor in ancestors {
            if let Err(e) = self.evaluate_rank(&ancestor).await {
                warn!(user_id = %ancestor, error = %e, "Rank refresh failed");
            }
        }
    }

    async fn ancestors_of(&self, user: &UserId) -> Result<Vec<UserId>, ServiceError> {
        let mut conn = self.repo.pool().acquire().await?;
        let lineage = Repository::fetch_lineage(&mut conn, user).await?;
        drop(conn);
        let tree = Tree::from_nodes(lineage);
        Ok(tree
            .ancestors(user)?
            .into_iter()
            .map(|(ancestor, _)| ancestor)
            .collect())
    }

    pub async fn get_rank(&self, user: &UserId) -> Result<RankRecord, ServiceError> {
        self.require_node(user).await?;
        Ok(self.repo.get_rank_record(user).await?)
    }
}

async fn promote_leader(conn: &mut SqliteConnection, user: &UserId) -> Result<(), ServiceError> {
    let lineage = Repository::fetch_lineage(conn, user).await?;
    let mut tree = Tree::from_nodes(lineage);
    for (ancestor, side) in tree.ancestors(user)? {
        let node = tree.node_mut(&ancestor)?;
        node.add_leader(side);
        store_node(conn, node).await?;
    }
    Ok(())
}
