//! Spillover placement of new users into the binary tree.

use super::{EngineError, Tree};
use crate::domain::{TeamSide, TimeMs, TreeNode, UserId};

/// Where a new node attaches: under `parent`, on `side`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub parent: UserId,
    pub side: TeamSide,
}

/// Find the slot a new referral of `referrer` lands in.
///
/// If the referrer's `side` slot is free the new node goes there. Otherwise
/// the subtree under that child is searched depth-first, trying the
/// requested side before the other at every node, and the first node with a
/// free slot takes the new user (requested side first). The result depends
/// only on the tree shape, so identical state gives identical placement.
pub fn find_slot(tree: &Tree, referrer: &UserId, side: TeamSide) -> Result<Placement, EngineError> {
    let referrer_node = tree.node(referrer)?;
    let start = match referrer_node.child(side) {
        None => {
            return Ok(Placement {
                parent: referrer.clone(),
                side,
            })
        }
        Some(child) => child.clone(),
    };

    let mut stack = vec![start];
    let mut visited = 0usize;
    while let Some(id) = stack.pop() {
        visited += 1;
        if visited > tree.len() {
            return Err(EngineError::Integrity(format!(
                "placement walk under {} revisits nodes",
                referrer
            )));
        }
        let node = tree.node(&id)?;
        match (node.child(side), node.child(side.opposite())) {
            (None, _) => return Ok(Placement { parent: id, side }),
            (Some(_), None) => {
                return Ok(Placement {
                    parent: id,
                    side: side.opposite(),
                })
            }
            (Some(preferred), Some(other)) => {
                stack.push(other.clone());
                stack.push(preferred.clone());
            }
        }
    }

    // Every subtree ends in leaves with free slots, so an exhausted stack
    // means a child pointer left the arena.
    Err(EngineError::Integrity(format!(
        "no free slot found under {} on {}",
        referrer, side
    )))
}

/// Place `new_user` under `referrer`, mutating the arena.
///
/// Returns the created node and the chosen slot. The caller persists both
/// the new node and the parent whose child pointer changed.
pub fn place(
    tree: &mut Tree,
    new_user: &UserId,
    referrer: &UserId,
    side: TeamSide,
    now: TimeMs,
) -> Result<(TreeNode, Placement), EngineError> {
    if tree.contains(new_user) {
        return Err(EngineError::AlreadyPlaced(new_user.clone()));
    }
    let placement = find_slot(tree, referrer, side)?;

    let mut node = TreeNode::new(new_user.clone(), now);
    node.parent = Some(placement.parent.clone());
    node.sponsor = Some(referrer.clone());

    tree.node_mut(&placement.parent)?
        .set_child(placement.side, new_user.clone());
    tree.insert(node.clone());

    Ok((node, placement))
}
