//! In-memory arena of tree nodes keyed by user id.
//!
//! All walks are iterative over parent/child pointers so depth never touches
//! the call stack.

use super::EngineError;
use crate::domain::{TeamSide, TreeNode, UserId};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<UserId, TreeNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = TreeNode>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|n| (n.user_id.clone(), n))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &UserId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn node(&self, id: &UserId) -> Result<&TreeNode, EngineError> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.clone()))
    }

    pub fn node_mut(&mut self, id: &UserId) -> Result<&mut TreeNode, EngineError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.clone()))
    }

    pub fn insert(&mut self, node: TreeNode) {
        self.nodes.insert(node.user_id.clone(), node);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    pub fn into_nodes(self) -> impl Iterator<Item = TreeNode> {
        self.nodes.into_values()
    }

    /// Ancestors of `id`, nearest first, each paired with the side through
    /// which `id`'s line enters that ancestor.
    ///
    /// # Errors
    /// `NodeNotFound` if `id` or a referenced parent is missing from the
    /// arena; `Integrity` on a cycle or a parent that does not link back.
    pub fn ancestors(&self, id: &UserId) -> Result<Vec<(UserId, TeamSide)>, EngineError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.node(id)?;
        seen.insert(current.user_id.clone());

        while let Some(parent_id) = current.parent.as_ref() {
            if !seen.insert(parent_id.clone()) {
                return Err(EngineError::Integrity(format!(
                    "cycle in parent chain of {} at {}",
                    id, parent_id
                )));
            }
            let parent = self.node(parent_id)?;
            let side = parent.side_of_child(&current.user_id).ok_or_else(|| {
                EngineError::Integrity(format!(
                    "{} names {} as parent but is not its child",
                    current.user_id, parent_id
                ))
            })?;
            path.push((parent_id.clone(), side));
            current = parent;
        }

        Ok(path)
    }

    /// Side of `ancestor` under which `descendant` sits.
    ///
    /// Walks parent pointers up from `descendant`; the last hop before
    /// `ancestor` decides the side. O(depth).
    pub fn team_side(
        &self,
        descendant: &UserId,
        ancestor: &UserId,
    ) -> Result<TeamSide, EngineError> {
        let not_descendant = || EngineError::NotADescendant {
            descendant: descendant.clone(),
            ancestor: ancestor.clone(),
        };
        if descendant == ancestor {
            return Err(not_descendant());
        }
        let mut seen = HashSet::new();
        let mut current = self.node(descendant)?;
        loop {
            let parent_id = current.parent.as_ref().ok_or_else(not_descendant)?;
            if !seen.insert(parent_id.clone()) {
                return Err(EngineError::Integrity(format!(
                    "cycle in parent chain of {}",
                    descendant
                )));
            }
            if parent_id == ancestor {
                let parent = self.node(parent_id)?;
                return parent.side_of_child(&current.user_id).ok_or_else(|| {
                    EngineError::Integrity(format!(
                        "{} names {} as parent but is not its child",
                        current.user_id, parent_id
                    ))
                });
            }
            current = self.node(parent_id)?;
        }
    }

    /// Descendants on one side of `root` in breadth-first order, left child
    /// before right child at each level. Children absent from the arena are
    /// skipped.
    pub fn side_descendants(
        &self,
        root: &UserId,
        side: TeamSide,
    ) -> Result<Vec<UserId>, EngineError> {
        let root_node = self.node(root)?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&UserId> = root_node.child(side).into_iter().collect();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                return Err(EngineError::Integrity(format!(
                    "{} reachable twice below {}",
                    id, root
                )));
            }
            out.push(id.clone());
            if let Some(node) = self.nodes.get(id) {
                queue.extend(node.left.as_ref());
                queue.extend(node.right.as_ref());
            }
        }

        Ok(out)
    }

    /// Verify that every child pointer is mirrored by the child's parent
    /// pointer and every parent pointer by a child pointer.
    pub fn check_links(&self) -> Result<(), EngineError> {
        for node in self.nodes.values() {
            for side in [TeamSide::Left, TeamSide::Right] {
                if let Some(child_id) = node.child(side) {
                    if let Some(child) = self.nodes.get(child_id) {
                        if child.parent.as_ref() != Some(&node.user_id) {
                            return Err(EngineError::Integrity(format!(
                                "{}.{} = {} but its parent is {:?}",
                                node.user_id, side, child_id, child.parent
                            )));
                        }
                    }
                }
            }
            if node.left.is_some() && node.left == node.right {
                return Err(EngineError::Integrity(format!(
                    "{} has the same child on both sides",
                    node.user_id
                )));
            }
            if let Some(parent_id) = node.parent.as_ref() {
                if let Some(parent) = self.nodes.get(parent_id) {
                    if parent.side_of_child(&node.user_id).is_none() {
                        return Err(EngineError::Integrity(format!(
                            "{} names {} as parent but is not its child",
                            node.user_id, parent_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
