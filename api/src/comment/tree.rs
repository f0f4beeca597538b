use std::collections::HashMap;

use super::CommentThread;

/// Flat comments indexed by id, plus a parent -> children adjacency map.
///
/// Built once per fetch. Input order is kept for siblings, so replies stay in
/// fetch (creation) order. Parents may appear before or after their replies.
pub struct CommentArena {
    nodes: Vec<Option<CommentThread>>,
    index: HashMap<i32, usize>,
    children: HashMap<i32, Vec<usize>>,
    roots: Vec<usize>,
}

impl CommentArena {
    pub fn build(comments: Vec<CommentThread>) -> Self {
        let mut index = HashMap::<i32, usize>::with_capacity(comments.len());
        let mut nodes = Vec::with_capacity(comments.len());

        for comment in comments {
            if index.contains_key(&comment.id) {
                tracing::warn!(id = comment.id, "Duplicate comment in fetched set, skipping");
                continue;
            }
            index.insert(comment.id, nodes.len());
            nodes.push(comment);
        }

        let mut children = HashMap::<i32, Vec<usize>>::new();
        let mut roots = vec![];

        for (slot, comment) in nodes.iter().enumerate() {
            match comment.parent_id {
                // A reply whose parent is gone (e.g. deleted) is shown as a root
                Some(parent_id)
                    if index.contains_key(&parent_id)
                        && !closes_cycle(&nodes, &index, comment.id, parent_id) =>
                {
                    children.entry(parent_id).or_default().push(slot);
                }
                _ => roots.push(slot),
            }
        }

        CommentArena {
            nodes: nodes.into_iter().map(Some).collect(),
            index,
            children,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Ids of the direct replies to `id`, in fetch order.
    pub fn reply_ids(&self, id: i32) -> Vec<i32> {
        self.children
            .get(&id)
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(|s| self.nodes[*s].as_ref().map(|c| c.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Materializes the nested tree, roots in fetch order.
    pub fn into_tree(mut self) -> Vec<CommentThread> {
        let roots = std::mem::take(&mut self.roots);
        roots
            .into_iter()
            .filter_map(|slot| self.take_subtree(slot, 0))
            .collect()
    }

    fn take_subtree(&mut self, slot: usize, depth: usize) -> Option<CommentThread> {
        let mut comment = self.nodes[slot].take()?;
        comment.depth = depth;

        if let Some(replies) = self.children.remove(&comment.id) {
            comment.replies = replies
                .into_iter()
                .filter_map(|reply| self.take_subtree(reply, depth + 1))
                .collect();
        }

        Some(comment)
    }
}

/// Whether attaching `id` under `parent_id` would make `id` its own ancestor.
/// Comments caught in such a loop are treated as roots so that every comment
/// still shows up exactly once.
fn closes_cycle(
    nodes: &[CommentThread],
    index: &HashMap<i32, usize>,
    id: i32,
    parent_id: i32,
) -> bool {
    let mut current = parent_id;

    // Any walk longer than the number of nodes is a loop that doesn't pass
    // through `id`, its members are rooted on their own
    for _ in 0..nodes.len() {
        if current == id {
            return true;
        }

        match index
            .get(&current)
            .and_then(|slot| nodes[*slot].parent_id)
            .filter(|p| index.contains_key(p))
        {
            Some(next) => current = next,
            None => return false,
        }
    }

    false
}
