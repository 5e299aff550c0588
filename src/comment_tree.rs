use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Comment, CommentThread};

/// Number of reply levels rendered under a top-level comment on the post detail page.
pub const MAX_REPLY_DEPTH: usize = 2;

/// build_comment_tree
///
/// Folds the flat list of comments of a single post into threads.
///
/// Top-level comments are ordered newest first; replies read oldest first so a
/// conversation reads top to bottom. Replies deeper than `max_depth` levels are cut,
/// and a reply whose parent is absent from `comments` (e.g. the parent was rejected)
/// is dropped together with its own subtree.
pub fn build_comment_tree(comments: Vec<Comment>, max_depth: usize) -> Vec<CommentThread> {
    let mut roots = Vec::new();
    let mut children: HashMap<Uuid, Vec<Comment>> = HashMap::new();

    for comment in comments {
        match comment.parent_id {
            Some(parent_id) => children.entry(parent_id).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    roots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    for replies in children.values_mut() {
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    roots
        .into_iter()
        .map(|root| attach_replies(root, &mut children, max_depth))
        .collect()
}

fn attach_replies(
    comment: Comment,
    children: &mut HashMap<Uuid, Vec<Comment>>,
    depth_left: usize,
) -> CommentThread {
    let replies = if depth_left == 0 {
        Vec::new()
    } else {
        children
            .remove(&comment.id)
            .unwrap_or_default()
            .into_iter()
            .map(|reply| attach_replies(reply, children, depth_left - 1))
            .collect()
    };

    CommentThread { comment, replies }
}
