pub mod create;
pub mod delete;
pub mod fetch;
pub mod get;
pub mod limit;
pub mod models;
pub mod patch;
pub mod report;
pub mod routes;
pub mod sort;
pub mod tally;
pub mod tree;
pub mod vote;

use std::fmt::Debug;

use serde::Serialize;

use crate::identity::models::profile::AuthorProfile;

use self::{models::Comment, tally::VoteTally};

pub const MAX_CONTENT_CHARS: usize = 5000;

/// The novel, and optionally the chapter of it, a thread is attached to.
/// Comments without a chapter belong to the novel-level thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentScope {
    pub novel_id: i32,
    pub chapter_id: Option<i32>,
}

// The model that will be returned to the client, rebuilt on every fetch
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentThread {
    pub id: i32,
    pub content: String,
    pub parent_id: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub edited_at: Option<chrono::NaiveDateTime>,
    pub author: Option<AuthorProfile>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    /// -1, 0 or 1
    pub viewer_vote: i32,
    pub depth: usize,
    pub is_comment_owner: bool,
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    pub fn new(
        comment: Comment,
        author: Option<AuthorProfile>,
        tally: VoteTally,
        viewer: Option<i32>,
    ) -> Self {
        CommentThread {
            id: comment.id,
            content: comment.content,
            parent_id: comment.parent_id,
            created_at: comment.created_at,
            edited_at: comment.edited_at,
            author,
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            score: tally.score(),
            viewer_vote: tally.viewer_vote,
            depth: 0,
            is_comment_owner: viewer == Some(comment.identity_id),
            replies: vec![],
        }
    }
}

/// Trims the content in place and checks its length.
pub fn validate_content(content: &mut String) -> Result<(), &'static str> {
    *content = content.trim().to_string();

    if content.is_empty() {
        return Err("No content provided");
    }

    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err("Content too long (max 5000 characters)");
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_content_trims() {
        let mut content = "  hello there \n".to_string();
        assert!(validate_content(&mut content).is_ok());
        assert_eq!(content, "hello there");
    }

    #[test]
    fn test_validate_content_rejects_blank_and_long() {
        let mut blank = " \t\n".to_string();
        assert_eq!(validate_content(&mut blank), Err("No content provided"));

        let mut long = "あ".repeat(MAX_CONTENT_CHARS + 1);
        assert!(validate_content(&mut long).is_err());

        // Limit counts characters, not bytes
        let mut at_limit = "あ".repeat(MAX_CONTENT_CHARS);
        assert!(validate_content(&mut at_limit).is_ok());
    }
}
