use std::collections::{BTreeSet, HashMap};

use diesel::{pg::Pg, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    identity::models::profile::{AuthorProfile, Profile},
    library::progress::read_counts,
    schema::{comment_votes, comments, profiles},
};

use super::{
    CommentThread, ContentScope,
    models::{Comment, CommentVote},
    sort::{SortOrder, sort_roots},
    tally::tally_votes,
    tree::CommentArena,
};

/// Everything needed to build the view of one thread.
#[derive(Debug, Default)]
pub struct FetchedThread {
    pub comments: Vec<Comment>,
    pub votes: Vec<CommentVote>,
    pub authors: HashMap<i32, AuthorProfile>,
}

/// Comments of exactly this scope: a chapter thread matches the chapter id,
/// the novel thread is the comments without any chapter.
pub fn in_scope(scope: ContentScope) -> comments::BoxedQuery<'static, Pg> {
    let query = comments::table
        .filter(comments::novel_id.eq(scope.novel_id))
        .into_boxed();

    match scope.chapter_id {
        Some(chapter_id) => query.filter(comments::chapter_id.eq(chapter_id)),
        None => query.filter(comments::chapter_id.is_null()),
    }
}

pub async fn fetch_thread(
    conn: &mut AsyncPgConnection,
    scope: ContentScope,
) -> Result<FetchedThread, eyre::Error> {
    let comments: Vec<Comment> = in_scope(scope)
        .order((comments::created_at.asc(), comments::id.asc()))
        .select(Comment::as_select())
        .load(conn)
        .await?;

    if comments.is_empty() {
        return Ok(FetchedThread::default());
    }

    let comment_ids: Vec<i32> = comments.iter().map(|c| c.id).collect();
    let author_ids: Vec<i32> = comments
        .iter()
        .map(|c| c.identity_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let votes: Vec<CommentVote> = comment_votes::table
        .filter(comment_votes::comment_id.eq_any(comment_ids))
        .select(CommentVote::as_select())
        .load(conn)
        .await?;

    let profiles: Vec<Profile> = profiles::table
        .filter(profiles::identity_id.eq_any(author_ids.clone()))
        .select(Profile::as_select())
        .load(conn)
        .await?;

    let counts = read_counts(conn, author_ids).await?;

    let authors = profiles
        .into_iter()
        .map(|p| {
            let read_count = counts.get(&p.identity_id).copied().unwrap_or(0);
            (p.identity_id, AuthorProfile::new(p, read_count))
        })
        .collect();

    Ok(FetchedThread {
        comments,
        votes,
        authors,
    })
}

/// Joins votes and authors onto the comments, nests replies and orders the
/// roots.
pub fn assemble(
    fetched: FetchedThread,
    viewer: Option<i32>,
    order: SortOrder,
) -> Vec<CommentThread> {
    let tallies = tally_votes(&fetched.votes, viewer);

    let views = fetched
        .comments
        .into_iter()
        .map(|c| {
            let tally = tallies.get(&c.id).copied().unwrap_or_default();
            let author = fetched.authors.get(&c.identity_id).cloned();
            CommentThread::new(c, author, tally, viewer)
        })
        .collect();

    let mut roots = CommentArena::build(views).into_tree();
    sort_roots(&mut roots, order);

    roots
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn at(minutes: i64) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::try_minutes(minutes).unwrap()
    }

    fn comment(id: i32, identity_id: i32, parent_id: Option<i32>, minutes: i64) -> Comment {
        Comment {
            id,
            novel_id: 1,
            chapter_id: None,
            identity_id,
            content: format!("comment {id}"),
            parent_id,
            created_at: at(minutes),
            edited_at: None,
        }
    }

    fn vote(id: i32, comment_id: i32, identity_id: i32, value: i32) -> CommentVote {
        CommentVote {
            id,
            comment_id,
            identity_id,
            value,
            created_at: at(100),
        }
    }

    fn profile(identity_id: i32, name: &str) -> Profile {
        Profile {
            identity_id,
            username: name.into(),
            avatar_url: None,
            created_at: at(0),
        }
    }

    // A (root, score 2, t=1), B (root, score 2, t=2), C (reply to B, t=3)
    fn sample_thread() -> FetchedThread {
        FetchedThread {
            comments: vec![
                comment(1, 100, None, 1),
                comment(2, 200, None, 2),
                comment(3, 100, Some(2), 3),
            ],
            votes: vec![
                vote(1, 1, 300, 1),
                vote(2, 1, 400, 1),
                vote(3, 2, 300, 1),
                vote(4, 2, 100, 1),
                vote(5, 3, 300, -1),
            ],
            authors: HashMap::from([
                (100, AuthorProfile::new(profile(100, "ayane"), 9)),
                (200, AuthorProfile::new(profile(200, "bram"), 10)),
            ]),
        }
    }

    #[test]
    fn test_popular_order_with_reply_nested() {
        let tree = assemble(sample_thread(), None, SortOrder::Popular);

        assert_eq!(tree.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].id, 3);
        assert_eq!(tree[0].replies[0].score, -1);
    }

    #[test]
    fn test_reply_stays_nested_in_every_sort() {
        for order in [SortOrder::Newest, SortOrder::Oldest, SortOrder::Popular] {
            let tree = assemble(sample_thread(), None, order);
            assert_eq!(tree.len(), 2);

            let b = tree.iter().find(|c| c.id == 2).unwrap();
            assert_eq!(b.replies.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3]);
        }
    }

    #[test]
    fn test_viewer_specific_fields() {
        let tree = assemble(sample_thread(), Some(100), SortOrder::Oldest);

        let a = &tree[0];
        assert_eq!(a.id, 1);
        assert!(a.is_comment_owner);
        assert_eq!(a.viewer_vote, 0);
        assert_eq!((a.upvotes, a.downvotes, a.score), (2, 0, 2));

        let b = &tree[1];
        assert!(!b.is_comment_owner);
        assert_eq!(b.viewer_vote, 1);
        assert!(b.replies[0].is_comment_owner);
    }

    #[test]
    fn test_authors_and_badges_are_joined() {
        let tree = assemble(sample_thread(), None, SortOrder::Oldest);

        let a_author = tree[0].author.as_ref().unwrap();
        assert_eq!(a_author.username, "ayane");
        assert_eq!(a_author.badge.threshold, 0);

        let b_author = tree[1].author.as_ref().unwrap();
        assert_eq!(b_author.badge.threshold, 10);
    }

    #[test]
    fn test_missing_profile_leaves_author_empty() {
        let mut thread = sample_thread();
        thread.authors.remove(&200);

        let tree = assemble(thread, None, SortOrder::Oldest);
        assert!(tree[1].author.is_none());
    }

    #[test]
    fn test_empty_thread() {
        assert!(assemble(FetchedThread::default(), Some(1), SortOrder::Popular).is_empty());
    }
}
