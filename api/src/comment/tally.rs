use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::models::CommentVote;

pub const UPVOTE: i32 = 1;
pub const DOWNVOTE: i32 = -1;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
    /// The viewer's own vote, 0 when they haven't voted
    pub viewer_vote: i32,
}

impl VoteTally {
    /// Net score, the only ranking signal for `popular` sorting
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

/// Counts up and down votes per comment id. Rows with any other value are
/// ignored.
pub fn tally_votes(votes: &[CommentVote], viewer: Option<i32>) -> HashMap<i32, VoteTally> {
    let mut tallies = HashMap::<i32, VoteTally>::new();

    for vote in votes {
        let tally = tallies.entry(vote.comment_id).or_default();

        match vote.value {
            UPVOTE => tally.upvotes += 1,
            DOWNVOTE => tally.downvotes += 1,
            value => {
                tracing::warn!(vote_id = vote.id, value, "Ignoring vote with unexpected value");
                continue;
            }
        }

        if Some(vote.identity_id) == viewer {
            tally.viewer_vote = vote.value;
        }
    }

    tallies
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn value(self) -> i32 {
        match self {
            VoteDirection::Up => UPVOTE,
            VoteDirection::Down => DOWNVOTE,
        }
    }
}

/// A viewer's vote on one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    None,
    Up,
    Down,
}

/// The row change that moves a vote from one state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteWrite {
    Insert(i32),
    Update(i32),
    Delete,
}

impl VoteState {
    pub fn from_value(value: Option<i32>) -> Self {
        match value {
            Some(UPVOTE) => VoteState::Up,
            Some(DOWNVOTE) => VoteState::Down,
            _ => VoteState::None,
        }
    }

    pub fn value(self) -> i32 {
        match self {
            VoteState::None => 0,
            VoteState::Up => UPVOTE,
            VoteState::Down => DOWNVOTE,
        }
    }

    /// Voting the same direction again takes the vote back, voting the other
    /// direction flips the existing row.
    pub fn toggle(self, direction: VoteDirection) -> (VoteState, VoteWrite) {
        let next = match direction {
            VoteDirection::Up => VoteState::Up,
            VoteDirection::Down => VoteState::Down,
        };

        match self {
            VoteState::None => (next, VoteWrite::Insert(direction.value())),
            current if current == next => (VoteState::None, VoteWrite::Delete),
            _ => (next, VoteWrite::Update(direction.value())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vote(id: i32, comment_id: i32, identity_id: i32, value: i32) -> CommentVote {
        CommentVote {
            id,
            comment_id,
            identity_id,
            value,
            created_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn test_tally_counts_and_viewer_vote() {
        let votes = vec![
            vote(1, 10, 1, 1),
            vote(2, 10, 2, 1),
            vote(3, 10, 3, -1),
            vote(4, 11, 1, -1),
            vote(5, 11, 4, 7),
        ];

        let tallies = tally_votes(&votes, Some(1));

        let first = tallies[&10];
        assert_eq!((first.upvotes, first.downvotes), (2, 1));
        assert_eq!(first.score(), 1);
        assert_eq!(first.viewer_vote, 1);

        let second = tallies[&11];
        assert_eq!((second.upvotes, second.downvotes), (0, 1));
        assert_eq!(second.score(), -1);
        assert_eq!(second.viewer_vote, -1);
    }

    #[test]
    fn test_tally_without_viewer() {
        let votes = vec![vote(1, 10, 1, 1), vote(2, 10, 4, 7)];
        let tallies = tally_votes(&votes, None);
        assert_eq!(tallies[&10].viewer_vote, 0);
        assert_eq!(tallies[&10].score(), 1);

        for tally in tallies.values() {
            assert!([-1, 0, 1].contains(&tally.viewer_vote));
        }
    }

    #[test]
    fn test_toggle_transitions() {
        use VoteDirection::*;

        assert_eq!(
            VoteState::None.toggle(Up),
            (VoteState::Up, VoteWrite::Insert(1))
        );
        assert_eq!(
            VoteState::None.toggle(Down),
            (VoteState::Down, VoteWrite::Insert(-1))
        );
        assert_eq!(VoteState::Up.toggle(Up), (VoteState::None, VoteWrite::Delete));
        assert_eq!(
            VoteState::Up.toggle(Down),
            (VoteState::Down, VoteWrite::Update(-1))
        );
        assert_eq!(
            VoteState::Down.toggle(Down),
            (VoteState::None, VoteWrite::Delete)
        );
        assert_eq!(
            VoteState::Down.toggle(Up),
            (VoteState::Up, VoteWrite::Update(1))
        );
    }

    #[test]
    fn test_same_direction_twice_returns_to_none() {
        for direction in [VoteDirection::Up, VoteDirection::Down] {
            let (once, _) = VoteState::None.toggle(direction);
            let (twice, write) = once.toggle(direction);
            assert_eq!(twice, VoteState::None);
            assert_eq!(write, VoteWrite::Delete);
        }
    }

    #[test]
    fn test_state_round_trips_through_stored_value() {
        for state in [VoteState::None, VoteState::Up, VoteState::Down] {
            let stored = (state != VoteState::None).then(|| state.value());
            assert_eq!(VoteState::from_value(stored), state);
        }
        assert_eq!(VoteState::from_value(Some(3)), VoteState::None);
    }
}
