//! Optimistic vote counters reconciled against the backend.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use shared::{
    domain::{ArgumentId, VoteDirection},
    protocol::TopicDetail,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{ClientError, VoteBackend};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub votes: i64,
    pub user_vote: Option<VoteDirection>,
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("a vote on argument {0} is already in flight")]
    InFlight(ArgumentId),
    #[error("failed to record vote: {0}")]
    Backend(#[from] ClientError),
}

#[derive(Default)]
struct LedgerState {
    tallies: HashMap<ArgumentId, VoteTally>,
    inflight: HashSet<ArgumentId>,
}

pub struct VoteLedger {
    backend: Arc<dyn VoteBackend>,
    state: Mutex<LedgerState>,
}

impl VoteLedger {
    pub fn new(backend: Arc<dyn VoteBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub async fn seed(&self, argument_id: ArgumentId, votes: i64) {
        let mut state = self.state.lock().await;
        state.tallies.entry(argument_id).or_default().votes = votes;
    }

    pub async fn seed_topic(&self, topic: &TopicDetail) {
        let mut state = self.state.lock().await;
        for argument in topic.pro_arguments.iter().chain(&topic.con_arguments) {
            state.tallies.entry(argument.id).or_default().votes = argument.votes.unwrap_or(0);
        }
    }

    pub async fn tally(&self, argument_id: ArgumentId) -> VoteTally {
        self.state
            .lock()
            .await
            .tallies
            .get(&argument_id)
            .copied()
            .unwrap_or_default()
    }

    /// Applies the vote locally, sends it, then either adopts the server's
    /// count or undoes exactly the local change.
    pub async fn cast(
        &self,
        argument_id: ArgumentId,
        direction: VoteDirection,
    ) -> Result<VoteTally, VoteError> {
        let previous_user_vote = {
            let mut state = self.state.lock().await;
            if !state.inflight.insert(argument_id) {
                return Err(VoteError::InFlight(argument_id));
            }
            let tally = state.tallies.entry(argument_id).or_default();
            let previous = tally.user_vote;
            tally.votes += direction.delta();
            tally.user_vote = Some(direction);
            previous
        };

        let outcome = self.backend.vote(argument_id, direction).await;

        let mut state = self.state.lock().await;
        state.inflight.remove(&argument_id);
        let tally = state.tallies.entry(argument_id).or_default();
        match outcome {
            Ok(response) => {
                tally.votes = response.votes;
                if response.user_vote.is_some() {
                    tally.user_vote = response.user_vote;
                }
                debug!(
                    "votes: argument {argument_id} reconciled votes={}",
                    response.votes
                );
                Ok(*tally)
            }
            Err(err) => {
                tally.votes -= direction.delta();
                tally.user_vote = previous_user_vote;
                warn!("votes: argument {argument_id} vote rolled back: {err}");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use shared::{error::ApiError, protocol::VoteResponse};
    use tokio::sync::{oneshot, Mutex as AsyncMutex};

    use super::*;

    struct ScriptedVotes {
        votes: Option<i64>,
        gate: AsyncMutex<Option<oneshot::Receiver<()>>>,
    }

    impl ScriptedVotes {
        fn answering(votes: i64) -> Self {
            Self {
                votes: Some(votes),
                gate: AsyncMutex::new(None),
            }
        }

        fn failing() -> Self {
            Self {
                votes: None,
                gate: AsyncMutex::new(None),
            }
        }
    }

    #[async_trait]
    impl VoteBackend for ScriptedVotes {
        async fn vote(
            &self,
            argument_id: ArgumentId,
            _direction: VoteDirection,
        ) -> Result<VoteResponse, ClientError> {
            let gate = self.gate.lock().await.take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            match self.votes {
                Some(votes) => Ok(VoteResponse {
                    argument_id,
                    votes,
                    user_vote: None,
                }),
                None => Err(ApiError::new(500, "Failed to upvote argument").into()),
            }
        }
    }

    #[tokio::test]
    async fn successful_vote_adopts_server_count() {
        let ledger = VoteLedger::new(Arc::new(ScriptedVotes::answering(10)));
        ledger.seed(ArgumentId(1), 3).await;

        let tally = ledger
            .cast(ArgumentId(1), VoteDirection::Upvote)
            .await
            .expect("vote");

        assert_eq!(tally.votes, 10);
        assert_eq!(tally.user_vote, Some(VoteDirection::Upvote));
        assert_eq!(ledger.tally(ArgumentId(1)).await, tally);
    }

    #[tokio::test]
    async fn failed_vote_restores_previous_tally() {
        let ledger = VoteLedger::new(Arc::new(ScriptedVotes::failing()));
        ledger.seed(ArgumentId(4), 7).await;
        let before = ledger.tally(ArgumentId(4)).await;

        let err = ledger
            .cast(ArgumentId(4), VoteDirection::Downvote)
            .await
            .expect_err("must fail");

        assert!(matches!(err, VoteError::Backend(_)));
        assert_eq!(ledger.tally(ArgumentId(4)).await, before);
    }

    #[tokio::test]
    async fn tentative_vote_is_visible_and_second_vote_is_refused() {
        let (release, gate) = oneshot::channel();
        let backend = ScriptedVotes::answering(1);
        *backend.gate.lock().await = Some(gate);
        let ledger = Arc::new(VoteLedger::new(Arc::new(backend)));

        let pending = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.cast(ArgumentId(2), VoteDirection::Upvote).await })
        };
        while ledger.tally(ArgumentId(2)).await.votes != 1 {
            tokio::task::yield_now().await;
        }

        let err = ledger
            .cast(ArgumentId(2), VoteDirection::Upvote)
            .await
            .expect_err("in flight");
        assert!(matches!(err, VoteError::InFlight(ArgumentId(2))));

        release.send(()).expect("release");
        let tally = pending.await.expect("join").expect("vote");
        assert_eq!(tally.votes, 1);
    }
}
