use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use agora_core::error::{AgoraError, Result};
use agora_core::traits::State;

use super::node::{Next, Node};

/// Combines the branch results into the state that replaces the original.
pub type MergeFn<S> = Arc<dyn Fn(&S, Vec<S>) -> S + Send + Sync>;

/// Runs several nodes concurrently, each on its own copy of the state.
///
/// Every branch gets an independent `deep_copy` of the incoming state. Once
/// all branches have finished, the merge function receives the original state
/// and the branch states in branch order, and its result becomes the new
/// state. If any branch fails, the first failure observed is returned and the
/// merge is skipped. Routing requests from the branches are ignored; the node
/// itself always returns `Next::Continue`.
pub struct ParallelNode<S: State> {
    branches: Vec<Arc<dyn Node<S>>>,
    merge: MergeFn<S>,
}

impl<S: State> ParallelNode<S> {
    pub fn new<F>(branches: Vec<Arc<dyn Node<S>>>, merge: F) -> Self
    where
        F: Fn(&S, Vec<S>) -> S + Send + Sync + 'static,
    {
        Self {
            branches,
            merge: Arc::new(merge),
        }
    }

    /// Add a branch after the existing ones.
    pub fn with_branch(mut self, node: impl Node<S>) -> Self {
        self.branches.push(Arc::new(node));
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    async fn fan_out(&self, cancel: &CancellationToken, state: &mut S) -> Result<()> {
        // Copy for every branch before starting any of them.
        let copies = self
            .branches
            .iter()
            .map(|_| state.deep_copy())
            .collect::<Result<Vec<S>>>()
            .map_err(|e| match e {
                AgoraError::StateCopy(_) => e,
                other => AgoraError::StateCopy(other.to_string()),
            })?;

        debug!(branches = copies.len(), "Starting parallel branches");

        let mut join_set = JoinSet::new();
        for (index, (node, mut copy)) in self.branches.iter().cloned().zip(copies).enumerate() {
            let cancel = cancel.clone();
            join_set.spawn(async move {
                let result = node.run(&cancel, &mut copy).await;
                (index, result.map(|_| copy))
            });
        }

        let mut slots: Vec<Option<S>> = (0..self.branches.len()).map(|_| None).collect();
        let mut failed = vec![false; self.branches.len()];
        let mut first_error: Option<AgoraError> = None;
        let mut panicked: Option<String> = None;

        // Drain every task even after a failure so none outlives this node.
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(branch_state))) => slots[index] = Some(branch_state),
                Ok((index, Err(e))) => {
                    warn!(branch = index, error = %e, "Parallel branch failed");
                    failed[index] = true;
                    if first_error.is_none() && panicked.is_none() {
                        first_error = Some(AgoraError::Branch {
                            index,
                            source: Box::new(e),
                        });
                    }
                }
                Err(e) => {
                    error!(error = %e, "Parallel branch task did not complete");
                    if first_error.is_none() && panicked.is_none() {
                        panicked = Some(e.to_string());
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if let Some(message) = panicked {
            let index = slots
                .iter()
                .zip(&failed)
                .position(|(slot, failed)| slot.is_none() && !failed)
                .unwrap_or_default();
            return Err(AgoraError::BranchPanicked { index, message });
        }

        let results: Vec<S> = slots.into_iter().flatten().collect();
        let merged = (self.merge)(state, results);
        *state = merged;
        Ok(())
    }
}

impl<S: State> Node<S> for ParallelNode<S> {
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>> {
        Box::pin(async move {
            self.fan_out(cancel, state).await?;
            Ok(Next::Continue)
        })
    }
}
