use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use agora_core::error::Result;
use agora_core::traits::State;

/// Name of the terminal state. Routing to it ends the execution.
pub const END: &str = "__end__";

/// Whether a routing target means "stop here". The empty name counts too.
pub(crate) fn is_terminal(name: &str) -> bool {
    name.is_empty() || name == END
}

/// Routing outcome of one node invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Let the graph's routing tables decide.
    Continue,
    /// Jump straight to the named node. `Goto(END)` ends the execution.
    Goto(String),
    /// End the execution.
    End,
}

impl Next {
    pub fn goto(node: impl Into<String>) -> Self {
        Next::Goto(node.into())
    }
}

/// A unit of work in a graph.
///
/// A node mutates the working state in place and tells the engine where to
/// go next. It must observe `cancel` for any long-running work.
pub trait Node<S: State>: Send + Sync + 'static {
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>>;
}

impl<S: State, N: Node<S> + ?Sized> Node<S> for Arc<N> {
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>> {
        (**self).run(cancel, state)
    }
}

/// A node backed by a closure.
pub struct FnNode<F> {
    f: F,
}

impl<S, F> Node<S> for FnNode<F>
where
    S: State,
    F: for<'a> Fn(&'a CancellationToken, &'a mut S) -> BoxFuture<'a, Result<Next>>
        + Send
        + Sync
        + 'static,
{
    fn run<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        state: &'a mut S,
    ) -> BoxFuture<'a, Result<Next>> {
        (self.f)(cancel, state)
    }
}

/// Wrap a closure as a node.
///
/// ```ignore
/// let greet = node_fn::<ConversationState, _>(|_cancel, state| {
///     Box::pin(async move {
///         state.set_output("hello")?;
///         Ok(Next::Continue)
///     })
/// });
/// ```
pub fn node_fn<S, F>(f: F) -> FnNode<F>
where
    S: State,
    F: for<'a> Fn(&'a CancellationToken, &'a mut S) -> BoxFuture<'a, Result<Next>>
        + Send
        + Sync
        + 'static,
{
    FnNode { f }
}
