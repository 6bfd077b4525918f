//! # Backline Runtime
//!
//! Runtime implementation for Backline reducers.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to the reducer
//! - **`EffectHandle`**: Lets a caller wait until an action and everything it cascaded into is done
//!
//! ## Example
//!
//! ```ignore
//! use backline_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! let mut handle = store.send(Action::DoSomething).await?;
//! handle.wait().await?;
//!
//! let value = store.state(|s| s.some_field).await;
//! ```

use backline_core::{effect::Effect, reducer::Reducer};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A spawned effect task panicked or was cancelled
        #[error("Effect task failed: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }
}

pub use error::StoreError;

/// Handle for waiting on the effects started by one `send`
///
/// Effects run in a spawned task. Actions they feed back are reduced and their
/// own effects executed inside that same task, so waiting on the handle waits
/// for the whole cascade.
#[derive(Debug)]
pub struct EffectHandle {
    task: Option<JoinHandle<()>>,
}

impl EffectHandle {
    /// A handle with nothing to wait for
    #[must_use]
    pub const fn completed() -> Self {
        Self { task: None }
    }

    const fn spawned(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Wait for all effects (and their cascades) to complete
    ///
    /// # Errors
    ///
    /// [`StoreError::TaskJoinError`] if the effect task panicked.
    pub async fn wait(&mut self) -> Result<(), StoreError> {
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, BoxFuture, Effect, EffectHandle, Ordering, Reducer, RwLock, StoreError,
    };

    struct Shared<S, R, E> {
        state: RwLock<S>,
        reducer: R,
        environment: E,
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Cloning a store is cheap; clones share state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        shared: Arc<Shared<S, R, E>>,
        shutdown: Arc<AtomicBool>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                shared: Arc::new(Shared {
                    state: RwLock::new(initial_state),
                    reducer,
                    environment,
                }),
                shutdown: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Send an action to the store
        ///
        /// The reducer runs synchronously under the state write lock; the
        /// returned effects run in a spawned task. `send` returns once the
        /// reducer has run, not when effects are done; use the returned
        /// [`EffectHandle`] to wait.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::SeqCst) {
                return Err(StoreError::ShutdownInProgress);
            }
            metrics::counter!("store.commands.total").increment(1);

            let effects = self.reduce(action).await;
            if effects.iter().all(Effect::is_none) {
                return Ok(EffectHandle::completed());
            }

            let store = self.clone();
            let task = tokio::spawn(async move {
                for effect in effects {
                    store.run_effect(effect).await;
                }
            });
            Ok(EffectHandle::spawned(task))
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.shared.state.read().await;
            f(&state)
        }

        /// Stop accepting new actions
        pub fn shutdown(&self) {
            tracing::debug!("Store shutting down");
            self.shutdown.store(true, Ordering::SeqCst);
        }

        async fn reduce(&self, action: A) -> backline_core::SmallVec<[Effect<A>; 4]> {
            let mut state = self.shared.state.write().await;
            self.shared
                .reducer
                .reduce(&mut state, action, &self.shared.environment)
        }

        async fn feed_back(&self, action: A) {
            let effects = self.reduce(action).await;
            for effect in effects {
                self.run_effect(effect).await;
            }
        }

        fn run_effect(&self, effect: Effect<A>) -> BoxFuture<'static, ()> {
            let store = self.clone();
            Box::pin(async move {
                match effect {
                    Effect::None => {
                        metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                    },
                    Effect::Future(fut) => {
                        tracing::trace!("Executing Effect::Future");
                        metrics::counter!("store.effects.executed", "type" => "future")
                            .increment(1);
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    },
                }
            })
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                shared: Arc::clone(&self.shared),
                shutdown: Arc::clone(&self.shutdown),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use backline_core::{SmallVec, smallvec};

    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
    }

    #[derive(Debug, Clone)]
    enum TestAction {
        Increment,
        ProduceEffect,
        ProduceChain,
    }

    struct TestEnv;

    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                TestAction::ProduceEffect => {
                    smallvec![Effect::future(async { Some(TestAction::Increment) })]
                },
                TestAction::ProduceChain => smallvec![
                    Effect::future(async { Some(TestAction::Increment) }),
                    Effect::future(async { Some(TestAction::ProduceEffect) }),
                ],
            }
        }
    }

    fn store() -> Store<TestState, TestAction, TestEnv, TestReducer> {
        Store::new(TestState::default(), TestReducer, TestEnv)
    }

    #[tokio::test]
    async fn send_runs_reducer_synchronously() {
        let store = store();
        let mut handle = store.send(TestAction::Increment).await.unwrap();
        handle.wait().await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn future_effect_feeds_action_back() {
        let store = store();
        let mut handle = store.send(TestAction::ProduceEffect).await.unwrap();
        handle.wait().await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn wait_covers_cascading_actions() {
        let store = store();
        let mut handle = store.send(TestAction::ProduceChain).await.unwrap();
        handle.wait().await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = store();
        store.shutdown();
        assert!(matches!(
            store.send(TestAction::Increment).await,
            Err(StoreError::ShutdownInProgress)
        ));
    }
}
