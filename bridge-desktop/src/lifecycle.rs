//! Lifecycle Observer Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
};

/// Desktop lifecycle observer.
///
/// Desktop windows keep playing when minimized, so the app is reported as
/// permanently active and no transitions are ever emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopLifecycleObserver;

impl DesktopLifecycleObserver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(LifecycleState::Active)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(DesktopLifecycleChangeStream))
    }
}

/// Desktop lifecycle change stream (never emits).
struct DesktopLifecycleChangeStream;

#[async_trait]
impl LifecycleChangeStream for DesktopLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        std::future::pending::<()>().await;
        None
    }
}
