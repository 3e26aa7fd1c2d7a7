#![allow(dead_code)] // Each test binary uses a different subset

pub mod builders;
pub mod doubles;
pub mod strategies;

pub use builders::*;
pub use doubles::*;

use std::time::Duration;

/// Poll `condition` until it holds or `timeout` elapses (tokio time, so
/// paused-clock tests advance through it instantly)
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
