//! Timer abstraction for connection and transaction timeouts

use futures::future::{self, Either, LocalBoxFuture};
use futures::pin_mut;
use std::future::Future;
use std::time::Duration;

/// Source of sleep futures; the browser implementation wraps `setTimeout`
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// The deadline passed before the future completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

/// Race `fut` against a sleep of `duration`
pub async fn with_timeout<T, F>(timer: &T, duration: Duration, fut: F) -> Result<F::Output, Elapsed>
where
    T: Timer + ?Sized,
    F: Future,
{
    let deadline = timer.sleep(duration);
    pin_mut!(fut);
    match future::select(fut, deadline).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed),
    }
}
