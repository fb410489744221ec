use std::time::Duration;


/// Advance paused tokio time one second at a time so every interval tick is
/// observed (Skip behavior would coalesce a multi-second jump).
pub(crate) async fn pass_seconds(n: u64) {
    tokio::task::yield_now().await;
    for _ in 0..n {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
}
