#![allow(dead_code)]

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use webtransport_datagrams::prelude::*;

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Route library logs to the test harness. Controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Echo every datagram the session receives until it ends.
///
/// The task owns the session; it resolves with the number of datagrams
/// echoed once the session closes or fails.
pub fn spawn_echo(session: Session) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let datagrams = session.datagrams();
        let reader = datagrams.reader();
        let writer = datagrams.writer();
        let mut echoed = 0;
        while let Ok(Some(datagram)) = reader.read().await {
            if writer.write(datagram).is_err() {
                break;
            }
            echoed += 1;
        }
        echoed
    })
}

/// Await `future`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("timed out")
}
