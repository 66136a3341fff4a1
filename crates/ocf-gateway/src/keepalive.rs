//! Connection liveness probing.

use std::time::Duration;

use ocf_gateway_coap::ClientCommander;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::KeepaliveConfig;

/// Periodic CoAP ping over one connection.
///
/// Every `time` of idle the peer is probed; an unanswered probe is retried
/// `retry` times every `interval` before the connection is torn down, which
/// fires the disconnect callback and with it the session teardown.
pub struct Keepalive {
    handle: JoinHandle<()>,
}

impl Keepalive {
    /// Start probing `commander`.
    pub fn spawn(commander: ClientCommander, config: KeepaliveConfig) -> Self {
        let handle = tokio::spawn(run(commander, config));
        Self { handle }
    }

    /// Stop probing. Idempotent; called on session close.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

async fn run(commander: ClientCommander, config: KeepaliveConfig) {
    let peer = commander.remote_addr();
    loop {
        tokio::time::sleep(config.time).await;
        if probe(&commander, config.interval).await {
            continue;
        }
        let mut alive = false;
        for attempt in 1..=config.retry {
            debug!(%peer, attempt, "keepalive retransmission");
            tokio::time::sleep(config.interval).await;
            if probe(&commander, config.interval).await {
                alive = true;
                break;
            }
        }
        if !alive {
            warn!(%peer, "peer unresponsive, closing connection");
            commander.close();
            return;
        }
    }
}

async fn probe(commander: &ClientCommander, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, commander.ping()).await,
        Ok(Ok(()))
    )
}
