use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    client::{Connector, KvConnection},
    error::WorkloadError,
    target::Target,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub tries: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            tries: 20,
            timeout: Duration::from_secs(2),
            backoff: Duration::from_millis(200),
        }
    }
}

/// Each attempt is bounded by `policy.timeout`; a failed attempt is followed
/// by `policy.backoff` before the next one. Cancellation is checked between
/// attempts and interrupts the backoff.
pub async fn connect_with_retry<C: Connector>(
    connector: &C,
    target: &Target,
    policy: &ConnectPolicy,
    cancel: &CancellationToken,
) -> Result<C::Connection, WorkloadError> {
    let mut reason = String::from("no attempts made");

    for attempt in 1..=policy.tries {
        if cancel.is_cancelled() {
            return Err(WorkloadError::Cancelled);
        }

        match tokio::time::timeout(policy.timeout, connector.connect(target)).await {
            Ok(Ok(connection)) => return Ok(connection),
            Ok(Err(e)) => reason = e.to_string(),
            Err(_) => reason = format!("connect timed out after {:?}", policy.timeout),
        }
        tracing::debug!(%target, attempt, tries = policy.tries, %reason, "connect attempt failed");

        if attempt < policy.tries {
            tokio::select! {
                _ = cancel.cancelled() => return Err(WorkloadError::Cancelled),
                _ = tokio::time::sleep(policy.backoff) => {}
            }
        }
    }

    Err(WorkloadError::Connect {
        target: target.to_string(),
        tries: policy.tries,
        reason,
    })
}

/// Checks the target answers `PING` before any phase starts.
pub async fn probe<C: Connector>(
    connector: &C,
    target: &Target,
    policy: &ConnectPolicy,
    cancel: &CancellationToken,
) -> Result<(), WorkloadError> {
    let mut connection = connect_with_retry(connector, target, policy, cancel).await?;
    connection
        .ping()
        .await
        .map_err(|source| WorkloadError::Probe {
            target: target.to_string(),
            source,
        })?;
    tracing::info!(name = %target.name, %target, "target reachable");
    Ok(())
}
