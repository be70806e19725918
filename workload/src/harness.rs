use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    client::Connector,
    connect::{self, ConnectPolicy},
    error::WorkloadError,
    target::Target,
};

/// Shared context for every phase of a run: how to reach the server, how hard
/// to retry, and the run-wide stop signal.
#[derive(Debug)]
pub struct Harness<C> {
    pub(crate) connector: Arc<C>,
    pub(crate) policy: ConnectPolicy,
    pub(crate) cancel: CancellationToken,
}

impl<C: Connector> Harness<C> {
    pub fn new(connector: C, cancel: CancellationToken) -> Self {
        Self {
            connector: Arc::new(connector),
            policy: ConnectPolicy::default(),
            cancel,
        }
    }

    pub fn with_policy(mut self, policy: ConnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn connect(&self, target: &Target) -> Result<C::Connection, WorkloadError> {
        connect::connect_with_retry(self.connector.as_ref(), target, &self.policy, &self.cancel)
            .await
    }

    pub async fn probe(&self, target: &Target) -> Result<(), WorkloadError> {
        connect::probe(self.connector.as_ref(), target, &self.policy, &self.cancel).await
    }
}
