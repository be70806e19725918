use std::{sync::Arc, time::Duration};

use key_space::KeySpace;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::time::Instant;

use crate::{
    client::{Connector, KvConnection},
    connect::connect_with_retry,
    harness::Harness,
    target::Target,
};

pub const WARMUP_CLIENTS: usize = 16;
pub const WARMUP_SEED: u64 = 0xBEEF;

impl<C: Connector> Harness<C> {
    /// Uniform GET traffic from [`WARMUP_CLIENTS`] connections for `duration`.
    /// Best effort: a worker that cannot connect, or loses its connection,
    /// just stops. Returns once every worker has been joined, with the number
    /// of requests answered.
    pub async fn warmup(&self, target: &Target, keys: Arc<KeySpace>, duration: Duration) -> u64 {
        tracing::info!(clients = WARMUP_CLIENTS, ?duration, "warm-up");
        let deadline = Instant::now() + duration;

        let mut handles = Vec::with_capacity(WARMUP_CLIENTS);
        for index in 0..WARMUP_CLIENTS {
            let connector = self.connector.clone();
            let policy = self.policy;
            let cancel = self.cancel.clone();
            let target = target.clone();
            let keys = keys.clone();

            handles.push(tokio::spawn(async move {
                let Ok(mut connection) =
                    connect_with_retry(connector.as_ref(), &target, &policy, &cancel).await
                else {
                    return 0u64;
                };

                let mut rng = StdRng::seed_from_u64(WARMUP_SEED + index as u64);
                let mut ops = 0;
                while Instant::now() < deadline && !cancel.is_cancelled() {
                    let key = &keys[rng.gen_range(0..keys.len())];
                    match connection.get(key).await {
                        Ok(_) => ops += 1,
                        Err(e) if e.is_disconnect() => break,
                        Err(_) => {}
                    }
                }
                ops
            }));
        }

        let mut total = 0;
        for handle in handles {
            match handle.await {
                Ok(ops) => total += ops,
                Err(e) => tracing::warn!(error = %e, "warm-up worker failed"),
            }
        }
        tracing::info!(ops = total, "warm-up done");
        total
    }
}
