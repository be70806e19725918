use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, RedisError, aio::MultiplexedConnection};
use thiserror::Error;

use crate::target::Target;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl ClientError {
    /// A disconnect ends the connection's useful life; anything else only
    /// fails the single request. A reply the client cannot parse leaves the
    /// stream unusable, so it counts as a disconnect too.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ClientError::Redis(e) => {
                !e.is_timeout()
                    && (e.is_io_error() || e.is_connection_dropped() || e.is_unrecoverable_error())
            }
            ClientError::Disconnected(_) => true,
            ClientError::Request(_) => false,
        }
    }
}

/// A single request/response session with the server under test.
#[async_trait]
pub trait KvConnection: Send {
    async fn ping(&mut self) -> Result<(), ClientError>;
    async fn get(&mut self, key: &str) -> Result<Option<Bytes>, ClientError>;
    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), ClientError>;
}

/// Opens connections to a target. Shared by every worker of every phase.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: KvConnection + 'static;

    async fn connect(&self, target: &Target) -> Result<Self::Connection, ClientError>;
}

/// Connects through the `redis` client. Each call opens a fresh connection,
/// so every worker has its own socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self, target: &Target) -> Result<RedisConnection, ClientError> {
        let client = redis::Client::open((target.host.as_str(), target.port))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(RedisConnection { conn })
    }
}

pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl KvConnection for RedisConnection {
    async fn ping(&mut self) -> Result<(), ClientError> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Bytes>, ClientError> {
        let value: Option<Vec<u8>> = self.conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), ClientError> {
        let _: () = self.conn.set(key, value).await?;
        Ok(())
    }
}
