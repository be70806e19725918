//! In-memory connectors for exercising the phases without a server, and a
//! scripted RESP server for the real client.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ClientError, Connector, KvConnection},
    target::Target,
};

#[derive(Debug, Default)]
struct Shared {
    connects: AtomicUsize,
    ops: AtomicU64,
    sets: Mutex<Vec<(String, usize)>>,
    // keys requested, per connection id
    requests: Mutex<BTreeMap<usize, Vec<String>>>,
}

#[derive(Debug, Default)]
pub struct MockConnector {
    shared: Arc<Shared>,
    // connects numbered from 1; these fail
    refuse_until: usize,
    refuse_all: bool,
    hang_until: usize,
    panic_on_connect: Option<usize>,
    latency: Duration,
    fail_set_key: Option<String>,
    error_every: Option<u64>,
    drop_after: Option<u64>,
    cancel_after_ops: Option<(u64, CancellationToken)>,
    cancel_on_connect: Option<(usize, CancellationToken)>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_all(mut self) -> Self {
        self.refuse_all = true;
        self
    }

    pub fn refuse_first(mut self, attempts: usize) -> Self {
        self.refuse_until = attempts;
        self
    }

    /// The first `attempts` connects never complete.
    pub fn hang_first(mut self, attempts: usize) -> Self {
        self.hang_until = attempts;
        self
    }

    pub fn panic_on_connect(mut self, nth: usize) -> Self {
        self.panic_on_connect = Some(nth);
        self
    }

    /// Per-request latency on the tokio clock. Zero means the request
    /// completes after a single yield.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fail_set_on(mut self, key: &str) -> Self {
        self.fail_set_key = Some(key.to_string());
        self
    }

    pub fn error_every(mut self, nth: u64) -> Self {
        self.error_every = Some(nth);
        self
    }

    /// Every connection drops after serving `ops` requests.
    pub fn drop_after(mut self, ops: u64) -> Self {
        self.drop_after = Some(ops);
        self
    }

    pub fn cancel_after_ops(mut self, ops: u64, token: CancellationToken) -> Self {
        self.cancel_after_ops = Some((ops, token));
        self
    }

    pub fn cancel_on_connect(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_connect = Some((nth, token));
        self
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn ops(&self) -> u64 {
        self.shared.ops.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> Vec<(String, usize)> {
        self.shared.sets.lock().unwrap().clone()
    }

    /// Keys each connection asked for, in connect order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.shared.requests.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, _target: &Target) -> Result<MockConnection, ClientError> {
        let attempt = self.shared.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((nth, token)) = &self.cancel_on_connect {
            if attempt == *nth {
                token.cancel();
            }
        }
        if self.panic_on_connect == Some(attempt) {
            panic!("connector blew up on attempt {attempt}");
        }
        if attempt <= self.hang_until {
            std::future::pending::<()>().await;
        }
        if self.refuse_all || attempt <= self.refuse_until {
            return Err(ClientError::Disconnected("connection refused".into()));
        }
        Ok(MockConnection {
            id: attempt,
            shared: self.shared.clone(),
            served: 0,
            latency: self.latency,
            fail_set_key: self.fail_set_key.clone(),
            error_every: self.error_every,
            drop_after: self.drop_after,
            cancel_after_ops: self.cancel_after_ops.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    id: usize,
    shared: Arc<Shared>,
    served: u64,
    latency: Duration,
    fail_set_key: Option<String>,
    error_every: Option<u64>,
    drop_after: Option<u64>,
    cancel_after_ops: Option<(u64, CancellationToken)>,
}

impl MockConnection {
    async fn serve(&mut self, key: &str) -> Result<(), ClientError> {
        self.shared
            .requests
            .lock()
            .unwrap()
            .entry(self.id)
            .or_default()
            .push(key.to_string());
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(limit) = self.drop_after {
            if self.served >= limit {
                return Err(ClientError::Disconnected("reset by peer".into()));
            }
        }
        self.served += 1;

        if let Some(nth) = self.error_every {
            if self.served % nth == 0 {
                return Err(ClientError::Request("-ERR busy".into()));
            }
        }

        let total = self.shared.ops.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after_ops {
            if total >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KvConnection for MockConnection {
    async fn ping(&mut self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Bytes>, ClientError> {
        self.serve(key).await?;
        Ok(None)
    }

    async fn set(&mut self, key: &str, value: &[u8]) -> Result<(), ClientError> {
        if self.fail_set_key.as_deref() == Some(key) {
            return Err(ClientError::Request(format!("-ERR rejected {}", key)));
        }
        self.serve(key).await?;
        self.shared
            .sets
            .lock()
            .unwrap()
            .push((key.to_string(), value.len()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerScript {
    /// PING, GET and SET against an in-memory map.
    Store,
    /// Like `Store`, but every SET gets an error reply.
    RejectSets,
    /// Answers GET with a bulk header claiming `i64::MAX` bytes, then hangs up.
    HugeBulkOnGet,
}

/// Serves RESP on an ephemeral local port until the test runtime ends.
/// Commands it does not know get `-ERR`.
pub async fn spawn_resp_server(script: ServerScript) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_resp(stream, script));
        }
    });
    port
}

async fn read_command(reader: &mut BufReader<TcpStream>) -> Option<Vec<Vec<u8>>> {
    let mut header = String::new();
    if reader.read_line(&mut header).await.ok()? == 0 {
        return None;
    }
    let argc: usize = header.trim().strip_prefix('*')?.parse().ok()?;
    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        let mut len_line = String::new();
        reader.read_line(&mut len_line).await.ok()?;
        let len: usize = len_line.trim().strip_prefix('$')?.parse().ok()?;
        let mut arg = vec![0u8; len + 2];
        reader.read_exact(&mut arg).await.ok()?;
        arg.truncate(len);
        args.push(arg);
    }
    Some(args)
}

async fn serve_resp(stream: TcpStream, script: ServerScript) {
    let mut reader = BufReader::new(stream);
    let mut store: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    while let Some(args) = read_command(&mut reader).await {
        let name = args
            .first()
            .map(|a| a.to_ascii_uppercase())
            .unwrap_or_default();
        let response: Vec<u8> = match (name.as_slice(), script) {
            (b"PING", _) => b"+PONG\r\n".to_vec(),
            (b"SET", ServerScript::RejectSets) => b"-ERR read only\r\n".to_vec(),
            (b"SET", _) if args.len() >= 3 => {
                store.insert(args[1].clone(), args[2].clone());
                b"+OK\r\n".to_vec()
            }
            (b"GET", ServerScript::HugeBulkOnGet) => {
                let _ = reader
                    .get_mut()
                    .write_all(format!("${}\r\n", i64::MAX).as_bytes())
                    .await;
                return;
            }
            (b"GET", _) if args.len() >= 2 => match store.get(&args[1]) {
                Some(value) => {
                    let mut out = format!("${}\r\n", value.len()).into_bytes();
                    out.extend_from_slice(value);
                    out.extend_from_slice(b"\r\n");
                    out
                }
                None => b"$-1\r\n".to_vec(),
            },
            _ => b"-ERR unknown command\r\n".to_vec(),
        };
        if reader.get_mut().write_all(&response).await.is_err() {
            return;
        }
    }
}
