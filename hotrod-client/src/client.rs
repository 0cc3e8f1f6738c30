//! # Client Facade
//!
//! Purpose: Expose the key/value operations of a remote Hot Rod cache,
//! hiding serialization, pooling, correlation, and topology handling.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `HotRodClient` wires serializers, engine, pool,
//!    and dispatcher together behind a compact API.
//! 2. **Lazy Connection**: Construction never touches the network; the
//!    first operation connects, and `Drop` disconnects.
//! 3. **One Core, Two Call Styles**: Every `_async` operation submits the
//!    synchronous core to the worker pool, so semantics match exactly.
//! 4. **Semantic Statuses**: Non-error statuses like `KEY_DOES_NOT_EXIST`
//!    are outcomes (`None`, `false`), not failures.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use hotrod_common::protocol::{
    flags, intelligence, status, ContainsKeyRequest, Expirable, GetRequest, PingRequest,
    PutIfAbsentRequest, PutRequest, RemoveRequest, ReplaceRequest, Request, Response,
};
use hotrod_common::{HotRodError, HotRodResult};

use crate::connection::SocketConnection;
use crate::engine::ProtocolEngine;
use crate::executor::{AsyncHandle, Executor};
use crate::pool::ConnectionPool;
use crate::serial::{JsonSerializer, Serializer};
use crate::timespec;

/// Construction parameters for [`HotRodClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host.
    pub host: String,
    /// Server Hot Rod port.
    pub port: u16,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Named cache to address; `None` for the default cache.
    pub cache_name: Option<String>,
    /// Worker threads backing the `_async` operations.
    pub pool_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: 11222,
            timeout: Duration::from_secs(10),
            cache_name: None,
            pool_size: 20,
        }
    }
}

/// Options for the put family of operations.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// How long the entry lives, e.g. `"10s"`, `"inf"`, `"def"`.
    pub lifespan: Option<String>,
    /// How long the entry may sit idle, same format as `lifespan`.
    pub max_idle: Option<String>,
    /// Ask the server to return the previously stored value.
    pub previous: bool,
}

impl WriteOptions {
    /// Sets the lifespan spec.
    pub fn lifespan(mut self, spec: impl Into<String>) -> Self {
        self.lifespan = Some(spec.into());
        self
    }

    /// Sets the max-idle spec.
    pub fn max_idle(mut self, spec: impl Into<String>) -> Self {
        self.max_idle = Some(spec.into());
        self
    }

    /// Requests the previously stored value.
    pub fn previous(mut self) -> Self {
        self.previous = true;
        self
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional<V> {
    /// Whether the server applied the write.
    pub applied: bool,
    /// Previously stored value, when one was requested and present.
    pub previous: Option<V>,
}

struct ClientInner<KS, VS> {
    engine: ProtocolEngine,
    key_serial: KS,
    val_serial: VS,
    connect_lock: Mutex<()>,
}

/// Blocking Hot Rod client with background-dispatch counterparts.
///
/// Generic over the key and value serializers; both default to JSON over
/// UTF-8 strings. The client is cheap to share: all operations take
/// `&self` and are safe to call from multiple threads.
pub struct HotRodClient<KS = JsonSerializer<String>, VS = JsonSerializer<String>> {
    inner: Arc<ClientInner<KS, VS>>,
    executor: Executor,
}

impl HotRodClient {
    /// Creates a client with the default JSON serializers.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_serializers(config, JsonSerializer::new(), JsonSerializer::new())
    }
}

impl<KS, VS> HotRodClient<KS, VS> {
    /// Creates a client with explicit key and value serializers.
    pub fn with_serializers(config: ClientConfig, key_serial: KS, val_serial: VS) -> Self {
        info!(
            host = %config.host,
            port = config.port,
            timeout_ms = config.timeout.as_millis() as u64,
            cache_name = config.cache_name.as_deref().unwrap_or("<default>"),
            pool_size = config.pool_size,
            "initializing client"
        );
        let pool = ConnectionPool::new(vec![SocketConnection::new(
            config.host,
            config.port,
            config.timeout,
        )]);
        let engine = ProtocolEngine::new(
            pool,
            config.timeout,
            config.cache_name,
            intelligence::TOPOLOGY,
        );
        HotRodClient {
            inner: Arc::new(ClientInner {
                engine,
                key_serial,
                val_serial,
                connect_lock: Mutex::new(()),
            }),
            executor: Executor::new(config.pool_size),
        }
    }

    /// Opens the pool. A no-op when already connected.
    pub fn connect(&self) -> HotRodResult<()> {
        self.inner.connect()
    }

    /// Closes the pool. A no-op when already closed.
    pub fn disconnect(&self) {
        self.inner.disconnect()
    }

    /// Endpoints the pool currently targets.
    pub fn endpoints(&self) -> Vec<(String, u16)> {
        self.inner.engine.pool().endpoints()
    }
}

impl<KS, VS> Drop for HotRodClient<KS, VS> {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl<KS, VS> ClientInner<KS, VS> {
    fn connect(&self) -> HotRodResult<()> {
        let _guard = self.connect_lock.lock();
        if !self.engine.pool().connected() {
            self.engine.pool().connect()?;
        }
        Ok(())
    }

    fn disconnect(&self) {
        let _guard = self.connect_lock.lock();
        self.engine.pool().disconnect();
    }
}

fn apply_write_options<R: Request + Expirable>(
    request: &mut R,
    options: &WriteOptions,
) -> HotRodResult<()> {
    if let Some(spec) = &options.lifespan {
        let spec = timespec::parse(spec)?;
        request.set_lifespan(spec.amount, spec.unit);
    }
    if let Some(spec) = &options.max_idle {
        let spec = timespec::parse(spec)?;
        request.set_max_idle(spec.amount, spec.unit);
    }
    if options.previous {
        request.header_mut().flags |= flags::FORCE_RETURN_VALUE;
    }
    Ok(())
}

fn unexpected(expected: &'static str, actual: &Response) -> HotRodError {
    HotRodError::Protocol(format!(
        "expected {expected}, got {}",
        actual.variant_name()
    ))
}

impl<KS: Serializer, VS: Serializer> ClientInner<KS, VS> {
    fn dispatch<R: Request>(&self, request: &mut R) -> HotRodResult<Response> {
        self.connect()?;
        debug!(op = R::OP_CODE, "dispatching request");
        self.engine.send(request)
    }

    fn decode_value(&self, data: Option<Vec<u8>>) -> HotRodResult<Option<VS::Value>> {
        data.map(|bytes| self.val_serial.from_bytes(&bytes)).transpose()
    }

    fn ping(&self) -> HotRodResult<bool> {
        let mut request = PingRequest::new();
        match self.dispatch(&mut request)? {
            Response::Ping(resp) => Ok(resp.header.status == status::OK),
            other => Err(unexpected("PingResponse", &other)),
        }
    }

    fn get_raw(&self, key: Vec<u8>) -> HotRodResult<Option<VS::Value>> {
        let mut request = GetRequest::new(key);
        match self.dispatch(&mut request)? {
            Response::Get(resp) => self.decode_value(resp.value),
            other => Err(unexpected("GetResponse", &other)),
        }
    }

    fn put_raw(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        options: &WriteOptions,
    ) -> HotRodResult<Option<VS::Value>> {
        let mut request = PutRequest::new(key, value);
        apply_write_options(&mut request, options)?;
        match self.dispatch(&mut request)? {
            Response::Put(resp) => self.decode_value(resp.prev_value),
            other => Err(unexpected("PutResponse", &other)),
        }
    }

    fn put_if_absent_raw(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        options: &WriteOptions,
    ) -> HotRodResult<Conditional<VS::Value>> {
        let mut request = PutIfAbsentRequest::new(key, value);
        apply_write_options(&mut request, options)?;
        match self.dispatch(&mut request)? {
            Response::PutIfAbsent(resp) => Ok(Conditional {
                applied: resp.header.status == status::OK,
                previous: self.decode_value(resp.prev_value)?,
            }),
            other => Err(unexpected("PutIfAbsentResponse", &other)),
        }
    }

    fn replace_raw(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        options: &WriteOptions,
    ) -> HotRodResult<Conditional<VS::Value>> {
        let mut request = ReplaceRequest::new(key, value);
        apply_write_options(&mut request, options)?;
        match self.dispatch(&mut request)? {
            Response::Replace(resp) => Ok(Conditional {
                applied: resp.header.status == status::OK,
                previous: self.decode_value(resp.prev_value)?,
            }),
            other => Err(unexpected("ReplaceResponse", &other)),
        }
    }

    fn contains_key_raw(&self, key: Vec<u8>) -> HotRodResult<bool> {
        let mut request = ContainsKeyRequest::new(key);
        match self.dispatch(&mut request)? {
            Response::ContainsKey(resp) => match resp.header.status {
                status::OK => Ok(true),
                status::KEY_DOES_NOT_EXIST => Ok(false),
                other_status => Err(HotRodError::Response {
                    message: format!("unexpected contains_key status 0x{other_status:02x}"),
                    response: Box::new(Response::ContainsKey(resp)),
                }),
            },
            other => Err(unexpected("ContainsKeyResponse", &other)),
        }
    }

    fn remove_raw(&self, key: Vec<u8>, previous: bool) -> HotRodResult<Conditional<VS::Value>> {
        let mut request = RemoveRequest::new(key);
        if previous {
            request.header_mut().flags |= flags::FORCE_RETURN_VALUE;
        }
        match self.dispatch(&mut request)? {
            Response::Remove(resp) => Ok(Conditional {
                applied: resp.header.status == status::OK,
                previous: self.decode_value(resp.prev_value)?,
            }),
            other => Err(unexpected("RemoveResponse", &other)),
        }
    }
}

impl<KS: Serializer, VS: Serializer> HotRodClient<KS, VS> {
    /// Pings the server; `true` when it answers OK.
    pub fn ping(&self) -> HotRodResult<bool> {
        self.inner.ping()
    }

    /// Fetches the value stored under `key`, `None` when absent.
    pub fn get(&self, key: &KS::Value) -> HotRodResult<Option<VS::Value>> {
        let key = self.inner.key_serial.to_bytes(key)?;
        self.inner.get_raw(key)
    }

    /// Stores `value` under `key`.
    ///
    /// Returns the previously stored value when `options.previous` asked
    /// for it.
    pub fn put(
        &self,
        key: &KS::Value,
        value: &VS::Value,
        options: &WriteOptions,
    ) -> HotRodResult<Option<VS::Value>> {
        let key = self.inner.key_serial.to_bytes(key)?;
        let value = self.inner.val_serial.to_bytes(value)?;
        self.inner.put_raw(key, value, options)
    }

    /// Stores `value` under `key` only when the key is absent.
    pub fn put_if_absent(
        &self,
        key: &KS::Value,
        value: &VS::Value,
        options: &WriteOptions,
    ) -> HotRodResult<Conditional<VS::Value>> {
        let key = self.inner.key_serial.to_bytes(key)?;
        let value = self.inner.val_serial.to_bytes(value)?;
        self.inner.put_if_absent_raw(key, value, options)
    }

    /// Replaces the value under `key` only when the key is present.
    pub fn replace(
        &self,
        key: &KS::Value,
        value: &VS::Value,
        options: &WriteOptions,
    ) -> HotRodResult<Conditional<VS::Value>> {
        let key = self.inner.key_serial.to_bytes(key)?;
        let value = self.inner.val_serial.to_bytes(value)?;
        self.inner.replace_raw(key, value, options)
    }

    /// Whether `key` is present on the server.
    pub fn contains_key(&self, key: &KS::Value) -> HotRodResult<bool> {
        let key = self.inner.key_serial.to_bytes(key)?;
        self.inner.contains_key_raw(key)
    }

    /// Removes `key`; `applied` tells whether it existed.
    pub fn remove(&self, key: &KS::Value, previous: bool) -> HotRodResult<Conditional<VS::Value>> {
        let key = self.inner.key_serial.to_bytes(key)?;
        self.inner.remove_raw(key, previous)
    }
}

impl<KS, VS> HotRodClient<KS, VS>
where
    KS: Serializer + Send + Sync + 'static,
    VS: Serializer + Send + Sync + 'static,
    VS::Value: Send + 'static,
{
    /// Background counterpart of [`HotRodClient::ping`].
    pub fn ping_async(&self) -> AsyncHandle<HotRodResult<bool>> {
        let inner = Arc::clone(&self.inner);
        self.executor.submit(move || inner.ping())
    }

    /// Background counterpart of [`HotRodClient::get`].
    pub fn get_async(&self, key: &KS::Value) -> AsyncHandle<HotRodResult<Option<VS::Value>>> {
        let inner = Arc::clone(&self.inner);
        let key = self.inner.key_serial.to_bytes(key);
        self.executor.submit(move || inner.get_raw(key?))
    }

    /// Background counterpart of [`HotRodClient::put`].
    pub fn put_async(
        &self,
        key: &KS::Value,
        value: &VS::Value,
        options: &WriteOptions,
    ) -> AsyncHandle<HotRodResult<Option<VS::Value>>> {
        let inner = Arc::clone(&self.inner);
        let key = self.inner.key_serial.to_bytes(key);
        let value = self.inner.val_serial.to_bytes(value);
        let options = options.clone();
        self.executor
            .submit(move || inner.put_raw(key?, value?, &options))
    }

    /// Background counterpart of [`HotRodClient::put_if_absent`].
    pub fn put_if_absent_async(
        &self,
        key: &KS::Value,
        value: &VS::Value,
        options: &WriteOptions,
    ) -> AsyncHandle<HotRodResult<Conditional<VS::Value>>> {
        let inner = Arc::clone(&self.inner);
        let key = self.inner.key_serial.to_bytes(key);
        let value = self.inner.val_serial.to_bytes(value);
        let options = options.clone();
        self.executor
            .submit(move || inner.put_if_absent_raw(key?, value?, &options))
    }

    /// Background counterpart of [`HotRodClient::replace`].
    pub fn replace_async(
        &self,
        key: &KS::Value,
        value: &VS::Value,
        options: &WriteOptions,
    ) -> AsyncHandle<HotRodResult<Conditional<VS::Value>>> {
        let inner = Arc::clone(&self.inner);
        let key = self.inner.key_serial.to_bytes(key);
        let value = self.inner.val_serial.to_bytes(value);
        let options = options.clone();
        self.executor
            .submit(move || inner.replace_raw(key?, value?, &options))
    }

    /// Background counterpart of [`HotRodClient::contains_key`].
    pub fn contains_key_async(&self, key: &KS::Value) -> AsyncHandle<HotRodResult<bool>> {
        let inner = Arc::clone(&self.inner);
        let key = self.inner.key_serial.to_bytes(key);
        self.executor.submit(move || inner.contains_key_raw(key?))
    }

    /// Background counterpart of [`HotRodClient::remove`].
    pub fn remove_async(
        &self,
        key: &KS::Value,
        previous: bool,
    ) -> AsyncHandle<HotRodResult<Conditional<VS::Value>>> {
        let inner = Arc::clone(&self.inner);
        let key = self.inner.key_serial.to_bytes(key);
        self.executor.submit(move || inner.remove_raw(key?, previous))
    }
}
