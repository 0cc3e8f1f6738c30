//! End-to-end client tests against scripted in-process Hot Rod servers.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use hotrod_client::{
    ClientConfig, ConnectionPool, HotRodClient, ProtocolEngine, SocketConnection, WriteOptions,
};
use hotrod_common::codec::{ByteSource, Decoder};
use hotrod_common::protocol::{
    intelligence, status, GetResponse, Host, PingRequest, PingResponse, PutIfAbsentResponse,
    PutResponse, RemoveResponse, ReplaceResponse, Request, ResponseHeader, TopologyChangeHeader,
};
use hotrod_common::schema::{encode_message, Schema};
use hotrod_common::{ConnectionError, HotRodError, HotRodResult};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Blocking byte source over the server side of a connection.
struct StreamSource<'a>(&'a mut TcpStream);

impl ByteSource for StreamSource<'_> {
    fn next_byte(&mut self) -> HotRodResult<u8> {
        let mut byte = [0u8; 1];
        self.0
            .read_exact(&mut byte)
            .map_err(|err| HotRodError::Decode(err.to_string()))?;
        Ok(byte[0])
    }
}

#[derive(Debug)]
struct ParsedRequest {
    id: u64,
    version: u8,
    op: u8,
    flags: u64,
    key: Option<Vec<u8>>,
    value: Option<Vec<u8>>,
    lifespan: Option<(u64, u8)>,
}

/// Reads one request off the wire; `None` when the client went away.
fn read_request(stream: &mut TcpStream) -> Option<ParsedRequest> {
    let mut source = StreamSource(stream);
    let mut dec = Decoder::new(&mut source);
    let magic = dec.byte().ok()?;
    assert_eq!(magic, 0xa0, "request magic");
    let id = dec.uvarlong().expect("id");
    let version = dec.byte().expect("version");
    let op = dec.byte().expect("op");
    let _cname = dec.string().expect("cname");
    let flags = dec.uvarint().expect("flags");
    let _ci = dec.byte().expect("ci");
    let _t_id = dec.uvarint().expect("t_id");

    let mut request = ParsedRequest {
        id,
        version,
        op,
        flags,
        key: None,
        value: None,
        lifespan: None,
    };
    match op {
        0x17 => {}
        0x03 | 0x0b | 0x0f => {
            request.key = Some(dec.bytes().expect("key"));
        }
        0x01 | 0x05 | 0x07 => {
            request.key = Some(dec.bytes().expect("key"));
            let (hi, lo) = dec.splitbyte().expect("tunits");
            if !matches!(hi, 0x07 | 0x08) {
                request.lifespan = Some((dec.uvarint().expect("lifespan"), hi));
            }
            if !matches!(lo, 0x07 | 0x08) {
                let _max_idle = dec.uvarint().expect("max_idle");
            }
            request.value = Some(dec.bytes().expect("value"));
        }
        other => panic!("unexpected request op 0x{other:02x}"),
    }
    Some(request)
}

fn reply<M: Schema>(stream: &mut TcpStream, response: &M) {
    let data = encode_message(response).expect("encode response");
    stream.write_all(&data).expect("write response");
    stream.flush().expect("flush response");
}

type Store = Arc<Mutex<HashMap<Vec<u8>, (Vec<u8>, Option<Instant>)>>>;
type Topology = Option<(u64, Vec<(String, u16)>)>;

#[derive(Default)]
struct KvServer {
    store: Store,
    ids: Arc<Mutex<Vec<u64>>>,
    topology: Arc<Mutex<Topology>>,
}

impl KvServer {
    /// Binds a listener and serves every accepted connection on its own
    /// thread until the process exits.
    fn start(&self) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let store = Arc::clone(&self.store);
        let ids = Arc::clone(&self.ids);
        let topology = Arc::clone(&self.topology);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let store = Arc::clone(&store);
                let ids = Arc::clone(&ids);
                let topology = Arc::clone(&topology);
                thread::spawn(move || {
                    while let Some(request) = read_request(&mut stream) {
                        ids.lock().unwrap().push(request.id);
                        handle(&mut stream, request, &store, &topology);
                    }
                });
            }
        });
        port
    }

    fn seen_ids(&self) -> Vec<u64> {
        self.ids.lock().unwrap().clone()
    }

    fn announce(&self, topology_id: u64, hosts: Vec<(String, u16)>) {
        *self.topology.lock().unwrap() = Some((topology_id, hosts));
    }
}

fn response_header(id: u64, op: u8, status_code: u8, topology: &Arc<Mutex<Topology>>) -> ResponseHeader {
    let mut header = ResponseHeader {
        id,
        op,
        status: status_code,
        ..ResponseHeader::default()
    };
    if let Some((topology_id, hosts)) = topology.lock().unwrap().as_ref() {
        header.tcm = 1;
        header.tc = Some(TopologyChangeHeader {
            id: *topology_id,
            n: hosts.len() as u64,
            hosts: hosts
                .iter()
                .map(|(ip, port)| Host {
                    ip: ip.clone(),
                    port: *port,
                })
                .collect(),
        });
    }
    header
}

fn expiry(request: &ParsedRequest) -> Option<Instant> {
    let (amount, unit) = request.lifespan?;
    let duration = match unit {
        0x00 => Duration::from_secs(amount),
        0x01 => Duration::from_millis(amount),
        _ => return None,
    };
    Some(Instant::now() + duration)
}

fn live_value(store: &Store, key: &[u8]) -> Option<Vec<u8>> {
    let mut store = store.lock().unwrap();
    match store.get(key) {
        Some((_, Some(deadline))) if *deadline <= Instant::now() => {
            store.remove(key);
            None
        }
        Some((value, _)) => Some(value.clone()),
        None => None,
    }
}

fn handle(stream: &mut TcpStream, request: ParsedRequest, store: &Store, topology: &Arc<Mutex<Topology>>) {
    if request.version != 25 {
        reply(
            stream,
            &hotrod_common::protocol::ErrorResponse {
                header: ResponseHeader {
                    id: 0,
                    op: hotrod_common::protocol::ErrorResponse::OP_CODE,
                    status: status::UNKNOWN_VERSION,
                    ..ResponseHeader::default()
                },
                error_message: "unknown version".to_string(),
            },
        );
        return;
    }

    let force = request.flags & 0x01 != 0;
    let id = request.id;
    match request.op {
        0x17 => reply(
            stream,
            &PingResponse {
                header: response_header(id, 0x18, status::OK, topology),
            },
        ),
        0x03 => {
            let key = request.key.as_deref().expect("get key");
            match live_value(store, key) {
                Some(value) => reply(
                    stream,
                    &GetResponse {
                        header: response_header(id, 0x04, status::OK, topology),
                        value: Some(value),
                    },
                ),
                None => reply(
                    stream,
                    &GetResponse {
                        header: response_header(id, 0x04, status::KEY_DOES_NOT_EXIST, topology),
                        value: None,
                    },
                ),
            }
        }
        0x01 => {
            let key = request.key.clone().expect("put key");
            let value = request.value.clone().expect("put value");
            let deadline = expiry(&request);
            let previous = live_value(store, &key);
            store.lock().unwrap().insert(key, (value, deadline));
            let (status_code, prev_value) = match previous {
                Some(prev) if force => (status::OK_WITH_VALUE, Some(prev)),
                _ => (status::OK, None),
            };
            reply(
                stream,
                &PutResponse {
                    header: response_header(id, 0x02, status_code, topology),
                    prev_value,
                },
            );
        }
        0x05 => {
            let key = request.key.clone().expect("put key");
            let value = request.value.clone().expect("put value");
            match live_value(store, &key) {
                Some(prev) if force => reply(
                    stream,
                    &PutIfAbsentResponse {
                        header: response_header(id, 0x06, status::FAIL_WITH_VALUE, topology),
                        prev_value: Some(prev),
                    },
                ),
                Some(_) => reply(
                    stream,
                    &PutIfAbsentResponse {
                        header: response_header(id, 0x06, status::ACTION_FAILED, topology),
                        prev_value: None,
                    },
                ),
                None => {
                    store
                        .lock()
                        .unwrap()
                        .insert(key, (value, expiry(&request)));
                    reply(
                        stream,
                        &PutIfAbsentResponse {
                            header: response_header(id, 0x06, status::OK, topology),
                            prev_value: None,
                        },
                    );
                }
            }
        }
        0x07 => {
            let key = request.key.clone().expect("replace key");
            let value = request.value.clone().expect("replace value");
            match live_value(store, &key) {
                Some(prev) => {
                    store
                        .lock()
                        .unwrap()
                        .insert(key, (value, expiry(&request)));
                    let (status_code, prev_value) = if force {
                        (status::OK_WITH_VALUE, Some(prev))
                    } else {
                        (status::OK, None)
                    };
                    reply(
                        stream,
                        &ReplaceResponse {
                            header: response_header(id, 0x08, status_code, topology),
                            prev_value,
                        },
                    );
                }
                None => reply(
                    stream,
                    &ReplaceResponse {
                        header: response_header(id, 0x08, status::ACTION_FAILED, topology),
                        prev_value: None,
                    },
                ),
            }
        }
        0x0b => {
            let key = request.key.as_deref().expect("remove key");
            match live_value(store, key) {
                Some(prev) => {
                    store.lock().unwrap().remove(key);
                    let (status_code, prev_value) = if force {
                        (status::OK_WITH_VALUE, Some(prev))
                    } else {
                        (status::OK, None)
                    };
                    reply(
                        stream,
                        &RemoveResponse {
                            header: response_header(id, 0x0c, status_code, topology),
                            prev_value,
                        },
                    );
                }
                None => reply(
                    stream,
                    &RemoveResponse {
                        header: response_header(id, 0x0c, status::KEY_DOES_NOT_EXIST, topology),
                        prev_value: None,
                    },
                ),
            }
        }
        0x0f => {
            let key = request.key.as_deref().expect("contains key");
            let status_code = if live_value(store, key).is_some() {
                status::OK
            } else {
                status::KEY_DOES_NOT_EXIST
            };
            reply(
                stream,
                &hotrod_common::protocol::ContainsKeyResponse {
                    header: response_header(id, 0x10, status_code, topology),
                },
            );
        }
        other => panic!("unexpected op 0x{other:02x}"),
    }
}

/// Serves one connection with a per-request closure, teacher-test style.
fn spawn_scripted(
    expected_requests: usize,
    handler: impl Fn(usize, ParsedRequest, &mut TcpStream) + Send + 'static,
) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        for idx in 0..expected_requests {
            let Some(request) = read_request(&mut stream) else {
                break;
            };
            handler(idx, request, &mut stream);
        }
    });
    port
}

fn client_for(port: u16) -> HotRodClient {
    init_tracing();
    HotRodClient::new(ClientConfig {
        port,
        timeout: Duration::from_secs(2),
        pool_size: 4,
        ..ClientConfig::default()
    })
}

#[test]
fn ping_succeeds_and_ids_are_sequential() {
    let server = KvServer::default();
    let client = client_for(server.start());
    for _ in 0..3 {
        assert!(client.ping().unwrap());
    }
    assert_eq!(server.seen_ids(), vec![1, 2, 3]);
}

#[test]
fn put_then_get_roundtrips_value() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let options = WriteOptions::default();
    assert_eq!(
        client.put(&"k".to_string(), &"v".to_string(), &options).unwrap(),
        None
    );
    assert_eq!(
        client.get(&"k".to_string()).unwrap(),
        Some("v".to_string())
    );
}

#[test]
fn get_missing_key_is_none() {
    let server = KvServer::default();
    let client = client_for(server.start());
    assert_eq!(client.get(&"missing".to_string()).unwrap(), None);
}

#[test]
fn put_returns_previous_value_when_requested() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "k".to_string();
    client
        .put(&key, &"one".to_string(), &WriteOptions::default())
        .unwrap();
    // Without the flag the server keeps the old value to itself.
    assert_eq!(
        client
            .put(&key, &"two".to_string(), &WriteOptions::default())
            .unwrap(),
        None
    );
    assert_eq!(
        client
            .put(&key, &"three".to_string(), &WriteOptions::default().previous())
            .unwrap(),
        Some("two".to_string())
    );
}

#[test]
fn put_if_absent_applies_only_once() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "k".to_string();

    let first = client
        .put_if_absent(&key, &"one".to_string(), &WriteOptions::default())
        .unwrap();
    assert!(first.applied);
    assert_eq!(first.previous, None);

    let second = client
        .put_if_absent(&key, &"two".to_string(), &WriteOptions::default())
        .unwrap();
    assert!(!second.applied);
    assert_eq!(second.previous, None);

    let third = client
        .put_if_absent(&key, &"three".to_string(), &WriteOptions::default().previous())
        .unwrap();
    assert!(!third.applied);
    assert_eq!(third.previous, Some("one".to_string()));
}

#[test]
fn replace_applies_only_to_present_keys() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "k".to_string();

    let miss = client
        .replace(&key, &"one".to_string(), &WriteOptions::default())
        .unwrap();
    assert!(!miss.applied);

    client
        .put(&key, &"one".to_string(), &WriteOptions::default())
        .unwrap();
    let hit = client
        .replace(&key, &"two".to_string(), &WriteOptions::default().previous())
        .unwrap();
    assert!(hit.applied);
    assert_eq!(hit.previous, Some("one".to_string()));
}

#[test]
fn contains_key_reflects_presence() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "k".to_string();
    assert!(!client.contains_key(&key).unwrap());
    client
        .put(&key, &"v".to_string(), &WriteOptions::default())
        .unwrap();
    assert!(client.contains_key(&key).unwrap());
}

#[test]
fn remove_reports_presence_and_previous_value() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "k".to_string();
    client
        .put(&key, &"v".to_string(), &WriteOptions::default())
        .unwrap();

    let removed = client.remove(&key, true).unwrap();
    assert!(removed.applied);
    assert_eq!(removed.previous, Some("v".to_string()));

    let again = client.remove(&key, false).unwrap();
    assert!(!again.applied);
    assert_eq!(again.previous, None);
}

#[test]
fn entries_expire_after_their_lifespan() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "short".to_string();
    client
        .put(
            &key,
            &"lived".to_string(),
            &WriteOptions::default().lifespan("150ms"),
        )
        .unwrap();
    assert_eq!(client.get(&key).unwrap(), Some("lived".to_string()));
    thread::sleep(Duration::from_millis(300));
    assert_eq!(client.get(&key).unwrap(), None);
    assert!(!client.contains_key(&key).unwrap());
}

#[test]
fn server_error_response_translates_to_server_error() {
    let port = spawn_scripted(1, |_, request, stream| {
        reply(
            stream,
            &hotrod_common::protocol::ErrorResponse {
                header: ResponseHeader {
                    id: request.id,
                    op: hotrod_common::protocol::ErrorResponse::OP_CODE,
                    status: status::SERVER_ERR,
                    ..ResponseHeader::default()
                },
                error_message: "boom".to_string(),
            },
        );
    });
    let client = client_for(port);
    let err = client.get(&"k".to_string()).unwrap_err();
    let HotRodError::Server { message, .. } = err else {
        panic!("expected server error, got {err:?}");
    };
    assert_eq!(message, "boom");
}

#[test]
fn unknown_command_translates_to_client_error() {
    let port = spawn_scripted(1, |_, request, stream| {
        reply(
            stream,
            &hotrod_common::protocol::ErrorResponse {
                header: ResponseHeader {
                    id: request.id,
                    op: hotrod_common::protocol::ErrorResponse::OP_CODE,
                    status: status::UNKNOWN_CMD,
                    ..ResponseHeader::default()
                },
                error_message: "what".to_string(),
            },
        );
    });
    let client = client_for(port);
    let err = client.ping().unwrap_err();
    assert!(matches!(err, HotRodError::Client { .. }));
}

#[test]
fn stale_protocol_version_yields_server_error() {
    init_tracing();
    let server = KvServer::default();
    let port = server.start();
    let pool = ConnectionPool::new(vec![SocketConnection::new(
        "127.0.0.1",
        port,
        Duration::from_secs(2),
    )]);
    pool.connect().unwrap();
    let engine = ProtocolEngine::new(pool, Duration::from_secs(2), None, intelligence::TOPOLOGY);

    let mut request = PingRequest::new();
    request.header_mut().version = 19;
    let err = engine.send(&mut request).unwrap_err();
    assert!(matches!(err, HotRodError::Server { .. }));
}

#[test]
fn silent_server_times_out() {
    let port = spawn_scripted(1, |_, _, _| {
        thread::sleep(Duration::from_secs(5));
    });
    init_tracing();
    let client = HotRodClient::new(ClientConfig {
        port,
        timeout: Duration::from_millis(200),
        pool_size: 1,
        ..ClientConfig::default()
    });
    let err = client.ping().unwrap_err();
    assert!(matches!(
        err,
        HotRodError::Connection(ConnectionError::Timeout)
    ));
}

#[test]
fn hangup_mid_response_is_a_connection_error() {
    let port = spawn_scripted(1, |_, request, stream| {
        // Two header bytes, then the peer goes away.
        let mut partial = vec![0xa1];
        partial.push(request.id as u8);
        stream.write_all(&partial).expect("partial write");
        stream.shutdown(std::net::Shutdown::Both).expect("shutdown");
    });
    let client = client_for(port);
    let err = client.ping().unwrap_err();
    assert!(matches!(
        err,
        HotRodError::Connection(ConnectionError::HungUp)
    ));
}

#[test]
fn topology_change_reconciles_pool_and_keeps_serving() {
    let server_a = KvServer::default();
    let port_a = server_a.start();
    let server_b = KvServer {
        store: Arc::clone(&server_a.store),
        ..KvServer::default()
    };
    let port_b = server_b.start();
    server_a.announce(
        1,
        vec![
            ("127.0.0.1".to_string(), port_a),
            ("127.0.0.1".to_string(), port_b),
        ],
    );

    let client = client_for(port_a);
    client.ping().unwrap();
    assert_eq!(
        client.endpoints(),
        vec![
            ("127.0.0.1".to_string(), port_a),
            ("127.0.0.1".to_string(), port_b),
        ]
    );

    // Round-robin now spans both members; the shared store keeps results
    // consistent wherever a request lands.
    for idx in 0..6 {
        let key = format!("key-{idx}");
        client
            .put(&key, &format!("value-{idx}"), &WriteOptions::default())
            .unwrap();
        assert_eq!(client.get(&key).unwrap(), Some(format!("value-{idx}")));
    }
    assert!(!server_b.seen_ids().is_empty());
}

#[test]
fn concurrent_calls_each_get_their_own_answer() {
    let server_a = KvServer::default();
    let port_a = server_a.start();
    let server_b = KvServer {
        store: Arc::clone(&server_a.store),
        ..KvServer::default()
    };
    let port_b = server_b.start();
    server_a.announce(
        1,
        vec![
            ("127.0.0.1".to_string(), port_a),
            ("127.0.0.1".to_string(), port_b),
        ],
    );

    let client = Arc::new(client_for(port_a));
    client.ping().unwrap();

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for round in 0..5 {
                    let key = format!("w{worker}-r{round}");
                    let value = format!("value-{worker}-{round}");
                    client.put(&key, &value, &WriteOptions::default()).unwrap();
                    assert_eq!(client.get(&key).unwrap(), Some(value));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn async_operations_mirror_their_sync_core() {
    let server = KvServer::default();
    let client = client_for(server.start());
    let key = "async".to_string();

    client
        .put_async(&key, &"v".to_string(), &WriteOptions::default())
        .join()
        .unwrap();
    assert_eq!(client.get_async(&key).join().unwrap(), Some("v".to_string()));
    assert!(client.contains_key_async(&key).join().unwrap());
    let removed = client.remove_async(&key, false).join().unwrap();
    assert!(removed.applied);
    assert!(client.ping_async().join().unwrap());
}

#[test]
fn disconnect_is_idempotent_and_reconnect_is_lazy() {
    let server = KvServer::default();
    let client = client_for(server.start());
    assert!(client.ping().unwrap());
    client.disconnect();
    client.disconnect();
    // The next operation reconnects on its own.
    assert!(client.ping().unwrap());
}
