// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `ServiceServer` (§4.H, §4.I): the dispatch site.
//!
//! Grounded on the teacher's `rpc::server::ServiceServer`/`RequestHandler`
//! (a tokio `spin()` loop reading DDS samples and handing them to a
//! blanket-`Fn`-impl handler), reworked onto `transport::stream::TcpListener`
//! and `wire::WireCodec`: `accept_pending` plays the role of the teacher's
//! per-sample receive, and `ServiceRegistry::dispatch` plays the role of its
//! `RequestHandler::handle`.
//!
//! A listener is deliberately not a `Selectable` (see `transport::stream`),
//! so the server polls it directly once per `run`/`step` iteration rather
//! than waiting on a reactor readiness event for it.

use std::cell::{Cell, RefCell};
use std::net::ToSocketAddrs;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::io::IoDevice;
use crate::reactor::{Reactor, Selectable, WakeHandle};
use crate::transport::stream::TcpListener;

#[cfg(feature = "http")]
use crate::transport::http;

use super::error::{RpcError, RpcResult};
use super::exception::RemoteException;
use super::registry::{Invoker, ServiceRegistry};
use super::wire::{Message, WireCodec};
use crate::value::SerializationInfo;

/// Split `"domain.method"` into its two halves (§4.I's composite key, sent
/// over the wire as a single dotted method name); a name with no `.`
/// belongs to the default (empty) domain.
fn split_domain(full: &str) -> (&str, &str) {
    match full.split_once('.') {
        Some((domain, method)) => (domain, method),
        None => ("", full),
    }
}

#[cfg(feature = "threaded-dispatch")]
mod threaded {
    use super::*;
    use crossbeam::channel::{unbounded, Receiver, Sender};

    pub type ThreadedHandler =
        Arc<dyn Fn(&SerializationInfo) -> Result<SerializationInfo, RemoteException> + Send + Sync>;

    pub struct Job {
        pub conn_id: u64,
        pub call_id: Option<i64>,
        pub handler: ThreadedHandler,
        pub args: SerializationInfo,
    }

    pub struct JobResult {
        pub conn_id: u64,
        pub call_id: Option<i64>,
        pub outcome: Result<SerializationInfo, RemoteException>,
    }

    /// A fixed worker pool executing registered handlers off the reactor
    /// thread (§9's Open Question resolution for `threaded-dispatch`):
    /// results are returned over a channel and applied back on the
    /// reactor thread, since a connection's `WireCodec`/`IoDevice` are not
    /// `Send`.
    pub struct ThreadPool {
        tx: Sender<Job>,
        pub rx: Receiver<JobResult>,
        _workers: Vec<std::thread::JoinHandle<()>>,
    }

    impl ThreadPool {
        pub fn new(worker_count: usize) -> Self {
            let (job_tx, job_rx) = unbounded::<Job>();
            let (result_tx, result_rx) = unbounded::<JobResult>();
            let mut workers = Vec::with_capacity(worker_count.max(1));
            for _ in 0..worker_count.max(1) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                workers.push(std::thread::spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let outcome = (job.handler)(&job.args);
                        if result_tx
                            .send(JobResult {
                                conn_id: job.conn_id,
                                call_id: job.call_id,
                                outcome,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                }));
            }
            Self {
                tx: job_tx,
                rx: result_rx,
                _workers: workers,
            }
        }

        pub fn submit(&self, job: Job) {
            let _ = self.tx.send(job);
        }
    }
}

struct Connection {
    id: u64,
    device: Rc<IoDevice>,
    wire: Box<dyn WireCodec>,
    read_buf: RefCell<Vec<u8>>,
    busy: Cell<bool>,
}

/// A `Send + Sync` capability to stop a running [`ServiceServer::run`] loop
/// from another thread, mirroring [`crate::event_loop::ExitHandle`].
#[derive(Clone)]
pub struct ServerExitHandle {
    flag: Arc<AtomicBool>,
    wake: WakeHandle,
}

impl ServerExitHandle {
    pub fn exit(&self) {
        self.flag.store(true, Ordering::Release);
        self.wake.wake();
    }
}

/// Accepts connections, decodes calls with a connection-owned [`WireCodec`],
/// dispatches through a shared [`ServiceRegistry`], and writes back a
/// `Response` or `Fault` (§4.H).
///
/// Each accepted connection gets its own `WireCodec` instance from
/// `wire_factory` rather than sharing one — the binary wire's per-connection
/// dictionary (§5) would otherwise leak state between unrelated peers.
pub struct ServiceServer {
    reactor: Reactor,
    listener: TcpListener,
    registry: Rc<RefCell<ServiceRegistry>>,
    wire_factory: Box<dyn Fn() -> Box<dyn WireCodec>>,
    connections: RefCell<Vec<Rc<Connection>>>,
    next_conn_id: Cell<u64>,
    self_ref: RefCell<Weak<ServiceServer>>,
    exit_flag: Arc<AtomicBool>,
    #[cfg(feature = "http")]
    http: Cell<bool>,
    #[cfg(feature = "threaded-dispatch")]
    threaded_registry: RefCell<std::collections::BTreeMap<(String, String), threaded::ThreadedHandler>>,
    #[cfg(feature = "threaded-dispatch")]
    thread_pool: RefCell<Option<threaded::ThreadPool>>,
}

#[cfg(feature = "threaded-dispatch")]
const DEFAULT_WORKER_COUNT: usize = 4;

impl ServiceServer {
    pub fn bind(
        reactor: &Reactor,
        addr: impl ToSocketAddrs,
        wire_factory: impl Fn() -> Box<dyn WireCodec> + 'static,
    ) -> RpcResult<Rc<Self>> {
        let listener = TcpListener::bind(addr, 128).map_err(RpcError::from)?;
        let server = Rc::new(Self {
            reactor: reactor.clone(),
            listener,
            registry: Rc::new(RefCell::new(ServiceRegistry::new())),
            wire_factory: Box::new(wire_factory),
            connections: RefCell::new(Vec::new()),
            next_conn_id: Cell::new(1),
            self_ref: RefCell::new(Weak::new()),
            exit_flag: Arc::new(AtomicBool::new(false)),
            #[cfg(feature = "http")]
            http: Cell::new(false),
            #[cfg(feature = "threaded-dispatch")]
            threaded_registry: RefCell::new(std::collections::BTreeMap::new()),
            #[cfg(feature = "threaded-dispatch")]
            thread_pool: RefCell::new(None),
        });
        *server.self_ref.borrow_mut() = Rc::downgrade(&server);
        Ok(server)
    }

    /// Expect/produce HTTP/1.1-framed request/response bodies instead of a
    /// bare wire stream — decided once, at construction.
    #[cfg(feature = "http")]
    pub fn enable_http(&self) {
        self.http.set(true);
    }

    /// Route calls matching `domain`/`method` to a worker-thread pool
    /// instead of running them inline on the reactor thread. `f` must be
    /// `Send + Sync`, since it may run on any worker. Lazily spins up a
    /// `DEFAULT_WORKER_COUNT`-sized pool on first use unless
    /// `set_worker_count` already sized one.
    #[cfg(feature = "threaded-dispatch")]
    pub fn register_threaded_method(
        &self,
        domain: impl Into<String>,
        method: impl Into<String>,
        f: impl Fn(&SerializationInfo) -> Result<SerializationInfo, RemoteException> + Send + Sync + 'static,
    ) {
        self.ensure_thread_pool(DEFAULT_WORKER_COUNT);
        self.threaded_registry
            .borrow_mut()
            .insert((domain.into(), method.into()), Arc::new(f));
    }

    /// Size the worker pool backing `register_threaded_method`. Only takes
    /// effect if called before the pool is first needed; later calls are a
    /// no-op once a pool already exists.
    #[cfg(feature = "threaded-dispatch")]
    pub fn set_worker_count(self: &Rc<Self>, count: usize) {
        self.ensure_thread_pool(count);
    }

    #[cfg(feature = "threaded-dispatch")]
    fn ensure_thread_pool(&self, count: usize) {
        let mut pool = self.thread_pool.borrow_mut();
        if pool.is_none() {
            *pool = Some(threaded::ThreadPool::new(count));
        }
    }

    pub fn register_method(&self, domain: impl Into<String>, method: impl Into<String>, invoker: impl Invoker + 'static) {
        self.registry.borrow_mut().register_method(domain, method, invoker);
    }

    pub fn local_port(&self) -> RpcResult<u16> {
        self.listener.local_port().map_err(RpcError::from)
    }

    pub fn exit_handle(&self) -> ServerExitHandle {
        ServerExitHandle {
            flag: self.exit_flag.clone(),
            wake: self.reactor.wake_handle(),
        }
    }

    /// Run until `exit_handle().exit()` is called from any thread.
    pub fn run(self: &Rc<Self>, poll_interval: Duration) -> RpcResult<()> {
        while !self.exit_flag.load(Ordering::Acquire) {
            self.step(poll_interval)?;
        }
        Ok(())
    }

    /// One iteration: accept pending connections, apply any finished
    /// threaded-dispatch results, then block on the reactor for up to
    /// `timeout`. Exposed directly for tests that want tight control over
    /// how many passes run.
    pub fn step(self: &Rc<Self>, timeout: Duration) -> RpcResult<()> {
        self.accept_pending()?;
        self.drain_threaded_results();
        self.reactor.wait(timeout).map_err(RpcError::from)?;
        self.drain_threaded_results();
        Ok(())
    }

    fn accept_pending(self: &Rc<Self>) -> RpcResult<()> {
        loop {
            match self.listener.try_accept(false) {
                Ok(Some(device)) => self.adopt_connection(device),
                Ok(None) => break,
                Err(e) => return Err(RpcError::from(e)),
            }
        }
        Ok(())
    }

    fn adopt_connection(self: &Rc<Self>, device: Rc<IoDevice>) {
        let id = self.next_conn_id.get();
        self.next_conn_id.set(id + 1);
        let wire = (self.wire_factory)();
        let conn = Rc::new(Connection {
            id,
            device: device.clone(),
            wire,
            read_buf: RefCell::new(Vec::new()),
            busy: Cell::new(false),
        });

        let selectable: Rc<dyn Selectable> = device.clone();
        self.reactor.add(&selectable);

        let weak_server = self.self_ref.borrow().clone();
        let weak_conn = Rc::downgrade(&conn);
        device.set_input_ready_handler(move |dev| {
            if let (Some(server), Some(conn)) = (weak_server.upgrade(), weak_conn.upgrade()) {
                server.on_readable(&conn, dev);
            }
        });
        if device.begin_read(vec![0u8; 4096]).is_err() {
            self.reactor.remove(selectable.as_ref());
            return;
        }
        self.connections.borrow_mut().push(conn);
    }

    fn on_readable(self: &Rc<Self>, conn: &Rc<Connection>, dev: &Rc<IoDevice>) {
        match dev.end_read() {
            Ok((buf, filled, eof)) => {
                conn.read_buf.borrow_mut().extend_from_slice(&buf[..filled]);
                self.try_dispatch(conn);
                if eof {
                    self.drop_connection(conn);
                    return;
                }
                if dev.begin_read(vec![0u8; 4096]).is_err() {
                    self.drop_connection(conn);
                }
            }
            Err(_) => self.drop_connection(conn),
        }
    }

    fn drop_connection(&self, conn: &Rc<Connection>) {
        self.reactor.remove(conn.device.as_ref());
        self.connections.borrow_mut().retain(|c| !Rc::ptr_eq(c, conn));
    }

    fn try_dispatch(self: &Rc<Self>, conn: &Rc<Connection>) {
        loop {
            if conn.busy.get() {
                break;
            }
            let snapshot = conn.read_buf.borrow().clone();
            let parsed = match self.decode_one(conn, &snapshot) {
                Ok(Some(pair)) => pair,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("discarding unreadable rpc request: {e}");
                    conn.read_buf.borrow_mut().clear();
                    break;
                }
            };
            let (msg, consumed) = parsed;
            conn.read_buf.borrow_mut().drain(..consumed);
            match msg {
                Message::Call { method, args, id } => self.handle_call(conn, &method, &args, id),
                _ => log::warn!("server received a non-call rpc message; ignoring"),
            }
        }
    }

    #[cfg(feature = "http")]
    fn decode_one(&self, conn: &Rc<Connection>, buf: &[u8]) -> crate::error::Result<Option<(Message, usize)>> {
        if !self.http.get() {
            return conn.wire.try_decode(buf);
        }
        match http::try_parse_request(buf)? {
            Some((req, consumed)) => match conn.wire.try_decode(&req.body)? {
                Some((msg, _)) => Ok(Some((msg, consumed))),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    #[cfg(not(feature = "http"))]
    fn decode_one(&self, conn: &Rc<Connection>, buf: &[u8]) -> crate::error::Result<Option<(Message, usize)>> {
        conn.wire.try_decode(buf)
    }

    fn handle_call(self: &Rc<Self>, conn: &Rc<Connection>, full_method: &str, args: &SerializationInfo, id: Option<i64>) {
        let (domain, method) = split_domain(full_method);

        #[cfg(feature = "threaded-dispatch")]
        if let Some(handler) = self.threaded_registry.borrow().get(&(domain.to_string(), method.to_string())).cloned() {
            if let Some(pool) = self.thread_pool.borrow().as_ref() {
                conn.busy.set(true);
                pool.submit(threaded::Job {
                    conn_id: conn.id,
                    call_id: id,
                    handler,
                    args: args.clone(),
                });
                return;
            }
        }

        let outcome = self.registry.borrow().dispatch(domain, method, args);
        self.reply(conn, id, outcome, full_method);
    }

    fn reply(
        &self,
        conn: &Rc<Connection>,
        id: Option<i64>,
        outcome: Option<Result<SerializationInfo, RemoteException>>,
        full_method: &str,
    ) {
        let mut body = Vec::new();
        let encode_result = match outcome {
            Some(Ok(result)) => conn.wire.encode_response(&result, id, &mut body),
            Some(Err(fault)) => conn.wire.encode_fault(fault.rc(), fault.text(), id, &mut body),
            None => conn
                .wire
                .encode_fault(0, &format!("method not found: {full_method}"), id, &mut body),
        };
        if let Err(e) = encode_result {
            log::error!("failed to encode rpc response: {e}");
            return;
        }
        let out = self.frame_response(body);
        if let Err(e) = conn.device.write(&out) {
            log::warn!("failed to write rpc response: {e}");
        }
    }

    #[cfg(feature = "http")]
    fn frame_response(&self, body: Vec<u8>) -> Vec<u8> {
        if !self.http.get() {
            return body;
        }
        let mut out = Vec::new();
        http::write_response(
            &http::HttpResponse {
                status: 200,
                content_type: "application/octet-stream".to_string(),
                body,
            },
            &mut out,
        );
        out
    }

    #[cfg(not(feature = "http"))]
    fn frame_response(&self, body: Vec<u8>) -> Vec<u8> {
        body
    }

    #[cfg(feature = "threaded-dispatch")]
    fn drain_threaded_results(self: &Rc<Self>) {
        let results: Vec<_> = {
            let pool = self.thread_pool.borrow();
            let Some(pool) = pool.as_ref() else { return };
            std::iter::from_fn(|| pool.rx.try_recv().ok()).collect()
        };
        for result in results {
            let conn = self
                .connections
                .borrow()
                .iter()
                .find(|c| c.id == result.conn_id)
                .cloned();
            let Some(conn) = conn else { continue };
            conn.busy.set(false);
            self.reply(&conn, result.call_id, Some(result.outcome), "<threaded>");
            self.try_dispatch(&conn);
        }
    }

    #[cfg(not(feature = "threaded-dispatch"))]
    fn drain_threaded_results(self: &Rc<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::binary_wire::BinaryWire;
    use crate::rpc::registry::typed;
    use crate::transport::stream::TcpStream;
    use std::time::Instant;

    #[test]
    fn accepts_a_connection_and_reports_method_not_found() {
        let reactor = Reactor::new().unwrap();
        let server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(BinaryWire::new())).unwrap();
        let port = server.local_port().unwrap();

        let client_wire = BinaryWire::new();
        let client_device = TcpStream::connect(("127.0.0.1", port), false).unwrap();
        server.step(Duration::from_millis(50)).unwrap();

        let mut bytes = Vec::new();
        client_wire
            .encode_call("does_not_exist", &SerializationInfo::new_array(), None, &mut bytes)
            .unwrap();
        client_device.write(&bytes).unwrap();
        server.step(Duration::from_millis(200)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut reply = Vec::new();
        while Instant::now() < deadline {
            let mut buf = [0u8; 256];
            if let Ok((n, _)) = client_device.read(&mut buf) {
                if n > 0 {
                    reply.extend_from_slice(&buf[..n]);
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let (msg, _) = client_wire.try_decode(&reply).unwrap().unwrap();
        match msg {
            Message::Fault { text, .. } => assert!(text.contains("does_not_exist")),
            _ => panic!("expected a Fault"),
        }
    }

    #[test]
    fn dispatches_a_registered_method() {
        let reactor = Reactor::new().unwrap();
        let server = ServiceServer::bind(&reactor, "127.0.0.1:0", || Box::new(BinaryWire::new())).unwrap();
        server.register_method("", "double", typed(|(n,): (i64,)| -> Result<i64, RemoteException> { Ok(n * 2) }));
        let port = server.local_port().unwrap();

        let client_wire = BinaryWire::new();
        let client_device = TcpStream::connect(("127.0.0.1", port), false).unwrap();
        server.step(Duration::from_millis(50)).unwrap();

        let mut args = SerializationInfo::new_array();
        *args.add_element() = 21i64.into();
        let mut bytes = Vec::new();
        client_wire.encode_call("double", &args, None, &mut bytes).unwrap();
        client_device.write(&bytes).unwrap();
        server.step(Duration::from_millis(200)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut reply = Vec::new();
        while Instant::now() < deadline {
            let mut buf = [0u8; 256];
            if let Ok((n, _)) = client_device.read(&mut buf) {
                if n > 0 {
                    reply.extend_from_slice(&buf[..n]);
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let (msg, _) = client_wire.try_decode(&reply).unwrap().unwrap();
        match msg {
            Message::Response { result, .. } => assert_eq!(result.to_i64().unwrap(), 42),
            _ => panic!("expected a Response"),
        }
    }
}
