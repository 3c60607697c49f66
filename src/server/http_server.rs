//! Server lifecycle: the stopped/running state machine, the binding-address
//! registry, the accept loops and the worker set.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{sleep, Duration, Instant};

use crate::server::config::ServerConfig;
use crate::server::context::{Connection, RequestContext};
use crate::server::error::Error;
use crate::server::handler::{ActionFuture, ActionHandler};
use crate::server::worker;

/// Whether the server is currently accepting connections. There is no
/// externally observable intermediate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Running,
}

/// State shared between the server handle, its accept loops and workers.
pub(crate) struct Shared {
    pub(crate) config: ServerConfig,
    running: AtomicBool,
    addresses: Mutex<Vec<String>>,
    root_path: Mutex<PathBuf>,
    action_handler: RwLock<Option<ActionHandler>>,
    workers: Mutex<HashMap<u64, AbortHandle>>,
    next_worker_id: AtomicU64,
}

impl Shared {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            addresses: Mutex::new(Vec::new()),
            root_path: Mutex::new(PathBuf::new()),
            action_handler: RwLock::new(None),
            workers: Mutex::new(HashMap::new()),
            next_worker_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub(crate) fn root_path(&self) -> PathBuf {
        self.lock_root_path().clone()
    }

    pub(crate) fn action_handler(&self) -> Option<ActionHandler> {
        self.action_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn deregister_worker(&self, id: u64) {
        self.lock_workers().remove(&id);
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.lock_workers().len()
    }

    /// Abort every tracked worker and empty the set.
    fn abort_all_workers(&self) -> usize {
        let mut workers = self.lock_workers();
        let count = workers.len();
        for (_, handle) in workers.drain() {
            handle.abort();
        }
        count
    }

    fn lock_workers(&self) -> MutexGuard<'_, HashMap<u64, AbortHandle>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_addresses(&self) -> MutexGuard<'_, Vec<String>> {
        self.addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_root_path(&self) -> MutexGuard<'_, PathBuf> {
        self.root_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handles that only exist while the server is running.
struct RunningState {
    shutdown_tx: watch::Sender<bool>,
    accept_loops: Vec<JoinHandle<()>>,
    local_addrs: Vec<SocketAddr>,
}

/// A minimal embeddable HTTP server.
///
/// The server is configured while stopped (binding addresses, root
/// directory, action handler), then started and stopped under host control.
/// Requests are classified into four kinds: the default document, a static
/// file under the root directory, an action dispatched to the host's
/// handler, or unknown. One task serves each accepted connection and closes
/// it when done.
///
/// ```no_run
/// use embedhttp_rs::{Server, ServerConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Server::new(ServerConfig::default());
/// server.add_binding_address("http://127.0.0.1:9999/");
/// server.set_root_path("/var/wwwroot");
///
/// server.start().await?;
/// // ... host runs ...
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    pub(crate) shared: Arc<Shared>,
    runtime: Mutex<Option<RunningState>>,
    disposed: AtomicBool,
}

impl Server {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
            runtime: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register a binding address of the form `http://host:port/` (a
    /// trailing path prefix is accepted and ignored). No-op if the address
    /// is already registered or the server is running.
    pub fn add_binding_address(&self, address: &str) {
        if self.shared.is_running() {
            debug!("binding address not added: server is running");
            return;
        }

        let mut addresses = self.shared.lock_addresses();
        if addresses.iter().any(|existing| existing == address) {
            return;
        }
        addresses.push(address.to_string());
    }

    /// Remove a binding address. No-op if the address is absent or the
    /// server is running.
    pub fn remove_binding_address(&self, address: &str) {
        if self.shared.is_running() {
            debug!("binding address not removed: server is running");
            return;
        }

        let mut addresses = self.shared.lock_addresses();
        if let Some(at) = addresses.iter().position(|existing| existing == address) {
            addresses.remove(at);
        }
    }

    /// Whether the address is registered.
    pub fn contains_binding_address(&self, address: &str) -> bool {
        self.shared
            .lock_addresses()
            .iter()
            .any(|existing| existing == address)
    }

    /// Remove every binding address. No-op if the server is running.
    pub fn clear_binding_addresses(&self) {
        if self.shared.is_running() {
            debug!("binding addresses not cleared: server is running");
            return;
        }

        self.shared.lock_addresses().clear();
    }

    /// The registered binding addresses.
    pub fn binding_addresses(&self) -> Vec<String> {
        self.shared.lock_addresses().clone()
    }

    /// Set the directory static files are served from. No-op if the server
    /// is running.
    pub fn set_root_path(&self, path: impl Into<PathBuf>) {
        if self.shared.is_running() {
            debug!("root path not changed: server is running");
            return;
        }

        *self.shared.lock_root_path() = path.into();
    }

    /// The directory static files are served from.
    pub fn root_path(&self) -> PathBuf {
        self.shared.root_path()
    }

    /// Install the action handler, replacing any previous one. See
    /// [`ActionHandler`] for the expected signature.
    pub fn set_action_handler<F>(&self, handler: F)
    where
        F: for<'a> Fn(&'a mut RequestContext) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        let mut slot = self
            .shared
            .action_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// Remove the action handler; action requests fall back to the built-in
    /// diagnostic response.
    pub fn clear_action_handler(&self) {
        let mut slot = self
            .shared
            .action_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Whether the server is accepting connections.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ServerState {
        if self.shared.is_running() {
            ServerState::Running
        } else {
            ServerState::Stopped
        }
    }

    /// The socket addresses the running server is bound to. Empty while
    /// stopped. Useful with port 0 in a binding address.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.lock_runtime()
            .as_ref()
            .map(|state| state.local_addrs.clone())
            .unwrap_or_default()
    }

    /// Bind a listener to every registered address and start accepting
    /// connections.
    ///
    /// No-op if already running or no addresses are registered. Any
    /// resolve or bind failure aborts startup, releases the listeners
    /// bound so far and leaves the server stopped.
    pub async fn start(&self) -> Result<(), Error> {
        if self.shared.is_running() {
            debug!("start ignored: server already running");
            return Ok(());
        }

        let addresses = self.shared.lock_addresses().clone();
        if addresses.is_empty() {
            warn!("start ignored: no binding addresses registered");
            return Ok(());
        }

        let mut listeners = Vec::with_capacity(addresses.len());
        for address in &addresses {
            let socket_addr = resolve_binding_address(address).await?;
            let listener =
                TcpListener::bind(socket_addr)
                    .await
                    .map_err(|source| Error::Bind {
                        address: address.clone(),
                        source,
                    })?;
            listeners.push(listener);
        }

        let mut local_addrs = Vec::with_capacity(listeners.len());
        for listener in &listeners {
            local_addrs.push(listener.local_addr()?);
        }

        let stale = self.shared.abort_all_workers();
        if stale > 0 {
            warn!("cleared {stale} stale workers from a previous run");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.shared.set_running(true);

        let mut accept_loops = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let shared = Arc::clone(&self.shared);
            let shutdown_rx = shutdown_rx.clone();
            accept_loops.push(tokio::spawn(listen_loop(listener, shared, shutdown_rx)));
        }

        for (address, local_addr) in addresses.iter().zip(&local_addrs) {
            info!("listening on {local_addr} for {address}");
        }

        *self.lock_runtime() = Some(RunningState {
            shutdown_tx,
            accept_loops,
            local_addrs,
        });

        Ok(())
    }

    /// Stop accepting connections, close the listeners and wind down the
    /// workers.
    ///
    /// The stopped state is published first so the accept loops observe it
    /// and their pending accepts are cancelled. In-flight workers get the
    /// configured grace period to finish, then are aborted; their responses
    /// may be truncated. Idempotent: stopping a stopped server is a no-op.
    pub async fn stop(&self) {
        if !self.shared.is_running() {
            debug!("stop ignored: server already stopped");
            return;
        }

        self.shared.set_running(false);

        let state = self.lock_runtime().take();
        let Some(state) = state else { return };

        let _ = state.shutdown_tx.send(true);

        for accept_loop in state.accept_loops {
            if let Err(join_error) = accept_loop.await {
                if !join_error.is_cancelled() {
                    error!("accept loop failed during shutdown: {join_error}");
                }
            }
        }
        // The loops own the listeners, so every address is unbound now.

        self.drain_workers().await;

        info!("server stopped");
    }

    /// Wait for in-flight workers to finish, aborting whatever is left when
    /// the grace period runs out.
    async fn drain_workers(&self) {
        let deadline = Instant::now() + self.shared.config.shutdown_grace;

        while self.shared.worker_count() > 0 {
            if Instant::now() >= deadline {
                let aborted = self.shared.abort_all_workers();
                warn!("aborted {aborted} in-flight connections at shutdown");
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    fn lock_runtime(&self) -> MutexGuard<'_, Option<RunningState>> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Drop for Server {
    /// Tear down without awaiting: publish the stopped state, signal the
    /// loops and abort every task. Runs the teardown at most once even if
    /// `stop()` already did it.
    fn drop(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.set_running(false);

        if let Some(state) = self.lock_runtime().take() {
            let _ = state.shutdown_tx.send(true);
            for accept_loop in &state.accept_loops {
                accept_loop.abort();
            }
        }

        self.shared.abort_all_workers();
    }
}

/// Accept connections until the server leaves the running state. The
/// shutdown signal cancels a pending accept instead of waiting for it to
/// return naturally.
async fn listen_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    while shared.is_running() {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    debug!("accepted connection from {peer_addr}");
                    spawn_worker(&shared, stream, peer_addr);
                }
                Err(accept_error) => {
                    error!("error accepting connection: {accept_error}");
                    sleep(Duration::from_millis(100)).await;
                }
            },
        }
    }
    // Dropping the listener unbinds the address.
}

/// Register a worker in the set and spawn its task. The set lock is held
/// across spawn + insert so the worker's own deregistration cannot run
/// before it is registered.
fn spawn_worker(shared: &Arc<Shared>, stream: TcpStream, peer_addr: SocketAddr) {
    let id = shared.next_worker_id.fetch_add(1, Ordering::SeqCst);

    let mut workers = shared.lock_workers();

    let worker_shared = Arc::clone(shared);
    let handle = tokio::spawn(async move {
        let stream: Box<dyn Connection> = Box::new(stream);
        worker::serve_connection(stream, peer_addr, Arc::clone(&worker_shared)).await;
        worker_shared.deregister_worker(id);
    });

    workers.insert(id, handle.abort_handle());
}

/// Resolve a binding address of the form `http://host:port/` to a socket
/// address. The port defaults to 80 when omitted; a trailing path prefix
/// is ignored.
async fn resolve_binding_address(address: &str) -> Result<SocketAddr, Error> {
    let invalid = |reason: String| Error::InvalidBindingAddress {
        address: address.to_string(),
        reason,
    };

    let rest = address
        .strip_prefix("http://")
        .ok_or_else(|| invalid("expected an http:// scheme".to_string()))?;

    let authority = match rest.split_once('/') {
        Some((authority, _)) => authority,
        None => rest,
    };
    if authority.is_empty() {
        return Err(invalid("missing host".to_string()));
    }

    // lookup_host needs an explicit port. The `]` comparison keeps a colon
    // inside an IPv6 literal from being mistaken for a port separator.
    let has_port = authority
        .rfind(':')
        .is_some_and(|at| at > authority.rfind(']').unwrap_or(0));
    let host_port = if has_port {
        authority.to_string()
    } else {
        format!("{authority}:80")
    };

    let mut resolved = tokio::net::lookup_host(&host_port)
        .await
        .map_err(|lookup_error| invalid(lookup_error.to_string()))?;

    resolved
        .next()
        .ok_or_else(|| invalid("address did not resolve".to_string()))
}
