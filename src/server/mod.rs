//! The reactor: one thread, one poll, every connection.
//!
//! A single event loop multiplexes the listening sockets and all client
//! connections over OS readiness notification. The poll wait is bounded so
//! the timeout supervisor gets a chance to sweep idle connections at least
//! once a second even when the loop is otherwise quiet.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info, warn};

use crate::config::{ListenConfig, ServerConfig};
use crate::connection::{Connection, Phase};
use crate::handler::Handler;

const EVENTS_CAPACITY: usize = 1024;

/// Upper bound on a single poll wait, so timeout sweeps keep running.
const POLL_WAIT: Duration = Duration::from_secs(1);

/// Single-threaded readiness-driven server loop.
///
/// Tokens `0..listeners.len()` identify the listening sockets; every token
/// above that range keys a connection in the table.
pub struct Reactor<H> {
    poll: Poll,
    events: Events,
    listeners: Vec<TcpListener>,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    config: ServerConfig,
    handler: H,
}

impl<H: Handler> Reactor<H> {
    /// Binds every configured listen endpoint and sets up the poll.
    ///
    /// # Errors
    ///
    /// Fails if no endpoint is configured, an address does not resolve, a
    /// bind is refused or the poll cannot be created. Callers should treat
    /// this as fatal.
    pub fn bind(config: ServerConfig, handler: H) -> io::Result<Self> {
        if config.listen.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no listen endpoints configured"));
        }

        let poll = Poll::new()?;
        let mut listeners = Vec::with_capacity(config.listen.len());
        for (index, endpoint) in config.listen.iter().enumerate() {
            let addr = resolve(endpoint)?;
            let mut listener = TcpListener::bind(addr)?;
            poll.registry().register(&mut listener, Token(index), Interest::READABLE)?;
            info!(addr = %listener.local_addr()?, "listening");
            listeners.push(listener);
        }
        let next_token = listeners.len();

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listeners,
            connections: HashMap::new(),
            next_token,
            config,
            handler,
        })
    }

    /// The addresses the listeners actually bound, useful with port 0.
    pub fn local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(|listener| listener.local_addr()).collect()
    }

    /// Runs the event loop. Does not return except on a poll failure; a
    /// fault on any single connection only tears that connection down.
    pub fn run(&mut self) -> io::Result<()> {
        let mut ready = Vec::new();
        loop {
            self.sweep_timeouts();

            if let Err(e) = self.poll.poll(&mut self.events, Some(POLL_WAIT)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            ready.clear();
            ready.extend(self.events.iter().map(|event| event.token()));
            for &token in &ready {
                if token.0 < self.listeners.len() {
                    self.accept_connections(token.0);
                } else {
                    self.drive(token);
                }
            }
        }
    }

    /// Accepts until the listener reports `WouldBlock`, registering each
    /// new connection for readable events.
    fn accept_connections(&mut self, index: usize) {
        loop {
            match self.listeners[index].accept() {
                Ok((mut stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
                    }

                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        error!(peer = %peer, error = %e, "failed to register connection");
                        continue;
                    }

                    let mut conn =
                        Connection::new(stream, peer, self.config.max_header_bytes, self.config.body_limits());
                    conn.set_registered(Some(Interest::READABLE));
                    debug!(peer = %peer, "accepted connection");
                    self.connections.insert(token, conn);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    /// Lets a connection consume its readiness event, then brings its poll
    /// registration back in line with the phase it ended up in.
    fn drive(&mut self, token: Token) {
        if let Some(conn) = self.connections.get_mut(&token) {
            match conn.phase() {
                Phase::ReadingHeaders | Phase::ReadingBody => conn.handle_readable(&self.handler),
                Phase::Dispatching | Phase::WritingResponse => conn.handle_writable(),
                Phase::Closed => {}
            }
        }
        self.reconcile(token);
    }

    /// Applies per-phase timeout budgets to every connection.
    fn sweep_timeouts(&mut self) {
        let now = Instant::now();
        let header_budget = self.config.header_timeout();
        let idle_budget = self.config.idle_timeout();

        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            if let Some(conn) = self.connections.get_mut(&token) {
                conn.check_timeout(now, header_budget, idle_budget);
            }
            self.reconcile(token);
        }
    }

    /// Reregisters the connection if its wanted interest changed, drops it
    /// once it is finished.
    fn reconcile(&mut self, token: Token) {
        let want = match self.connections.get(&token) {
            Some(conn) => conn.interest(),
            None => return,
        };

        let Some(want) = want else {
            self.drop_connection(token);
            return;
        };

        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if conn.registered() == Some(want) {
            return;
        }
        match self.poll.registry().reregister(conn.stream_mut(), token, want) {
            Ok(()) => conn.set_registered(Some(want)),
            Err(e) => {
                error!(peer = %conn.peer(), error = %e, "failed to update interest, dropping connection");
                self.drop_connection(token);
            }
        }
    }

    fn drop_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
            debug!(peer = %conn.peer(), "connection closed");
        }
    }
}

fn resolve(listen: &ListenConfig) -> io::Result<SocketAddr> {
    (listen.host.as_str(), listen.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{}:{} resolves to no address", listen.host, listen.port),
            )
        })
}
