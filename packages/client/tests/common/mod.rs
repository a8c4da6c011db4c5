//! Scripted in-memory transport shared by the pool tests.

#![allow(dead_code)]

pub mod peer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use muxpool_client::cache::TlsSessionEntry;
use muxpool_client::error::{self, Error};
use muxpool_client::pool::{
    Connecting, MuxStream, RequestHead, SessionConnector, SessionEvent, SessionHandle,
};
use muxpool_client::{Agent, AgentConfig, Authority, Result, SessionOptions};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// What a freshly connected mock session does on its own.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report settings with this stream limit right away
    Settings(u32),
    /// Wait for the test to drive it through its `MockControl`
    Manual,
    /// Report a connect error
    Fail(String),
    /// Close before sending settings
    CloseEarly,
}

#[derive(Default)]
pub struct HandleState {
    pub closed: AtomicBool,
    pub destroyed: AtomicBool,
    pub opened: AtomicUsize,
    pub canceled: Arc<AtomicUsize>,
}

pub struct MockHandle {
    pub state: Arc<HandleState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl MockHandle {
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }
}

pub struct MockStream {
    canceled: Arc<AtomicUsize>,
}

impl MuxStream for MockStream {
    fn cancel(&mut self) {
        self.canceled.fetch_add(1, Ordering::SeqCst);
    }
}

impl SessionHandle for MockHandle {
    type Stream = MockStream;

    fn open_stream(&self, _head: RequestHead) -> Result<MockStream> {
        if self.is_closed() {
            return Err(error::stream("mock session closed"));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockStream {
            canceled: Arc::clone(&self.state.canceled),
        })
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::Closed);
    }

    fn destroy(&self, _error: Option<Error>) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.destroyed.store(true, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::Closed);
    }
}

/// Test-side view of one connected mock session.
#[derive(Clone)]
pub struct MockControl {
    pub authority: Authority,
    pub cached_tls: Option<TlsSessionEntry>,
    pub state: Arc<HandleState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl MockControl {
    pub fn settings(&self, max_concurrent_streams: u32) {
        let _ = self.events.send(SessionEvent::Settings {
            max_concurrent_streams,
        });
    }

    pub fn origin(&self, origins: &[&str]) {
        let origins = origins.iter().map(|origin| origin.to_string()).collect();
        let _ = self.events.send(SessionEvent::Origin(origins));
    }

    pub fn tls_session(&self, ticket: &'static [u8]) {
        let _ = self.events.send(SessionEvent::TlsSession(TlsSessionEntry {
            ticket: bytes::Bytes::from_static(ticket),
            ..TlsSessionEntry::default()
        }));
    }

    pub fn fail(&self, err: Error) {
        let _ = self.events.send(SessionEvent::Error(err));
    }

    pub fn close(&self) {
        let _ = self.events.send(SessionEvent::Closed);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Inner>,
}

struct Inner {
    script: Mutex<Script>,
    sessions: Mutex<Vec<MockControl>>,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(script),
                sessions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_script(&self, script: Script) {
        *self.inner.script.lock() = script;
    }

    pub fn connect_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn session(&self, index: usize) -> MockControl {
        self.inner.sessions.lock()[index].clone()
    }
}

impl SessionConnector for MockConnector {
    type Handle = MockHandle;

    fn connect(
        &self,
        authority: &Authority,
        _options: &SessionOptions,
        tls_session: Option<TlsSessionEntry>,
    ) -> Result<Connecting<MockHandle>> {
        let (events_tx, events) = mpsc::unbounded_channel();
        let state = Arc::new(HandleState::default());

        match self.inner.script.lock().clone() {
            Script::Settings(max) => {
                let _ = events_tx.send(SessionEvent::Settings {
                    max_concurrent_streams: max,
                });
            }
            Script::Manual => {}
            Script::Fail(message) => {
                let _ = events_tx.send(SessionEvent::Error(error::connect(message)));
                let _ = events_tx.send(SessionEvent::Closed);
            }
            Script::CloseEarly => {
                let _ = events_tx.send(SessionEvent::Closed);
            }
        }

        self.inner.sessions.lock().push(MockControl {
            authority: authority.clone(),
            cached_tls: tls_session,
            state: Arc::clone(&state),
            events: events_tx.clone(),
        });

        Ok(Connecting {
            handle: MockHandle {
                state,
                events: events_tx,
            },
            events,
        })
    }
}

pub type MockAgent = Agent<MockConnector>;

pub fn agent(script: Script) -> (MockAgent, MockConnector) {
    agent_with(script, AgentConfig::default())
}

pub fn agent_with(script: Script, config: AgentConfig) -> (MockAgent, MockConnector) {
    let connector = MockConnector::new(script);
    let agent = Agent::with_connector(connector.clone(), config).unwrap();
    (agent, connector)
}

pub fn head(uri: &str) -> RequestHead {
    http::Request::get(uri).body(()).unwrap()
}

pub fn options() -> SessionOptions {
    SessionOptions::default()
}

/// Poll `condition` until it holds, panicking after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}
