// SPDX-License-Identifier: MIT

use crate::error::NodeError;
use crate::lock::Lock;
use crate::streamer::Streamer;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// How one node depends on another (spec.md §3 "Link (declared)", §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// No propagation; present only so link tables can carry a placeholder.
    None,
    /// Detect-time dependency: downstream waits on upstream's test outcome
    /// and, at run time, on its run outcome too.
    Require,
    /// Upstream's on-disk content feeds downstream's version digest.
    Content,
    /// Upstream's declared `version` string feeds downstream's digest.
    Version,
    /// Downstream must not start its run phase until upstream's has ended,
    /// with no data dependency implied.
    Serial,
}

/// A signal a kernel propagates along its outgoing links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// "I exist" — the first signal a kernel ever emits.
    Require,
    /// "My content changed since last build."
    Change,
}

/// An edge from one kernel to another, resolved at graph-build time
/// (spec.md §4.6) and walked at run time by [`Kernel::run`].
#[derive(Clone)]
pub struct Link {
    pub kind: LinkKind,
    pub node: Arc<Kernel>,
}

impl Link {
    pub fn new(kind: LinkKind, node: Arc<Kernel>) -> Self {
        Self { kind, node }
    }
}

/// One schedulable unit (a layer or a cache) in the build graph (spec.md
/// §4.5). A `Node` owns the declarative questions (test/run/skip/links);
/// its [`Kernel`] owns the state machine that answers "when".
#[async_trait]
pub trait Node: Send + Sync {
    /// Performs the node's build-time work. Only called when [`Kernel`]
    /// has decided the node changed.
    async fn run(&self) -> Result<(), NodeError>;
    /// Runs instead of `run` when nothing changed; typically a log line.
    async fn skip(&self) -> Result<(), NodeError>;
    /// Computes `(exists, matched)`: whether the node has a prior record
    /// at all, and whether that record matches the current inputs.
    async fn test(&self) -> Result<(bool, bool), NodeError>;
    /// Outgoing links and whether this node uses "Shape B" (test runs
    /// after upstream links resolve, spec.md §4.5.2) instead of "Shape A".
    fn links(&self) -> (Vec<Link>, bool);
    fn kernel(&self) -> &Arc<Kernel>;
    /// The node's own half of its stdout/stderr pipe. The driver holds the
    /// paired [`crate::StreamReader`] and drains it in declaration order;
    /// the kernel closes this side exactly once, after `run`/`skip` has
    /// settled, so the driver's drain always terminates.
    fn streamer(&self) -> &Streamer;
}

struct State {
    err: Option<NodeError>,
    matched: bool,
    exists: bool,
    change: bool,
}

/// The state machine driving one node through `unknown -> tested ->
/// (built | skipped)` (spec.md §4.5.1), independent of what the node
/// actually does.
pub struct Kernel {
    name: String,
    state: Mutex<State>,
    test_tx: watch::Sender<bool>,
    test_rx: watch::Receiver<bool>,
    run_tx: watch::Sender<bool>,
    run_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    lock: Arc<Lock>,
}

impl Kernel {
    pub fn new(name: impl Into<String>, lock: Arc<Lock>) -> Arc<Self> {
        let (test_tx, test_rx) = watch::channel(false);
        let (run_tx, run_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(State {
                err: None,
                matched: false,
                exists: false,
                change: false,
            }),
            test_tx,
            test_rx,
            run_tx,
            run_rx,
            done_tx,
            done_rx,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            lock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn link(self: &Arc<Self>, kind: LinkKind) -> Link {
        Link::new(kind, Arc::clone(self))
    }

    pub fn error(&self) -> Option<NodeError> {
        self.state.lock().err.clone()
    }

    pub fn changed(&self) -> bool {
        self.state.lock().change
    }

    async fn wait_watch(rx: &watch::Receiver<bool>) {
        let mut rx = rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    async fn wait_tested(&self) {
        Self::wait_watch(&self.test_rx).await;
    }

    async fn wait_run(&self) {
        Self::wait_watch(&self.run_rx).await;
    }

    /// Blocks until the node has finished (run, skipped, or failed).
    pub async fn wait(&self) {
        Self::wait_watch(&self.done_rx).await;
    }

    fn record_link_failure(&self, link_name: &str, upstream_err: &NodeError) {
        let mut state = self.state.lock();
        if state.err.is_none() {
            state.err = Some(NodeError::link_failed(link_name, upstream_err));
        }
    }

    fn send(self: &Arc<Self>, link: &Link, ev: Event) {
        self.lock.claim();
        let tx = link.node.events_tx.clone();
        let lock = Arc::clone(&self.lock);
        tokio::spawn(async move {
            // `send` fails only once the target's receive loop has ended
            // and dropped its receiver, meaning it will never consume this
            // event — so we release the claim ourselves instead of relying
            // on the target's drain loop to do it after processing.
            if tx.send(ev).is_err() {
                lock.release();
            }
        });
    }

    /// Runs this node to completion, choosing Shape A or Shape B per
    /// [`Node::links`] (spec.md §4.5.2).
    pub async fn run(self: Arc<Self>, node: Arc<dyn Node>) {
        let (links, for_test) = node.links();
        if for_test {
            self.try_after(node, links).await;
        } else {
            self.try_before(node, links).await;
        }
    }

    async fn try_before(self: Arc<Self>, node: Arc<dyn Node>, links: Vec<Link>) {
        for link in &links {
            if link.kind == LinkKind::Require {
                link.node.wait_tested().await;
                if let Some(e) = link.node.error() {
                    self.record_link_failure(link.node.name(), &e);
                }
            }
        }

        self.run_test(&node).await;
        let _ = self.test_tx.send(true);

        self.init(&links);
        self.lock.release();

        self.drain(node, &links, true).await;
    }

    async fn try_after(self: Arc<Self>, node: Arc<dyn Node>, links: Vec<Link>) {
        for link in &links {
            if link.kind == LinkKind::Require {
                self.send(link, Event::Require);
            }
        }
        self.lock.release();

        for link in &links {
            if matches!(link.kind, LinkKind::Require | LinkKind::Serial) {
                link.node.wait_run().await;
            }
            if link.kind == LinkKind::Require {
                if let Some(e) = link.node.error() {
                    self.record_link_failure(link.node.name(), &e);
                }
            }
        }

        self.run_test(&node).await;
        let _ = self.test_tx.send(true);

        self.init(&links);

        self.drain(node, &links, false).await;
    }

    async fn run_test(self: &Arc<Self>, node: &Arc<dyn Node>) {
        if self.state.lock().err.is_some() {
            return;
        }
        match node.test().await {
            Ok((exists, matched)) => {
                let mut state = self.state.lock();
                state.exists = exists;
                state.matched = matched;
            }
            Err(e) => self.state.lock().err = Some(e),
        }
    }

    fn init(self: &Arc<Self>, links: &[Link]) {
        let matched = self.state.lock().matched;
        if matched {
            return;
        }
        debug_assert!(
            !self.state.lock().exists,
            "node '{}': present but non-matching",
            self.name
        );
        for link in links {
            match link.kind {
                LinkKind::Require => self.send(link, Event::Require),
                LinkKind::Content | LinkKind::Version => self.send(link, Event::Change),
                LinkKind::None | LinkKind::Serial => {}
            }
        }
        let mut state = self.state.lock();
        state.exists = true;
        state.change = true;
    }

    fn trigger(self: &Arc<Self>, links: &[Link], ev: Event) {
        {
            let state = self.state.lock();
            let already_handled = match ev {
                Event::Require => state.exists,
                Event::Change => state.change,
            };
            if already_handled {
                return;
            }
        }
        for link in links {
            match link.kind {
                LinkKind::Require => self.send(link, Event::Require),
                LinkKind::Content => self.send(link, Event::Change),
                LinkKind::None | LinkKind::Version | LinkKind::Serial => {}
            }
        }
        let mut state = self.state.lock();
        state.exists = true;
        state.change = true;
    }

    /// Event loop shared by both shapes: react to incoming `Require`/
    /// `Change` events from downstream pulls until the quiescence lock
    /// fires, then run or skip exactly once (spec.md §4.5.3-4.5.4).
    async fn drain(self: Arc<Self>, node: Arc<dyn Node>, links: &[Link], wait_before_run: bool) {
        let mut events_rx = self
            .events_rx
            .lock()
            .take()
            .expect("kernel drained more than once");
        loop {
            tokio::select! {
                ev = events_rx.recv() => {
                    if let Some(ev) = ev {
                        self.trigger(links, ev);
                        self.lock.release();
                    }
                }
                _ = self.lock.wait() => {
                    if self.state.lock().err.is_some() {
                        break;
                    }
                    let change = self.state.lock().change;
                    let result = if change {
                        if wait_before_run && !self.wait_upstream_runs(links).await {
                            break;
                        }
                        node.run().await
                    } else {
                        node.skip().await
                    };
                    if let Err(e) = result {
                        self.state.lock().err = Some(e);
                    }
                    break;
                }
            }
        }
        node.streamer().close();
        let _ = self.run_tx.send(true);
        let _ = self.done_tx.send(true);
    }

    /// Returns `false` if an upstream `Require` link failed, in which case
    /// the caller should stop without running.
    async fn wait_upstream_runs(self: &Arc<Self>, links: &[Link]) -> bool {
        for link in links {
            if matches!(link.kind, LinkKind::Require | LinkKind::Serial) {
                link.node.wait_run().await;
            }
            if link.kind == LinkKind::Require {
                if let Some(e) = link.node.error() {
                    self.state.lock().err = Some(NodeError::link_failed(link.node.name(), &e));
                    return false;
                }
            }
        }
        true
    }
}

/// Spawns `node` on the current runtime and runs it to completion.
pub async fn run_node(node: Arc<dyn Node>) {
    let kernel = Arc::clone(node.kernel());
    kernel.run(node).await;
}

/// Blocks until `node` has finished.
pub async fn wait_for_node(node: &Arc<dyn Node>) {
    node.kernel().wait().await;
}

pub fn node_error(node: &Arc<dyn Node>) -> Option<NodeError> {
    node.kernel().error()
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
