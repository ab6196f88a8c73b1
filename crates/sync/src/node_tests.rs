use super::*;
use std::sync::Mutex as StdMutex;

struct FakeNode {
    kernel: Arc<Kernel>,
    exists: bool,
    matched: bool,
    links: Vec<Link>,
    for_test: bool,
    log: Arc<StdMutex<Vec<String>>>,
    streamer: Streamer,
}

#[async_trait]
impl Node for FakeNode {
    async fn run(&self) -> Result<(), NodeError> {
        self.log.lock().unwrap().push(format!("{}:run", self.kernel.name()));
        Ok(())
    }

    async fn skip(&self) -> Result<(), NodeError> {
        self.log.lock().unwrap().push(format!("{}:skip", self.kernel.name()));
        Ok(())
    }

    async fn test(&self) -> Result<(bool, bool), NodeError> {
        Ok((self.exists, self.matched))
    }

    fn links(&self) -> (Vec<Link>, bool) {
        (self.links.clone(), self.for_test)
    }

    fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    fn streamer(&self) -> &Streamer {
        &self.streamer
    }
}

/// Each node consumes exactly one unit of the shared [`Lock`]'s initial
/// count, released internally once the node reaches its passive state
/// (spec.md §4.4) — callers must claim once per node up front and must
/// not release again themselves.
fn spawn_node(
    lock: &Arc<Lock>,
    name: &str,
    exists: bool,
    matched: bool,
    links: Vec<Link>,
    log: &Arc<StdMutex<Vec<String>>>,
) -> Arc<dyn Node> {
    lock.claim();
    let kernel = Kernel::new(name, Arc::clone(lock));
    let node: Arc<dyn Node> = Arc::new(FakeNode {
        kernel,
        exists,
        matched,
        links,
        for_test: false,
        log: Arc::clone(log),
        streamer: Streamer::pair().0,
    });
    let owned = Arc::clone(&node);
    tokio::spawn(async move {
        run_node(owned).await;
    });
    node
}

#[tokio::test]
async fn unmatched_upstream_runs_but_matched_downstream_still_skips() {
    // A `Require` link only makes the downstream wait for the upstream's
    // test outcome and, if the downstream itself decides to rebuild, for
    // the upstream's run to finish first. It does not by itself force an
    // otherwise-matched downstream to rebuild (spec.md §4.5.3).
    let lock = Arc::new(Lock::new());
    let log = Arc::new(StdMutex::new(Vec::new()));

    let upstream = spawn_node(&lock, "upstream", false, false, vec![], &log);
    let upstream_kernel = Arc::clone(upstream.kernel());

    let downstream_links = vec![upstream_kernel.link(LinkKind::Require)];
    let downstream = spawn_node(&lock, "downstream", true, true, downstream_links, &log);

    wait_for_node(&upstream).await;
    wait_for_node(&downstream).await;

    assert!(node_error(&upstream).is_none());
    assert!(node_error(&downstream).is_none());
    let log = log.lock().unwrap();
    assert!(log.contains(&"upstream:run".to_string()));
    assert!(log.contains(&"downstream:skip".to_string()));
}

#[tokio::test]
async fn content_link_forces_rebuild_even_when_downstream_test_matched() {
    // A `Content` link is owned by the *upstream* kernel (the source of
    // the change event), pointing at the downstream (spec.md §4.6
    // "these flow downstream, so the upstream node is the source").
    let lock = Arc::new(Lock::new());
    let log = Arc::new(StdMutex::new(Vec::new()));

    lock.claim();
    let downstream_kernel = Kernel::new("downstream", Arc::clone(&lock));
    let downstream: Arc<dyn Node> = Arc::new(FakeNode {
        kernel: Arc::clone(&downstream_kernel),
        exists: true,
        matched: true,
        links: vec![],
        for_test: false,
        log: Arc::clone(&log),
        streamer: Streamer::pair().0,
    });

    lock.claim();
    let upstream_kernel = Kernel::new("upstream", Arc::clone(&lock));
    let upstream: Arc<dyn Node> = Arc::new(FakeNode {
        kernel: Arc::clone(&upstream_kernel),
        exists: false,
        matched: false,
        links: vec![Link::new(LinkKind::Content, Arc::clone(&downstream_kernel))],
        for_test: false,
        log: Arc::clone(&log),
        streamer: Streamer::pair().0,
    });

    let up = Arc::clone(&upstream);
    tokio::spawn(async move {
        run_node(up).await;
    });
    let down = Arc::clone(&downstream);
    tokio::spawn(async move {
        run_node(down).await;
    });

    wait_for_node(&upstream).await;
    wait_for_node(&downstream).await;

    let log = log.lock().unwrap();
    assert!(log.contains(&"upstream:run".to_string()));
    assert!(
        log.contains(&"downstream:run".to_string()),
        "a content link should override a matched test result: {log:?}"
    );
}

#[tokio::test]
async fn matched_node_with_no_links_skips() {
    let lock = Arc::new(Lock::new());
    let log = Arc::new(StdMutex::new(Vec::new()));
    let node = spawn_node(&lock, "solo", true, true, vec![], &log);
    wait_for_node(&node).await;
    assert!(node_error(&node).is_none());
    assert_eq!(log.lock().unwrap().as_slice(), &["solo:skip".to_string()]);
}

#[tokio::test]
async fn matched_upstream_leaves_downstream_untouched() {
    let lock = Arc::new(Lock::new());
    let log = Arc::new(StdMutex::new(Vec::new()));

    let upstream = spawn_node(&lock, "upstream", true, true, vec![], &log);
    let upstream_kernel = Arc::clone(upstream.kernel());

    let downstream_links = vec![upstream_kernel.link(LinkKind::Require)];
    let downstream = spawn_node(&lock, "downstream", true, true, downstream_links, &log);

    wait_for_node(&upstream).await;
    wait_for_node(&downstream).await;

    let log = log.lock().unwrap();
    assert_eq!(log.as_slice(), &["upstream:skip".to_string(), "downstream:skip".to_string()]);
}

#[tokio::test]
async fn upstream_failure_propagates_to_downstream() {
    struct FailingNode {
        kernel: Arc<Kernel>,
        streamer: Streamer,
    }

    #[async_trait]
    impl Node for FailingNode {
        async fn run(&self) -> Result<(), NodeError> {
            Ok(())
        }
        async fn skip(&self) -> Result<(), NodeError> {
            Ok(())
        }
        async fn test(&self) -> Result<(bool, bool), NodeError> {
            Err(NodeError::new("boom"))
        }
        fn links(&self) -> (Vec<Link>, bool) {
            (vec![], false)
        }
        fn kernel(&self) -> &Arc<Kernel> {
            &self.kernel
        }
        fn streamer(&self) -> &Streamer {
            &self.streamer
        }
    }

    let lock = Arc::new(Lock::new());
    let log = Arc::new(StdMutex::new(Vec::new()));

    lock.claim();
    let upstream_kernel = Kernel::new("failing", Arc::clone(&lock));
    let upstream: Arc<dyn Node> = Arc::new(FailingNode {
        kernel: Arc::clone(&upstream_kernel),
        streamer: Streamer::pair().0,
    });

    let downstream_links = vec![upstream_kernel.link(LinkKind::Require)];
    let downstream = spawn_node(&lock, "downstream", true, true, downstream_links, &log);

    let up = Arc::clone(&upstream);
    tokio::spawn(async move {
        run_node(up).await;
    });

    wait_for_node(&upstream).await;
    wait_for_node(&downstream).await;

    assert!(node_error(&upstream).is_some());
    let err = node_error(&downstream).expect("downstream should inherit the failure");
    assert!(err.to_string().contains("failing"));
}
