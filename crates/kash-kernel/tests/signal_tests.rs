//! Signal dispatcher tests.
//!
//! The dispatcher is installed on the test runtime and real children are
//! spawned, so these exercise actual SIGCHLD delivery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kash_kernel::{
    ForegroundFlag, Identity, Kernel, KernelConfig, RunTime, ShellEvent, SignalDispatcher,
    WatchList,
};
use tokio::sync::mpsc;

fn kernel_in(dir: &std::path::Path) -> Kernel {
    Kernel::new(
        KernelConfig::batch().with_cwd(dir),
        Identity::new("tester", "testhost", dir),
    )
}

fn install(kernel: &Kernel) -> SignalDispatcher {
    SignalDispatcher::install(
        &tokio::runtime::Handle::current(),
        kernel.event_sender(),
        kernel.watch_list(),
        kernel.foreground_flag(),
        Arc::new(|| {}),
    )
    .expect("install dispatcher")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn watched_child_exit_is_enqueued_with_pid() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&refreshes);
    let watched = WatchList::new();

    let _dispatcher = SignalDispatcher::install(
        &tokio::runtime::Handle::current(),
        tx,
        watched.clone(),
        ForegroundFlag::new(),
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .expect("install dispatcher");

    // Unwatched children are left to their own waiters.
    let status = std::process::Command::new("true").status().unwrap();
    assert!(status.success());

    let child = std::process::Command::new("sleep").arg("0.1").spawn().unwrap();
    let pid = child.id();
    watched.insert(pid);
    drop(child);

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event within timeout")
        .expect("channel closed");
    assert!(matches!(event, ShellEvent::ChildExited { pid: p, .. } if p == pid));
    assert!(watched.is_empty());
    assert!(rx.try_recv().is_err());
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn dispatcher_reaps_through_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let mut kernel = kernel_in(dir.path());
    let _dispatcher = install(&kernel);

    kernel.execute("sleep 0.2 &");
    assert_eq!(kernel.jobs().len(), 1);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !kernel.jobs().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
        kernel.drain_events();
    }
    assert!(kernel.jobs().is_empty());
    assert!(!kernel.history().by_id(1).unwrap().run_time.is_pending());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn foreground_command_does_not_stretch_background_run_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut kernel = kernel_in(dir.path());
    let _dispatcher = install(&kernel);

    let started = Instant::now();
    kernel.execute("sleep 0.2 &");
    // Blocks well past the job's exit; its SIGCHLD lands in the same wait.
    kernel.execute("sleep 1.2");
    assert!(started.elapsed() >= Duration::from_millis(1200));

    assert!(kernel.jobs().is_empty());
    match kernel.history().by_id(1).unwrap().run_time {
        RunTime::Final(d) => {
            assert!(d >= Duration::from_millis(200), "ran for {d:?}");
            assert!(d < Duration::from_millis(900), "ran for {d:?}");
        }
        RunTime::Pending => panic!("background entry was never finalized"),
    }
}
