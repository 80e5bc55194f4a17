//! Conveyor tests: worker accounting, graceful drain, forced kill, misuse.

use conveyor::{Conveyor, EngineError, WorkItem, processor};
use crossbeam_channel::{bounded, unbounded};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn combined_len(err: EngineError) -> usize {
    match err {
        EngineError::Combined(c) => c.len(),
        other => panic!("expected combined error, got {other:?}"),
    }
}

// --- worker accounting / graceful stop ---

#[test]
fn test_cores_after_run_minions() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    assert_eq!(c.cores(), 0);
    c.run_minions(3).unwrap();
    assert_eq!(c.cores(), 3);
    c.stop().unwrap();
}

#[test]
fn test_stop_idle_exits_all_workers() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    c.run_minions(4).unwrap();
    assert!(c.stop().is_ok());
    assert_eq!(c.cores(), 0);
}

#[test]
fn test_stop_drains_backlog() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_w = Arc::clone(&seen);
    let c = Conveyor::standalone(
        "n",
        processor(move |_, _: WorkItem<u32>, _| {
            thread::sleep(Duration::from_millis(1));
            seen_w.fetch_add(1, Ordering::SeqCst);
        }),
        100,
    );
    for i in 0..50 {
        c.input().send(WorkItem::new(i)).unwrap();
    }
    c.run_minions(2).unwrap();
    c.stop().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 50);
    assert!(c.input().is_empty());
}

#[test]
fn test_single_worker_is_fifo() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let order_w = Arc::clone(&order);
    let c = Conveyor::standalone(
        "n",
        processor(move |_, item: WorkItem<&'static str>, _| {
            order_w.lock().unwrap().push(item.payload);
        }),
        10,
    );
    c.run_minions(1).unwrap();
    for s in ["a", "b", "c"] {
        c.input().send(WorkItem::new(s)).unwrap();
    }
    c.stop().unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_worker_ids_are_sequential() {
    let ids = Arc::new(Mutex::new(Vec::new()));
    let ids_w = Arc::clone(&ids);
    let (started_tx, started_rx) = unbounded();
    let (release_tx, release_rx) = bounded::<()>(0);
    let c = Conveyor::standalone(
        "n",
        processor(move |id, _: WorkItem<u32>, _| {
            ids_w.lock().unwrap().push(id);
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }),
        10,
    );
    c.run_minions(3).unwrap();
    for i in 0..3 {
        c.input().send(WorkItem::new(i)).unwrap();
    }
    for _ in 0..3 {
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    drop(release_tx);
    c.stop().unwrap();
    let mut ids = ids.lock().unwrap().clone();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_panicking_step_keeps_worker_alive() {
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_w = Arc::clone(&seen);
    let c = Conveyor::standalone(
        "n",
        processor(move |_, item: WorkItem<u32>, _| {
            if item.payload == 0 {
                panic!("boom");
            }
            seen_w.fetch_add(1, Ordering::SeqCst);
        }),
        10,
    );
    c.run_minions(1).unwrap();
    c.input().send(WorkItem::new(0)).unwrap();
    c.input().send(WorkItem::new(1)).unwrap();
    c.stop().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(c.cores(), 0);
}

#[test]
fn test_stop_on_trigger() {
    let c = Arc::new(Conveyor::standalone(
        "n",
        processor(|_, _: WorkItem<u32>, _| {}),
        10,
    ));
    c.run_minions(2).unwrap();
    let (trigger_tx, trigger_rx) = bounded(1);
    let watcher = Arc::clone(&c).stop_on(trigger_rx);
    trigger_tx.send(()).unwrap();
    assert!(watcher.join().unwrap().is_ok());
    assert_eq!(c.cores(), 0);
}

// --- forced kill ---

#[test]
fn test_kill_idle_workers_is_clean() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    c.run_minions(3).unwrap();
    assert!(c.kill().is_ok());
    assert_eq!(c.cores(), 0);
}

#[test]
fn test_kill_counts_only_busy_workers() {
    let (started_tx, started_rx) = unbounded();
    let (release_tx, release_rx) = bounded::<()>(0);
    let c = Conveyor::standalone(
        "n",
        processor(move |_, _: WorkItem<u32>, _| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }),
        10,
    );
    c.run_minions(4).unwrap();
    c.input().send(WorkItem::new(1)).unwrap();
    c.input().send(WorkItem::new(2)).unwrap();
    for _ in 0..2 {
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    let err = c.kill().unwrap_err();
    assert_eq!(combined_len(err), 2);
    assert_eq!(c.cores(), 0);
    drop(release_tx);
}

#[test]
fn test_kill_returns_promptly_with_one_abandoned_task() {
    let (started_tx, started_rx) = unbounded();
    let c = Conveyor::standalone(
        "slow",
        processor(move |_, _: WorkItem<u32>, _| {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_secs(2));
        }),
        100,
    );
    for i in 0..100 {
        c.input().send(WorkItem::new(i)).unwrap();
    }
    c.run_minions(1).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let t0 = Instant::now();
    let err = c.kill().unwrap_err();
    assert!(t0.elapsed() < Duration::from_secs(1));
    match err {
        EngineError::Combined(c) => {
            assert_eq!(c.len(), 1);
            assert_eq!(c.abandoned(), 1);
            match &c.errors()[0] {
                EngineError::Abandoned {
                    node,
                    worker,
                    pending,
                } => {
                    assert_eq!(node, "slow");
                    assert_eq!(*worker, 1);
                    assert_eq!(*pending, 99);
                }
                other => panic!("expected abandoned, got {other:?}"),
            }
        }
        other => panic!("expected combined error, got {other:?}"),
    }
}

// --- misuse ---

#[test]
fn test_second_stop_fails() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    c.run_minions(2).unwrap();
    c.stop().unwrap();
    assert!(matches!(
        c.stop(),
        Err(EngineError::AlreadyTerminated { node }) if node == "n"
    ));
}

#[test]
fn test_kill_after_stop_fails() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    c.run_minions(2).unwrap();
    c.stop().unwrap();
    assert!(matches!(
        c.kill(),
        Err(EngineError::AlreadyTerminated { .. })
    ));
}

#[test]
fn test_second_kill_fails() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    c.run_minions(1).unwrap();
    c.kill().unwrap();
    assert!(matches!(
        c.kill(),
        Err(EngineError::AlreadyTerminated { .. })
    ));
}

#[test]
fn test_run_minions_twice_rejected() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    c.run_minions(1).unwrap();
    assert!(matches!(
        c.run_minions(1),
        Err(EngineError::AlreadyRunning(_))
    ));
    assert_eq!(c.cores(), 1);
    c.stop().unwrap();
}

#[test]
fn test_run_minions_zero_rejected() {
    let c = Conveyor::standalone("n", processor(|_, _: WorkItem<u32>, _| {}), 10);
    assert!(matches!(
        c.run_minions(0),
        Err(EngineError::InvalidParallelism(_))
    ));
}
