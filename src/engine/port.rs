//! Named, bounded FIFO of work items.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::WorkItem;
use crate::error::EngineError;

/// A uniquely named, fixed-capacity queue of [`WorkItem`]s.
///
/// Cloning a port hands out another handle to the same queue. Every handle keeps both ends
/// alive, so a port never disconnects while any clone exists; sends block when the queue is full.
///
/// A port also counts its unfinished items: queued ones plus those a conveyor worker has taken
/// but not finished processing. Items taken through [`recv`](Self::recv) and friends are finished
/// on receipt.
pub struct Port<T> {
    name: Arc<str>,
    capacity: usize,
    unfinished: Arc<AtomicUsize>,
    sent: Arc<AtomicU64>,
    tx: Sender<WorkItem<T>>,
    rx: Receiver<WorkItem<T>>,
}

impl<T> Clone for Port<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            capacity: self.capacity,
            unfinished: Arc::clone(&self.unfinished),
            sent: Arc::clone(&self.sent),
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Port<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.rx.len())
            .field("unfinished", &self.unfinished())
            .finish()
    }
}

impl<T> Port<T> {
    /// New port; a capacity of 0 is bumped to 1 so the queue can hold at least one item.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            name: Arc::from(name.into()),
            capacity,
            unfinished: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(AtomicU64::new(0)),
            tx,
            rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Queued items plus items a worker is still processing.
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::Acquire)
    }

    /// `(unfinished, sends attempted so far)`. Two equal snapshots with nothing unfinished mean
    /// the port saw no traffic in between.
    pub(crate) fn activity(&self) -> (usize, u64) {
        (self.unfinished(), self.sent.load(Ordering::Acquire))
    }

    fn begin_send(&self) {
        self.sent.fetch_add(1, Ordering::AcqRel);
        self.unfinished.fetch_add(1, Ordering::AcqRel);
    }

    /// Blocking send; waits while the queue is full.
    pub fn send(&self, item: WorkItem<T>) -> Result<(), EngineError> {
        self.begin_send();
        self.tx.send(item).map_err(|_| {
            self.finish();
            EngineError::PortClosed(self.name.to_string())
        })
    }

    /// Non-blocking send; hands the item back when the queue is full.
    pub fn try_send(&self, item: WorkItem<T>) -> Result<(), WorkItem<T>> {
        self.begin_send();
        self.tx.try_send(item).map_err(|e| {
            self.finish();
            match e {
                TrySendError::Full(item) | TrySendError::Disconnected(item) => item,
            }
        })
    }

    /// Blocking receive.
    pub fn recv(&self) -> Result<WorkItem<T>, EngineError> {
        let item = self
            .rx
            .recv()
            .map_err(|_| EngineError::PortClosed(self.name.to_string()))?;
        self.finish();
        Ok(item)
    }

    pub fn try_recv(&self) -> Option<WorkItem<T>> {
        let item = self.rx.try_recv().ok()?;
        self.finish();
        Some(item)
    }

    /// Receive with a deadline; `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<WorkItem<T>>, EngineError> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => {
                self.finish();
                Ok(Some(item))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(EngineError::PortClosed(self.name.to_string()))
            }
        }
    }

    /// Mark one item taken through [`receiver`](Self::receiver) as fully processed.
    pub(crate) fn finish(&self) {
        let _ = self
            .unfinished
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Receiving end, for use inside `crossbeam_channel::select!`. Items taken here stay
    /// unfinished until [`finish`](Self::finish) is called.
    pub(crate) fn receiver(&self) -> &Receiver<WorkItem<T>> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_and_len() {
        let port = Port::new("p", 4);
        for i in 0..3 {
            port.send(WorkItem::new(i)).unwrap();
        }
        assert_eq!(port.len(), 3);
        let got: Vec<i32> = (0..3).map(|_| port.recv().unwrap().payload).collect();
        assert_eq!(got, vec![0, 1, 2]);
        assert!(port.is_empty());
    }

    #[test]
    fn try_send_returns_item_when_full() {
        let port = Port::new("p", 1);
        port.send(WorkItem::new(1)).unwrap();
        let back = port.try_send(WorkItem::new(2)).unwrap_err();
        assert_eq!(back.payload, 2);
    }

    #[test]
    fn unfinished_counts_queued_and_taken_items() {
        let port = Port::new("p", 4);
        port.send(WorkItem::new(1)).unwrap();
        port.send(WorkItem::new(2)).unwrap();
        assert_eq!(port.activity(), (2, 2));

        // Taken raw, the way a worker does: still unfinished until the step completes.
        let taken = port.receiver().recv().unwrap();
        assert_eq!(taken.payload, 1);
        assert!(port.len() == 1 && port.unfinished() == 2);
        port.finish();
        assert_eq!(port.unfinished(), 1);

        // Taken by a host: finished on receipt.
        assert_eq!(port.try_recv().map(|i| i.payload), Some(2));
        assert_eq!(port.activity(), (0, 2));
        port.finish();
        assert_eq!(port.unfinished(), 0);
    }

    #[test]
    fn rejected_try_send_is_not_counted() {
        let port = Port::new("p", 1);
        port.send(WorkItem::new(1)).unwrap();
        assert!(port.try_send(WorkItem::new(2)).is_err());
        assert_eq!(port.unfinished(), 1);
    }

    #[test]
    fn zero_capacity_is_bumped() {
        let port: Port<()> = Port::new("p", 0);
        assert_eq!(port.capacity(), 1);
    }
}
