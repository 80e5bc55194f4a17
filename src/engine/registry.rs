//! Shared name-keyed table of ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use super::port::Port;
use crate::WorkItem;
use crate::error::EngineError;

struct Inner<T> {
    ports: RwLock<HashMap<String, Port<T>>>,
    next_private: AtomicU64,
}

/// Every port of a pipeline, addressable by name from any processing step.
///
/// Cloning shares the same table. Registration is check-and-insert under one write lock, so two
/// steps racing to create the same name get exactly one winner. Making sure a port exists before
/// another step looks it up is still up to the caller.
pub struct Registry<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                ports: RwLock::new(HashMap::new()),
                next_private: AtomicU64::new(1),
            }),
        }
    }

    /// Create a port named `name`. Fails with [`EngineError::DuplicatePort`] if the name is taken.
    pub fn register(&self, name: &str, capacity: usize) -> Result<Port<T>, EngineError> {
        let mut ports = self
            .inner
            .ports
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if ports.contains_key(name) {
            return Err(EngineError::DuplicatePort(name.to_string()));
        }
        let port = Port::new(name, capacity);
        ports.insert(name.to_string(), port.clone());
        debug!("registered port '{}' (capacity {})", name, port.capacity());
        Ok(port)
    }

    /// Create a port under a fresh name starting with `prefix`, for private synchronization
    /// (e.g. a fan-out step collecting one acknowledgment per item it issued).
    pub fn private_port(&self, prefix: &str, capacity: usize) -> Port<T> {
        loop {
            let n = self.inner.next_private.fetch_add(1, Ordering::Relaxed);
            match self.register(&format!("{prefix}#{n}"), capacity) {
                Ok(port) => return port,
                Err(_) => continue,
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Port<T>> {
        self.inner
            .ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Like [`get`](Self::get) but missing names are an error.
    pub fn port(&self, name: &str) -> Result<Port<T>, EngineError> {
        self.get(name)
            .ok_or_else(|| EngineError::PortNotFound(name.to_string()))
    }

    /// Drop the table's handle. Items still queued stay reachable through clones already held.
    pub fn remove(&self, name: &str) -> Option<Port<T>> {
        let removed = self
            .inner
            .ports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if removed.is_some() {
            debug!("removed port '{}'", name);
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Sorted port names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner
            .ports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `name` and send `item` to it (blocking while full).
    pub fn send_to(&self, name: &str, item: WorkItem<T>) -> Result<(), EngineError> {
        self.port(name)?.send(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected() {
        let reg: Registry<u8> = Registry::new();
        reg.register("a", 1).unwrap();
        assert!(matches!(
            reg.register("a", 1),
            Err(EngineError::DuplicatePort(n)) if n == "a"
        ));
    }

    #[test]
    fn concurrent_register_has_one_winner() {
        use std::sync::Barrier;

        let reg: Registry<u8> = Registry::new();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    reg.register("x", 1).is_ok()
                })
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(reg.names(), vec!["x".to_string()]);
    }

    #[test]
    fn concurrent_private_ports_never_collide() {
        let reg: Registry<u8> = Registry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| reg.private_port("p", 1).name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut names: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 200);
        assert_eq!(reg.len(), 200);
    }

    #[test]
    fn private_ports_get_distinct_names() {
        let reg: Registry<u8> = Registry::new();
        let a = reg.private_port("done", 1);
        let b = reg.private_port("done", 1);
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with("done#"));
        assert_eq!(reg.len(), 2);
        reg.remove(a.name());
        assert!(!reg.contains(a.name()));
    }

    #[test]
    fn send_to_missing_port_fails() {
        let reg: Registry<u8> = Registry::new();
        assert!(matches!(
            reg.send_to("nope", WorkItem::new(1)),
            Err(EngineError::PortNotFound(_))
        ));
    }
}
