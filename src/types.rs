//! Public types shared by the engine and the pipeline.

use std::sync::Arc;

use crate::engine::Registry;

/// One unit of work travelling through a port: an opaque payload plus an optional failure marker.
///
/// A present `error` means the item is a failure report rather than normal data. The engine never
/// looks at it; consumers branch on [`WorkItem::is_err`].
#[derive(Debug)]
pub struct WorkItem<T> {
    pub payload: T,
    pub error: Option<anyhow::Error>,
}

impl<T> WorkItem<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            error: None,
        }
    }

    /// Item carrying a failure report about `payload`.
    pub fn failed(payload: T, error: impl Into<anyhow::Error>) -> Self {
        Self {
            payload,
            error: Some(error.into()),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Split into the payload and a `Result` of the failure marker.
    pub fn into_result(self) -> (T, anyhow::Result<()>) {
        match self.error {
            Some(e) => (self.payload, Err(e)),
            None => (self.payload, Ok(())),
        }
    }
}

impl<T> From<T> for WorkItem<T> {
    fn from(payload: T) -> Self {
        WorkItem::new(payload)
    }
}

/// Processing step run by every worker of a node: `(worker_id, item, registry)`.
///
/// The step gets the whole registry and decides for itself which port(s) receive its output.
/// It must not assume exclusive ownership of any port and must tolerate being abandoned by
/// [`Conveyor::kill`](crate::engine::Conveyor::kill) mid-flight.
pub type ProcessorFn<T> = Arc<dyn Fn(usize, WorkItem<T>, &Registry<T>) + Send + Sync + 'static>;

/// Wrap a closure as a [`ProcessorFn`].
pub fn processor<T, F>(f: F) -> ProcessorFn<T>
where
    F: Fn(usize, WorkItem<T>, &Registry<T>) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_result_splits_failure_marker() {
        let (payload, status) = WorkItem::new(3).into_result();
        assert_eq!(payload, 3);
        assert!(status.is_ok());

        let (payload, status) = WorkItem::failed(4, anyhow::anyhow!("bad")).into_result();
        assert_eq!(payload, 4);
        assert_eq!(status.unwrap_err().to_string(), "bad");
    }
}
