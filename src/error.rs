//! Engine error types: abandonment, protocol misuse, and the combined error returned by kill.

use std::fmt;

/// Errors produced by the engine itself. Item-level failures travel inside
/// [`WorkItem::error`](crate::WorkItem) and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A worker was killed while its processing step was still running. The step keeps running
    /// on its own thread; its effects may or may not be observed.
    #[error("aborted - node: {node}, worker: {worker}, queue: {pending}, step abandoned")]
    Abandoned {
        node: String,
        worker: usize,
        pending: usize,
    },

    /// `stop` or `kill` was called on a conveyor that was already told to terminate.
    #[error("conveyor '{node}' already terminated")]
    AlreadyTerminated { node: String },

    #[error("'{0}' is already running")]
    AlreadyRunning(String),

    #[error("pipeline is not running")]
    NotRunning,

    #[error("node '{0}' already registered")]
    DuplicateNode(String),

    #[error("port '{0}' already registered")]
    DuplicatePort(String),

    #[error("port '{0}' not found")]
    PortNotFound(String),

    #[error("parallelism for '{0}' must be at least 1")]
    InvalidParallelism(String),

    #[error("failed to spawn worker thread for '{node}': {source}")]
    Spawn {
        node: String,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline stopped with work still queued on a node's input port, e.g. because that node
    /// had already been killed.
    #[error("stopped with work left - node: {node}, queue: {pending}")]
    Undrained { node: String, pending: usize },

    /// Every receiving handle of the port is gone.
    #[error("port '{0}' is closed")]
    PortClosed(String),

    #[error(transparent)]
    Combined(#[from] CombinedError),
}

/// Several independent failures reported as one. Displays as the newline-joined messages.
#[derive(Debug, Default)]
pub struct CombinedError {
    errors: Vec<EngineError>,
}

impl CombinedError {
    /// Number of constituent failures (nested combined errors are flattened on insert).
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[EngineError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<EngineError> {
        self.errors
    }

    /// Add one failure; a nested [`EngineError::Combined`] contributes its parts.
    pub fn push(&mut self, err: EngineError) {
        match err {
            EngineError::Combined(inner) => self.errors.extend(inner.into_errors()),
            other => self.errors.push(other),
        }
    }

    /// Count of [`EngineError::Abandoned`] entries.
    pub fn abandoned(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| matches!(e, EngineError::Abandoned { .. }))
            .count()
    }
}

impl fmt::Display for CombinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CombinedError {}

impl FromIterator<EngineError> for CombinedError {
    fn from_iter<I: IntoIterator<Item = EngineError>>(iter: I) -> Self {
        let mut combined = CombinedError::default();
        for err in iter {
            combined.push(err);
        }
        combined
    }
}

/// Join errors into one [`EngineError::Combined`]; `Ok(())` when there are none.
pub fn combine_errors<I>(errors: I) -> Result<(), EngineError>
where
    I: IntoIterator<Item = EngineError>,
{
    let combined: CombinedError = errors.into_iter().collect();
    if combined.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Combined(combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abandoned(worker: usize) -> EngineError {
        EngineError::Abandoned {
            node: "n".into(),
            worker,
            pending: 0,
        }
    }

    #[test]
    fn empty_input_is_ok() {
        assert!(combine_errors(Vec::new()).is_ok());
    }

    #[test]
    fn nested_combined_is_flattened() {
        let inner = combine_errors(vec![abandoned(1), abandoned(2)]).unwrap_err();
        let outer = combine_errors(vec![inner, abandoned(3)]).unwrap_err();
        match outer {
            EngineError::Combined(c) => {
                assert_eq!(c.len(), 3);
                assert_eq!(c.abandoned(), 3);
                assert_eq!(c.to_string().lines().count(), 3);
            }
            other => panic!("expected combined, got {other:?}"),
        }
    }

    #[test]
    fn into_errors_keeps_order() {
        let combined: CombinedError = vec![
            abandoned(1),
            EngineError::Undrained {
                node: "n".into(),
                pending: 2,
            },
        ]
        .into_iter()
        .collect();
        let parts = combined.into_errors();
        assert!(matches!(parts[0], EngineError::Abandoned { worker: 1, .. }));
        assert!(matches!(parts[1], EngineError::Undrained { pending: 2, .. }));
    }
}
