use std::fmt;
use std::sync::Arc;

/// Cloneable handle to an error returned by a job's run.
///
/// Job failures travel as data inside [`Finished`](crate::Event::Finished)
/// events, and an event may be delivered to several streams at once, so the
/// underlying [`anyhow::Error`] is shared rather than owned. The full error
/// chain is preserved.
#[derive(Clone)]
pub struct JobError(Arc<anyhow::Error>);

impl JobError {
    /// Wrap an error for delivery on an event stream.
    pub fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }

    /// Construct a job error from a plain message.
    pub fn msg<M>(msg: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(anyhow::Error::msg(msg))
    }

    /// Borrow the wrapped error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempt to downcast to a concrete error type in the chain.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref()
    }

    /// Convert back into an [`anyhow::Error`].
    ///
    /// Returns the original error when this handle is the last clone,
    /// otherwise a new error wrapping the shared one.
    pub fn into_anyhow(self) -> anyhow::Error {
        match Arc::try_unwrap(self.0) {
            Ok(err) => err,
            Err(shared) => anyhow::Error::new(JobError(shared)),
        }
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        // The wrapped error heads the chain, so a re-wrapped JobError keeps
        // every concrete type in it reachable.
        self.0.chain().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_one_error() {
        let err = JobError::msg("derp");
        let clone = err.clone();
        assert_eq!(err.to_string(), clone.to_string());
        assert!(Arc::ptr_eq(&err.0, &clone.0));
    }

    #[test]
    fn test_into_anyhow_unwraps_last_clone() {
        let err = JobError::new(anyhow::anyhow!("boom"));
        assert_eq!(err.into_anyhow().to_string(), "boom");
    }

    #[test]
    fn test_downcast_reaches_the_original_type() {
        #[derive(Debug, thiserror::Error)]
        #[error("not found")]
        struct NotFound;

        let err = JobError::new(anyhow::Error::new(NotFound));
        assert!(err.downcast_ref::<NotFound>().is_some());
    }
}
