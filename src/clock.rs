//! Injectable wall-clock so lifecycle evaluation can be tested deterministically.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A source of "now", injected once per manager instance so tests can age
/// records without sleeping.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    /// The real system clock.
    #[must_use]
    pub fn system() -> Self {
        Self(Arc::new(Utc::now))
    }

    /// A clock fixed to a caller-supplied function, e.g. one that returns a
    /// `DateTime` pinned in a test's scaffolding.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Clock(..)")
    }
}
