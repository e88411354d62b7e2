use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::libs::error::{AlnError, Result};

/// Cooperative cancellation flag shared between a caller and long-running
/// operations. Operations poll [`CancelToken::check`] between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AlnError::UserCancelled)
        } else {
            Ok(())
        }
    }
}
