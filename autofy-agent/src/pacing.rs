use autofy_common::{AutofyError, Result};
use autofy_runtime::{Cancellation, sleep_or_cancel};
use std::time::Duration;
use tracing::debug;

/// Fixed pause before every logical model call, keeping a run under
/// free-tier request quotas.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep out the pacing delay. Fails with [`AutofyError::Cancelled`] if
    /// `cancel` fires first.
    pub async fn wait(&self, cancel: &Cancellation) -> Result<()> {
        if !self.delay.is_zero() {
            debug!(target: "agent.pacing", secs = self.delay.as_secs_f32(), "pacing");
        }
        if sleep_or_cancel(self.delay, cancel).await {
            Ok(())
        } else {
            Err(AutofyError::Cancelled)
        }
    }
}
