//! Output teardown guard.

use smu_core::{Session, SmuResult};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Disables the source output when a sweep ends.
///
/// Normal and error paths call [`OutputGuard::release`], which awaits the
/// disable write and reports its result. If the sweep future is dropped
/// before that (cancellation, timeout), `Drop` spawns the disable write on
/// the current Tokio runtime instead.
pub struct OutputGuard {
    session: Arc<dyn Session>,
    disable_command: String,
    armed: bool,
}

impl OutputGuard {
    /// Arm a guard that will send `disable_command` on `session`.
    pub fn arm(session: Arc<dyn Session>, disable_command: String) -> Self {
        Self {
            session,
            disable_command,
            armed: true,
        }
    }

    /// Send the disable command now and disarm.
    pub async fn release(mut self) -> SmuResult<()> {
        let result = self.session.write(&self.disable_command).await;
        self.armed = false;
        debug!(address = self.session.address(), ok = result.is_ok(), "output guard released");
        result
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let session = Arc::clone(&self.session);
        let command = std::mem::take(&mut self.disable_command);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(address = session.address(), "sweep cancelled, disabling output");
                handle.spawn(async move {
                    if let Err(e) = session.write(&command).await {
                        error!(address = session.address(), error = %e, "failed to disable output after cancelled sweep");
                    }
                });
            }
            Err(_) => {
                error!(
                    address = session.address(),
                    "sweep dropped outside a Tokio runtime, output may still be enabled"
                );
            }
        }
    }
}
