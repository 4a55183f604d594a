//! Cancellation flag shared between the Ctrl-C handler and running work.
//! 取消标志：Ctrl-C 处理器与正在运行的任务之间共享

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap, cloneable cancellation flag.
///
/// Clones observe the same underlying state, so the flag handed to a signal
/// handler cancels every operation polling any clone of it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Install a process-wide Ctrl-C handler that trips `flag`.
///
/// Can only be installed once per process; a second call returns an error.
pub fn install_ctrlc_handler(flag: &CancelFlag) -> Result<()> {
    let flag = flag.clone();
    ctrlc::set_handler(move || {
        flag.cancel();
        tracing::warn!("Interrupt received, cancelling current step");
    })
    .context("Failed to install Ctrl-C handler")
}
