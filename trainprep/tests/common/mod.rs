use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};

/// Serializes tests in one binary that set or clear `TRAINPREP_PIP_BIN`.
static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn env_lock() -> MutexGuard<'static, ()> {
    match ENV_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
