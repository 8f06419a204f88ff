pub mod client;
pub mod config;
pub mod consts;
pub mod converter;
pub mod error;
pub mod handler;
pub mod homeassistant;
pub mod host;
pub mod types;
pub mod value;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, ignoring poisoning. The guarded data are plain flags
/// and maps which stay consistent even if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
