//! Temporarily overriding flags for the duration of a scope.
//!
//! [`override_flags`] applies a batch of overrides through the normal
//! parser-and-write-through path and returns a guard; dropping the guard
//! puts every flag back to its prior value and presence, write-through
//! included. Application is transactional: if any single override fails,
//! the ones already applied are rolled back before the error returns.

use crate::error::FlagError;
use crate::registry::FlagValues;
use crate::value::Value;

/// Restores the overridden flags when dropped.
pub struct OverrideGuard {
    fv: FlagValues,
    saved: Vec<(String, Value, bool)>,
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        // Reverse order, so overlapping overrides of the same flag unwind
        // to the oldest saved state.
        for (name, value, present) in self.saved.drain(..).rev() {
            self.fv.restore(&name, value, present);
        }
    }
}

/// Apply `overrides` to `fv`, returning a guard that undoes them.
///
/// Each value goes through the flag's parser exactly as a command-line
/// override would, and write-through fires both on application and on
/// restoration.
pub fn override_flags(
    fv: &FlagValues,
    overrides: &[(String, Value)],
) -> Result<OverrideGuard, FlagError> {
    let mut guard = OverrideGuard {
        fv: fv.clone(),
        saved: Vec::new(),
    };
    for (name, value) in overrides {
        let (previous, present) = fv.snapshot(name)?;
        fv.set(name, value.clone())?;
        guard.saved.push((name.clone(), previous, present));
    }
    Ok(guard)
}

/// Run `body` with `overrides` in effect, restoring afterwards.
pub fn with_overrides<R>(
    fv: &FlagValues,
    overrides: &[(String, Value)],
    body: impl FnOnce() -> R,
) -> Result<R, FlagError> {
    let _guard = override_flags(fv, overrides)?;
    Ok(body())
}
