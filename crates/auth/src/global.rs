//! Process-wide authenticator instance.
//!
//! Installed once at boot; afterwards it is read-only. Reconfiguring at
//! runtime is rejected.

use std::sync::{Arc, PoisonError, RwLock};

use crate::authenticator::Authenticator;
use crate::error::{AuthError, AuthResult};

static INSTANCE: RwLock<Option<Arc<Authenticator>>> = RwLock::new(None);

/// Install the process-wide authenticator.
///
/// Fails with [`AuthError::AlreadyInitialized`] on any second call.
pub fn install(authenticator: Authenticator) -> AuthResult<Arc<Authenticator>> {
    let mut slot = INSTANCE.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(AuthError::AlreadyInitialized);
    }
    let shared = Arc::new(authenticator);
    *slot = Some(shared.clone());
    Ok(shared)
}

/// The installed authenticator, if any.
pub fn get() -> Option<Arc<Authenticator>> {
    INSTANCE.read().unwrap_or_else(PoisonError::into_inner).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the slot is process-global and tests share the process.
    #[test]
    fn install_once_then_read() {
        let first = install(Authenticator::builder().with_home_route("/dashboard").build().unwrap()).unwrap();

        let got = get().unwrap();
        assert!(Arc::ptr_eq(&first, &got));
        assert_eq!(got.home_route(), "/dashboard");

        let again = install(Authenticator::builder().build().unwrap());
        assert!(matches!(again, Err(AuthError::AlreadyInitialized)));
        assert_eq!(get().unwrap().home_route(), "/dashboard");
    }
}
