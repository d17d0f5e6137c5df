//! Secret store backends for the password and exam number.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::debug;

use super::CredentialError;

/// A keyed secret store: `service` namespaces the value, `account` is the user.
pub trait SecretStore: Send + Sync {
    /// Looks up a secret; `Ok(None)` when no entry exists.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the backend is unreachable or fails.
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError>;

    /// Stores or replaces a secret.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the backend rejects the write.
    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), CredentialError>;

    /// Removes a secret. Returns `false` when there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the backend fails for another reason.
    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialError>;
}

/// System keychain via the `keyring` crate.
///
/// Platform keychain bindings can panic when no session keyring is available,
/// so every call is wrapped in `catch_unwind` and mapped to
/// [`CredentialError::StoreUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringStore;

impl SecretStore for KeyringStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, CredentialError> {
        let entry = safe_keyring_entry(service, account)?;
        match catch_unwind(AssertUnwindSafe(|| entry.get_password())) {
            Ok(Ok(secret)) => Ok(Some(secret)),
            Ok(Err(keyring::Error::NoEntry)) => {
                debug!(service, "no keyring entry");
                Ok(None)
            }
            Ok(Err(error)) => Err(store_failure("read", &error)),
            Err(_) => Err(CredentialError::StoreUnavailable),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), CredentialError> {
        let entry = safe_keyring_entry(service, account)?;
        catch_unwind(AssertUnwindSafe(|| entry.set_password(secret)))
            .map_err(|_| CredentialError::StoreUnavailable)?
            .map_err(|error| store_failure("write", &error))
    }

    fn delete(&self, service: &str, account: &str) -> Result<bool, CredentialError> {
        let entry = safe_keyring_entry(service, account)?;
        match catch_unwind(AssertUnwindSafe(|| entry.delete_credential())) {
            Ok(Ok(())) => Ok(true),
            Ok(Err(keyring::Error::NoEntry)) => Ok(false),
            Ok(Err(error)) => Err(store_failure("delete", &error)),
            Err(_) => Err(CredentialError::StoreUnavailable),
        }
    }
}

fn safe_keyring_entry(service: &str, account: &str) -> Result<keyring::Entry, CredentialError> {
    catch_unwind(|| keyring::Entry::new(service, account))
        .map_err(|_| CredentialError::StoreUnavailable)?
        .map_err(|error| store_failure("open", &error))
}

fn store_failure(operation: &'static str, error: &keyring::Error) -> CredentialError {
    CredentialError::Store {
        operation,
        reason: error.to_string(),
    }
}
