//! Tenant credentials.
//!
//! Tenants are customer companies identified by an email address and
//! authenticated with a shared secret key. Tenants are only ever created
//! by an administrator, and removed by editing the snapshot by hand.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::snapshot::{self, SnapshotError};

/// Authenticated tenant identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tenant {
    pub email: String,
}

/// Credentials presented by a client.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct TenantEntry {
    secret_key: String,
}

/// Presented credentials do not match any tenant.
///
/// Unknown emails and wrong keys produce the same error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
#[display(fmt = "invalid credentials")]
pub struct InvalidCredentials;

/// Errors that may occur while adding a tenant.
#[derive(Debug, Display, From, Error)]
pub enum AddTenantError {
    /// A tenant with the same email already exists.
    #[display(fmt = "tenant {} already exists", _0)]
    DuplicateTenant(#[error(not(source))] String),

    /// Updated tenant list could not be written to disk.
    Snapshot(SnapshotError),
}

/// File-backed tenant credential store.
pub struct TenantStore {
    path: PathBuf,
    tenants: RwLock<BTreeMap<String, TenantEntry>>,
}

impl fmt::Debug for TenantStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TenantStore {
    /// Open the tenant store located at the provided path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let tenants: BTreeMap<String, TenantEntry> = snapshot::load(&path)?;

        info!(tenants = tenants.len(), "loaded tenant store");

        Ok(Self {
            path,
            tenants: RwLock::new(tenants),
        })
    }

    /// Add a new tenant.
    pub fn add(&self, email: String, secret_key: String) -> Result<Tenant, AddTenantError> {
        let mut tenants = self.tenants.write().unwrap_or_else(PoisonError::into_inner);

        if tenants.contains_key(&email) {
            return Err(AddTenantError::DuplicateTenant(email));
        }

        let mut next = tenants.clone();
        next.insert(email.clone(), TenantEntry { secret_key });

        snapshot::persist(&self.path, &next)?;
        *tenants = next;

        info!(%email, "added tenant");

        Ok(Tenant { email })
    }

    /// Validate presented credentials.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<Tenant, InvalidCredentials> {
        let tenants = self.tenants.read().unwrap_or_else(PoisonError::into_inner);

        let Some(entry) = tenants.get(&credentials.email) else {
            return Err(InvalidCredentials);
        };

        if bool::from(
            entry
                .secret_key
                .as_bytes()
                .ct_eq(credentials.secret_key.as_bytes()),
        ) {
            Ok(Tenant {
                email: credentials.email.clone(),
            })
        } else {
            Err(InvalidCredentials)
        }
    }

    /// Count of registered tenants.
    pub fn len(&self) -> usize {
        self.tenants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if there are no registered tenants.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
