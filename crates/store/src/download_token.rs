//! Single-use download tokens.
//!
//! A download token is minted by a successful update check and authorizes
//! exactly one download of the installer it is bound to. Tokens have their
//! lifespan limited by the store's TTL, [`DEFAULT_TOKEN_TTL`] unless configured
//! otherwise, and are to have their length equal to the [`TOKEN_LENGTH`] value.
//!
//! Redemption checks and marks a token as consumed inside a single critical
//! section, so out of any number of concurrent attempts only one succeeds.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, PoisonError},
};

use common::environment::Environment;
use derive_more::{Display, Error};
use rand::{
    distributions::{Alphanumeric, DistString},
    thread_rng,
};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::version::Version;

pub const TOKEN_LENGTH: usize = 64;
pub const DEFAULT_TOKEN_TTL: Duration = Duration::seconds(600);

/// Issued download token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadToken {
    /// Opaque token string value.
    pub token: String,

    /// Version the token authorizes.
    pub version: Version,

    /// Environment of the authorized release.
    pub environment: Environment,

    /// Email of the tenant the token was issued to.
    pub tenant: String,

    /// Token creation timestamp.
    pub issued_at: OffsetDateTime,

    /// Timestamp after which the token can no longer be redeemed.
    pub expires_at: OffsetDateTime,

    /// Whether the token was already redeemed.
    pub consumed: bool,
}

impl DownloadToken {
    /// Token lifetime, in whole seconds.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).whole_seconds()
    }

    fn check(&self, now: OffsetDateTime) -> Result<Grant, RedeemError> {
        if self.consumed {
            return Err(RedeemError::TokenAlreadyUsed);
        }

        if now > self.expires_at {
            return Err(RedeemError::TokenExpired);
        }

        Ok(Grant {
            version: self.version,
            environment: self.environment,
            tenant: self.tenant.clone(),
        })
    }
}

/// Release a valid token grants access to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    pub version: Version,
    pub environment: Environment,
    pub tenant: String,
}

/// Errors that may occur during token redemption.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum RedeemError {
    /// Token was never issued, or was already reaped.
    #[display(fmt = "download token not found")]
    TokenNotFound,

    /// Token lifetime has elapsed.
    #[display(fmt = "download token has expired")]
    TokenExpired,

    /// Token was already redeemed.
    #[display(fmt = "download token was already used")]
    TokenAlreadyUsed,
}

/// In-memory download token store.
#[derive(Debug)]
pub struct TokenStore {
    ttl: Duration,
    tokens: Mutex<HashMap<String, DownloadToken>>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

impl TokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Configured token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new token for the provided release.
    pub fn issue(
        &self,
        version: Version,
        environment: Environment,
        tenant: &str,
    ) -> DownloadToken {
        self.issue_at(version, environment, tenant, OffsetDateTime::now_utc())
    }

    /// Issue a new token as if the current time was `now`.
    pub fn issue_at(
        &self,
        version: Version,
        environment: Environment,
        tenant: &str,
        now: OffsetDateTime,
    ) -> DownloadToken {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let token = Alphanumeric.sample_string(&mut thread_rng(), TOKEN_LENGTH);

            if let Entry::Vacant(entry) = tokens.entry(token.clone()) {
                let download_token = DownloadToken {
                    token,
                    version,
                    environment,
                    tenant: tenant.to_string(),
                    issued_at: now,
                    expires_at: now + self.ttl,
                    consumed: false,
                };

                entry.insert(download_token.clone());

                debug!(%version, %environment, %tenant, "issued download token");

                return download_token;
            }
        }
    }

    /// Validate a token without consuming it.
    pub fn inspect(&self, token: &str) -> Result<Grant, RedeemError> {
        self.inspect_at(token, OffsetDateTime::now_utc())
    }

    /// Validate a token without consuming it, as if the current time was `now`.
    pub fn inspect_at(&self, token: &str, now: OffsetDateTime) -> Result<Grant, RedeemError> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);

        tokens
            .get(token)
            .ok_or(RedeemError::TokenNotFound)?
            .check(now)
    }

    /// Redeem a token, marking it as consumed.
    pub fn redeem(&self, token: &str) -> Result<Grant, RedeemError> {
        self.redeem_at(token, OffsetDateTime::now_utc())
    }

    /// Redeem a token as if the current time was `now`.
    pub fn redeem_at(&self, token: &str, now: OffsetDateTime) -> Result<Grant, RedeemError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);

        let download_token = tokens.get_mut(token).ok_or(RedeemError::TokenNotFound)?;
        let grant = download_token.check(now)?;
        download_token.consumed = true;

        Ok(grant)
    }

    /// Remove every token that expired before `now`.
    ///
    /// Consumed tokens are kept until they expire, so that repeated
    /// redemption attempts keep reporting [`RedeemError::TokenAlreadyUsed`].
    pub fn reap_at(&self, now: OffsetDateTime) -> usize {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);

        let before = tokens.len();
        tokens.retain(|_, token| now <= token.expires_at);

        before - tokens.len()
    }

    /// Remove every expired token.
    pub fn reap(&self) -> usize {
        self.reap_at(OffsetDateTime::now_utc())
    }

    /// Count of tokens currently held.
    pub fn len(&self) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the store holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a task that periodically removes expired tokens.
    pub fn spawn_reaper(self: &Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let removed = store.reap();

                if removed > 0 {
                    info!(removed, "reaped expired download tokens");
                }
            }
        })
    }
}
