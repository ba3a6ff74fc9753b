//! Identity sources
//!
//! An [`IdentitySource`] answers "who is acting right now". The store asks it
//! once at the start of every unit of work instead of reading global state.

/// Recorded when no source yields an identity
pub const DEFAULT_AUDITOR: &str = "wade.wilson";

/// Environment variable read by [`EnvIdentity::default`]
pub const IDENTITY_ENV: &str = "BOOK_REVISIONS_USER";

/// Supplies the identity of the current actor
pub trait IdentitySource: Send + Sync {
    /// `None` when no authenticated actor is known
    fn current_identity(&self) -> Option<String>;
}

impl<F> IdentitySource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_identity(&self) -> Option<String> {
        self()
    }
}

/// Always reports the same identity
#[derive(Debug, Clone)]
pub struct StaticIdentity(String);

impl StaticIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }
}

impl IdentitySource for StaticIdentity {
    fn current_identity(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the identity from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvIdentity {
    var: String,
}

impl EnvIdentity {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvIdentity {
    fn default() -> Self {
        Self::new(IDENTITY_ENV)
    }
}

impl IdentitySource for EnvIdentity {
    fn current_identity(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// Never knows who is acting; every commit falls back to the placeholder
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentitySource for Anonymous {
    fn current_identity(&self) -> Option<String> {
        None
    }
}
