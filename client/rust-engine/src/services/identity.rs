use std::sync::RwLock;

/// Seam over the external identity provider. The engine never performs
/// sign-in itself; it only asks for the current bearer token, at call time,
/// so refreshed tokens are picked up without re-wiring anything.
pub trait TokenProvider: Send + Sync {
    /// The current bearer token, or None while signed out.
    fn current_token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }
}

/// Reads the token from an environment variable. Good enough for the demo
/// binary and local testing against a real backend.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new("ELYSIAN_ID_TOKEN")
    }
}

impl TokenProvider for EnvTokenProvider {
    fn current_token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|token| !token.trim().is_empty())
    }
}

/// In-process token holder for hosts that drive the identity flow themselves
/// (and for tests). The host calls `signed_in` / `signed_out` as the identity
/// provider reports changes.
#[derive(Default)]
pub struct SessionTokenProvider {
    token: RwLock<Option<String>>,
}

impl SessionTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let provider = Self::new();
        provider.signed_in(token);
        provider
    }

    pub fn signed_in(&self, token: impl Into<String>) {
        let mut guard = self.token.write().expect("token lock poisoned");
        *guard = Some(token.into());
    }

    pub fn signed_out(&self) {
        let mut guard = self.token.write().expect("token lock poisoned");
        *guard = None;
    }
}

impl TokenProvider for SessionTokenProvider {
    fn current_token(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }
}
