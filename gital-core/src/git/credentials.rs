//! Credential callbacks for fetch and clone

use git2::{Cred, CredentialType, RemoteCallbacks};
use tracing::debug;

/// libgit2 keeps asking for credentials as long as the callback returns
/// some; give up after this many attempts.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Credentials offered to remotes during fetch and clone
#[derive(Clone, Default)]
pub struct GitAuth {
    /// GitLab token, offered for HTTP(S) remotes as user `oauth2`
    pub token: Option<String>,
}

impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitAuth")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitAuth {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Remote callbacks with a credential handler installed
    pub fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0;

        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str(&format!(
                    "authentication failed for {url}"
                )));
            }

            debug!(url, ?allowed, attempt = attempts, "Credentials requested");

            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
            }

            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(token) = self.token.as_deref() {
                    return Cred::userpass_plaintext("oauth2", token);
                }
            }

            if allowed.contains(CredentialType::USERNAME) {
                return Cred::username(username_from_url.unwrap_or("git"));
            }

            Cred::default()
        });

        callbacks
    }
}
