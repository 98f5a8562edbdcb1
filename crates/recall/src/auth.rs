//! Session authentication against the credential table.
//!
//! Access control is a flat shared-secret check: the access code entered
//! at session start must exist in the credential store. The authenticated
//! [`Session`] then carries the owning credential through every store and
//! model operation — there is no other authorization layer.

use anyhow::{bail, Result};

use recall_core::store::Store;

/// An authenticated session. Constructing one requires a successful
/// credential lookup; the secret doubles as the document owner key.
#[derive(Debug, Clone)]
pub struct Session {
    credential: String,
}

impl Session {
    /// The owning credential used to scope every document operation.
    pub fn owner(&self) -> &str {
        &self.credential
    }
}

/// Authenticate an access code against the store.
///
/// Failure leaves no state behind; the caller may simply try again with
/// another code (no lockout, no backoff).
pub async fn authenticate(store: &dyn Store, code: &str) -> Result<Session> {
    let code = code.trim();
    if code.is_empty() {
        bail!("access code required (pass --code or set RECALL_CODE)");
    }

    match store.find_credential(code).await? {
        Some(credential) => Ok(Session {
            credential: credential.secret,
        }),
        None => bail!("authentication failed: unknown access code"),
    }
}
