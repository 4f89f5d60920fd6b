//! Credential verification.
//!
//! Sign-in delegates the username/password check to a [`CredentialCheck`]
//! so the HTTP layer never sees how credentials are stored. The bundled
//! implementation is a single hard-coded demo account.

use async_trait::async_trait;
use subtle::ConstantTimeEq;

/// Profile of a successfully verified user.
#[derive(Debug, Clone)]
pub struct VerifiedUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Verifies a username/password pair.
#[async_trait]
pub trait CredentialCheck: Send + Sync + std::fmt::Debug {
    /// `None` means the credentials do not match; no distinction is made
    /// between unknown user and wrong password.
    async fn verify(&self, username: &str, password: &str) -> Option<VerifiedUser>;
}

/// The fixed demo account.
#[derive(Debug, Default)]
pub struct DemoCredentials;

#[async_trait]
impl CredentialCheck for DemoCredentials {
    async fn verify(&self, username: &str, password: &str) -> Option<VerifiedUser> {
        let user_ok = constant_time_str_eq(username, "admin@com");
        let pass_ok = constant_time_str_eq(password, "123");
        if user_ok && pass_ok {
            Some(VerifiedUser {
                email: "kevin.dockx@gmail.com".to_string(),
                first_name: "Kevin".to_string(),
                last_name: "Dockx".to_string(),
            })
        } else {
            None
        }
    }
}

fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
