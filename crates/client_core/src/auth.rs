use std::sync::Arc;

use reqwest::Client;
use shared::{
    domain::{BearerToken, Role, Session},
    protocol::{ActivateRequest, ConfirmResetQuery, ResetPasswordQuery, SignInEnvelope, SignInQuery},
};
use storage::CredentialStore;
use tracing::{error, info};
use url::Url;

use crate::{
    api::ensure_success,
    config::parse_base_url,
    error::ClientError,
};

/// Sign-in, sign-out and the unauthenticated account flows.
pub struct AuthClient {
    http: Client,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
}

impl AuthClient {
    pub fn new(base_url: &str, store: Arc<dyn CredentialStore>) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::new(),
            base_url: parse_base_url(base_url)?,
            store,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(&format!("api/auth/{path}"))?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let email = require(email, "Please enter an email")?;
        let password = require_verbatim(password, "Please enter a password")?;

        let response = self
            .http
            .post(self.endpoint("signin")?)
            .query(&SignInQuery {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .inspect_err(|err| error!(error = %err, "sign-in request failed"))?;
        let envelope: SignInEnvelope = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let profile = envelope.data.user_response;
        let session = Session::new(
            BearerToken::new(envelope.data.token),
            Role::new(profile.role.clone()),
            profile,
        );
        self.store
            .save_session(&session)
            .await
            .map_err(ClientError::Storage)?;
        info!(email, role = %session.role, "signed in");
        Ok(session)
    }

    /// Forgets the token, role and every profile field.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.store.clear().await.map_err(ClientError::Storage)?;
        info!("signed out");
        Ok(())
    }

    pub async fn current_session(&self) -> Result<Option<Session>, ClientError> {
        self.store.load_session().await.map_err(ClientError::Storage)
    }

    pub async fn require_session(&self) -> Result<Session, ClientError> {
        self.current_session().await?.ok_or(ClientError::NotSignedIn)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ClientError> {
        let email = require(email, "Please enter an email")?;
        let response = self
            .http
            .post(self.endpoint("reset-password")?)
            .query(&ResetPasswordQuery {
                email: email.to_string(),
            })
            .send()
            .await?;
        ensure_success(response).await?;
        info!(email, "password reset requested");
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        key: &str,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let key = require_verbatim(key, "Missing reset key")?;
        let new_password = require_verbatim(new_password, "Please enter a new password")?;
        let response = self
            .http
            .post(self.endpoint("confirm-reset-password")?)
            .query(&ConfirmResetQuery {
                key: key.to_string(),
                new_password: new_password.to_string(),
            })
            .send()
            .await?;
        ensure_success(response).await?;
        info!("password reset confirmed");
        Ok(())
    }

    pub async fn activate(&self, email: &str) -> Result<(), ClientError> {
        let email = require(email, "Please enter an email")?;
        let response = self
            .http
            .post(self.endpoint("activate")?)
            .json(&ActivateRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        ensure_success(response).await?;
        info!(email, "activation email requested");
        Ok(())
    }
}

fn require<'a>(value: &'a str, message: &str) -> Result<&'a str, ClientError> {
    require_verbatim(value, message).map(str::trim)
}

/// Blank input is rejected, anything else is sent exactly as typed.
fn require_verbatim<'a>(value: &'a str, message: &str) -> Result<&'a str, ClientError> {
    if value.trim().is_empty() {
        Err(ClientError::validation(message))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
