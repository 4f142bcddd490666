//! Form-post authentication.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use vestibule::{Authenticator, Options, RequestContext, UserRecord};

use crate::error::Result;
use crate::users::{CredentialOptions, Credentials, UserStore};

/// Identifies users from submitted form data.
///
/// Reads the username and password from the request data (field names per
/// the `fields` option) and checks them against the user store.
#[derive(Debug, Clone)]
pub struct FormAuthenticator {
    credentials: Credentials,
}

impl FormAuthenticator {
    /// Build from adapter options.
    pub fn new(store: Arc<dyn UserStore>, options: &Options) -> Result<Self> {
        let options = CredentialOptions::from_options("Form", options)?;
        Ok(Self {
            credentials: Credentials::new(store, options),
        })
    }
}

#[async_trait]
impl Authenticator for FormAuthenticator {
    async fn authenticate(&self, request: &dyn RequestContext) -> Option<UserRecord> {
        let fields = self.credentials.fields();
        let data = request.data();
        let username = data.get(&fields.username).and_then(Value::as_str)?;
        let password = data.get(&fields.password).and_then(Value::as_str)?;
        self.credentials.check(username, password).await
    }
}
