//! Callback authorization.

use std::sync::Arc;

use async_trait::async_trait;
use vestibule::{Authorizer, RequestContext, UserRecord};

/// Application callback deciding access.
pub type AuthorizeFn = Arc<dyn Fn(&UserRecord, &dyn RequestContext) -> bool + Send + Sync>;

/// Delegates the decision to an application callback.
#[derive(Clone)]
pub struct ControllerAuthorizer {
    callback: AuthorizeFn,
}

impl ControllerAuthorizer {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&UserRecord, &dyn RequestContext) -> bool + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Share an existing callback.
    pub fn from_fn(callback: AuthorizeFn) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl Authorizer for ControllerAuthorizer {
    async fn authorize(&self, user: &UserRecord, request: &dyn RequestContext) -> bool {
        (self.callback)(user, request)
    }
}

impl std::fmt::Debug for ControllerAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerAuthorizer").finish_non_exhaustive()
    }
}
