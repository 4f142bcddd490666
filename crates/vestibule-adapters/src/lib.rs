//! Reference adapters for vestibule.
//!
//! Provides:
//! - [`FormAuthenticator`]: username/password from submitted form data
//! - [`BasicAuthenticator`]: stateless HTTP Basic with a 401 challenge
//! - [`CrudAuthorizer`]: action → CRUD operation permission checks
//! - [`ControllerAuthorizer`]: application callback
//! - [`UserStore`] / [`StaticUserStore`] and Argon2 [`hash_password`] / [`verify_password`]
//!
//! [`default_registry`] registers `Form`, `Basic` and `Crud`;
//! [`with_controller`] adds `Controller` with the application's callback.

use std::sync::Arc;

use vestibule::{AdapterRegistry, RequestContext, UserRecord};

pub mod basic;
pub mod controller;
pub mod crud;
pub mod error;
pub mod form;
pub mod password;
pub mod users;

pub use basic::BasicAuthenticator;
pub use controller::{AuthorizeFn, ControllerAuthorizer};
pub use crud::CrudAuthorizer;
pub use error::{Error, Result};
pub use form::FormAuthenticator;
pub use password::{hash_password, verify_password};
pub use users::{CredentialOptions, Credentials, StaticUserStore, UserStore};

/// Registry with the `Form`, `Basic` and `Crud` adapters over `users`.
pub fn default_registry(users: Arc<dyn UserStore>) -> AdapterRegistry {
    let form_users = users.clone();
    AdapterRegistry::new()
        .with_authenticator("Form", move |options| {
            Ok(Arc::new(FormAuthenticator::new(form_users.clone(), options)?))
        })
        .with_authenticator("Basic", move |options| {
            Ok(Arc::new(BasicAuthenticator::new(users.clone(), options)?))
        })
        .with_authorizer("Crud", |options| Ok(Arc::new(CrudAuthorizer::new(options)?)))
}

/// Register the `Controller` authorizer with `callback`.
pub fn with_controller<F>(registry: AdapterRegistry, callback: F) -> AdapterRegistry
where
    F: Fn(&UserRecord, &dyn RequestContext) -> bool + Send + Sync + 'static,
{
    let callback: AuthorizeFn = Arc::new(callback);
    registry.with_authorizer("Controller", move |_| {
        Ok(Arc::new(ControllerAuthorizer::from_fn(callback.clone())))
    })
}
