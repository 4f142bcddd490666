//! CRUD permission authorization.
//!
//! Each action maps to a CRUD operation (`view` → `read`, ...). A user is
//! granted access when its permission list holds `"{action_path}{controller}/{op}"`
//! or the wildcard `"{action_path}*"`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use vestibule::{ActionMap, Authorizer, Options, RequestContext, UserRecord};

use crate::error::{Error, Result};

/// Default action → operation map.
pub fn default_action_map() -> ActionMap {
    HashMap::from(
        [
            ("index", "read"),
            ("view", "read"),
            ("add", "create"),
            ("edit", "update"),
            ("delete", "delete"),
        ]
        .map(|(action, op)| (action.to_string(), op.to_string())),
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CrudOptions {
    #[serde(default)]
    action_path: String,
    #[serde(default)]
    controller: Option<String>,
    #[serde(default = "default_permission_field")]
    permission_field: String,
    #[serde(default)]
    actions: HashMap<String, String>,
}

fn default_permission_field() -> String {
    "permissions".to_string()
}

/// Grants access from a user's CRUD permission list.
#[derive(Debug)]
pub struct CrudAuthorizer {
    action_path: String,
    controller: Option<String>,
    permission_field: String,
    actions: RwLock<ActionMap>,
}

impl CrudAuthorizer {
    /// Build from adapter options.
    ///
    /// Options: `action_path` (permission prefix), `controller` (resource
    /// name, else the first segment of the request URL), `permission_field`
    /// (default `permissions`), `actions` (extra action → operation entries).
    pub fn new(options: &Options) -> Result<Self> {
        let options: CrudOptions = serde_json::from_value(Value::Object(options.clone()))
            .map_err(|e| Error::options("Crud", e))?;
        let mut actions = default_action_map();
        actions.extend(
            options
                .actions
                .into_iter()
                .map(|(action, op)| (action.to_lowercase(), op)),
        );
        Ok(Self {
            action_path: options.action_path,
            controller: options.controller,
            permission_field: options.permission_field,
            actions: RwLock::new(actions),
        })
    }

    /// Operation mapped to `action`, if any.
    pub fn operation(&self, action: &str) -> Option<String> {
        self.actions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&action.to_lowercase())
            .cloned()
    }

    fn controller(&self, request: &dyn RequestContext) -> Option<String> {
        if let Some(controller) = &self.controller {
            return Some(controller.clone());
        }
        request
            .url()
            .split('/')
            .find(|segment| !segment.is_empty())
            .map(str::to_lowercase)
    }
}

#[async_trait]
impl Authorizer for CrudAuthorizer {
    async fn authorize(&self, user: &UserRecord, request: &dyn RequestContext) -> bool {
        let Some(op) = self.operation(request.action()) else {
            log::warn!(
                "Crud authorizer: action '{}' is not mapped to an operation",
                request.action()
            );
            return false;
        };
        let Some(controller) = self.controller(request) else {
            return false;
        };
        let Some(Value::Array(granted)) = user.get(&self.permission_field) else {
            return false;
        };

        let exact = format!("{}{controller}/{op}", self.action_path);
        let wildcard = format!("{}*", self.action_path);
        granted
            .iter()
            .filter_map(Value::as_str)
            .any(|permission| permission == exact || permission == wildcard)
    }

    fn map_actions(&self, map: &ActionMap) {
        let mut actions = self
            .actions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (action, op) in map {
            actions.insert(action.to_lowercase(), op.clone());
        }
    }
}
