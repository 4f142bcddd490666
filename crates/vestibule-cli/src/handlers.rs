//! Handler functions for CLI commands.
//!
//! Each handler returns the text to print so it can be tested without
//! capturing stdout.

use std::sync::Arc;

use vestibule::{
    AdapterConfig, AdapterRegistry, AuthConfig, Gate, UnauthorizedPolicy, resolve_entries,
};
use vestibule_adapters::{StaticUserStore, default_registry, hash_password, with_controller};

use crate::error::Result;

// ============================================================================
// Command handlers
// ============================================================================

/// Validate a config file and describe the resolved gate.
pub fn cmd_check(path: &str) -> Result<String> {
    let mut config = AuthConfig::load(path)?;
    config.apply_defaults();
    let gate = Gate::new(config.clone(), &check_registry())?;
    tracing::info!(
        authenticators = gate.authenticators().len(),
        authorizers = gate.authorizers().len(),
        "Config {path} is valid"
    );

    let mut lines = vec![format!("Config OK: {path}")];
    lines.extend(describe_chain("authenticate", config.authenticate.as_ref()));
    lines.extend(describe_chain("authorize", config.authorize.as_ref()));
    lines.push(format!("login_action: {}", config.login_action()));
    lines.push(format!(
        "login_redirect: {}",
        config.login_redirect().unwrap_or("(none, falls back to /)")
    ));
    lines.push(format!("logout_redirect: {}", config.logout_redirect()));
    lines.push(format!(
        "unauthorized: {}",
        match config.unauthorized_policy() {
            UnauthorizedPolicy::Referrer => "redirect to referrer".to_string(),
            UnauthorizedPolicy::Forbid => "403 Forbidden".to_string(),
            UnauthorizedPolicy::To(url) => format!("redirect to {url}"),
        }
    ));
    lines.push(format!(
        "session_key: {}",
        config.session_key().unwrap_or("(stateless)")
    ));
    if !config.allow.is_empty() {
        lines.push(format!("allow: {}", config.allow.join(", ")));
    }
    Ok(lines.join("\n"))
}

/// Render a config file with defaults applied.
pub fn cmd_show(path: &str) -> Result<String> {
    let mut config = AuthConfig::load(path)?;
    config.apply_defaults();
    Ok(toml::to_string(&config)?)
}

/// Hash a password.
pub fn cmd_hash_password(password: &str) -> Result<String> {
    Ok(hash_password(password)?)
}

// ============================================================================
// Helpers
// ============================================================================

/// Reference registry used for validation.
///
/// Adapters are only constructed, never consulted, so the user store is
/// empty and the controller callback denies.
fn check_registry() -> AdapterRegistry {
    with_controller(
        default_registry(Arc::new(StaticUserStore::default())),
        |_, _| false,
    )
}

/// One line per adapter, in order, with merged options.
fn describe_chain(label: &str, block: Option<&AdapterConfig>) -> Vec<String> {
    let entries = block.map(resolve_entries).unwrap_or_default();
    if entries.is_empty() {
        return vec![format!("{label}: (none)")];
    }

    let mut lines = vec![format!("{label}:")];
    for (i, entry) in entries.iter().enumerate() {
        let mut line = format!("  {}. {}", i + 1, entry.id);
        if entry.factory != entry.id {
            line.push_str(&format!(" (class {})", entry.factory));
        }
        if !entry.options.is_empty() {
            line.push_str(&format!(" {}", serde_json::Value::Object(entry.options.clone())));
        }
        lines.push(line);
    }
    lines
}

// ============================================================================
// Tests
// ============================================================================
