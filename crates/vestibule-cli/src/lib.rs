//! # vestibule-cli
//!
//! Admin CLI for vestibule gate configurations:
//! - `check`: validate a config and print the resolved adapter chains
//! - `show`: print the effective config with defaults applied
//! - `hash-password`: produce an Argon2 PHC string for a user record

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod error;
pub mod handlers;

pub use error::{Error, Result};
