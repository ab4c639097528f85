#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(warnings)]

//! Small, dependency-light helpers shared across the authorization server crates.

pub mod secret_string;

#[cfg(feature = "humantime-serde")]
pub mod humantime_serde;

pub use secret_string::SecretString;
