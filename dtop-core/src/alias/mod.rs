//! Per-host connection overrides from an OpenSSH client config file
//!
//! Only `HostName`, `User`, `Port` and `IdentityFile` are read; every other
//! option is left to the `ssh` client itself.

mod pattern;
mod table;

pub use table::{AliasTable, HostAlias};
