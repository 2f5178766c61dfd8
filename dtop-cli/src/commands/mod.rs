//! Command implementations for the dtop CLI

mod poll;

pub use poll::cmd_poll;
