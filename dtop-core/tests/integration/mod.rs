//! Integration test modules

mod alias_tests;
mod fleet_tests;
