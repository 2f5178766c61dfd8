//! Property test modules

mod formatter_tests;
mod parser_tests;
