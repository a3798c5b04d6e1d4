//! tests/mod.rs

mod common;

mod claim_tests;
mod scheduler_tests;
