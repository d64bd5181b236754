//! Shared fixtures for the end-to-end tests
//!
//! Each test binary pulls in the whole harness and uses a slice of it.

#![allow(dead_code)]

pub mod bedrock;
pub mod config;
