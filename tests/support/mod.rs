//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod portal;
pub mod socket_guard;
