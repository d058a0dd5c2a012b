//! Durable storage substrate contracts.

pub mod kv;
