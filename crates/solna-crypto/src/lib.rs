#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for WS-Security processing.
//!
//! Every module follows the same pattern: a trait for the operation and a
//! `from_uri` constructor mapping XML algorithm URIs to boxed
//! implementations.

pub mod cipher;
pub mod digest;
pub mod keytransport;
pub mod keywrap;
pub mod random;
pub mod sign;
