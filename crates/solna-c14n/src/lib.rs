#![forbid(unsafe_code)]

//! Streaming Exclusive Canonical XML 1.0 (exc-C14N) over typed events.

pub mod escape;
pub mod exclusive;
pub mod render;

pub use exclusive::{canonicalize_events, ExcC14n};

use solna_core::algorithm;

/// Supported canonicalization modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    Exclusive,
    ExclusiveWithComments,
}

impl C14nMode {
    /// Map an algorithm URI to a mode, `None` for unsupported URIs.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::EXC_C14N => Some(C14nMode::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(C14nMode::ExclusiveWithComments),
            _ => None,
        }
    }
}
