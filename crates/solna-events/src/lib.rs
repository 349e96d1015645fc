#![forbid(unsafe_code)]

//! Typed XML event model for streaming WS-Security processing.
//!
//! Events are produced once by an upstream reader, then owned by the
//! processing chain until consumed or replayed. Only the security header
//! region is ever buffered; body content streams through untouched.

pub mod event;
pub mod queue;
pub mod reader;
pub mod writer;

pub use event::{Attribute, NsBinding, QName, XmlEvent};
pub use queue::EventQueue;
