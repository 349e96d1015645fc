#![forbid(unsafe_code)]

//! Streaming WS-Security verification and decryption.
//!
//! The engine is a pull-mode processor chain over typed XML events: the
//! consumer repeatedly asks for the next event, the chain locates the
//! `wsse:Security` header, dispatches each header child to its handler
//! (Timestamp, BinarySecurityToken, EncryptedKey, Signature), and streams
//! everything else through untouched. Referenced `EncryptedData` subtrees
//! are replaced by decrypted plaintext events; the header itself is left
//! structurally intact.

pub mod binary_token;
pub mod chain;
pub mod descriptor;
pub mod decrypt;
pub mod encrypted_key;
pub mod policy;
pub mod registry;
pub mod signature;
pub mod timestamp;

pub use chain::{InputProcessorChain, ProcessingContext};
pub use policy::{AlgorithmSuite, Enforcement, ProcessorConfig};
pub use registry::{Action, DocumentRegistry, ProcessingResult};
