#![forbid(unsafe_code)]

pub use solna_core as core;
pub use solna_events as events;
pub use solna_c14n as c14n;
pub use solna_crypto as crypto;
pub use solna_keys as keys;
pub use solna_wss as wss;
