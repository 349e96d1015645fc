#![forbid(unsafe_code)]

//! BinarySecurityToken handling.

use crate::chain::ProcessingContext;
use crate::descriptor::bind_binary_token;
use crate::registry::{Action, ProcessingResult};
use solna_core::{ns, Result};
use solna_events::event::XmlEvent;

/// Handle a buffered `wsse:BinarySecurityToken` subtree: decode the
/// carried certificate and register it under the token's id so later
/// `wsse:Reference` lookups resolve to it.
pub fn handle(events: &[XmlEvent], ctx: &mut ProcessingContext<'_>) -> Result<()> {
    let descriptor = bind_binary_token(events)?;

    if let Some(encoding) = &descriptor.encoding_type {
        if encoding != ns::BASE64_ENCODING {
            ctx.config
                .enforcement
                .handle(&format!("unexpected EncodingType on BinarySecurityToken: {encoding}"))?;
        }
    }

    match descriptor.value_type.as_deref() {
        Some(ns::X509V3_TYPE) | None => {}
        Some(other) => {
            // Not a certificate token; nothing for this engine to index.
            tracing::debug!(value_type = other, "ignoring non-X509v3 binary token");
            return Ok(());
        }
    }

    let id = descriptor.id.unwrap_or_else(|| "binary-token".into());
    tracing::debug!(id = %id, "registering binary security token certificate");
    ctx.registry.register_certificate(id.clone(), descriptor.der);
    ctx.registry
        .insert_or_get(&id, ProcessingResult::new(Action::Token, id.clone()));
    ctx.registry.add_token_element(id);
    Ok(())
}
