#![forbid(unsafe_code)]

//! EncryptedKey processing: unwrap the ephemeral session key and schedule
//! decryption of every data reference it unlocks.

use crate::chain::ProcessingContext;
use crate::decrypt::DecryptProcessor;
use crate::descriptor::bind_encrypted_key;
use crate::registry::{Action, ProcessingResult, SessionKeyState};
use solna_core::{algorithm, Error, Result};
use solna_crypto::{keytransport, keywrap};
use solna_events::queue::EventQueue;
use solna_keys::resolver::{KeyInfoDescriptor, KeyInfoEntry, TokenResolver};

/// True for symmetric key-wrap transport algorithms (as opposed to
/// asymmetric key transport).
fn is_symmetric_key_wrap(transport: &str) -> bool {
    matches!(
        transport,
        algorithm::KW_AES128
            | algorithm::KW_AES192
            | algorithm::KW_AES256
            | algorithm::KW_TRIPLEDES
    )
}

/// Handle a buffered `xenc:EncryptedKey` subtree.
pub fn handle(queue: &EventQueue, ctx: &mut ProcessingContext<'_>) -> Result<()> {
    let descriptor = bind_encrypted_key(queue.events())?;
    let id = descriptor
        .id
        .clone()
        .unwrap_or_else(|| "encrypted-key".into());

    // Already processed under this id: reprocessing a duplicated id is a
    // no-op returning the cached result.
    if ctx.registry.has_result_with_action(&id, Action::Encryption) {
        tracing::debug!(id = %id, "encrypted key already processed");
        return Ok(());
    }

    tracing::debug!(id = %id, "found encrypted key element");

    for attr in &descriptor.disallowed_attributes {
        ctx.config
            .enforcement
            .handle(&format!("attribute {attr} is not permitted on EncryptedKey"))?;
    }

    let transport = descriptor.transport_algorithm.as_str();
    match transport {
        algorithm::RSA_PKCS1 => {
            let suite_allows = ctx
                .config
                .algorithm_suite
                .key_wrap_algorithms
                .iter()
                .any(|a| a == algorithm::RSA_PKCS1);
            if !ctx.config.allow_rsa15 && !suite_allows {
                return Err(Error::PolicyViolation(
                    "rsa-1_5 key transport is not allowed".into(),
                ));
            }
        }
        algorithm::RSA_OAEP
        | algorithm::RSA_OAEP_ENC11
        | algorithm::KW_AES128
        | algorithm::KW_AES192
        | algorithm::KW_AES256
        | algorithm::KW_TRIPLEDES => {}
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "key transport: {other}"
            )));
        }
    }
    ctx.config
        .algorithm_suite
        .check_key_wrap_algorithm(transport)?;

    let mut certificates = Vec::new();
    let state = if is_symmetric_key_wrap(transport) {
        let kek = resolve_symmetric_kek(&descriptor.key_info, &id, ctx)?;
        let wrap = keywrap::from_uri(transport)?;
        // Symmetric unwrap carries its own integrity check; a failure
        // here is a hard error, not an oracle concern.
        let key = wrap.unwrap(&kek, &descriptor.cipher_value)?;
        SessionKeyState::Key(key)
    } else {
        // Asymmetric key transport: resolve and verify the wrapping
        // certificate, then unwrap with the matching private key.
        if descriptor.key_info.entries.is_empty() {
            return Err(Error::Structural(
                "EncryptedKey carries no KeyInfo to locate the decryption key".into(),
            ));
        }
        if descriptor.key_info.entries.len() != 1 {
            ctx.config
                .enforcement
                .handle("EncryptedKey KeyInfo must have exactly one child")?;
        }
        let single = KeyInfoDescriptor {
            owner_id: id.clone(),
            entries: vec![descriptor.key_info.entries[0].clone()],
        };
        let mut token = {
            let resolver = TokenResolver::new(ctx.provider, &*ctx.registry);
            resolver.resolve(&single)?
        };
        token.verify(ctx.trust_store)?;
        ctx.config
            .algorithm_suite
            .check_asymmetric_key_length(token.public_key_bits()?)?;

        let cert = token
            .leaf_certificate()
            .ok_or_else(|| Error::Certificate("token carries no certificate".into()))?
            .to_vec();
        let private_key = ctx.provider.private_key_for(&cert).ok_or_else(|| {
            Error::Key("no private key available for the decryption certificate".into())
        })?;
        certificates.push(cert);

        let transport_alg =
            keytransport::from_uri_with_params(transport, descriptor.oaep.clone())?;
        match transport_alg.decrypt(&private_key, &descriptor.cipher_value) {
            Ok(key) => SessionKeyState::Key(key),
            Err(_) => {
                // SECURITY: a failed asymmetric unwrap must NOT become an
                // error. Distinguishing "bad key" from "bad ciphertext"
                // here would hand an attacker a Bleichenbacher-style
                // padding oracle. Instead a random key sized from the
                // first referenced EncryptedData's algorithm is
                // substituted and processing continues on the normal
                // path; the failure surfaces uniformly at the downstream
                // integrity check. Do not "fix" this into a hard error.
                tracing::debug!(id = %id, "key unwrap failed, deferring to random session key");
                SessionKeyState::RandomPending
            }
        }
    };

    let mut result = ProcessingResult::new(Action::Encryption, id.clone());
    result.transport_algorithm = Some(transport.to_owned());
    result.certificates = certificates;
    ctx.registry.insert_or_get(&id, result);
    ctx.registry.add_token_element(id.clone());

    if !descriptor.data_reference_ids.is_empty() {
        ctx.registry
            .register_pending_key(id, state, &descriptor.data_reference_ids);
        let ns_context = ctx.ns_context.clone();
        ctx.install_unique_processor(Box::new(DecryptProcessor::new(ns_context)));
    }
    Ok(())
}

/// The key-encryption key for a symmetric key wrap, located through the
/// provider by KeyName or key identifier, with the EncryptedKey id as a
/// final hint.
fn resolve_symmetric_kek(
    key_info: &KeyInfoDescriptor,
    encrypted_key_id: &str,
    ctx: &mut ProcessingContext<'_>,
) -> Result<Vec<u8>> {
    for entry in &key_info.entries {
        match entry {
            KeyInfoEntry::KeyName { name } => {
                if let Some(secret) = ctx.provider.secret_key(name) {
                    return Ok(secret);
                }
            }
            KeyInfoEntry::KeyIdentifier { bytes, .. } => {
                let hint = String::from_utf8_lossy(bytes).into_owned();
                if let Some(secret) = ctx.provider.secret_key(&hint) {
                    return Ok(secret);
                }
            }
            _ => {}
        }
    }
    ctx.provider
        .secret_key(encrypted_key_id)
        .ok_or_else(|| Error::Key("no key-encryption key available for key unwrap".into()))
}
