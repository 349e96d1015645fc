#![forbid(unsafe_code)]

//! Timestamp freshness validation.

use crate::chain::ProcessingContext;
use crate::descriptor::{bind_timestamp, TimestampDescriptor};
use crate::registry::{Action, ProcessingResult};
use chrono::{DateTime, Utc};
use solna_core::{Error, Result};
use solna_events::event::XmlEvent;

/// Handle a buffered `wsu:Timestamp` subtree.
pub fn handle(events: &[XmlEvent], ctx: &mut ProcessingContext<'_>) -> Result<()> {
    // At most one Timestamp per security header.
    if ctx.registry.count_by_action(Action::Timestamp) > 0 {
        return Err(Error::Structural(
            "message contains two or more timestamps".into(),
        ));
    }

    let descriptor = bind_timestamp(events)?;
    tracing::debug!(id = ?descriptor.id, "validating timestamp");
    validate(&descriptor, ctx.config, Utc::now())?;

    let id = descriptor.id.clone().unwrap_or_else(|| "timestamp".into());
    ctx.registry
        .insert_or_get(&id, ProcessingResult::new(Action::Timestamp, id.clone()));
    ctx.registry.add_token_element(id);
    Ok(())
}

/// Validate a timestamp against the configured policy at the given time.
///
/// Structural checks always run; the temporal comparisons only under
/// strict mode.
pub fn validate(
    descriptor: &TimestampDescriptor,
    config: &crate::policy::ProcessorConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    let created = descriptor
        .created
        .as_deref()
        .map(|s| parse_datetime(s, "Created"))
        .transpose()?;
    let expires = descriptor
        .expires
        .as_deref()
        .map(|s| parse_datetime(s, "Expires"))
        .transpose()?;

    // A Timestamp must carry at least a lifetime assertion.
    if created.is_none() && expires.is_none() && config.strict_timestamps {
        return Err(Error::Structural("created time is missing".into()));
    }

    if !config.strict_timestamps {
        return Ok(());
    }

    if let Some(created) = created {
        if now < created {
            return Err(Error::Expired("created time is in the future".into()));
        }
    }

    // The declared Expires wins unless it lies beyond Created plus the
    // configured lifetime cap; then the cap wins. Without a declared
    // Expires, a configured default TTL implies one.
    let capped = match (created, config.timestamp_ttl_cap) {
        (Some(c), Some(cap)) => Some(c + cap),
        _ => None,
    };
    let effective_expires = match (expires, capped) {
        (Some(e), Some(cap)) => Some(e.min(cap)),
        (Some(e), None) => Some(e),
        (None, _) => match (created, config.default_timestamp_ttl) {
            (Some(c), Some(ttl)) => Some(c + ttl),
            _ => None,
        },
    };

    if let Some(expires) = effective_expires {
        if now >= expires {
            return Err(Error::Expired("message has expired".into()));
        }
    }

    Ok(())
}

fn parse_datetime(text: &str, what: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Structural(format!("invalid {what} time '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ProcessorConfig;
    use chrono::Duration;

    fn descriptor(created: Option<&str>, expires: Option<&str>) -> TimestampDescriptor {
        TimestampDescriptor {
            id: Some("ts-1".into()),
            created: created.map(str::to_owned),
            expires: expires.map(str::to_owned),
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_valid_window_passes() {
        let d = descriptor(
            Some("2024-06-01T12:00:00Z"),
            Some("2024-06-01T12:05:00Z"),
        );
        let config = ProcessorConfig::default();
        validate(&d, &config, at("2024-06-01T12:02:30Z")).unwrap();
    }

    #[test]
    fn test_expired_message_fails() {
        let d = descriptor(
            Some("2024-06-01T12:00:00Z"),
            Some("2024-06-01T12:05:00Z"),
        );
        let config = ProcessorConfig::default();
        let err = validate(&d, &config, at("2024-06-01T12:05:00Z")).unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[test]
    fn test_future_created_fails() {
        // Created two hours ahead of the verification clock.
        let d = descriptor(
            Some("2024-06-01T14:00:00Z"),
            Some("2024-06-01T14:05:00Z"),
        );
        let config = ProcessorConfig::default();
        let err = validate(&d, &config, at("2024-06-01T12:00:00Z")).unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[test]
    fn test_no_children_fails_structurally() {
        let d = descriptor(None, None);
        let config = ProcessorConfig::default();
        let err = validate(&d, &config, at("2024-06-01T12:00:00Z")).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_expires_only_passes() {
        let d = descriptor(None, Some("2024-06-01T12:05:00Z"));
        let config = ProcessorConfig::default();
        validate(&d, &config, at("2024-06-01T12:00:00Z")).unwrap();
    }

    #[test]
    fn test_garbage_created_fails_structurally() {
        let d = descriptor(Some("not-a-date"), None);
        let config = ProcessorConfig::default();
        let err = validate(&d, &config, at("2024-06-01T12:00:00Z")).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_ttl_cap_beats_declared_expires() {
        // Declared lifetime of an hour, cap of 300 seconds.
        let d = descriptor(
            Some("2024-06-01T12:00:00Z"),
            Some("2024-06-01T13:00:00Z"),
        );
        let config = ProcessorConfig {
            timestamp_ttl_cap: Some(Duration::seconds(300)),
            ..ProcessorConfig::default()
        };
        // Inside the cap: fine.
        validate(&d, &config, at("2024-06-01T12:04:00Z")).unwrap();
        // Past the cap but before the declared Expires: expired.
        let err = validate(&d, &config, at("2024-06-01T12:06:00Z")).unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[test]
    fn test_declared_expires_wins_inside_cap() {
        // Declared Expires is tighter than the cap.
        let d = descriptor(
            Some("2024-06-01T12:00:00Z"),
            Some("2024-06-01T12:01:00Z"),
        );
        let config = ProcessorConfig {
            timestamp_ttl_cap: Some(Duration::seconds(3600)),
            ..ProcessorConfig::default()
        };
        let err = validate(&d, &config, at("2024-06-01T12:02:00Z")).unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[test]
    fn test_default_ttl_implies_expiry() {
        let d = descriptor(Some("2024-06-01T12:00:00Z"), None);
        let config = ProcessorConfig {
            default_timestamp_ttl: Some(Duration::seconds(300)),
            ..ProcessorConfig::default()
        };
        validate(&d, &config, at("2024-06-01T12:04:59Z")).unwrap();
        let err = validate(&d, &config, at("2024-06-01T12:05:00Z")).unwrap_err();
        assert!(matches!(err, Error::Expired(_)));
    }

    #[test]
    fn test_non_strict_skips_temporal_checks() {
        let d = descriptor(
            Some("2024-06-01T12:00:00Z"),
            Some("2024-06-01T12:05:00Z"),
        );
        let config = ProcessorConfig {
            strict_timestamps: false,
            ..ProcessorConfig::default()
        };
        // Long expired, but non-strict only checks structure.
        validate(&d, &config, at("2024-06-02T12:00:00Z")).unwrap();
    }

    #[test]
    fn test_non_strict_still_checks_structure() {
        let d = descriptor(Some("not-a-date"), None);
        let config = ProcessorConfig {
            strict_timestamps: false,
            ..ProcessorConfig::default()
        };
        assert!(validate(&d, &config, at("2024-06-01T12:00:00Z")).is_err());
    }
}
