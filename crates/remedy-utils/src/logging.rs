//! Tracing setup for remedy
//!
//! Structured logging for the pipeline: events carry `ticket_id`,
//! `attempt`, and `strategy` fields where relevant.

use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the tracing subscriber
///
/// Honors `RUST_LOG` when set; otherwise defaults to `remedy=debug,info`
/// in verbose mode and `remedy=info,warn` otherwise. Returns an error if
/// a subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("remedy=debug,info")
            } else {
                EnvFilter::try_new("remedy=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

/// Span covering one full ticket remediation run
pub fn ticket_span(ticket_id: &str) -> tracing::Span {
    span!(Level::INFO, "ticket_execution", ticket_id = %ticket_id)
}

/// Span covering one fix attempt within a ticket run
pub fn attempt_span(ticket_id: &str, attempt: u32) -> tracing::Span {
    span!(
        Level::INFO,
        "fix_attempt",
        ticket_id = %ticket_id,
        attempt = attempt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_tolerated_twice() {
        // The second call fails because a subscriber is installed; both
        // outcomes are acceptable in a shared test process.
        let first = init_tracing(false);
        let second = init_tracing(true);
        assert!(first.is_ok() || second.is_err());
    }

    #[test]
    fn spans_carry_expected_names() {
        let span = ticket_span("BUG-9");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "ticket_execution");
        }
        let span = attempt_span("BUG-9", 2);
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "fix_attempt");
        }
    }
}
