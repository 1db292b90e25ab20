use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info,exam_forge=debug";

/// Install the global `tracing` subscriber, logging to stderr so stdout stays clean JSON.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`]; `verbose` raises the crate to `trace`.
/// `EXAM_FORGE_LOG_COMPACT=1` selects the compact formatter. Calling this more than once
/// is harmless.
pub fn init(verbose: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if verbose {
        if let Ok(directive) = "exam_forge=trace".parse() {
            filter = filter.add_directive(directive);
        }
    }

    let compact = std::env::var("EXAM_FORGE_LOG_COMPACT").is_ok_and(|v| v == "1");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if compact {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
}
