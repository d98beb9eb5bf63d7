//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directives for a base level.
///
/// The relay logs at `level`; HTTP plumbing stays at `warn` except request
/// spans from `tower_http`.
pub fn filter_directives(level: &str) -> String {
    format!("llm_relay={level},tower_http={level},axum={level},hyper=warn,reqwest=warn")
}

/// Initialize the global subscriber.
///
/// `RUST_LOG`, when set, replaces the computed directives. Safe to call more
/// than once; later calls are ignored.
pub fn init_tracing(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_parse() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("llm_relay=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing("info");
        init_tracing("debug");
    }
}
