use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a compact global subscriber filtered by `RUST_LOG`, falling back
/// to `info`. Statement events are emitted under the `credo::sql` target, so
/// `RUST_LOG=info,credo::sql=debug` shows every query.
pub fn init_logging() -> Result<()> {
    init_logging_with("info")
}

/// Same as [`init_logging`] with a custom fallback directive.
pub fn init_logging_with(default_directive: &str) -> Result<()> {
    let filter_layer = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .with_context(|| format!("invalid log directive `{default_directive}`"))?,
    };

    let fmt_layer = fmt::layer()
        .compact()
        .with_ansi(false)
        .with_target(true)
        .boxed();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directives() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(init_logging_with("credo=loud").is_err());
    }
}
