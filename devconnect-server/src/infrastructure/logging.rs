use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

// sqlx logs every statement at info and h2 is chatty on gRPC streams.
const QUIET_DEPENDENCIES: &str = "sqlx=warn,h2=warn,tower=warn";

/// Installs the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(level))
            .map_err(|e| anyhow!("invalid LOG_LEVEL '{level}': {e}"))?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

fn default_directives(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}

#[cfg(test)]
mod tests {
    use super::default_directives;

    #[test]
    fn configured_level_keeps_dependencies_quiet() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("sqlx=warn"));
        assert!(tracing_subscriber::EnvFilter::try_new(directives).is_ok());
    }
}
