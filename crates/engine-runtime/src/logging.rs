use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Honors `RUST_LOG`, defaulting to `info`.
/// Returns `false` when a subscriber was already installed.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init();
        assert!(!init());
        tracing::info!("still logging");
    }
}
