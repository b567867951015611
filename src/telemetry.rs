//! Tracing setup.
//!
//! Console narration from the daemon goes through `tracing`; the
//! operation log file is a separate domain artifact owned by
//! [`crate::oplog`]. Filtering follows `GITPULSE_LOG` when set,
//! otherwise the `-v` count.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("GITPULSE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("gitpulse={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
