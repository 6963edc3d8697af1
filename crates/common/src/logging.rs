use tracing_core::Level;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// HTTP plumbing crates that are capped at [`Level::WARN`] regardless of configuration.
const TRANSPORT_TARGETS: [&str; 3] = ["hyper", "tower", "tower_http"];

/// Install the global subscriber.
///
/// Events from the update server crates are filtered by the configured level.
pub fn init(config: &Config) {
    let format = fmt::format().with_target(false).compact();

    let filter = TRANSPORT_TARGETS
        .into_iter()
        .fold(Targets::new(), |filter, target| {
            filter.with_target(target, Level::WARN)
        })
        .with_default(config.logging.level);

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
