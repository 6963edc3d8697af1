/// `checksum` subcommand.
mod checksum;

/// `serve` subcommand.
mod serve;

pub(crate) use checksum::checksum;
pub(crate) use serve::serve;
