use std::path::Path;

use common::hash;

/// Print the checksum of the provided installer in `sha256sum` format.
pub(crate) fn checksum(path: &Path) -> Result<(), anyhow::Error> {
    let checksum = hash::sha256_file(path)?;

    println!("{checksum}  {}", path.display());

    Ok(())
}
