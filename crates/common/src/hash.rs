use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

use sha2::{Digest, Sha256};

/// Read buffer used while hashing files.
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute SHA-256 digest of the provided data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute SHA-256 digest of a reader's contents, encoded as a lowercase hex string.
///
/// The reader is consumed in fixed-size chunks, so arbitrarily large inputs
/// are hashed without being loaded into memory.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute SHA-256 digest of a file, encoded as a lowercase hex string.
pub fn sha256_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    sha256_reader(File::open(path)?)
}
