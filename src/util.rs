use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Hex SHA-256 of a byte slice
pub fn hash(buf: &[u8]) -> String {
	hex::encode(Sha256::digest(buf))
}

/// Hex SHA-256 of a file's full contents, read in bounded chunks
pub fn hash_file(path: &Path) -> io::Result<String> {
	let mut f = fs::File::open(path)?;
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; HASH_BUFFER_SIZE];
	loop {
		let n = f.read(&mut buf)?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize()))
}

/// High-entropy alphanumeric token for agent names and secrets
pub fn random_token(len: usize) -> String {
	rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}


// vim: ts=4
