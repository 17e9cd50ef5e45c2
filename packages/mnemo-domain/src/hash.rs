use sha2::{Digest, Sha256};

/// Hash of a content body. The hash is a pure function of the body text and
/// is the deduplication key for content rows.
pub fn content_hash(body: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(body.as_bytes());

	hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hashes_hello_world() {
		assert_eq!(
			content_hash("hello world"),
			"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
		);
	}

	#[test]
	fn hash_is_stable_across_calls() {
		assert_eq!(content_hash(""), content_hash(""));
		assert_ne!(content_hash("a"), content_hash("b"));
	}
}
