use sha2::{Digest, Sha256};

/// SHA-256 over the items joined with `\n`, hex encoded.
///
/// Order matters: callers pass document order, so the same set in a different
/// order yields a different fingerprint.
pub fn fingerprint<S: AsRef<str>>(items: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            hasher.update(b"\n");
        }
        hasher.update(item.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub fn has_changed(old: Option<&str>, new: &str) -> bool {
    match old {
        Some(old) => old != new,
        None => true,
    }
}
