//! Fingerprint computation for stored objects using BLAKE3
//!
//! Every encoding starts with a type discriminator followed by the object's
//! fields in a fixed order. Variable-length fields are length-prefixed with an
//! 8-byte big-endian count so adjacent fields can never alias.

use crate::object::TreeEntry;
use crate::types::{Hash, Properties, Signature};
use blake3::Hasher;

fn update_len_prefixed(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn update_properties(hasher: &mut Hasher, properties: &Properties) {
    hasher.update(b"mode:");
    hasher.update(&[properties.mode.tag()]);
}

fn update_signature(hasher: &mut Hasher, signature: &Signature) {
    update_len_prefixed(hasher, signature.name.as_bytes());
    update_len_prefixed(hasher, signature.email.as_bytes());
    hasher.update(&signature.when.timestamp_millis().to_be_bytes());
}

/// Compute the fingerprint of a blob
///
/// Hash = hash("blob" || content_checksum || properties)
pub fn compute_blob_hash(check_sum: &Hash, properties: &Properties) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"blob");
    hasher.update(check_sum.as_bytes());
    update_properties(&mut hasher, properties);
    hasher.finalize().into()
}

/// Compute the fingerprint of a tree node
///
/// Hash = hash("tree" || entry_count || (entry_hash || name || dir_flag)* || properties)
///
/// Entries must already be sorted by name.
pub fn compute_tree_hash(entries: &[TreeEntry], properties: &Properties) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"tree");
    hasher.update(&(entries.len() as u64).to_be_bytes());
    for entry in entries {
        hasher.update(entry.hash.as_bytes());
        update_len_prefixed(&mut hasher, entry.name.as_bytes());
        hasher.update(&[entry.is_dir as u8]);
    }
    update_properties(&mut hasher, properties);
    hasher.finalize().into()
}

/// Compute the fingerprint of a commit
///
/// Hash = hash("commit" || author || committer || message || tree || parent_count || parents)
///
/// Parent order is significant: the first parent is the branch being merged into.
pub fn compute_commit_hash(
    author: &Signature,
    committer: &Signature,
    message: &str,
    tree_hash: &Hash,
    parent_hashes: &[Hash],
) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"commit");
    update_signature(&mut hasher, author);
    update_signature(&mut hasher, committer);
    update_len_prefixed(&mut hasher, message.as_bytes());
    hasher.update(tree_hash.as_bytes());
    hasher.update(&(parent_hashes.len() as u64).to_be_bytes());
    for parent in parent_hashes {
        hasher.update(parent.as_bytes());
    }
    hasher.finalize().into()
}

/// Compute the content checksum of raw blob bytes.
pub fn compute_content_hash(content: &[u8]) -> Hash {
    blake3::hash(content).into()
}
