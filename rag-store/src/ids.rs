//! Stable identifiers for stored points.

use uuid::Uuid;

use crate::record::ChunkId;

/// Deterministic UUID v5 for a logical key.
#[inline]
pub fn uuid_v5_from_key(key: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Point id of a chunk; re-indexing the same position overwrites the same point.
pub fn point_id(id: &ChunkId) -> String {
    uuid_v5_from_key(&format!("chunk|{}|{}", id.document_id, id.index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_and_distinct() {
        let a = point_id(&ChunkId::new("guide/install", 0));
        assert_eq!(a, point_id(&ChunkId::new("guide/install", 0)));
        assert_ne!(a, point_id(&ChunkId::new("guide/install", 1)));
        // "a|1" + "0" must not collide with "a" + "10"
        assert_ne!(
            point_id(&ChunkId::new("a|1", 0)),
            point_id(&ChunkId::new("a", 10))
        );
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
