//! Mappers between indexed chunks and the JSON payload stored with each point.
//!
//! Payload layout (flat, one key per field):
//! `document_id`, `chunk_index`, `text`, `token_count`, `is_continuation`,
//! `fingerprint`, `embedding_model`, `embedded_at` (RFC 3339), then every
//! [`SourceMetadata`] field, with `extra` kept as a nested object.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::record::{ChunkId, ContentType, IndexedChunk, SourceMetadata, StoredRecord};

/// Builds the payload object for one chunk.
pub fn to_payload(chunk: &IndexedChunk) -> Value {
    let m = &chunk.metadata;
    let rec = &chunk.record;
    json!({
        "document_id": m.document_id,
        "chunk_index": rec.chunk_id().index,
        "text": chunk.text,
        "token_count": chunk.token_count,
        "is_continuation": chunk.is_continuation,
        "fingerprint": rec.fingerprint(),
        "embedding_model": rec.embedding_model(),
        "embedded_at": rec.embedded_at().to_rfc3339(),
        "url": m.url,
        "product_tag": m.product_tag,
        "version": m.version,
        "title": m.title,
        "section_title": m.section_title,
        "section_level": m.section_level,
        "content_type": m.content_type.as_str(),
        "has_code": m.has_code,
        "extra": m.extra,
    })
}

/// Chunk id stored in a payload; `None` when either part is missing.
pub fn chunk_id_of(p: &Map<String, Value>) -> Option<ChunkId> {
    let doc = p.get("document_id")?.as_str()?;
    let index = u32::try_from(p.get("chunk_index")?.as_u64()?).ok()?;
    Some(ChunkId::new(doc, index))
}

/// Text stored in a payload (empty when missing).
pub fn text_of(p: &Map<String, Value>) -> String {
    str_field(p, "text").unwrap_or_default()
}

/// Metadata stored in a payload; missing fields fall back to empty values.
pub fn metadata_of(p: &Map<String, Value>) -> SourceMetadata {
    SourceMetadata {
        document_id: str_field(p, "document_id").unwrap_or_default(),
        url: str_field(p, "url").unwrap_or_default(),
        product_tag: str_field(p, "product_tag").unwrap_or_default(),
        version: str_field(p, "version"),
        title: str_field(p, "title"),
        section_title: str_field(p, "section_title"),
        section_level: p
            .get("section_level")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok()),
        content_type: ContentType::parse(
            p.get("content_type").and_then(Value::as_str).unwrap_or("text"),
        ),
        has_code: p.get("has_code").and_then(Value::as_bool).unwrap_or(false),
        extra: match p.get("extra") {
            Some(Value::Object(o)) => o.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => BTreeMap::new(),
        },
    }
}

/// Prior-state view of a payload used by change detection.
pub fn stored_record_of(p: &Map<String, Value>) -> Option<StoredRecord> {
    Some(StoredRecord {
        chunk_id: chunk_id_of(p)?,
        fingerprint: str_field(p, "fingerprint")?,
        embedding_model: str_field(p, "embedding_model"),
        embedded_at: str_field(p, "embedded_at")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}

fn str_field(p: &Map<String, Value>, key: &str) -> Option<String> {
    p.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Chunk, EmbeddingRecord, SourceDocument};

    fn indexed() -> IndexedChunk {
        let mut extra = BTreeMap::new();
        extra.insert("locale".to_string(), json!("en"));
        let doc = SourceDocument {
            id: "guide/install".into(),
            url: "https://docs.example/guide/install".into(),
            raw_text: String::new(),
            product_tag: "cli".into(),
            version: Some("2.1".into()),
            title: Some("Install".into()),
            last_modified: None,
            extra,
        };
        let chunk = Chunk {
            id: ChunkId::new("guide/install", 3),
            text: "## Linux\n\nRun the installer.".into(),
            overlap_bytes: 0,
            token_count: 9,
            section_title: Some("Linux".into()),
            section_level: Some(2),
            has_code: false,
            is_continuation: false,
            content_type: ContentType::Text,
            fingerprint: "fp".into(),
        };
        let rec = EmbeddingRecord::new(chunk.id.clone(), vec![0.1, 0.2], 2, "m", "fp").unwrap();
        IndexedChunk::new(&doc, &chunk, rec)
    }

    #[test]
    fn payload_keeps_metadata_and_identity() {
        let ic = indexed();
        let payload = to_payload(&ic);
        let p = payload.as_object().unwrap();

        assert_eq!(chunk_id_of(p), Some(ChunkId::new("guide/install", 3)));
        assert_eq!(text_of(p), ic.text);
        assert_eq!(metadata_of(p), ic.metadata);

        let stored = stored_record_of(p).unwrap();
        assert_eq!(stored.fingerprint, "fp");
        assert_eq!(stored.embedding_model.as_deref(), Some("m"));
        assert!(stored.embedded_at.is_some());
    }

    #[test]
    fn missing_identity_is_none() {
        let p = json!({"text": "orphan"});
        let p = p.as_object().unwrap();
        assert!(chunk_id_of(p).is_none());
        assert!(stored_record_of(p).is_none());
        assert_eq!(metadata_of(p).content_type, ContentType::Text);
    }
}
