//! Filter conversion to Qdrant `Filter`.
//!
//! Every condition of a [`RagFilter`] is required (`must`). Equality supports
//! scalar values only (`String`, integer `Number`, `Bool`); others are skipped.

use qdrant_client::qdrant::{Condition, Filter};
use tracing::{debug, warn};

use crate::record::RagFilter;

/// Converts [`RagFilter`] into its list of `must` conditions.
pub fn to_conditions(f: &RagFilter) -> Vec<Condition> {
    let mut must: Vec<Condition> = Vec::new();

    if let Some(tag) = &f.product_tag {
        must.push(Condition::matches("product_tag", tag.clone()));
    }
    if let Some(version) = &f.version {
        must.push(Condition::matches("version", version.clone()));
    }

    for (field, val) in &f.equals {
        let cond = match val {
            serde_json::Value::String(s) => Condition::matches(field.as_str(), s.clone()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Condition::matches(field.as_str(), i),
                None => {
                    warn!("filters::to_conditions skipping non-integer number for {field}");
                    continue;
                }
            },
            serde_json::Value::Bool(b) => Condition::matches(field.as_str(), *b),
            _ => {
                warn!("filters::to_conditions skipping unsupported value for {field}");
                continue;
            }
        };
        must.push(cond);
    }

    debug!("filters::to_conditions must={}", must.len());
    must
}

/// Converts [`RagFilter`] to a Qdrant [`Filter`]; `None` when it has no conditions.
pub fn to_qdrant_filter(f: &RagFilter) -> Option<Filter> {
    let must = to_conditions(f);
    (!must.is_empty()).then(|| Filter::must(must))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_conditions_are_required() {
        let f = RagFilter {
            product_tag: Some("cli".into()),
            version: Some("2.1".into()),
            equals: vec![
                ("extra.locale".into(), json!("en")),
                ("section_level".into(), json!(2)),
                ("has_code".into(), json!(true)),
                ("ignored".into(), json!([1, 2])),
                ("ignored_float".into(), json!(0.5)),
            ],
        };
        let q = to_qdrant_filter(&f).unwrap();
        assert_eq!(q.must.len(), 5);
        assert!(q.should.is_empty());
    }

    #[test]
    fn empty_filter_is_none() {
        assert!(to_qdrant_filter(&RagFilter::default()).is_none());
    }
}
