use serde::Deserialize;

use super::{optional_text, ValidationError};
use crate::model::RelationshipType;

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipUpsert {
    pub worker_id: i64,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RelationshipUpsert {
    pub fn validate(&self) -> Result<(), ValidationError> {
        optional_text("notes", self.notes.as_deref(), 2000)?;
        if self.tags.len() > 20 {
            return Err(ValidationError::new("at most 20 tags"));
        }
        if self.tags.iter().any(|t| t.trim().is_empty() || t.chars().count() > 50) {
            return Err(ValidationError::new("tags must be 1-50 characters"));
        }
        Ok(())
    }

    pub fn normalized_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.tags.iter().map(|t| t.trim().to_lowercase()).collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipFilter {
    pub relationship_type: Option<RelationshipType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_lowercased_and_deduplicated() {
        let upsert = RelationshipUpsert {
            worker_id: 1,
            relationship_type: RelationshipType::Favorite,
            notes: None,
            tags: vec![" Punctual".into(), "punctual".into(), "Barista".into()],
        };
        assert!(upsert.validate().is_ok());
        assert_eq!(upsert.normalized_tags(), vec!["barista", "punctual"]);
    }
}
