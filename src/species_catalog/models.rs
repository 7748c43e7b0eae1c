use serde::{Deserialize, Serialize};

/// Scientific and common name of a species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesName {
    pub scientific: String,
    pub common: Option<String>,
}

/// Shared reference record describing one species.
///
/// There is at most one document per scientific name, compared
/// case-insensitively (see [`scientific_key`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesDocument {
    pub id: String,
    pub name: SpeciesName,
    pub family: Option<String>,
    pub kingdom: Option<String>,
    pub species_type: Option<String>,
    pub habitat: Option<String>,
    pub conservation: Option<String>,
    pub reference_image_url: Option<String>,
    pub fun_facts: Vec<String>,
    pub facts: Vec<String>,
    /// Confidence of the identification that created the document.
    pub confidence: f64,
    /// Ids of the images that produced or confirmed this species. No duplicates.
    pub image_ids: Vec<String>,
    pub raw_response: Option<String>,
    pub processed_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SpeciesDocument {
    /// A document with only a name, a confidence and its first image.
    pub fn new(name: SpeciesName, confidence: f64, image_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        SpeciesDocument {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            family: None,
            kingdom: None,
            species_type: None,
            habitat: None,
            conservation: None,
            reference_image_url: None,
            fun_facts: vec![],
            facts: vec![],
            confidence,
            image_ids: vec![image_id.into()],
            raw_response: None,
            processed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Links an image to this species. Returns false if it was already linked.
    pub fn add_image_id(&mut self, image_id: &str) -> bool {
        if self.image_ids.iter().any(|id| id == image_id) {
            return false;
        }
        self.image_ids.push(image_id.to_string());
        true
    }

    pub fn scientific_key(&self) -> String {
        scientific_key(&self.name.scientific)
    }
}

/// Normalised dedup key for a scientific name.
pub fn scientific_key(scientific_name: &str) -> String {
    scientific_name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bear() -> SpeciesDocument {
        SpeciesDocument::new(
            SpeciesName {
                scientific: "Ursus arctos".to_string(),
                common: Some("Brown bear".to_string()),
            },
            0.9,
            "img-1",
        )
    }

    #[test]
    fn add_image_id_never_duplicates() {
        let mut doc = bear();
        assert!(!doc.add_image_id("img-1"));
        assert!(doc.add_image_id("img-2"));
        assert!(!doc.add_image_id("img-2"));
        assert_eq!(doc.image_ids, vec!["img-1", "img-2"]);
    }

    #[test]
    fn scientific_key_ignores_case_and_padding() {
        assert_eq!(scientific_key("  Ursus Arctos "), "ursus arctos");
        assert_eq!(bear().scientific_key(), scientific_key("URSUS ARCTOS"));
        assert_ne!(scientific_key("Ursus arctos"), scientific_key("Ursus arctos horribilis"));
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let json = serde_json::to_value(bear()).unwrap();
        assert_eq!(json["name"]["scientific"], "Ursus arctos");
        assert_eq!(json["imageIds"][0], "img-1");
        assert!(json["referenceImageUrl"].is_null());
        assert!(json["funFacts"].as_array().unwrap().is_empty());
    }
}
