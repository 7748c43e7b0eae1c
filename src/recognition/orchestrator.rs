//! Drives one claimed image through identification, catalog lookup and
//! (reuse | enrich + create), and owns every status transition of that image.

use super::client::{RecognitionClient, RecognitionError};
use super::types::{Enrichment, Identification};
use crate::image_ledger::{Image, ImageLedger, RECOGNIZE_KIND};
use crate::server::metrics;
use crate::species_catalog::{SpeciesCatalog, SpeciesDocument, SpeciesName};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// Public base URL used when none is configured.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5000";

/// Error that sent an image to FAILED.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("recognition failed: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("persistence failed: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

/// How a successfully processed image got its species document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Reused,
    Created,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Reused => "reused",
            Resolution::Created => "created",
        }
    }
}

/// Result of processing one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOutcome {
    pub image_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProcessingOutcome {
    fn succeeded(image_id: String, document_id: String, resolution: Resolution) -> Self {
        Self {
            image_id,
            success: true,
            document_id: Some(document_id),
            resolution: Some(resolution),
            error_message: None,
        }
    }

    fn failed(image_id: String, error: &ProcessingError) -> Self {
        Self {
            image_id,
            success: false,
            document_id: None,
            resolution: None,
            error_message: Some(error.to_string()),
        }
    }
}

/// Turns a stored image location into a URL the recognition service can fetch.
///
/// Absolute http(s) URLs are returned untouched; anything else is treated as a
/// path below `base_url`.
pub fn resolve_image_url(base_url: &str, url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

pub struct RecognitionOrchestrator {
    ledger: Arc<dyn ImageLedger>,
    catalog: Arc<dyn SpeciesCatalog>,
    client: Arc<dyn RecognitionClient>,
    public_base_url: String,
}

impl RecognitionOrchestrator {
    pub fn new(
        ledger: Arc<dyn ImageLedger>,
        catalog: Arc<dyn SpeciesCatalog>,
        client: Arc<dyn RecognitionClient>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            client,
            public_base_url: public_base_url.into(),
        }
    }

    /// Claims one eligible image and processes it to DONE or FAILED.
    ///
    /// Returns `Ok(None)` when nothing is eligible. An `Err` means the claim
    /// itself failed and no image was touched; failures while processing a
    /// claimed image are reported through the outcome instead.
    pub async fn process_next_eligible_image(&self) -> anyhow::Result<Option<ProcessingOutcome>> {
        let Some(mut image) = self.ledger.claim_next_eligible(RECOGNIZE_KIND)? else {
            return Ok(None);
        };
        info!("Processing image {} ({})", image.id, image.url);

        let outcome = match self.recognize(&mut image).await {
            Ok((document_id, resolution)) => {
                info!(
                    "Image {} linked to species document {} ({})",
                    image.id,
                    document_id,
                    resolution.as_str()
                );
                metrics::record_recognition_outcome("success", resolution.as_str());
                ProcessingOutcome::succeeded(image.id.clone(), document_id, resolution)
            }
            Err(e) => {
                warn!("Recognition of image {} failed: {}", image.id, e);
                image.mark_failed();
                if let Err(save_err) = self.ledger.save(&image) {
                    error!(
                        "Failed to persist FAILED status for image {}: {:#}",
                        image.id, save_err
                    );
                }
                metrics::record_recognition_outcome("failure", "none");
                ProcessingOutcome::failed(image.id.clone(), &e)
            }
        };
        Ok(Some(outcome))
    }

    async fn recognize(&self, image: &mut Image) -> Result<(String, Resolution), ProcessingError> {
        let full_url = resolve_image_url(&self.public_base_url, &image.url);
        let identification = self.identify(&full_url).await?;
        info!(
            "Identified {} ({}) with confidence {:.2}",
            identification.scientific_name,
            identification.common_name.as_deref().unwrap_or("-"),
            identification.confidence
        );

        if let Some(existing) = self
            .catalog
            .find_by_scientific_name(&identification.scientific_name)?
        {
            return self.link_existing(image, existing);
        }

        let enrichment = self
            .enrich(
                &identification.scientific_name,
                identification.common_name.as_deref(),
            )
            .await?;
        let document = new_document(image, identification, enrichment);

        if let Err(e) = self.catalog.save(&document) {
            // Another writer may have created the same species in the meantime.
            return match self
                .catalog
                .find_by_scientific_name(&document.name.scientific)?
            {
                Some(winner) if winner.id != document.id => {
                    warn!(
                        "Species {} was created concurrently, reusing document {}",
                        document.name.scientific, winner.id
                    );
                    self.link_existing(image, winner)
                }
                _ => Err(e.into()),
            };
        }

        image.mark_done(document.id.clone());
        self.ledger.save(image)?;
        Ok((document.id, Resolution::Created))
    }

    fn link_existing(
        &self,
        image: &mut Image,
        mut document: SpeciesDocument,
    ) -> Result<(String, Resolution), ProcessingError> {
        if document.add_image_id(&image.id) {
            self.catalog.save(&document)?;
        }
        image.mark_done(document.id.clone());
        self.ledger.save(image)?;
        Ok((document.id, Resolution::Reused))
    }

    async fn identify(&self, image_url: &str) -> Result<Identification, RecognitionError> {
        let start = Instant::now();
        let result = self.client.identify(image_url).await;
        metrics::record_recognition_call("identify", call_status(&result), start.elapsed());
        result
    }

    async fn enrich(
        &self,
        scientific_name: &str,
        common_name: Option<&str>,
    ) -> Result<Enrichment, RecognitionError> {
        let start = Instant::now();
        let result = self.client.enrich(scientific_name, common_name).await;
        metrics::record_recognition_call("enrich", call_status(&result), start.elapsed());
        result
    }
}

fn call_status<T>(result: &Result<T, RecognitionError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}

fn new_document(
    image: &Image,
    identification: Identification,
    enrichment: Enrichment,
) -> SpeciesDocument {
    let mut document = SpeciesDocument::new(
        SpeciesName {
            scientific: identification.scientific_name,
            common: identification.common_name,
        },
        identification.confidence,
        image.id.clone(),
    );
    document.family = enrichment.family;
    document.kingdom = enrichment.kingdom;
    document.species_type = enrichment.species_type;
    document.habitat = enrichment.habitat;
    document.conservation = enrichment.conservation;
    document.reference_image_url = enrichment.reference_image_url;
    document.fun_facts = enrichment.fun_facts;
    document.facts = enrichment.facts;
    document.raw_response = Some(enrichment.raw_response);
    document
}
