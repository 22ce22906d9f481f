use super::ServiceConnector;
use crate::config::ServiceConfig;
use crate::error::{Dependency, ProcessingError, detail};
use crate::models::{ImageRecord, RecordQuery};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 250;

/// Parses a caller supplied listing limit. Anything that is not a number in
/// `1..=250` falls back to the default.
pub fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|limit| (1..=MAX_LIST_LIMIT).contains(limit))
        .unwrap_or(DEFAULT_LIST_LIMIT)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublishedImage {
    pub key: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CatalogEntry {
    pub uploaded_date: DateTime<Utc>,
    pub original: PublishedImage,
    pub derivative: PublishedImage,
}

/// Read side over the image records.
pub struct ImageCatalog {
    connector: Arc<dyn ServiceConnector>,
    config: Arc<ServiceConfig>,
}

impl ImageCatalog {
    pub fn new(connector: Arc<dyn ServiceConnector>, config: Arc<ServiceConfig>) -> Self {
        Self { connector, config }
    }

    /// Processed images, newest upload first.
    pub async fn list_processed(&self, limit: usize) -> Result<Vec<CatalogEntry>, ProcessingError> {
        let limit = if (1..=MAX_LIST_LIMIT).contains(&limit) {
            limit
        } else {
            DEFAULT_LIST_LIMIT
        };

        let metadata = self
            .connector
            .metadata_store()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::MetadataStore, e))?;
        let rows = metadata
            .query(&RecordQuery::processed_newest_first(limit))
            .await
            .map_err(|e| ProcessingError::Query(detail(&e)))?;

        rows.iter()
            .map(|(key, attrs)| {
                let record = ImageRecord::from_attributes(key, attrs)
                    .map_err(|e| ProcessingError::Query(e.to_string()))?;
                self.entry(record)
            })
            .collect()
    }

    fn entry(&self, record: ImageRecord) -> Result<CatalogEntry, ProcessingError> {
        let processed = record.processed.ok_or_else(|| {
            ProcessingError::Query(format!("record {} is not processed", record.key))
        })?;

        Ok(CatalogEntry {
            uploaded_date: record.uploaded_date,
            original: PublishedImage {
                url: self.config.public_url(&record.key),
                key: record.key,
                width: record.org_width,
                height: record.org_height,
            },
            derivative: PublishedImage {
                url: self.config.public_url(&processed.name),
                key: processed.name,
                width: processed.width,
                height: processed.height,
            },
        })
    }
}
