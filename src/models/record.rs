use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;

/// Schema-less attribute set as held by the metadata store.
pub type Attributes = BTreeMap<String, String>;

pub const PROCESSED: &str = "processed";
pub const UPLOADED_DATE: &str = "uploadedDate";
pub const ORG_HEIGHT: &str = "orgHeight";
pub const ORG_WIDTH: &str = "orgWidth";
pub const PROCESSED_NAME: &str = "processedName";
pub const PROCESSED_HEIGHT: &str = "processedHeight";
pub const PROCESSED_WIDTH: &str = "processedWidth";

const FLAG_YES: &str = "y";
const FLAG_NO: &str = "n";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordDecodeError {
    #[error("record {key} is missing attribute '{attribute}'")]
    Missing { key: String, attribute: &'static str },

    #[error("record {key} has invalid value '{value}' for '{attribute}'")]
    Invalid {
        key: String,
        attribute: &'static str,
        value: String,
    },

    #[error("record {key} is not processed but carries '{attribute}'")]
    Inconsistent { key: String, attribute: &'static str },
}

/// Result of a successful resize, as recorded on the image record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProcessedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    /// Attributes merged into the record once the derivative is published.
    pub fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(PROCESSED.to_string(), FLAG_YES.to_string());
        attrs.insert(PROCESSED_NAME.to_string(), self.name.clone());
        attrs.insert(PROCESSED_HEIGHT.to_string(), self.height.to_string());
        attrs.insert(PROCESSED_WIDTH.to_string(), self.width.to_string());
        attrs
    }
}

/// Metadata kept for every uploaded original, keyed by its storage key.
///
/// `processed` is either fully present or absent; decoding rejects records
/// that violate that, so callers never see a half-processed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImageRecord {
    pub key: String,
    pub uploaded_date: DateTime<Utc>,
    pub org_width: u32,
    pub org_height: u32,
    pub processed: Option<ProcessedImage>,
}

impl ImageRecord {
    pub fn new_upload(key: impl Into<String>, uploaded_date: DateTime<Utc>, width: u32, height: u32) -> Self {
        Self {
            key: key.into(),
            uploaded_date: uploaded_date.trunc_subsecs(3),
            org_width: width,
            org_height: height,
            processed: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed.is_some()
    }

    pub fn to_attributes(&self) -> Attributes {
        let mut attrs = match &self.processed {
            Some(processed) => processed.attributes(),
            None => {
                let mut attrs = Attributes::new();
                attrs.insert(PROCESSED.to_string(), FLAG_NO.to_string());
                attrs
            }
        };
        attrs.insert(UPLOADED_DATE.to_string(), format_timestamp(&self.uploaded_date));
        attrs.insert(ORG_HEIGHT.to_string(), self.org_height.to_string());
        attrs.insert(ORG_WIDTH.to_string(), self.org_width.to_string());
        attrs
    }

    pub fn from_attributes(key: &str, attrs: &Attributes) -> Result<Self, RecordDecodeError> {
        let processed = match required(key, attrs, PROCESSED)? {
            FLAG_YES => Some(ProcessedImage {
                name: required(key, attrs, PROCESSED_NAME)?.to_string(),
                height: dimension(key, attrs, PROCESSED_HEIGHT)?,
                width: dimension(key, attrs, PROCESSED_WIDTH)?,
            }),
            FLAG_NO => {
                for attribute in [PROCESSED_NAME, PROCESSED_HEIGHT, PROCESSED_WIDTH] {
                    if attrs.contains_key(attribute) {
                        return Err(RecordDecodeError::Inconsistent {
                            key: key.to_string(),
                            attribute,
                        });
                    }
                }
                None
            }
            other => {
                return Err(RecordDecodeError::Invalid {
                    key: key.to_string(),
                    attribute: PROCESSED,
                    value: other.to_string(),
                });
            }
        };

        let raw_date = required(key, attrs, UPLOADED_DATE)?;
        let uploaded_date = DateTime::parse_from_rfc3339(raw_date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|_| RecordDecodeError::Invalid {
                key: key.to_string(),
                attribute: UPLOADED_DATE,
                value: raw_date.to_string(),
            })?;

        Ok(Self {
            key: key.to_string(),
            uploaded_date,
            org_height: dimension(key, attrs, ORG_HEIGHT)?,
            org_width: dimension(key, attrs, ORG_WIDTH)?,
            processed,
        })
    }
}

/// RFC 3339 with millisecond precision; sorts lexicographically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn required<'a>(
    key: &str,
    attrs: &'a Attributes,
    attribute: &'static str,
) -> Result<&'a str, RecordDecodeError> {
    attrs
        .get(attribute)
        .map(String::as_str)
        .ok_or_else(|| RecordDecodeError::Missing {
            key: key.to_string(),
            attribute,
        })
}

fn dimension(key: &str, attrs: &Attributes, attribute: &'static str) -> Result<u32, RecordDecodeError> {
    let raw = required(key, attrs, attribute)?;
    raw.parse().map_err(|_| RecordDecodeError::Invalid {
        key: key.to_string(),
        attribute,
        value: raw.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Equals { attribute: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub attribute: String,
    pub descending: bool,
}

/// Filter, ordering and limit for a metadata store query.
///
/// When `order_by` is set only records carrying that attribute are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub order_by: Option<OrderBy>,
    pub limit: usize,
}

impl RecordQuery {
    pub fn processed_newest_first(limit: usize) -> Self {
        Self {
            filter: RecordFilter::Equals {
                attribute: PROCESSED.to_string(),
                value: FLAG_YES.to_string(),
            },
            order_by: Some(OrderBy {
                attribute: UPLOADED_DATE.to_string(),
                descending: true,
            }),
            limit,
        }
    }

    pub fn matches(&self, attrs: &Attributes) -> bool {
        let filtered = match &self.filter {
            RecordFilter::All => true,
            RecordFilter::Equals { attribute, value } => attrs.get(attribute) == Some(value),
        };
        let ordered = self
            .order_by
            .as_ref()
            .is_none_or(|order| attrs.contains_key(&order.attribute));
        filtered && ordered
    }

    /// Orders and truncates records that already passed [`RecordQuery::matches`].
    pub fn finish(&self, mut records: Vec<(String, Attributes)>) -> Vec<(String, Attributes)> {
        if let Some(order) = &self.order_by {
            records.sort_by(|(ka, a), (kb, b)| {
                let ord = a
                    .get(&order.attribute)
                    .cmp(&b.get(&order.attribute))
                    .then_with(|| ka.cmp(kb));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        records.truncate(self.limit);
        records
    }
}
