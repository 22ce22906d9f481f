use crate::entities::{image_attributes, prelude::*};
use crate::models::{Attributes, RecordFilter, RecordQuery};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
};
use std::collections::BTreeMap;

/// Keyed store of small schema-less records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Attributes>>;

    /// Merges `attributes` into the record at `key`, attribute by attribute;
    /// attributes not mentioned keep their current value.
    async fn put(&self, key: &str, attributes: &Attributes) -> Result<()>;

    async fn query(&self, query: &RecordQuery) -> Result<Vec<(String, Attributes)>>;
}

/// Attribute rows in a relational table, one row per (domain, item, name).
pub struct SeaOrmMetadataStore {
    db: DatabaseConnection,
    domain: String,
}

impl SeaOrmMetadataStore {
    pub fn new(db: DatabaseConnection, domain: String) -> Self {
        Self { db, domain }
    }

    fn group(rows: Vec<image_attributes::Model>) -> BTreeMap<String, Attributes> {
        let mut items: BTreeMap<String, Attributes> = BTreeMap::new();
        for row in rows {
            items.entry(row.item_name).or_default().insert(row.name, row.value);
        }
        items
    }

    /// Item names for one page of `query`, filtered, ordered and limited in SQL.
    async fn matching_keys(&self, query: &RecordQuery) -> Result<Vec<String>> {
        let mut select = ImageAttributes::find()
            .select_only()
            .column(image_attributes::Column::ItemName)
            .filter(image_attributes::Column::Domain.eq(&self.domain));

        if let RecordFilter::Equals { attribute, value } = &query.filter {
            let matching = Query::select()
                .column(image_attributes::Column::ItemName)
                .from(ImageAttributes)
                .and_where(image_attributes::Column::Domain.eq(&self.domain))
                .and_where(image_attributes::Column::Name.eq(attribute))
                .and_where(image_attributes::Column::Value.eq(value))
                .to_owned();
            select = select.filter(image_attributes::Column::ItemName.in_subquery(matching));
        }

        // Ordering reads the order attribute's own row, one per item
        select = match &query.order_by {
            Some(order) => {
                let direction = if order.descending { Order::Desc } else { Order::Asc };
                select
                    .filter(image_attributes::Column::Name.eq(&order.attribute))
                    .order_by(image_attributes::Column::Value, direction.clone())
                    .order_by(image_attributes::Column::ItemName, direction)
            }
            None => select
                .distinct()
                .order_by_asc(image_attributes::Column::ItemName),
        };

        let keys = select
            .limit(query.limit as u64)
            .into_tuple::<String>()
            .all(&self.db)
            .await?;
        Ok(keys)
    }
}

#[async_trait]
impl MetadataStore for SeaOrmMetadataStore {
    async fn get(&self, key: &str) -> Result<Option<Attributes>> {
        let rows = ImageAttributes::find()
            .filter(image_attributes::Column::Domain.eq(&self.domain))
            .filter(image_attributes::Column::ItemName.eq(key))
            .all(&self.db)
            .await?;

        Ok(Self::group(rows).remove(key))
    }

    async fn put(&self, key: &str, attributes: &Attributes) -> Result<()> {
        if attributes.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows = attributes
            .iter()
            .map(|(name, value)| image_attributes::ActiveModel {
                domain: Set(self.domain.clone()),
                item_name: Set(key.to_string()),
                name: Set(name.clone()),
                value: Set(value.clone()),
                updated_at: Set(now),
            });

        ImageAttributes::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    image_attributes::Column::Domain,
                    image_attributes::Column::ItemName,
                    image_attributes::Column::Name,
                ])
                .update_columns([
                    image_attributes::Column::Value,
                    image_attributes::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        tracing::debug!("Merged {} attribute(s) into {}", attributes.len(), key);
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<(String, Attributes)>> {
        let keys = self.matching_keys(query).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let rows = ImageAttributes::find()
            .filter(image_attributes::Column::Domain.eq(&self.domain))
            .filter(image_attributes::Column::ItemName.is_in(keys.iter().cloned()))
            .all(&self.db)
            .await?;

        let mut items = Self::group(rows);
        Ok(keys
            .into_iter()
            .filter_map(|key| items.remove(&key).map(|attrs| (key, attrs)))
            .collect())
    }
}
