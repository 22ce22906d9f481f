use crate::config::ServiceConfig;
use crate::entities::image_attributes;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm::{ConnectionTrait, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(config: &ServiceConfig) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Metadata database: {}", config.database_url);

    let mut opt = ConnectOptions::new(&config.database_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    let stmt = schema
        .create_table_from_entity(image_attributes::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;
    info!("   - Table 'image_attributes' checked/created");

    // Listing filters on (name, value) before grouping by item
    let index = "CREATE INDEX IF NOT EXISTS idx_image_attributes_lookup \
                 ON image_attributes(domain, name, value)";
    if let Err(e) = db
        .execute(sea_orm::Statement::from_string(builder, index.to_owned()))
        .await
    {
        tracing::warn!("   - Index creation warning: {}", e);
    }

    Ok(())
}
