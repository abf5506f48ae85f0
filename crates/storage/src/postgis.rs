//! Product store backed by PostgreSQL/PostGIS.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info, instrument};

use crate::error::{Result, StorageError};
use crate::model::RasterRow;
use crate::store::{ProductStore, StoreTransaction};

/// Rows per multi-row INSERT; four binds each, well under the 65535 limit.
const INSERT_CHUNK_SIZE: usize = 500;

/// Connection pool bounds.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub min_connections: u32,
    pub max_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 20,
        }
    }
}

/// Database connection pool and product operations.
pub struct PgProductStore {
    pool: PgPool,
    srid: i32,
}

impl PgProductStore {
    /// Open the pool. `srid` is the CRS of stored geometries and rasters.
    pub async fn connect(database_url: &str, settings: PoolSettings, srid: i32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Connection failed: {}", e)))?;

        info!(
            min_connections = settings.min_connections,
            max_connections = settings.max_connections,
            "Connected to database"
        );

        Ok(Self { pool, srid })
    }

    /// Create extensions, tables and the summary view if missing.
    pub async fn migrate(&self) -> Result<()> {
        let schema = SCHEMA_SQL.replace("{srid}", &self.srid.to_string());

        // Split SQL statements and execute them individually
        for statement in schema.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::MigrationError(e.to_string()))?;
            }
        }

        debug!("Schema up to date");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Begin failed: {}", e)))?;
        Ok(Box::new(PgTransaction { tx, srid: self.srid }))
    }

    #[instrument(skip(self))]
    async fn optimize_storage(&self) -> Result<()> {
        for statement in OPTIMIZE_SQL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::OptimizeError(format!("{}: {}", statement, e)))?;
        }
        info!("Storage optimized");
        Ok(())
    }
}

/// One parcel's unit of work.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    srid: i32,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert_parcel(&mut self, parcel_id: &str, geometry_wkt: &str) -> Result<()> {
        sqlx::query("INSERT INTO plots (id, geom) VALUES ($1, ST_Multi(ST_GeomFromText($2, $3)))")
            .bind(parcel_id)
            .bind(geometry_wkt)
            .bind(self.srid)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false);
                if duplicate {
                    StorageError::DuplicateParcel(parcel_id.to_string())
                } else {
                    StorageError::DatabaseError(format!("Parcel insert failed: {}", e))
                }
            })?;
        Ok(())
    }

    async fn insert_products(&mut self, rows: &[RasterRow]) -> Result<u64> {
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let mut builder = products_insert(chunk, self.srid);
            let result = builder
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StorageError::DatabaseError(format!("Product insert failed: {}", e)))?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Rollback failed: {}", e)))
    }
}

/// Multi-row insert converting each blob server-side with
/// `ST_FromGDALRaster`.
fn products_insert(rows: &[RasterRow], srid: i32) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("INSERT INTO products (plot_id, product_name, rast, product_date) ");
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.parcel_id.as_str())
            .push_bind(row.index.as_str())
            .push("ST_FromGDALRaster(")
            .push_bind_unseparated(row.raster.as_slice())
            .push_unseparated(", ")
            .push_bind_unseparated(srid)
            .push_unseparated(")")
            .push_bind(row.product_date);
    });
    builder.push(" ON CONFLICT (plot_id, product_name, product_date) DO NOTHING");
    builder
}

/// Database schema SQL. `{srid}` is substituted before execution.
const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS postgis;
CREATE EXTENSION IF NOT EXISTS postgis_raster;

CREATE TABLE IF NOT EXISTS plots (
    id TEXT PRIMARY KEY,
    geom geometry(MultiPolygon, {srid}) NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id BIGSERIAL PRIMARY KEY,
    plot_id TEXT NOT NULL REFERENCES plots(id) ON DELETE CASCADE,
    product_name TEXT NOT NULL,
    rast raster NOT NULL,
    product_date DATE NOT NULL,

    UNIQUE(plot_id, product_name, product_date)
);

CREATE INDEX IF NOT EXISTS idx_products_plot_date ON products(plot_id, product_date);
CREATE INDEX IF NOT EXISTS idx_plots_geom ON plots USING gist (geom);

CREATE MATERIALIZED VIEW IF NOT EXISTS spectral_indices_stats AS
SELECT plot_id,
       product_name,
       product_date,
       (ST_SummaryStats(rast)).mean AS mean
FROM products
"#;

/// Post-batch maintenance, in order.
const OPTIMIZE_SQL: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_products_rast_convexhull ON public.products USING gist (ST_ConvexHull(rast))",
    "SELECT AddRasterConstraints('public'::name, 'products'::name, 'rast'::name, \
     'srid', 'pixel_types', 'num_bands', 'nodata_values', 'scale_x', 'scale_y')",
    "ANALYZE public.products",
    "REFRESH MATERIALIZED VIEW spectral_indices_stats",
];
