//! PostgreSQL loader for fhirbase.
//!
//! Resources flow from a [`ResourceSource`](fhirbase_bundle::ResourceSource)
//! through the transform engine into one table per resource type, using
//! one of two strategies:
//!
//! - [`CopyLoader`]: groups the stream into runs of one resource type and
//!   issues one `COPY ... FROM STDIN` per run
//! - [`InsertLoader`]: batched `INSERT ... ON CONFLICT (id) DO NOTHING`
//!
//! Both write through the [`LoadTarget`] trait. [`PgTarget`] is the
//! database implementation.
//!
//! # Example
//!
//! ```ignore
//! use fhirbase_bundle::{MultifileBundle, expand_paths};
//! use fhirbase_db_postgres::{LoadMode, PgTarget, PostgresConfig, create_pool, loader_for};
//! use fhirbase_transform::TransformEngine;
//!
//! let pool = create_pool(&PostgresConfig::default()).await?;
//! let mut target = PgTarget::new(pool);
//! let mut source = MultifileBundle::open(&expand_paths(&["./export"])?);
//! let mut loader = loader_for(LoadMode::Copy, TransformEngine::new(), "4.0.0", 2000);
//! loader.load(&mut target, &mut source, &mut |_, _| {}).await?;
//! ```

mod config;
mod error;
mod grouped;
mod loader;
mod pool;
mod postgres;
mod target;

pub use config::PostgresConfig;
pub use error::{LoaderError, Result, is_undefined_table};
pub use grouped::GroupedSource;
pub use loader::{
    CopyLoader, DEFAULT_BATCH_SIZE, InsertLoader, LoadMode, LoadOutcome, Loader,
    ParseLoadModeError, ProgressCallback, loader_for,
};
pub use pool::{create_pool, mask_password, test_connection};
pub use postgres::{PgTarget, copy_sql, encode_copy_row, insert_sql};
pub use target::{
    CopySource, InsertStatement, LOAD_COLUMNS, LOAD_STATUS, LOAD_TXID, LoadBatch, LoadRow,
    LoadTarget,
};
