//! Filmsync ETL Library
//!
//! Incremental synchronization of the movie catalog from PostgreSQL
//! into Elasticsearch.
//!
//! # Overview
//!
//! The pipeline runs on a fixed cadence and moves change data through
//! four stages:
//!
//! - **State Store**: one durable watermark slot marking the last
//!   successfully processed modification time
//! - **Extractor**: per-kind queries (movies, genres, persons) that
//!   denormalize child relations into JSON rows, full or incremental
//!   depending on the watermark
//! - **Transformer**: per-kind decoders that validate row shape and
//!   derive the role projections, dropping (not failing on) bad rows
//! - **Loader**: index bootstrap plus one `_bulk` upsert per run
//!
//! Connectivity failures on either side are retried with exponential
//! backoff; anything that still fails ends the run without touching the
//! watermark, so the next run replays the same window.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use filmsync_etl::config::Config;
//! use filmsync_etl::extract::PgExtractor;
//! use filmsync_etl::load::EsLoader;
//! use filmsync_etl::pipeline::EtlPipeline;
//! use filmsync_etl::state::FileWatermarkStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let connect_timeout = Duration::from_secs(config.etl.connect_timeout_secs);
//!
//!     let pipeline = EtlPipeline::new(
//!         PgExtractor::new(config.database.url, connect_timeout),
//!         EsLoader::new(config.elasticsearch.url, connect_timeout),
//!         FileWatermarkStore::new(config.etl.state_path),
//!         Duration::from_secs(config.etl.poll_interval_secs),
//!     );
//!     pipeline.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod extract;
pub mod load;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod state;
pub mod transform;
