//! Client-side access layer for the CREDO protein-ligand interaction
//! database: typed entities, adaptors that compose filtered queries, and
//! chemistry searches delegated to the database cartridges.

pub mod adaptor;
pub mod bitmask;
pub mod chem;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod pagination;
pub mod path;
pub mod query;
pub mod sql;

pub use adaptor::{AdaptorOptions, FetchArgs, Fetched};
pub use config::{CredoConfig, Schema};
pub use db::{Capability, Credo};
pub use error::{CredoError, Result};
pub use pagination::Pagination;
pub use query::{Query, Scored};
