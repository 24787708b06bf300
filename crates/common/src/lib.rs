//! Viewer Common Library
//!
//! Shared code for the viewer gateway and the download worker including:
//! - IIIF image and presentation url handling
//! - EAD archive trees
//! - Search index access
//! - Database models and repository patterns
//! - Bookmarks, comments, annotations, CMS pages and geo maps
//! - Download jobs and the TaskManager client
//! - Error types, configuration, authentication, caching and metrics

pub mod annotations;
pub mod auth;
pub mod bookmarks;
pub mod cache;
pub mod cms;
pub mod comments;
pub mod config;
pub mod db;
pub mod download;
pub mod ead;
pub mod errors;
pub mod geomap;
pub mod iiif;
pub mod metrics;
pub mod search;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::Repository;
pub use search::{SearchIndex, SolrDocument};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
