//! SE2 API client library.
//!
//! This crate talks to the upstream SE2 campaign system. It supports:
//!
//! - Paged listing of tasks, task logs and accounts
//! - Per-task metadata lookups
//! - Session cookie refresh with a single retry on failure
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use se2_client::{FileCredentialStore, Se2Client, Se2Config, TaskFilter};
//!
//! # async fn example() -> Result<(), se2_client::Se2Error> {
//! let config = Se2Config::new("https://se2.example.com");
//! let store = Arc::new(FileCredentialStore::new(&config.cookie_path));
//! let client = Se2Client::new(config, store)?;
//!
//! match client.fetch_tasks(TaskFilter::All).await {
//!     Some(tasks) => println!("{} tasks upstream", tasks.len()),
//!     None => eprintln!("task listing unavailable"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod source;
pub mod types;

pub use client::Se2Client;
pub use config::Se2Config;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::Se2Error;
pub use source::RemoteSource;
pub use types::{Paged, TaskFilter, TaskMetadata};
