//! Dual Cache - a two-tier TTL cache for application data
//!
//! Values live in an optional remote store and in an in-process store.
//! Reads prefer the remote and fall back to local; writes go to both.
//! A memoizer and a lazy pager sit on top of the manager.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod memo;
pub mod models;
pub mod pager;
pub mod tasks;

pub use api::AppState;
pub use backend::{Backend, NoopRemote, RemoteAdapter, RemoteStore};
pub use cache::{KeyCodec, LocalStore, StatsSnapshot};
pub use config::Config;
pub use error::{BackendError, CacheError, Result};
pub use manager::{CacheManager, CacheManagerBuilder};
pub use memo::Memoizer;
pub use pager::{DataSource, FetchResult, Filters, LazyPager, Page, PagerState};
pub use tasks::spawn_cleanup_task;

#[cfg(feature = "redis")]
pub use backend::RedisStore;
