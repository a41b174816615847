//! Job postings feed: a Parse-backed data source, a job list controller with
//! a cancellable remote search, and the posting model.

pub mod api;
pub mod config;
pub mod controller;
pub mod models;

pub use api::{HttpJobSource, JobSource};
pub use config::{Config, ConfigError, Overrides};
pub use controller::{JobListController, JobListView, LoadState, SearchState, MIN_SEARCH_LEN};
pub use models::{Company, DateEnvelope, DetailTarget, EmploymentType, Job, Recency};
