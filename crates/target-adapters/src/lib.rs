//! Narrow, mockable adapters for the side effects fault modules and
//! remediation steps actually perform: container lifecycle, PostgreSQL,
//! outbound HTTP, and the target's environment-variable file.
//!
//! Every adapter is a small trait plus one real implementation and one
//! in-memory fake (under `fakes`), matching the source stack's pattern of
//! defining an interface at every I/O seam so the engine and workflow can be
//! unit tested without a live Docker daemon, Postgres instance, or target
//! process.

pub mod container;
pub mod db;
pub mod fakes;
pub mod file;
pub mod http;

pub use container::{ContainerAdapter, ContainerStatus, DockerCliContainerAdapter};
pub use db::{DbAdapter, LockKind, PgDbAdapter};
pub use file::{FileAdapter, LocalFileAdapter};
pub use http::{FloodStats, HttpAdapter, ReqwestHttpAdapter, ResponseClass};
