pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod playlist;
pub mod runner;

pub use config::ExportConfig;
pub use error::ExportError;
pub use job::{ExportJob, ExportRequest, JobStatus, PlaybackMode};
pub use manager::ExportManager;
pub use playlist::PlaylistSource;
