pub mod dates;
pub mod error;
pub mod storage;
pub mod types;

pub use error::Error;
pub use storage::{content_hash, ArticleStore};
pub use types::{
    ArticleRecord, DetailData, JobStatus, JobType, Pagination, ScrapeErrorKind, ScrapeStats,
    Sentiment, SourceConfig, SummaryRecord,
};

pub type Result<T> = std::result::Result<T, Error>;
