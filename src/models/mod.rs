//! Data models for PriceScout.

mod candidate;
mod hospital;
mod price_file;

pub use candidate::{CandidateLink, CrawledPage, DownloadedFile, SearchHit};
pub use hospital::{Hospital, SearchStatus};
pub use price_file::{FileType, PriceFile};
