//! Domain types shared across acquisition, storage and retrieval

pub mod acquisition;
pub mod profile;
pub mod search;

pub use acquisition::{AcquisitionTarget, TargetKind, TargetList};
pub use profile::{Attributes, CandidateProfile, ExtractedProfile, ExtractionBatch, ProfileStub};
pub use search::{RankingSource, ScoredProfile, SearchHit, SearchQuery, SearchResult};
