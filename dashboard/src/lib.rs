//! Dashboard aggregation.
//!
//! Groups request descriptors into the four dashboard tabs and counts them.
//! An expired request is shown as failed no matter what its recorded status
//! says, unless it already completed.

pub mod aggregator;

pub use aggregator::{
    bucket_of, counts, filter, sort_by_priority, BucketCounts, Dashboard, DashboardView,
    StatusFilter,
};
