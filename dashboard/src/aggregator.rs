use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use veriflow_types::{RequestDescriptor, RequestStatus, Timestamp};

/// The dashboard tabs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusFilter {
    /// Nobody has started the request.
    New,
    /// Work has started but the request is not finished.
    Pending,
    Completed,
    /// Failed, or past its deadline without completing.
    FailedExpired,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 4] = [
        StatusFilter::New,
        StatusFilter::Pending,
        StatusFilter::Completed,
        StatusFilter::FailedExpired,
    ];
}

/// Which tab a descriptor belongs in at `now`.
///
/// A completed request stays under completed after its deadline; any other
/// request past its deadline counts as failed-expired.
pub fn bucket_of(descriptor: &RequestDescriptor, now: Timestamp) -> StatusFilter {
    match descriptor.status {
        RequestStatus::Completed => StatusFilter::Completed,
        RequestStatus::Failed => StatusFilter::FailedExpired,
        _ if descriptor.is_expired(now) => StatusFilter::FailedExpired,
        RequestStatus::Pending => StatusFilter::New,
        RequestStatus::InProgress
        | RequestStatus::Assigned
        | RequestStatus::InReview
        | RequestStatus::RequiresInfo => StatusFilter::Pending,
    }
}

/// The descriptors in one tab, in their original order.
pub fn filter<'a>(
    requests: &'a [RequestDescriptor],
    tab: StatusFilter,
    now: Timestamp,
) -> Vec<&'a RequestDescriptor> {
    requests
        .iter()
        .filter(|r| bucket_of(r, now) == tab)
        .collect()
}

/// Per-tab counts for the summary cards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub new: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed_expired: usize,
}

impl BucketCounts {
    pub fn get(&self, tab: StatusFilter) -> usize {
        match tab {
            StatusFilter::New => self.new,
            StatusFilter::Pending => self.pending,
            StatusFilter::Completed => self.completed,
            StatusFilter::FailedExpired => self.failed_expired,
        }
    }

    pub fn total(&self) -> usize {
        self.new + self.pending + self.completed + self.failed_expired
    }
}

pub fn counts(requests: &[RequestDescriptor], now: Timestamp) -> BucketCounts {
    requests
        .iter()
        .fold(BucketCounts::default(), |mut acc, r| {
            match bucket_of(r, now) {
                StatusFilter::New => acc.new += 1,
                StatusFilter::Pending => acc.pending += 1,
                StatusFilter::Completed => acc.completed += 1,
                StatusFilter::FailedExpired => acc.failed_expired += 1,
            }
            acc
        })
}

/// Most urgent first, then soonest deadline. Requests without a priority
/// (system checks) sort after every prioritised one. Stable for ties.
pub fn sort_by_priority(requests: &mut [&RequestDescriptor]) {
    requests.sort_by_key(|r| (Reverse(r.priority()), r.expires_at));
}

/// What a tab renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DashboardView {
    /// Nothing has been fetched yet.
    Loading,
    /// Fetched, but the tab has no requests.
    Empty,
    Ready(Vec<RequestDescriptor>),
}

/// The subject's request collection as last fetched.
#[derive(Clone, Debug, Default)]
pub struct Dashboard {
    requests: Option<Vec<RequestDescriptor>>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the collection with a fresh listing.
    pub fn load(&mut self, requests: Vec<RequestDescriptor>) {
        tracing::debug!(count = requests.len(), "dashboard refreshed");
        self.requests = Some(requests);
    }

    pub fn is_loaded(&self) -> bool {
        self.requests.is_some()
    }

    pub fn view(&self, tab: StatusFilter, now: Timestamp) -> DashboardView {
        let Some(requests) = &self.requests else {
            return DashboardView::Loading;
        };
        let matching: Vec<RequestDescriptor> =
            filter(requests, tab, now).into_iter().cloned().collect();
        if matching.is_empty() {
            DashboardView::Empty
        } else {
            DashboardView::Ready(matching)
        }
    }

    /// `None` until the first load.
    pub fn counts(&self, now: Timestamp) -> Option<BucketCounts> {
        self.requests.as_deref().map(|r| counts(r, now))
    }
}
