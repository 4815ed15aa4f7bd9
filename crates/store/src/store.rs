use foundation::{GeoBounds, ObjectId};

use crate::error::StoreError;
use crate::object::Object;

/// Handle for an in-flight single-object fetch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchId(pub u64);

/// Handle for an in-flight viewport query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryId(pub u64);

/// Completions and arrivals pulled from a store via [`ObjectStore::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Fetched {
        fetch: FetchId,
        result: Result<Object, StoreError>,
    },
    Arrival {
        query: QueryId,
        object: Object,
    },
    QueryDone {
        query: QueryId,
        result: Result<(), StoreError>,
    },
}

/// Abortable object source, keyed by id and by viewport query.
///
/// Completion is pull-based: the embedding pumps [`ObjectStore::poll`] on
/// its logical thread and routes the events, so all consumer state stays
/// single-threaded and cooperative. A canceled fetch or query emits no
/// further events.
pub trait ObjectStore {
    fn fetch(&mut self, id: ObjectId) -> FetchId;

    /// Returns `true` if the fetch was still in flight.
    fn cancel_fetch(&mut self, fetch: FetchId) -> bool;

    /// Starts a streaming viewport query. Matching objects arrive as
    /// [`StoreEvent::Arrival`]s followed by one [`StoreEvent::QueryDone`].
    fn query(&mut self, ql: &str, bounds: GeoBounds) -> QueryId;

    /// Returns `true` if the query was still in flight.
    fn cancel_query(&mut self, query: QueryId) -> bool;

    fn poll(&mut self) -> Vec<StoreEvent>;
}
