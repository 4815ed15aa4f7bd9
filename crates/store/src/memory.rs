use std::collections::{BTreeMap, VecDeque};

use foundation::{GeoBounds, ObjectId};

use crate::error::StoreError;
use crate::object::Object;
use crate::store::{FetchId, ObjectStore, QueryId, StoreEvent};

/// Tag filter understood by [`MemoryStore`] queries.
///
/// `*` (or empty) matches everything, `key=value` matches tag equality,
/// a bare word matches tag presence. Real query languages live behind
/// other backends; this is just enough to drive layers deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryFilter {
    All,
    Has(String),
    Eq { key: String, value: String },
}

fn parse_filter(ql: &str) -> QueryFilter {
    let ql = ql.trim();
    if ql.is_empty() || ql == "*" {
        return QueryFilter::All;
    }
    match ql.split_once('=') {
        Some((key, value)) => QueryFilter::Eq {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        },
        None => QueryFilter::Has(ql.to_string()),
    }
}

fn filter_matches(filter: &QueryFilter, object: &Object) -> bool {
    match filter {
        QueryFilter::All => true,
        QueryFilter::Has(key) => object.tags.contains_key(key),
        QueryFilter::Eq { key, value } => object.tag(key) == Some(value.as_str()),
    }
}

#[derive(Debug)]
struct InFlightFetch {
    id: FetchId,
    target: ObjectId,
    due_in: u32,
}

#[derive(Debug)]
struct InFlightQuery {
    id: QueryId,
    matches: VecDeque<Object>,
    due_in: u32,
}

/// Deterministic in-memory object store.
///
/// Objects are keyed in a `BTreeMap` so query arrival order is stable.
/// Delivery latency is expressed in polls; with `stagger` enabled a query
/// delivers one arrival per poll, which makes out-of-order and
/// superseded-query scenarios easy to stage in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: BTreeMap<ObjectId, Object>,
    latency: u32,
    stagger: bool,
    next_fetch: u64,
    next_query: u64,
    fetches: Vec<InFlightFetch>,
    queries: Vec<InFlightQuery>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose deliveries are delayed by `latency` polls.
    pub fn with_latency(latency: u32) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn set_latency(&mut self, latency: u32) {
        self.latency = latency;
    }

    /// One query arrival per poll instead of the whole result set at once.
    pub fn set_stagger(&mut self, stagger: bool) {
        self.stagger = stagger;
    }

    pub fn insert(&mut self, object: Object) {
        self.objects.insert(object.id, object);
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Object> {
        self.objects.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn pending_fetches(&self) -> usize {
        self.fetches.len()
    }

    pub fn pending_queries(&self) -> usize {
        self.queries.len()
    }
}

impl ObjectStore for MemoryStore {
    fn fetch(&mut self, id: ObjectId) -> FetchId {
        let fetch = FetchId(self.next_fetch);
        self.next_fetch += 1;
        self.fetches.push(InFlightFetch {
            id: fetch,
            target: id,
            due_in: self.latency,
        });
        fetch
    }

    fn cancel_fetch(&mut self, fetch: FetchId) -> bool {
        let before = self.fetches.len();
        self.fetches.retain(|f| f.id != fetch);
        self.fetches.len() != before
    }

    fn query(&mut self, ql: &str, bounds: GeoBounds) -> QueryId {
        let query = QueryId(self.next_query);
        self.next_query += 1;

        let filter = parse_filter(ql);
        let matches: VecDeque<Object> = self
            .objects
            .values()
            .filter(|ob| ob.intersects(&bounds) && filter_matches(&filter, ob))
            .cloned()
            .collect();

        self.queries.push(InFlightQuery {
            id: query,
            matches,
            due_in: self.latency,
        });
        query
    }

    fn cancel_query(&mut self, query: QueryId) -> bool {
        let before = self.queries.len();
        self.queries.retain(|q| q.id != query);
        self.queries.len() != before
    }

    fn poll(&mut self) -> Vec<StoreEvent> {
        let mut out = Vec::new();

        let mut i = 0;
        while i < self.fetches.len() {
            if self.fetches[i].due_in > 0 {
                self.fetches[i].due_in -= 1;
                i += 1;
                continue;
            }
            let fetch = self.fetches.remove(i);
            let result = self
                .objects
                .get(&fetch.target)
                .cloned()
                .ok_or(StoreError::NotFound(fetch.target));
            out.push(StoreEvent::Fetched {
                fetch: fetch.id,
                result,
            });
        }

        let mut i = 0;
        while i < self.queries.len() {
            let query = &mut self.queries[i];
            if query.due_in > 0 {
                query.due_in -= 1;
                i += 1;
                continue;
            }
            if self.stagger {
                match query.matches.pop_front() {
                    Some(object) => {
                        out.push(StoreEvent::Arrival {
                            query: query.id,
                            object,
                        });
                        i += 1;
                    }
                    None => {
                        let query = self.queries.remove(i);
                        out.push(StoreEvent::QueryDone {
                            query: query.id,
                            result: Ok(()),
                        });
                    }
                }
            } else {
                let mut query = self.queries.remove(i);
                while let Some(object) = query.matches.pop_front() {
                    out.push(StoreEvent::Arrival {
                        query: query.id,
                        object,
                    });
                }
                out.push(StoreEvent::QueryDone {
                    query: query.id,
                    result: Ok(()),
                });
            }
        }

        out
    }
}
