use foundation::{GeoBounds, Zoom};
use store::{ObjectStore, QueryId, StoreEvent};
use tracing::{debug, warn};

use crate::cache::FeatureCache;
use crate::config::LayerConfig;
use crate::sink::RenderSink;

/// Drives one layer's query lifecycle against the viewport.
///
/// Owns the cycle identity: every viewport update supersedes the
/// in-flight query, and arrivals from superseded queries are dropped
/// here, before they reach the cache. The cache itself only ever knows
/// about the current cycle.
pub struct LayerCoordinator<S, R> {
    cache: FeatureCache<S, R>,
    config: LayerConfig,
    current_query: Option<QueryId>,
    last_zoom: Option<Zoom>,
}

impl<S: ObjectStore, R: RenderSink> LayerCoordinator<S, R> {
    pub fn new(cache: FeatureCache<S, R>, config: LayerConfig) -> Self {
        Self {
            cache,
            config,
            current_query: None,
            last_zoom: None,
        }
    }

    pub fn cache(&self) -> &FeatureCache<S, R> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut FeatureCache<S, R> {
        &mut self.cache
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn is_loading(&self) -> bool {
        self.current_query.is_some()
    }

    /// Reacts to a viewport move or zoom: sheds out-of-view entries,
    /// propagates zoom changes, supersedes the in-flight query and
    /// issues the query for the current zoom band.
    pub fn update_view(&mut self, bounds: GeoBounds, zoom: Zoom) {
        if !self.config.in_band(zoom) {
            self.cache.hide_all(false);
            self.abort_query();
            return;
        }

        self.cache.evict_out_of_bounds(&bounds);

        if self.last_zoom != Some(zoom) {
            self.cache.on_zoom_changed(zoom);
            self.last_zoom = Some(zoom);
        }

        self.abort_query();

        let Some(ql) = self.config.query_for(zoom) else {
            return;
        };
        self.cache.start_cycle();
        let query = self.cache.store_mut().query(ql, bounds);
        self.current_query = Some(query);
    }

    fn abort_query(&mut self) {
        if let Some(query) = self.current_query.take() {
            self.cache.store_mut().cancel_query(query);
        }
    }

    /// One cooperative scheduling tick: pumps store events into the
    /// cache, routes query arrivals, then runs scheduled cache tasks.
    pub fn tick(&mut self) {
        for event in self.cache.pump() {
            match event {
                StoreEvent::Arrival { query, object } => {
                    if Some(query) == self.current_query {
                        self.cache.arrive(object);
                    } else {
                        debug!(?query, "dropping arrival from superseded query");
                    }
                }
                StoreEvent::QueryDone { query, result } => {
                    if Some(query) != self.current_query {
                        continue;
                    }
                    self.current_query = None;
                    if let Err(err) = result {
                        warn!(%err, "viewport query failed");
                    }
                    self.cache.end_cycle();
                }
                StoreEvent::Fetched { .. } => {}
            }
        }
        self.cache.tick();
    }
}

#[cfg(test)]
mod tests {
    use foundation::{GeoBounds, LatLon, ObjectId, Zoom};
    use store::{Geometry, MemoryStore, Object, ObjectStore};

    use super::LayerCoordinator;
    use crate::cache::FeatureCache;
    use crate::config::LayerConfig;
    use crate::evaluate::BasicEvaluator;
    use crate::sink::MemorySink;

    type TestCoordinator = LayerCoordinator<MemoryStore, MemorySink>;

    fn tree(num: u64, lat: f64, lon: f64) -> Object {
        Object::new(ObjectId::node(num), Geometry::Point(LatLon::new(lat, lon)))
            .with_tag("natural", "tree")
    }

    fn coordinator(store: MemoryStore, config: LayerConfig) -> TestCoordinator {
        let mut cache = FeatureCache::new(store, Box::new(BasicEvaluator::default()));
        cache.attach(MemorySink::new());
        LayerCoordinator::new(cache, config)
    }

    fn bounds(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> GeoBounds {
        GeoBounds::new(LatLon::new(min_lat, min_lon), LatLon::new(max_lat, max_lon))
    }

    #[test]
    fn query_cycle_populates_the_visible_set() {
        let mut store = MemoryStore::new();
        store.insert(tree(1, 0.1, 0.1));
        store.insert(tree(2, 0.2, 0.2));
        store.insert(tree(3, 40.0, 40.0));

        let mut coord = coordinator(store, LayerConfig::single_query("natural=tree"));
        coord.update_view(bounds(0.0, 0.0, 1.0, 1.0), Zoom(16));
        assert!(coord.is_loading());

        coord.tick();
        assert!(!coord.is_loading());
        let visible: Vec<ObjectId> = coord.cache().visible_ids().collect();
        assert_eq!(visible, vec![ObjectId::node(1), ObjectId::node(2)]);
    }

    #[test]
    fn out_of_band_zoom_hides_and_aborts() {
        let mut store = MemoryStore::new();
        store.insert(tree(1, 0.1, 0.1));

        let config = LayerConfig {
            min_zoom: 13,
            ..LayerConfig::single_query("*")
        };
        let mut coord = coordinator(store, config);

        coord.update_view(bounds(0.0, 0.0, 1.0, 1.0), Zoom(16));
        coord.tick();
        assert!(coord.cache().is_visible(ObjectId::node(1)));

        coord.update_view(bounds(0.0, 0.0, 1.0, 1.0), Zoom(12));
        assert!(!coord.is_loading());
        assert!(coord.cache().entry(ObjectId::node(1)).is_none());
        assert_eq!(coord.cache().store().pending_queries(), 0);
    }

    #[test]
    fn arrivals_from_a_stale_query_are_dropped() {
        let mut store = MemoryStore::new();
        store.insert(tree(1, 0.1, 0.1));
        let mut coord = coordinator(store, LayerConfig::single_query("*"));

        // A query the coordinator does not own streams in anyway (the
        // network raced an abort); its arrivals must not touch the cache.
        let view = bounds(0.0, 0.0, 1.0, 1.0);
        coord.cache_mut().store_mut().query("*", view);
        coord.tick();

        assert_eq!(coord.cache().visible_ids().count(), 0);
        assert!(!coord.is_loading());
    }

    #[test]
    fn new_view_supersedes_the_inflight_query() {
        let mut store = MemoryStore::new();
        store.set_stagger(true);
        store.insert(tree(1, 0.1, 0.1));
        store.insert(tree(2, 0.2, 0.2));

        let mut coord = coordinator(store, LayerConfig::single_query("*"));
        coord.update_view(bounds(0.0, 0.0, 1.0, 1.0), Zoom(16));
        coord.tick(); // first arrival of the first query

        // A pan supersedes the query mid-stream; the canceled remainder
        // never arrives and the new cycle's result wins.
        coord.update_view(bounds(0.0, 0.0, 0.15, 0.15), Zoom(16));
        coord.tick();
        coord.tick();
        coord.tick();

        let visible: Vec<ObjectId> = coord.cache().visible_ids().collect();
        assert_eq!(visible, vec![ObjectId::node(1)]);
        assert!(!coord.is_loading());
    }

    #[test]
    fn zoom_band_switches_the_query_text() {
        let mut store = MemoryStore::new();
        store.insert(tree(1, 0.1, 0.1));
        store.insert(
            Object::new(ObjectId::node(2), Geometry::Point(LatLon::new(0.2, 0.2)))
                .with_tag("natural", "water"),
        );

        let config: LayerConfig = serde_json::from_str(
            r#"{
                "query": {"13": "natural=tree", "16": "natural"},
                "min_zoom": 13
            }"#,
        )
        .unwrap();
        let mut coord = coordinator(store, config);
        let view = bounds(0.0, 0.0, 1.0, 1.0);

        coord.update_view(view, Zoom(13));
        coord.tick();
        let visible: Vec<ObjectId> = coord.cache().visible_ids().collect();
        assert_eq!(visible, vec![ObjectId::node(1)]);

        coord.update_view(view, Zoom(16));
        coord.tick();
        let visible: Vec<ObjectId> = coord.cache().visible_ids().collect();
        assert_eq!(visible, vec![ObjectId::node(1), ObjectId::node(2)]);
    }

    #[test]
    fn pan_evicts_out_of_view_entries_before_the_next_cycle() {
        let mut store = MemoryStore::new();
        store.insert(tree(1, 0.1, 0.1));

        let mut coord = coordinator(store, LayerConfig::single_query("*"));
        coord.update_view(bounds(0.0, 0.0, 1.0, 1.0), Zoom(16));
        coord.tick();
        assert!(coord.cache().is_visible(ObjectId::node(1)));

        // Pan far away with a slow store; the eviction happens
        // immediately, before the new query completes.
        coord.cache_mut().store_mut().set_latency(5);
        coord.update_view(bounds(50.0, 50.0, 51.0, 51.0), Zoom(16));
        assert!(!coord.cache().is_visible(ObjectId::node(1)));
        assert!(coord.is_loading());
    }
}
