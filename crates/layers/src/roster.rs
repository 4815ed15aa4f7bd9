use foundation::ObjectId;
use store::ObjectStore;

use crate::cache::FeatureCache;
use crate::events::EntryEvent;
use crate::sink::RenderSink;

/// One row of the roster: what a sidebar widget renders per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterItem {
    pub id: ObjectId,
    pub title: String,
    pub sign: Option<String>,
}

/// Ordered mirror of the shown entry set, fed from the cache's entry
/// events. Rows appear in arrival order; updates for unknown ids are
/// ignored, removals of unknown ids are no-ops.
#[derive(Debug, Default)]
pub struct EntryRoster {
    items: Vec<RosterItem>,
}

impl EntryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[RosterItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains the cache's entry events and mirrors them.
    pub fn sync<S: ObjectStore, R: RenderSink>(&mut self, cache: &mut FeatureCache<S, R>) {
        for event in cache.drain_events() {
            match event {
                EntryEvent::Added(id) => {
                    if self.position(id).is_none() {
                        if let Some(item) = roster_item(cache, id) {
                            self.items.push(item);
                        }
                    }
                }
                EntryEvent::Updated(id) => {
                    if let Some(index) = self.position(id) {
                        if let Some(item) = roster_item(cache, id) {
                            self.items[index] = item;
                        }
                    }
                }
                EntryEvent::Removed(id) => {
                    if let Some(index) = self.position(id) {
                        self.items.remove(index);
                    }
                }
            }
        }
    }

    fn position(&self, id: ObjectId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

fn roster_item<S: ObjectStore, R: RenderSink>(
    cache: &FeatureCache<S, R>,
    id: ObjectId,
) -> Option<RosterItem> {
    let entry = cache.entry(id)?;
    let presentation = entry.presentation.as_ref()?;
    Some(RosterItem {
        id,
        title: presentation.title.clone(),
        sign: presentation.sign.clone(),
    })
}

#[cfg(test)]
mod tests {
    use foundation::{LatLon, ObjectId};
    use pretty_assertions::assert_eq;
    use store::{Geometry, MemoryStore, Object};

    use super::EntryRoster;
    use crate::cache::{FeatureCache, PinOptions};
    use crate::evaluate::BasicEvaluator;
    use crate::sink::MemorySink;

    fn cache() -> FeatureCache<MemoryStore, MemorySink> {
        let mut cache = FeatureCache::new(MemoryStore::new(), Box::new(BasicEvaluator::default()));
        cache.attach(MemorySink::new());
        cache
    }

    fn named(num: u64, name: &str) -> Object {
        Object::new(
            ObjectId::node(num),
            Geometry::Point(LatLon::new(0.0, num as f64 / 100.0)),
        )
        .with_tag("name", name)
    }

    #[test]
    fn mirrors_arrivals_in_order() {
        let mut cache = cache();
        let mut roster = EntryRoster::new();

        cache.start_cycle();
        cache.arrive(named(2, "Beta"));
        cache.arrive(named(1, "Alpha"));
        cache.end_cycle();
        roster.sync(&mut cache);

        let titles: Vec<&str> = roster.items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Beta", "Alpha"]);
    }

    #[test]
    fn drops_rows_when_entries_disappear() {
        let mut cache = cache();
        let mut roster = EntryRoster::new();

        cache.start_cycle();
        cache.arrive(named(1, "Alpha"));
        cache.arrive(named(2, "Beta"));
        cache.end_cycle();
        roster.sync(&mut cache);
        assert_eq!(roster.len(), 2);

        cache.start_cycle();
        cache.arrive(named(2, "Beta"));
        cache.end_cycle();
        roster.sync(&mut cache);

        let titles: Vec<&str> = roster.items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Beta"]);
    }

    #[test]
    fn pin_only_entries_stay_off_the_roster() {
        let mut cache = cache();
        let mut roster = EntryRoster::new();

        let pin = cache.pin_object(named(9, "Hidden"), PinOptions::default());
        roster.sync(&mut cache);
        assert!(roster.is_empty());

        // Unpinning emits a removal for an id the roster never had.
        cache.unpin(pin);
        roster.sync(&mut cache);
        assert!(roster.is_empty());
    }

    #[test]
    fn updates_rewrite_titles_in_place() {
        let mut cache = cache();
        let mut roster = EntryRoster::new();

        cache.start_cycle();
        cache.arrive(named(1, "Alpha"));
        cache.end_cycle();
        roster.sync(&mut cache);

        cache.schedule_reevaluation(ObjectId::node(1));
        cache.tick();
        roster.sync(&mut cache);

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.items()[0].title, "Alpha");
    }
}
