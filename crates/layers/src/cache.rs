use std::collections::{BTreeMap, BTreeSet};

use foundation::{GeoBounds, ObjectId, Zoom};
use runtime::{EventLog, TaskId, TickQueue};
use store::{FetchId, Object, ObjectStore, StoreError, StoreEvent};
use tracing::{debug, error, warn};

use crate::entry::FeatureEntry;
use crate::evaluate::{EvalContext, EvalError, PresentationEvaluator, PresentationResult};
use crate::events::EntryEvent;
use crate::marker;
use crate::sink::RenderSink;
use crate::symbology::Style;

/// Handle identifying one lookup request.
///
/// Abort through [`FeatureCache::abort_lookup`]; the ticket stays valid
/// (as a logged no-op) after the lookup completed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookupTicket(u64);

/// Handle identifying one pin request. Release through
/// [`FeatureCache::unpin`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinTicket(u64);

/// Terminal outcome of a lookup. Delivered exactly once per ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The object is available, from a live cache entry or a fresh fetch.
    /// No cache entry is created by the lookup itself.
    Ready(Object),
    Failed(StoreError),
    Aborted,
}

/// Style-variant additions requested by one pin.
///
/// Two pins with equal contents are still distinct requests; records are
/// tracked by ticket identity, not by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinOptions {
    pub variants: Vec<String>,
}

impl PinOptions {
    pub fn with_variants<I, T>(names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            variants: names.into_iter().map(Into::into).collect(),
        }
    }
}

pub type LookupCallback<S, R> = Box<dyn FnOnce(&mut FeatureCache<S, R>, LookupOutcome)>;

enum Task {
    ResolveCached(LookupTicket),
    Reevaluate(ObjectId),
}

struct Lookup<S, R> {
    id: ObjectId,
    callback: LookupCallback<S, R>,
}

struct PendingFetch {
    fetch: FetchId,
    waiters: Vec<LookupTicket>,
}

struct PinRecord {
    ticket: PinTicket,
    options: PinOptions,
}

enum PinState {
    Pending { lookup: LookupTicket, options: PinOptions },
    Active { id: ObjectId },
}

/// Per-layer feature visibility and lifecycle cache.
///
/// Tracks which objects are known and rendered, reconciles that set
/// against successive viewport query cycles, keeps reference-counted pin
/// requests alive independently of the viewport, and drives presentation
/// evaluation and render-sink updates. Single-threaded: asynchronous
/// completions arrive via [`FeatureCache::pump`] and
/// [`FeatureCache::tick`] on the embedding's logical thread.
pub struct FeatureCache<S, R> {
    store: S,
    sink: Option<R>,
    evaluator: Box<dyn PresentationEvaluator>,
    zoom: Zoom,
    /// Variants merged into every evaluation result unless the evaluator
    /// already defines them (the built-in `hover` style lives here).
    fallback_variants: BTreeMap<String, Style>,

    entries: BTreeMap<ObjectId, FeatureEntry>,
    visible: BTreeSet<ObjectId>,
    pins: BTreeMap<ObjectId, Vec<PinRecord>>,
    pin_states: BTreeMap<PinTicket, PinState>,

    lookups: BTreeMap<LookupTicket, Lookup<S, R>>,
    pending: BTreeMap<ObjectId, PendingFetch>,
    fetch_index: BTreeMap<FetchId, ObjectId>,

    tasks: TickQueue<Task>,
    debounce: BTreeMap<ObjectId, TaskId>,

    /// Ids seen since `start_cycle`, `None` outside a cycle.
    cycle: Option<BTreeSet<ObjectId>>,
    events: EventLog<EntryEvent>,

    next_lookup: u64,
    next_pin: u64,
}

impl<S: ObjectStore, R: RenderSink> FeatureCache<S, R> {
    pub fn new(store: S, evaluator: Box<dyn PresentationEvaluator>) -> Self {
        let mut fallback_variants = BTreeMap::new();
        fallback_variants.insert("hover".to_string(), Style::hover_default());

        Self {
            store,
            sink: None,
            evaluator,
            zoom: Zoom(0),
            fallback_variants,
            entries: BTreeMap::new(),
            visible: BTreeSet::new(),
            pins: BTreeMap::new(),
            pin_states: BTreeMap::new(),
            lookups: BTreeMap::new(),
            pending: BTreeMap::new(),
            fetch_index: BTreeMap::new(),
            tasks: TickQueue::new(),
            debounce: BTreeMap::new(),
            cycle: None,
            events: EventLog::new(),
            next_lookup: 0,
            next_pin: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn sink(&self) -> Option<&R> {
        self.sink.as_ref()
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn set_fallback_variant(&mut self, name: impl Into<String>, style: Style) {
        self.fallback_variants.insert(name.into(), style);
    }

    /// Attaches the render surface and re-shows every live entry.
    pub fn attach(&mut self, sink: R) {
        self.sink = Some(sink);
        let ids: Vec<ObjectId> = self.entries.keys().copied().collect();
        for id in ids {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.is_shown = true;
            }
            self.process_object(id);
        }
    }

    /// Releases every artifact and hands the render surface back.
    pub fn detach(&mut self) -> Option<R> {
        self.hide_all(true);
        self.sink.take()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn entry(&self, id: ObjectId) -> Option<&FeatureEntry> {
        self.entries.get(&id)
    }

    pub fn is_visible(&self, id: ObjectId) -> bool {
        self.visible.contains(&id)
    }

    pub fn is_pinned(&self, id: ObjectId) -> bool {
        self.pins.contains_key(&id)
    }

    pub fn visible_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.visible.iter().copied()
    }

    pub fn events(&self) -> &[EntryEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<EntryEvent> {
        self.events.drain()
    }

    // ---- viewport reconciliation ----

    /// Opens a query cycle: the current visible set becomes the removal
    /// candidates, and a fresh seen-set starts collecting arrivals.
    pub fn start_cycle(&mut self) {
        if self.cycle.is_some() {
            debug!("restarting query cycle before the previous one ended");
        }
        self.cycle = Some(BTreeSet::new());
    }

    /// Records the arrival of one object for the open cycle.
    pub fn arrive(&mut self, object: Object) {
        let id = object.id;
        match &mut self.cycle {
            Some(seen) => {
                seen.insert(id);
            }
            None => warn!(%id, "arrival outside an open query cycle"),
        }

        if self.visible.contains(&id) {
            return;
        }

        if self.entries.contains_key(&id) {
            // Pinned entry scrolled back into the viewport; already shown.
            self.visible.insert(id);
            self.events.emit(EntryEvent::Added(id));
            return;
        }

        match self.evaluate_object(&object) {
            Ok(result) => {
                let mut entry = FeatureEntry::new(object);
                entry.is_shown = true;
                self.entries.insert(id, entry);
                self.visible.insert(id);
                self.apply_presentation(id, result);
                self.events.emit(EntryEvent::Added(id));
            }
            Err(err) => {
                error!(%id, %err, "presentation evaluation failed during arrival; object skipped");
            }
        }
    }

    /// Closes the cycle: every id that was visible before but not seen
    /// during the cycle loses viewport membership. Pinned survivors stay
    /// alive in the pin table only.
    pub fn end_cycle(&mut self) {
        let Some(seen) = self.cycle.take() else {
            warn!("end_cycle without an open cycle");
            return;
        };

        let stale: Vec<ObjectId> = self
            .visible
            .iter()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();
        for id in stale {
            self.visible.remove(&id);
            if !self.pins.contains_key(&id) {
                self.unshow_and_drop(id);
            }
        }
    }

    /// Sheds visible entries whose geometry no longer intersects
    /// `region`, without waiting for the next query cycle.
    pub fn evict_out_of_bounds(&mut self, region: &GeoBounds) {
        let mut evicted: Vec<ObjectId> = Vec::new();
        for id in &self.visible {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            let Some(bounds) = entry.object.geometry.bounds() else {
                continue;
            };
            if !bounds.intersects(region) {
                evicted.push(*id);
            }
        }
        for id in evicted {
            self.visible.remove(&id);
            if !self.pins.contains_key(&id) {
                self.unshow_and_drop(id);
            }
        }
    }

    /// Empties the visible set. Pinned entries stay shown unless `force`
    /// is set, in which case their artifacts are released too (pin
    /// records survive; the next attach re-shows them).
    pub fn hide_all(&mut self, force: bool) {
        let visible: Vec<ObjectId> = std::mem::take(&mut self.visible).into_iter().collect();
        for id in visible {
            if self.pins.contains_key(&id) {
                if force {
                    self.unshow_keep(id);
                }
            } else {
                self.unshow_and_drop(id);
            }
        }
        if force {
            let remaining: Vec<ObjectId> = self.entries.keys().copied().collect();
            for id in remaining {
                self.unshow_keep(id);
            }
        }
    }

    /// Re-evaluates every live entry against the new zoom level without
    /// changing membership.
    pub fn on_zoom_changed(&mut self, zoom: Zoom) {
        self.zoom = zoom;
        let ids: Vec<ObjectId> = self.entries.keys().copied().collect();
        for id in ids {
            self.process_object(id);
        }
    }

    // ---- abortable lookup ----

    /// Resolves `id` to its object: from the live entry on the next tick
    /// when one exists, otherwise through a deduplicated store fetch.
    /// The callback fires exactly once.
    pub fn lookup(&mut self, id: ObjectId, callback: LookupCallback<S, R>) -> LookupTicket {
        let ticket = LookupTicket(self.next_lookup);
        self.next_lookup += 1;
        self.lookups.insert(ticket, Lookup { id, callback });

        if self.entries.contains_key(&id) {
            self.tasks.push(Task::ResolveCached(ticket));
        } else {
            self.begin_fetch(id, ticket);
        }
        ticket
    }

    /// Aborts a lookup. The callback fires with [`LookupOutcome::Aborted`]
    /// and the underlying fetch is canceled when no other waiter needs
    /// it. After completion this is a logged no-op.
    pub fn abort_lookup(&mut self, ticket: LookupTicket) -> bool {
        let Some(lookup) = self.lookups.remove(&ticket) else {
            warn!(?ticket, "abort called after lookup completion");
            return false;
        };

        let id = lookup.id;
        if let Some(pending) = self.pending.get_mut(&id) {
            pending.waiters.retain(|t| *t != ticket);
            if pending.waiters.is_empty() {
                let fetch = pending.fetch;
                self.pending.remove(&id);
                self.fetch_index.remove(&fetch);
                self.store.cancel_fetch(fetch);
            }
        }

        (lookup.callback)(self, LookupOutcome::Aborted);
        true
    }

    fn begin_fetch(&mut self, id: ObjectId, ticket: LookupTicket) {
        if let Some(pending) = self.pending.get_mut(&id) {
            debug!(%id, "lookup deduplicated onto in-flight fetch");
            pending.waiters.push(ticket);
            return;
        }
        let fetch = self.store.fetch(id);
        self.fetch_index.insert(fetch, id);
        self.pending.insert(
            id,
            PendingFetch {
                fetch,
                waiters: vec![ticket],
            },
        );
    }

    fn resolve_fetch(&mut self, fetch: FetchId, result: Result<Object, StoreError>) {
        let Some(id) = self.fetch_index.remove(&fetch) else {
            return;
        };
        let Some(pending) = self.pending.remove(&id) else {
            return;
        };
        for ticket in pending.waiters {
            let Some(lookup) = self.lookups.remove(&ticket) else {
                continue;
            };
            let outcome = match &result {
                Ok(object) => LookupOutcome::Ready(object.clone()),
                Err(err) => LookupOutcome::Failed(err.clone()),
            };
            (lookup.callback)(self, outcome);
        }
    }

    // ---- pinning ----

    /// Pins `id` shown regardless of viewport membership. Asynchronous:
    /// the object is looked up first (see [`FeatureCache::lookup`]);
    /// unpinning before resolution aborts the lookup.
    pub fn pin(&mut self, id: ObjectId, options: PinOptions) -> PinTicket {
        let ticket = PinTicket(self.next_pin);
        self.next_pin += 1;

        let lookup = self.lookup(
            id,
            Box::new(move |cache, outcome| match outcome {
                LookupOutcome::Ready(object) => {
                    if matches!(cache.pin_states.get(&ticket), Some(PinState::Pending { .. })) {
                        cache.activate_pin(ticket, object);
                    }
                }
                LookupOutcome::Failed(err) => {
                    warn!(%id, %err, "pin lookup failed");
                    cache.pin_states.remove(&ticket);
                }
                LookupOutcome::Aborted => {
                    cache.pin_states.remove(&ticket);
                }
            }),
        );
        self.pin_states
            .insert(ticket, PinState::Pending { lookup, options });
        ticket
    }

    /// Synchronous pin for a caller that already holds the object.
    pub fn pin_object(&mut self, object: Object, options: PinOptions) -> PinTicket {
        let ticket = PinTicket(self.next_pin);
        self.next_pin += 1;
        self.activate(ticket, object, options);
        ticket
    }

    /// Releases one pin. Identity-based: only the record issued with this
    /// ticket is removed. Emptying the option list unshows the entry
    /// unless it is still viewport-visible (soft downgrade). Stale
    /// tickets are a logged no-op.
    pub fn unpin(&mut self, ticket: PinTicket) {
        match self.pin_states.remove(&ticket) {
            None => warn!(?ticket, "stale unpin ignored"),
            Some(PinState::Pending { lookup, .. }) => {
                debug!(?ticket, "unpin before pin resolution; aborting lookup");
                self.abort_lookup(lookup);
            }
            Some(PinState::Active { id }) => {
                let emptied = match self.pins.get_mut(&id) {
                    Some(records) => {
                        records.retain(|r| r.ticket != ticket);
                        records.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.pins.remove(&id);
                    if self.visible.contains(&id) {
                        self.process_object(id);
                    } else {
                        self.unshow_and_drop(id);
                    }
                } else {
                    self.process_object(id);
                }
            }
        }
    }

    fn activate_pin(&mut self, ticket: PinTicket, object: Object) {
        let options = match self.pin_states.remove(&ticket) {
            Some(PinState::Pending { options, .. }) => options,
            Some(state @ PinState::Active { .. }) => {
                self.pin_states.insert(ticket, state);
                return;
            }
            None => return,
        };
        self.activate(ticket, object, options);
    }

    fn activate(&mut self, ticket: PinTicket, object: Object, options: PinOptions) {
        let id = object.id;
        self.entries
            .entry(id)
            .or_insert_with(|| FeatureEntry::new(object));
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.is_shown = true;
        }
        self.pins
            .entry(id)
            .or_default()
            .push(PinRecord { ticket, options });
        self.pin_states.insert(ticket, PinState::Active { id });
        self.process_object(id);
    }

    // ---- debounced re-evaluation ----

    /// Coalesces re-evaluation requests: at most one evaluation of `id`
    /// runs per tick no matter how often this is called before the tick
    /// fires. A dead id at fire time is silently dropped.
    pub fn schedule_reevaluation(&mut self, id: ObjectId) {
        if self.debounce.contains_key(&id) {
            return;
        }
        let task = self.tasks.push(Task::Reevaluate(id));
        self.debounce.insert(id, task);
    }

    // ---- pumping ----

    /// Runs every task scheduled before this call. Call once per
    /// scheduling tick.
    pub fn tick(&mut self) {
        for (task_id, task) in self.tasks.drain_batch() {
            match task {
                Task::Reevaluate(id) => {
                    if self.debounce.get(&id) == Some(&task_id) {
                        self.debounce.remove(&id);
                    }
                    if self.entries.contains_key(&id) {
                        self.process_object(id);
                    }
                }
                Task::ResolveCached(ticket) => {
                    let Some(lookup) = self.lookups.remove(&ticket) else {
                        continue;
                    };
                    let cached = self.entries.get(&lookup.id).map(|e| e.object.clone());
                    match cached {
                        Some(object) => (lookup.callback)(self, LookupOutcome::Ready(object)),
                        None => {
                            // Entry died before the tick fired; fall
                            // through to a real fetch.
                            let id = lookup.id;
                            self.lookups.insert(ticket, lookup);
                            self.begin_fetch(id, ticket);
                        }
                    }
                }
            }
        }
    }

    /// Polls the store: fetch completions are consumed here, query
    /// events are returned for the coordinator to route.
    pub fn pump(&mut self) -> Vec<StoreEvent> {
        let mut unrouted = Vec::new();
        for event in self.store.poll() {
            match event {
                StoreEvent::Fetched { fetch, result } => self.resolve_fetch(fetch, result),
                other => unrouted.push(other),
            }
        }
        unrouted
    }

    // ---- presentation ----

    fn evaluate_object(&self, object: &Object) -> Result<PresentationResult, EvalError> {
        let ctx = EvalContext::for_object(object, self.zoom);
        let mut result = self.evaluator.evaluate(&ctx)?;
        for (name, style) in &self.fallback_variants {
            result
                .variants
                .entry(name.clone())
                .or_insert_with(|| style.clone());
        }
        Ok(result)
    }

    /// Variant names to show right now: the evaluator's active set plus
    /// every variant requested by an outstanding pin, order-preserving.
    fn merged_active(&self, id: ObjectId, result: &PresentationResult) -> Vec<String> {
        let mut active = result.active.clone();
        if let Some(records) = self.pins.get(&id) {
            for record in records {
                for name in &record.options.variants {
                    if !active.contains(name) {
                        active.push(name.clone());
                    }
                }
            }
        }
        active
    }

    fn process_object(&mut self, id: ObjectId) {
        let Some(entry) = self.entries.get(&id) else {
            return;
        };
        match self.evaluate_object(&entry.object) {
            Ok(result) => self.apply_presentation(id, result),
            Err(err) => {
                error!(%id, %err, "presentation evaluation failed; keeping previous presentation");
            }
        }
    }

    fn apply_presentation(&mut self, id: ObjectId, result: PresentationResult) {
        let active = self.merged_active(id, &result);
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        if let Some(sink) = self.sink.as_mut() {
            for (name, style) in &result.variants {
                match entry.shapes.get(name) {
                    Some(artifact) => sink.update_shape(*artifact, style),
                    None => {
                        let artifact = sink.create_shape(id, name, style);
                        entry.shapes.insert(name.clone(), artifact);
                    }
                }
            }

            if entry.is_shown {
                for name in &active {
                    if !entry.applied.contains(name)
                        && let Some(artifact) = entry.shapes.get(name)
                    {
                        sink.add_to_view(*artifact);
                    }
                }
                for name in &entry.applied {
                    if !active.contains(name)
                        && let Some(artifact) = entry.shapes.get(name)
                    {
                        sink.remove_from_view(*artifact);
                    }
                }
                entry.applied = active;
            }

            if let Some(at) = entry.object.geometry.center()
                && let Some(spec) =
                    marker::marker_spec(at, result.marker.as_ref(), result.sign.as_deref())
            {
                match entry.marker {
                    Some(artifact) => sink.update_marker(artifact, &spec),
                    None => {
                        let artifact = sink.create_marker(id, &spec);
                        entry.marker = Some(artifact);
                        if entry.is_shown {
                            sink.add_to_view(artifact);
                        }
                    }
                }
            }

            let html = format!("<h1>{}</h1>{}", result.title, result.body);
            match entry.popup {
                Some(artifact) => sink.set_popup_content(artifact, &html),
                None => {
                    let artifact = sink.create_popup(id);
                    sink.set_popup_content(artifact, &html);
                    entry.popup = Some(artifact);
                }
            }
        }

        entry.presentation = Some(result);
        self.events.emit(EntryEvent::Updated(id));
    }

    // ---- teardown ----

    fn unshow_and_drop(&mut self, id: ObjectId) {
        let Some(mut entry) = self.entries.remove(&id) else {
            return;
        };
        self.release_artifacts(&mut entry);
        self.events.emit(EntryEvent::Removed(id));
    }

    fn unshow_keep(&mut self, id: ObjectId) {
        let Some(mut entry) = self.entries.remove(&id) else {
            return;
        };
        if entry.is_shown {
            self.release_artifacts(&mut entry);
            self.events.emit(EntryEvent::Removed(id));
        }
        self.entries.insert(id, entry);
    }

    fn release_artifacts(&mut self, entry: &mut FeatureEntry) {
        if let Some(sink) = self.sink.as_mut() {
            for (_, artifact) in std::mem::take(&mut entry.shapes) {
                sink.remove_from_view(artifact);
                sink.destroy(artifact);
            }
            if let Some(artifact) = entry.marker.take() {
                sink.remove_from_view(artifact);
                sink.destroy(artifact);
            }
            if let Some(artifact) = entry.popup.take() {
                sink.destroy(artifact);
            }
        } else {
            entry.shapes.clear();
            entry.marker = None;
            entry.popup = None;
        }
        entry.applied.clear();
        entry.is_shown = false;
    }
}
