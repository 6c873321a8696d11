//! The news desk: the single-threaded world the event loop drives.
//!
//! The desk owns every chyron, producer, the lane manager, and the poller
//! registry. The runtime feeds it three things: the 100 ms tick, reporter
//! signals drained from the signal channel, and completed HTTP fetches for
//! its pollers; the desk hands back fetch jobs to issue and paint specs to
//! render. All cross-component calls (dashboard reflows suspending
//! members, producers filing headlines) happen synchronously inside these
//! entry points.

pub mod dragdrop;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use core_anim::GroupId;
use core_chyron::{Chyron, ChyronEvent, TICK_INTERVAL_MS};
use core_headline::fit::FontMetrics;
use core_headline::{Headline, HeadlinePaint};
use core_lane::{ChyronControl, LaneManager, ShiftHandle, UnsubscribeAction};
use core_poller::transport::HttpRequest;
use core_poller::{PollerRegistry, REQUEST_PUMP_INTERVAL_MS};
use core_producer::{ChyronHandle, Producer, ProducerError};
use core_reporter::{Reporter, ReporterSignal};
use core_settings::Document;
use core_story::persist;
use core_story::{StoryInfo, StyleList, fix_identity_duplication};
use core_types::{ChyronId, DisplayGeometry, FontSpec, HeadlineId, ProducerId, Vector};

pub use core_chyron::ChyronState;

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error(transparent)]
    Story(#[from] core_story::StoryError),
    #[error(transparent)]
    Coverage(#[from] ProducerError),
    #[error("unknown producer")]
    UnknownProducer,
}

/// One HTTP request the runtime should perform for a poller.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub poller_url: String,
    pub request: HttpRequest,
    pub auth: Option<(String, String)>,
}

struct ProducerEntry {
    producer: Producer,
    chyron: ChyronId,
}

/// Adapter giving one chyron to a producer, buffering teardown events.
struct SingleChyron<'a> {
    chyron: &'a mut Chyron,
    now: u64,
    events: Vec<ChyronEvent>,
}

impl ChyronHandle for SingleChyron<'_> {
    fn display(&mut self) {
        self.chyron.display();
    }

    fn hide(&mut self) {
        let events = self.chyron.hide();
        self.events.extend(events);
    }

    fn shelve(&mut self) {
        self.chyron.shelve();
    }

    fn file_headline(&mut self, headline: Headline) -> Option<HeadlineId> {
        self.chyron.file_headline(headline).ok()
    }

    fn highlight_headline(&mut self, headline: HeadlineId, opacity: f64, timeout_ms: u64) {
        self.chyron
            .highlight_headline(headline, opacity, timeout_ms, self.now);
    }
}

/// Adapter giving the chyron collection to the lane manager's dashboards.
struct ChyronHost<'a> {
    chyrons: &'a mut HashMap<ChyronId, Chyron>,
    now: u64,
    /// Chyrons fully removed from their lane, with their teardown events.
    removed: Vec<(ChyronId, Vec<ChyronEvent>)>,
}

impl ChyronControl for ChyronHost<'_> {
    fn suspend(&mut self, chyron: ChyronId) {
        if let Some(c) = self.chyrons.get_mut(&chyron) {
            c.suspend();
        }
    }

    fn resume(&mut self, chyron: ChyronId) {
        if let Some(c) = self.chyrons.get_mut(&chyron) {
            c.resume();
        }
    }

    fn shift_deferred(&mut self, chyron: ChyronId, vector: Vector) -> Option<ShiftHandle> {
        let c = self.chyrons.get_mut(&chyron)?;
        c.shift_by(vector, false, self.now).map(|g| (chyron, g))
    }

    fn start_shift(&mut self, handle: ShiftHandle, now: u64) -> bool {
        self.chyrons
            .get_mut(&handle.0)
            .is_some_and(|c| c.start_shift(handle.1, now))
    }

    fn unsubscribed(&mut self, chyron: ChyronId) {
        if let Some(c) = self.chyrons.get_mut(&chyron) {
            let events = c.unsubscribed();
            self.removed.push((chyron, events));
        }
    }
}

pub struct NewsDesk {
    displays: Arc<dyn DisplayGeometry>,
    metrics: Box<dyn FontMetrics>,
    lane_manager: LaneManager,
    chyrons: HashMap<ChyronId, Chyron>,
    producers: HashMap<ProducerId, ProducerEntry>,
    pollers: PollerRegistry,
    style_list: Rc<RefCell<StyleList>>,
    signal_tx: UnboundedSender<ReporterSignal>,
    next_chyron: u64,
    next_producer: u64,
}

impl NewsDesk {
    pub fn new(
        displays: Arc<dyn DisplayGeometry>,
        metrics: Box<dyn FontMetrics>,
        style_list: StyleList,
        header_font: FontSpec,
        signal_tx: UnboundedSender<ReporterSignal>,
    ) -> Self {
        let header_stylesheet = style_list.default_style().stylesheet.clone();
        Self {
            lane_manager: LaneManager::new(displays.clone(), header_font, header_stylesheet),
            displays,
            metrics,
            chyrons: HashMap::new(),
            producers: HashMap::new(),
            pollers: PollerRegistry::new(),
            style_list: Rc::new(RefCell::new(style_list)),
            signal_tx,
            next_chyron: 1,
            next_producer: 1,
        }
    }

    pub fn tick_interval_ms(&self) -> u64 {
        TICK_INTERVAL_MS
    }

    pub fn pump_interval_ms(&self) -> u64 {
        REQUEST_PUMP_INTERVAL_MS
    }

    pub fn style_list(&self) -> Rc<RefCell<StyleList>> {
        self.style_list.clone()
    }

    pub fn producer_ids(&self) -> Vec<ProducerId> {
        let mut ids: Vec<ProducerId> = self.producers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn story_identities(&self) -> Vec<String> {
        self.producers
            .values()
            .map(|entry| entry.producer.story_info().identity.clone())
            .collect()
    }

    pub fn chyron_for(&self, producer: ProducerId) -> Option<&Chyron> {
        let entry = self.producers.get(&producer)?;
        self.chyrons.get(&entry.chyron)
    }

    pub fn lane_manager(&self) -> &LaneManager {
        &self.lane_manager
    }

    /// Bring a new story under coverage: resolve identity collisions,
    /// subscribe a chyron to its lane, and start the reporter. On a cover
    /// failure everything is rolled back.
    pub fn add_story(
        &mut self,
        mut story_info: StoryInfo,
        reporter: Box<dyn Reporter>,
        now: u64,
    ) -> Result<ProducerId, DeskError> {
        fix_identity_duplication(&mut story_info, &self.story_identities());
        story_info.validate()?;
        let story = Arc::new(story_info);

        let chyron_id = ChyronId(self.next_chyron);
        self.next_chyron += 1;
        self.lane_manager
            .subscribe(chyron_id, story.clone(), self.metrics.as_ref());
        self.chyrons
            .insert(chyron_id, Chyron::new(chyron_id, story.clone()));

        let producer_id = ProducerId(self.next_producer);
        self.next_producer += 1;
        let mut producer = Producer::new(
            producer_id,
            story,
            self.style_list.clone(),
            reporter,
        );

        let start = {
            let chyron = self.chyrons.get_mut(&chyron_id).expect("just inserted");
            let mut handle = SingleChyron {
                chyron,
                now,
                events: Vec::new(),
            };
            producer.start_covering_story(
                &mut handle,
                &mut self.pollers,
                self.signal_tx.clone(),
                now,
            )
        };
        if let Err(e) = start {
            let mut host = ChyronHost {
                chyrons: &mut self.chyrons,
                now,
                removed: Vec::new(),
            };
            self.lane_manager
                .unsubscribe(chyron_id, UnsubscribeAction::Immediate, &mut host, now);
            self.chyrons.remove(&chyron_id);
            return Err(e.into());
        }

        self.producers.insert(
            producer_id,
            ProducerEntry {
                producer,
                chyron: chyron_id,
            },
        );
        tracing::info!(target: "desk", producer = producer_id.0, "story_added");
        Ok(producer_id)
    }

    /// Stop coverage and remove the story. Dashboard members leave through
    /// the queued reflow path; everything else drops immediately.
    pub fn remove_story(&mut self, producer: ProducerId, now: u64) -> Result<(), DeskError> {
        let Some(mut entry) = self.producers.remove(&producer) else {
            return Err(DeskError::UnknownProducer);
        };
        let stop = {
            let chyron = self
                .chyrons
                .get_mut(&entry.chyron)
                .ok_or(DeskError::UnknownProducer)?;
            let mut handle = SingleChyron {
                chyron,
                now,
                events: Vec::new(),
            };
            let result = entry
                .producer
                .stop_covering_story(&mut handle, &mut self.pollers);
            let events = std::mem::take(&mut handle.events);
            self.route_chyron_events(producer, &events);
            result
        };

        let is_dashboard = self
            .chyrons
            .get(&entry.chyron)
            .is_some_and(|c| c.story_info().entry_type.is_dashboard());
        let action = if is_dashboard {
            UnsubscribeAction::Queued
        } else {
            UnsubscribeAction::Immediate
        };
        let mut host = ChyronHost {
            chyrons: &mut self.chyrons,
            now,
            removed: Vec::new(),
        };
        self.lane_manager
            .unsubscribe(entry.chyron, action, &mut host, now);
        let removed = std::mem::take(&mut host.removed);
        self.finish_removals(removed);
        tracing::info!(target: "desk", producer = producer.0, "story_removed");
        stop?;
        Ok(())
    }

    /// Shelve a covered story (its chyron hides but keeps its headlines).
    pub fn shelve_story(&mut self, producer: ProducerId, now: u64) -> Result<(), DeskError> {
        self.with_producer(producer, now, |producer, handle| {
            producer.shelve_story(handle)
        })?
        .map_err(DeskError::from)
    }

    pub fn unshelve_story(&mut self, producer: ProducerId, now: u64) -> Result<(), DeskError> {
        self.with_producer(producer, now, |producer, handle| {
            producer.unshelve_story(handle);
            Ok(())
        })?
        .map_err(DeskError::from)
    }

    fn with_producer<R>(
        &mut self,
        producer: ProducerId,
        now: u64,
        f: impl FnOnce(&mut Producer, &mut SingleChyron<'_>) -> Result<R, ProducerError>,
    ) -> Result<Result<R, ProducerError>, DeskError> {
        let Some(entry) = self.producers.get_mut(&producer) else {
            return Err(DeskError::UnknownProducer);
        };
        let Some(chyron) = self.chyrons.get_mut(&entry.chyron) else {
            return Err(DeskError::UnknownProducer);
        };
        let mut handle = SingleChyron {
            chyron,
            now,
            events: Vec::new(),
        };
        let result = f(&mut entry.producer, &mut handle);
        let events = std::mem::take(&mut handle.events);
        self.route_chyron_events(producer, &events);
        Ok(result)
    }

    /// One 100 ms scheduler tick across every chyron, then the dashboards.
    pub fn tick(&mut self, now: u64) {
        let mut shift_completions: Vec<(ChyronId, GroupId)> = Vec::new();
        let mut out_of_scope: Vec<(ChyronId, HeadlineId)> = Vec::new();

        let chyron_ids: Vec<ChyronId> = {
            let mut ids: Vec<ChyronId> = self.chyrons.keys().copied().collect();
            ids.sort();
            ids
        };
        for id in chyron_ids {
            let Some(chyron) = self.chyrons.get_mut(&id) else {
                continue;
            };
            let events = chyron.tick(
                now,
                &mut self.lane_manager,
                self.displays.as_ref(),
                self.metrics.as_ref(),
            );
            for event in events {
                match event {
                    ChyronEvent::HeadlineOutOfScope(h) => out_of_scope.push((id, h)),
                    ChyronEvent::ShiftComplete(g) => shift_completions.push((id, g)),
                }
            }
        }

        for (chyron, headline) in out_of_scope {
            self.notify_out_of_scope(chyron, headline);
        }

        let mut host = ChyronHost {
            chyrons: &mut self.chyrons,
            now,
            removed: Vec::new(),
        };
        for (chyron, group) in shift_completions {
            self.lane_manager
                .on_shift_complete(chyron, group, &mut host, now);
        }
        self.lane_manager.tick(now, &mut host);
        let removed = std::mem::take(&mut host.removed);
        self.finish_removals(removed);
    }

    /// Collect the HTTP requests the pollers want issued right now.
    pub fn pump_pollers(&mut self, now: u64) -> Vec<FetchJob> {
        let mut jobs = Vec::new();
        for url in self.pollers.urls() {
            if let Some(poller) = self.pollers.get_mut(&url)
                && let Some(request) = poller.pump(now)
            {
                jobs.push(FetchJob {
                    poller_url: url.clone(),
                    auth: poller.auth(),
                    request,
                });
            }
        }
        jobs
    }

    /// A fetch issued from `pump_pollers` finished.
    pub fn handle_fetch_result(&mut self, poller_url: &str, now: u64, body: Result<Vec<u8>, String>) {
        if let Some(poller) = self.pollers.get_mut(poller_url) {
            poller.handle_reply(now, body);
        }
    }

    /// Route one drained reporter signal.
    pub fn handle_signal(&mut self, signal: ReporterSignal, now: u64) {
        match signal {
            ReporterSignal::NewData { producer, payload } => {
                let _ = self.with_producer(producer, now, |p, handle| {
                    p.ingest(handle, &payload, now);
                    Ok(())
                });
            }
            ReporterSignal::Highlight {
                producer,
                opacity_milli,
                timeout_ms,
            } => {
                let _ = self.with_producer(producer, now, |p, handle| {
                    p.handle_highlight(handle, opacity_milli as f64 / 1000.0, timeout_ms);
                    Ok(())
                });
            }
            ReporterSignal::ShelveStory { producer } => {
                let _ = self.with_producer(producer, now, |p, handle| {
                    let _ = p.shelve_story(handle);
                    Ok(())
                });
            }
            ReporterSignal::UnshelveStory { producer } => {
                let _ = self.with_producer(producer, now, |p, handle| {
                    p.unshelve_story(handle);
                    Ok(())
                });
            }
        }
    }

    /// Pointer moved over (or off) a headline.
    pub fn pointer_enter(&mut self, chyron: ChyronId, headline: HeadlineId, now: u64) {
        if let Some(c) = self.chyrons.get_mut(&chyron) {
            c.pointer_enter(headline, now);
        }
    }

    pub fn pointer_leave(&mut self, chyron: ChyronId, headline: HeadlineId, now: u64) {
        if let Some(c) = self.chyrons.get_mut(&chyron) {
            c.pointer_leave(headline, now);
        }
    }

    /// Find the topmost headline under a point, for pointer routing.
    pub fn hit_test(&self, point: core_types::Point) -> Option<(ChyronId, HeadlineId)> {
        let mut ids: Vec<&ChyronId> = self.chyrons.keys().collect();
        ids.sort();
        for id in ids.into_iter().rev() {
            let chyron = &self.chyrons[id];
            if chyron.state() != ChyronState::Displaying {
                continue;
            }
            for headline_id in chyron.posted().iter().rev() {
                if let Some(h) = chyron.headline(*headline_id)
                    && h.geometry.contains_point(point)
                {
                    return Some((*id, *headline_id));
                }
            }
        }
        None
    }

    /// Everything to draw this frame: headlines in chyron order, then
    /// dashboard headers.
    pub fn paints(&self) -> Vec<HeadlinePaint> {
        let mut ids: Vec<&ChyronId> = self.chyrons.keys().collect();
        ids.sort();
        let mut paints = Vec::new();
        for id in ids {
            paints.extend(self.chyrons[id].paints());
        }
        paints.extend(self.lane_manager.header_paints());
        paints
    }

    /// Persist every covered story and the style list into the document.
    pub fn save(&self, doc: &mut Document) {
        let mut stories: Vec<StoryInfo> = self
            .producers
            .values()
            .map(|entry| (**entry.producer.story_info()).clone())
            .collect();
        stories.sort_by(|a, b| a.identity.cmp(&b.identity));
        for story in &mut stories {
            if let Some(entry) = self
                .producers
                .values()
                .find(|e| e.producer.story_info().identity == story.identity)
            {
                entry.producer.reporter().secure(&mut story.reporter_parameters);
            }
        }
        persist::save_stories(doc, &stories);
        persist::save_styles(doc, &self.style_list.borrow());
    }

    fn notify_out_of_scope(&mut self, chyron: ChyronId, headline: HeadlineId) {
        if let Some(entry) = self
            .producers
            .values_mut()
            .find(|entry| entry.chyron == chyron)
        {
            entry.producer.headline_going_out_of_scope(headline);
        }
    }

    fn route_chyron_events(&mut self, producer: ProducerId, events: &[ChyronEvent]) {
        for event in events {
            if let ChyronEvent::HeadlineOutOfScope(h) = event
                && let Some(entry) = self.producers.get_mut(&producer)
            {
                entry.producer.headline_going_out_of_scope(*h);
            }
        }
    }

    fn finish_removals(&mut self, removed: Vec<(ChyronId, Vec<ChyronEvent>)>) {
        for (chyron, events) in removed {
            if let Some(producer_id) = self
                .producers
                .iter()
                .find(|(_, entry)| entry.chyron == chyron)
                .map(|(id, _)| *id)
            {
                self.route_chyron_events(producer_id, &events);
            }
            self.chyrons.remove(&chyron);
        }
    }
}
