//! Per-story animation scheduler.
//!
//! A `Chyron` owns every headline filed for its story: a queue of pending
//! entries, an arena of on-screen headlines, and the in-flight entering and
//! exiting sets. A 100 ms tick drives the whole machine with one hard rule,
//! the animation interlock: no new entry or exit starts while either
//! in-flight set is non-empty, and at most one ttl-exit starts per tick.
//!
//! Train entries push posted siblings instead of letting them age out; once
//! the train group lands, any sibling pushed fully off the display is
//! destroyed and the survivors stop aging. The dashboard drives coordinated
//! moves through the `shift_*` methods, which return group handles it can
//! start and await on its own schedule.

pub mod entry;

use std::collections::{HashMap, HashSet, VecDeque};

use core_anim::{Animation, AnimationDriver, GroupId, PropertyValue};
use core_headline::fit::FontMetrics;
use core_headline::{Headline, HeadlinePaint};
use core_story::StoryInfoRef;
use core_types::{
    AgeEffects, AnimExitType, ChyronId, DisplayGeometry, FixedText, HeadlineId, Rect, Vector,
};

/// Scheduler clock period.
pub const TICK_INTERVAL_MS: u64 = 100;
/// Hover and highlight opacity ramps.
pub const HOVER_FADE_MS: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChyronState {
    Hidden,
    Displaying,
    Suspended,
    Shelved,
}

#[derive(Debug, thiserror::Error)]
pub enum ChyronError {
    #[error("headline for story \"{got}\" filed with chyron covering \"{expected}\"")]
    StoryMismatch { expected: String, got: String },
}

/// Outbound notifications from a tick or a teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChyronEvent {
    /// The headline left the arena (exit finished, train push, or hide).
    HeadlineOutOfScope(HeadlineId),
    /// A shift group started through `shift_*` finished.
    ShiftComplete(GroupId),
}

/// Lane geometry the chyron consumes. Implemented by the lane manager;
/// `base_lane_position` recomputes the anchor and resets the boundary rect
/// to it, `grow_lane_boundaries` unites the boundary with an occupied rect.
pub trait LaneProvider {
    fn base_lane_position(&mut self, chyron: ChyronId) -> Rect;
    fn grow_lane_boundaries(&mut self, chyron: ChyronId, rect: Rect);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnimTag {
    Entry { headline: HeadlineId, train: bool },
    Exit(HeadlineId),
    Shift,
    AgeFade,
    Hover,
}

#[derive(Debug)]
pub struct Chyron {
    id: ChyronId,
    story_info: StoryInfoRef,
    state: ChyronState,

    next_headline: u64,
    incoming: VecDeque<(HeadlineId, Headline)>,
    headlines: HashMap<HeadlineId, Headline>,
    /// Posted headlines in insertion order.
    posted: Vec<HeadlineId>,
    entering: HashSet<HeadlineId>,
    exiting: HashSet<HeadlineId>,

    driver: AnimationDriver<HeadlineId, AnimTag>,
    /// Opacity to restore after a hover or highlight boost.
    saved_opacity: HashMap<HeadlineId, f64>,
    /// Pending highlight restores as (deadline, headline).
    highlight_restores: Vec<(u64, HeadlineId)>,
}

impl Chyron {
    pub fn new(id: ChyronId, story_info: StoryInfoRef) -> Self {
        Self {
            id,
            story_info,
            state: ChyronState::Hidden,
            next_headline: 0,
            incoming: VecDeque::new(),
            headlines: HashMap::new(),
            posted: Vec::new(),
            entering: HashSet::new(),
            exiting: HashSet::new(),
            driver: AnimationDriver::new(),
            saved_opacity: HashMap::new(),
            highlight_restores: Vec::new(),
        }
    }

    pub fn id(&self) -> ChyronId {
        self.id
    }

    pub fn state(&self) -> ChyronState {
        self.state
    }

    pub fn story_info(&self) -> &StoryInfoRef {
        &self.story_info
    }

    pub fn posted(&self) -> &[HeadlineId] {
        &self.posted
    }

    pub fn headline(&self, id: HeadlineId) -> Option<&Headline> {
        self.headlines.get(&id)
    }

    pub fn entering_is_empty(&self) -> bool {
        self.entering.is_empty()
    }

    pub fn exiting_is_empty(&self) -> bool {
        self.exiting.is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.incoming.len()
    }

    pub fn headline_count(&self) -> usize {
        self.headlines.len()
    }

    fn ttl_ms(&self) -> u64 {
        self.story_info.ttl * 1000
    }

    /// Enqueue a headline and return its id. Filing a headline for another
    /// story is a contract violation by the producer wiring.
    pub fn file_headline(&mut self, headline: Headline) -> Result<HeadlineId, ChyronError> {
        if headline.story != self.story_info.identity {
            debug_assert_eq!(
                headline.story, self.story_info.identity,
                "headline filed with the wrong chyron"
            );
            tracing::error!(target: "chyron",
                expected = %self.story_info.identity, got = %headline.story,
                "headline_story_mismatch");
            return Err(ChyronError::StoryMismatch {
                expected: self.story_info.identity.clone(),
                got: headline.story,
            });
        }
        let id = HeadlineId(self.next_headline);
        self.next_headline += 1;
        self.incoming.push_back((id, headline));
        Ok(id)
    }

    // ---- state machine --------------------------------------------------

    pub fn display(&mut self) {
        if matches!(self.state, ChyronState::Hidden | ChyronState::Shelved) {
            tracing::debug!(target: "chyron", id = self.id.0, "display");
            self.state = ChyronState::Displaying;
        }
    }

    /// Stop displaying: cancels in-flight animations and destroys every
    /// headline, queued ones included.
    pub fn hide(&mut self) -> Vec<ChyronEvent> {
        tracing::debug!(target: "chyron", id = self.id.0, "hide");
        self.state = ChyronState::Hidden;
        self.driver.cancel_all();
        self.entering.clear();
        self.exiting.clear();
        self.posted.clear();
        self.saved_opacity.clear();
        self.highlight_restores.clear();
        let mut events: Vec<ChyronEvent> = self
            .incoming
            .drain(..)
            .map(|(id, _)| ChyronEvent::HeadlineOutOfScope(id))
            .collect();
        events.extend(
            self.headlines
                .drain()
                .map(|(id, _)| ChyronEvent::HeadlineOutOfScope(id)),
        );
        events
    }

    /// Hide but keep everything for a later `display()`.
    pub fn shelve(&mut self) {
        if self.state == ChyronState::Displaying {
            tracing::debug!(target: "chyron", id = self.id.0, "shelve");
            self.state = ChyronState::Shelved;
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ChyronState::Displaying {
            self.state = ChyronState::Suspended;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ChyronState::Suspended {
            self.state = ChyronState::Displaying;
        }
    }

    /// Dashboard removal hook: the chyron is leaving its lane for good.
    pub fn unsubscribed(&mut self) -> Vec<ChyronEvent> {
        self.hide()
    }

    // ---- tick -----------------------------------------------------------

    /// One 100 ms scheduler tick.
    pub fn tick(
        &mut self,
        now: u64,
        lanes: &mut dyn LaneProvider,
        displays: &dyn DisplayGeometry,
        metrics: &dyn FontMetrics,
    ) -> Vec<ChyronEvent> {
        let mut events = Vec::new();
        self.advance_animations(now, displays, &mut events);
        self.process_highlight_restores(now);
        self.age_by_opacity(now);

        if self.state != ChyronState::Displaying {
            return events;
        }
        // Animation interlock: let any running transition finish first.
        if !self.entering.is_empty() || !self.exiting.is_empty() {
            return events;
        }

        if let Some((id, mut headline)) = self.incoming.pop_front() {
            headline.viewed = 0;
            self.initialize_headline(id, &mut headline, lanes, displays, metrics);
            self.headlines.insert(id, headline);
            self.start_headline_entry(id, now, displays);
        } else {
            let ttl = self.ttl_ms();
            let expired = self.posted.iter().copied().find(|id| {
                self.headlines.get(id).is_some_and(|h| {
                    !h.ignore && h.viewed != 0 && now.saturating_sub(h.viewed) > ttl
                })
            });
            if let Some(id) = expired {
                self.start_headline_exit(id, now, displays, &mut events);
            }
        }
        events
    }

    fn advance_animations(
        &mut self,
        now: u64,
        displays: &dyn DisplayGeometry,
        events: &mut Vec<ChyronEvent>,
    ) {
        let completions = {
            let Self {
                driver, headlines, ..
            } = self;
            driver.advance(now, |id, value| {
                if let Some(h) = headlines.get_mut(&id) {
                    match value {
                        PropertyValue::Geometry(r) => h.geometry = r,
                        PropertyValue::Opacity(o) => h.opacity = o,
                    }
                }
            })
        };
        for (group, tag) in completions {
            match tag {
                AnimTag::Entry { headline, train } => {
                    self.entering.remove(&headline);
                    if let Some(h) = self.headlines.get_mut(&headline) {
                        // viewed == 0 is the "never entered" sentinel
                        h.viewed = now.max(1);
                        tracing::trace!(target: "chyron.anim",
                            id = self.id.0, headline = headline.0, "headline_posted");
                    }
                    self.posted.push(headline);
                    if train {
                        self.train_expire_headlines(displays, events);
                    }
                }
                AnimTag::Exit(headline) => {
                    self.exiting.remove(&headline);
                    self.destroy_headline(headline, events);
                }
                AnimTag::Shift => events.push(ChyronEvent::ShiftComplete(group)),
                AnimTag::AgeFade | AnimTag::Hover => {}
            }
        }
    }

    // ---- entry ----------------------------------------------------------

    fn initialize_headline(
        &mut self,
        _id: HeadlineId,
        headline: &mut Headline,
        lanes: &mut dyn LaneProvider,
        displays: &dyn DisplayGeometry,
        metrics: &dyn FontMetrics,
    ) {
        let story = &self.story_info;
        let lane = lanes.base_lane_position(self.id);
        let dims = story.dimensions(displays);
        let fixed = dims.width > 0 && dims.height > 0;

        if !fixed {
            headline.initialize(
                story.headlines_always_visible,
                FixedText::None,
                None,
                metrics,
            );
        }
        let size = if fixed { dims } else { headline.geometry.size() };
        headline.geometry = entry::initial_rect(story.entry_type, lane, size, story.margin);
        if fixed {
            headline.initialize(
                story.headlines_always_visible,
                story.headlines_fixed_type,
                Some(dims),
                metrics,
            );
        }

        // The boundary rect restarts from the anchor and swallows every
        // rectangle this chyron currently occupies.
        for pid in &self.posted {
            if let Some(posted) = self.headlines.get(pid) {
                lanes.grow_lane_boundaries(self.id, posted.geometry);
            }
        }
        lanes.grow_lane_boundaries(self.id, headline.geometry);
    }

    fn start_headline_entry(&mut self, id: HeadlineId, now: u64, displays: &dyn DisplayGeometry) {
        let story = self.story_info.clone();
        let entry_type = story.entry_type;
        let rect = match self.headlines.get(&id) {
            Some(h) => h.geometry,
            None => return,
        };

        if entry_type.is_pop() || entry_type.is_dashboard() {
            if let Some(h) = self.headlines.get_mut(&id) {
                // viewed == 0 is the "never entered" sentinel
                h.viewed = now.max(1);
            }
            self.posted.push(id);
            return;
        }

        if entry_type.is_fade() {
            if let Some(h) = self.headlines.get_mut(&id) {
                h.opacity = 0.0;
            }
            self.entering.insert(id);
            self.driver.start_group(
                AnimTag::Entry {
                    headline: id,
                    train: false,
                },
                vec![Animation::opacity(
                    id,
                    0.0,
                    1.0,
                    story.fade_target_duration,
                    story.fading_curve,
                )],
                now,
            );
            return;
        }

        // Slide and Train entries: move in, pushing posted siblings away.
        let display = displays.display_rect(story.primary_display);
        let end = entry::resting_rect(entry_type, rect, display, story.margin);
        let mut animations = vec![Animation::geometry(
            id,
            rect,
            end,
            story.anim_motion_duration,
            story.motion_curve,
        )];
        if let Some(shift) = entry::sibling_shift(entry_type, rect.size(), story.margin) {
            for pid in &self.posted {
                if let Some(posted) = self.headlines.get(pid) {
                    animations.push(Animation::geometry(
                        *pid,
                        posted.geometry,
                        posted.geometry.translated(shift),
                        story.anim_motion_duration,
                        story.motion_curve,
                    ));
                }
            }
        }
        self.entering.insert(id);
        self.driver.start_group(
            AnimTag::Entry {
                headline: id,
                train: entry_type.is_train(),
            },
            animations,
            now,
        );
    }

    /// Destroy every posted headline whose four corners all landed outside
    /// the target display after a train push.
    fn train_expire_headlines(
        &mut self,
        displays: &dyn DisplayGeometry,
        events: &mut Vec<ChyronEvent>,
    ) {
        let display = displays.display_rect(self.story_info.primary_display);
        let expired: Vec<HeadlineId> = self
            .posted
            .iter()
            .copied()
            .filter(|id| {
                self.headlines.get(id).is_some_and(|h| {
                    h.geometry
                        .corners()
                        .iter()
                        .all(|corner| !display.contains_point(*corner))
                })
            })
            .collect();
        for id in expired {
            tracing::trace!(target: "chyron.anim",
                id = self.id.0, headline = id.0, "train_expired");
            self.destroy_headline(id, events);
        }
    }

    // ---- exit -----------------------------------------------------------

    fn start_headline_exit(
        &mut self,
        id: HeadlineId,
        now: u64,
        displays: &dyn DisplayGeometry,
        events: &mut Vec<ChyronEvent>,
    ) {
        let story = self.story_info.clone();

        // Train headlines never take the exit path; they fade (or just
        // freeze) and wait to be pushed off.
        if story.entry_type.is_train() {
            let current = match self.headlines.get(&id) {
                Some(h) => h.opacity,
                None => return,
            };
            if story.train_use_age_effect
                && story.train_age_effect == AgeEffects::ReduceOpacityFixed
            {
                let target = story.train_age_percent as f64 / 100.0;
                self.driver.start_group(
                    AnimTag::AgeFade,
                    vec![Animation::opacity(
                        id,
                        current,
                        target,
                        story.fade_target_duration,
                        story.fading_curve,
                    )],
                    now,
                );
            }
            if let Some(h) = self.headlines.get_mut(&id) {
                h.ignore = true;
            }
            return;
        }

        let rect = match self.headlines.get(&id) {
            Some(h) => h.geometry,
            None => return,
        };
        let opacity = self.headlines.get(&id).map_or(1.0, |h| h.opacity);

        match story.exit_type {
            AnimExitType::Pop => {
                self.posted.retain(|p| *p != id);
                self.destroy_headline(id, events);
            }
            AnimExitType::Fade => {
                self.posted.retain(|p| *p != id);
                self.exiting.insert(id);
                self.driver.start_group(
                    AnimTag::Exit(id),
                    vec![Animation::opacity(
                        id,
                        opacity,
                        0.0,
                        story.fade_target_duration,
                        story.fading_curve,
                    )],
                    now,
                );
            }
            exit => {
                let display = displays.display_rect(story.primary_display);
                let end = exit_end_rect(exit, rect, display);
                let mut animations = vec![Animation::geometry(
                    id,
                    rect,
                    end,
                    story.anim_motion_duration,
                    story.motion_curve,
                )];
                if exit.is_slide_fade() {
                    animations.push(Animation::opacity(
                        id,
                        opacity,
                        0.0,
                        story.fade_target_duration,
                        story.fading_curve,
                    ));
                }
                self.posted.retain(|p| *p != id);
                self.exiting.insert(id);
                self.driver
                    .start_group(AnimTag::Exit(id), animations, now);
            }
        }
    }

    // ---- aging ----------------------------------------------------------

    /// Continuous opacity for train chyrons with the by-age effect:
    /// `1 − age_fraction × (1 − target)`, saturating at the ttl.
    fn age_by_opacity(&mut self, now: u64) {
        let story = &self.story_info;
        if !story.entry_type.is_train()
            || !story.train_use_age_effect
            || story.train_age_effect != AgeEffects::ReduceOpacityByAge
        {
            return;
        }
        let ttl = self.ttl_ms().max(1);
        let target = story.train_age_percent as f64 / 100.0;
        for id in &self.posted {
            if self.saved_opacity.contains_key(id) {
                continue; // a hover or highlight boost owns the opacity
            }
            if let Some(h) = self.headlines.get_mut(id)
                && h.viewed != 0
            {
                let age_fraction =
                    (now.saturating_sub(h.viewed) as f64 / ttl as f64).min(1.0);
                h.opacity = 1.0 - age_fraction * (1.0 - target);
            }
        }
    }

    // ---- hover & highlight ----------------------------------------------

    fn boostable(&self, id: HeadlineId) -> bool {
        self.headlines.contains_key(&id)
            && !self.entering.contains(&id)
            && !self.exiting.contains(&id)
    }

    /// Pointer entered a headline: remember its opacity and ramp to full.
    pub fn pointer_enter(&mut self, id: HeadlineId, now: u64) {
        if !self.boostable(id) {
            return;
        }
        let current = self.headlines[&id].opacity;
        self.saved_opacity.entry(id).or_insert(current);
        self.driver.cancel_target(id);
        self.driver.start_group(
            AnimTag::Hover,
            vec![Animation::opacity(
                id,
                current,
                1.0,
                HOVER_FADE_MS,
                self.story_info.fading_curve,
            )],
            now,
        );
    }

    /// Pointer left: ramp back to the remembered opacity.
    pub fn pointer_leave(&mut self, id: HeadlineId, now: u64) {
        let Some(saved) = self.saved_opacity.remove(&id) else {
            return;
        };
        if !self.headlines.contains_key(&id) {
            return;
        }
        let current = self.headlines[&id].opacity;
        self.driver.cancel_target(id);
        self.driver.start_group(
            AnimTag::Hover,
            vec![Animation::opacity(
                id,
                current,
                saved,
                HOVER_FADE_MS,
                self.story_info.fading_curve,
            )],
            now,
        );
    }

    /// Boost one headline's opacity for a bounded time (reporter-draw
    /// highlight requests arrive here through the producer).
    pub fn highlight_headline(&mut self, id: HeadlineId, opacity: f64, timeout_ms: u64, now: u64) {
        if !self.boostable(id) {
            return;
        }
        let current = self.headlines[&id].opacity;
        self.saved_opacity.entry(id).or_insert(current);
        self.driver.cancel_target(id);
        self.driver.start_group(
            AnimTag::Hover,
            vec![Animation::opacity(
                id,
                current,
                opacity.clamp(0.0, 1.0),
                HOVER_FADE_MS,
                self.story_info.fading_curve,
            )],
            now,
        );
        self.highlight_restores.push((now + timeout_ms, id));
    }

    fn process_highlight_restores(&mut self, now: u64) {
        let due: Vec<HeadlineId> = self
            .highlight_restores
            .iter()
            .filter(|(deadline, _)| *deadline <= now)
            .map(|(_, id)| *id)
            .collect();
        self.highlight_restores.retain(|(deadline, _)| *deadline > now);
        for id in due {
            self.pointer_leave(id, now);
        }
    }

    // ---- shifts ---------------------------------------------------------

    /// Move every posted headline by `vector`. Returns the group handle, or
    /// `None` when nothing is visible. With `auto_start = false` the group
    /// waits for `start_shift`.
    pub fn shift_by(&mut self, vector: Vector, auto_start: bool, now: u64) -> Option<GroupId> {
        if self.posted.is_empty() {
            return None;
        }
        let story = &self.story_info;
        let animations: Vec<_> = self
            .posted
            .iter()
            .filter_map(|id| {
                self.headlines.get(id).map(|h| {
                    Animation::geometry(
                        *id,
                        h.geometry,
                        h.geometry.translated(vector),
                        story.anim_motion_duration,
                        story.motion_curve,
                    )
                })
            })
            .collect();
        Some(if auto_start {
            self.driver.start_group(AnimTag::Shift, animations, now)
        } else {
            self.driver.defer_group(AnimTag::Shift, animations)
        })
    }

    pub fn shift_left(&mut self, amount: i32, auto_start: bool, now: u64) -> Option<GroupId> {
        self.shift_by(Vector::left(amount), auto_start, now)
    }

    pub fn shift_right(&mut self, amount: i32, auto_start: bool, now: u64) -> Option<GroupId> {
        self.shift_by(Vector::right(amount), auto_start, now)
    }

    pub fn shift_up(&mut self, amount: i32, auto_start: bool, now: u64) -> Option<GroupId> {
        self.shift_by(Vector::up(amount), auto_start, now)
    }

    pub fn shift_down(&mut self, amount: i32, auto_start: bool, now: u64) -> Option<GroupId> {
        self.shift_by(Vector::down(amount), auto_start, now)
    }

    /// Start a deferred shift group.
    pub fn start_shift(&mut self, group: GroupId, now: u64) -> bool {
        self.driver.start(group, now)
    }

    // ---- rendering ------------------------------------------------------

    /// Paint specs for everything currently on screen, posted order first,
    /// then in-flight entries and exits.
    pub fn paints(&self) -> Vec<HeadlinePaint> {
        if matches!(self.state, ChyronState::Hidden | ChyronState::Shelved) {
            return Vec::new();
        }
        let mut ids: Vec<HeadlineId> = self.posted.clone();
        let mut rest: Vec<HeadlineId> = self
            .headlines
            .keys()
            .copied()
            .filter(|id| !self.posted.contains(id))
            .collect();
        rest.sort();
        ids.extend(rest);
        ids.iter()
            .filter_map(|id| self.headlines.get(id).map(Headline::paint))
            .collect()
    }

    fn destroy_headline(&mut self, id: HeadlineId, events: &mut Vec<ChyronEvent>) {
        self.driver.cancel_target(id);
        self.posted.retain(|p| *p != id);
        self.entering.remove(&id);
        self.exiting.remove(&id);
        self.saved_opacity.remove(&id);
        self.highlight_restores.retain(|(_, h)| *h != id);
        if self.headlines.remove(&id).is_some() {
            events.push(ChyronEvent::HeadlineOutOfScope(id));
        }
    }
}

/// Off-screen endpoint for a moving exit.
fn exit_end_rect(exit: AnimExitType, rect: Rect, display: Rect) -> Rect {
    use AnimExitType::*;
    match exit {
        SlideLeft | SlideFadeLeft => rect.with_position(display.left() - rect.width, rect.y),
        SlideRight | SlideFadeRight => rect.with_position(display.right() + rect.width, rect.y),
        SlideUp | SlideFadeUp => rect.with_position(rect.x, display.top() - rect.height),
        SlideDown | SlideFadeDown => rect.with_position(rect.x, display.bottom() + rect.height),
        Fade | Pop => rect,
    }
}
