//! Dashboard: same-group chyrons stacked under a header.
//!
//! Members keep insertion order; lower index means higher priority, and
//! slots stack away from the header in the family's direction. All reflow
//! motion is serialised through the animation queue: one entry runs at a
//! time, every member is suspended while it runs, and queued removals are
//! processed head-first only after the previous removal's animations drain.

use std::collections::{HashMap, VecDeque};

use core_anim::{Animation, AnimationDriver, PropertyValue};
use core_headline::fit::FontMetrics;
use core_headline::{Headline, HeadlinePaint};
use core_story::{StoryInfo, StoryInfoRef};
use core_types::{
    AnimEntryType, ChyronId, DisplayGeometry, EasingCurve, FontSpec, Rect, Size, Vector,
};

use crate::{ChyronControl, LaneData, ShiftHandle, UnsubscribeAction};

/// Header height factor for the Down/Up stacking families.
pub const HEADER_HEIGHT_FACTOR: f64 = 0.35;
/// Header width factor for the In stacking families.
pub const HEADER_WIDTH_FACTOR: f64 = 0.15;

#[derive(Debug)]
struct QueueEntry {
    shifts: Vec<ShiftHandle>,
    header_end: Rect,
}

#[derive(Debug)]
struct Running {
    remaining: Vec<ShiftHandle>,
    header_done: bool,
}

pub struct Dashboard {
    id: String,
    display: usize,
    entry_type: AnimEntryType,
    motion_duration: u64,
    motion_curve: EasingCurve,
    /// Header resting position; reflow animations re-assert it.
    anchor: Rect,
    header: Headline,
    members: Vec<ChyronId>,

    header_driver: AnimationDriver<(), ()>,
    anim_queue: VecDeque<QueueEntry>,
    running: Option<Running>,
    unsubscribe_queue: VecDeque<ChyronId>,
}

impl Dashboard {
    /// Build the dashboard for `story`'s group, placing the header at the
    /// family's anchoring corner.
    pub fn new(
        story: &StoryInfoRef,
        displays: &dyn DisplayGeometry,
        header_font: &FontSpec,
        header_stylesheet: &str,
        metrics: &dyn FontMetrics,
    ) -> Self {
        use AnimEntryType::*;
        let display = displays.display_rect(story.primary_display);
        let dims = story.dimensions(displays);
        let margin = story.margin;

        let (mut w, mut h) = (dims.width, dims.height);
        match story.entry_type {
            DashboardDownLeftTop | DashboardDownRightTop | DashboardUpLeftBottom
            | DashboardUpRightBottom => h = (h as f64 * HEADER_HEIGHT_FACTOR) as i32,
            _ => w = (w as f64 * HEADER_WIDTH_FACTOR) as i32,
        }

        let mut header = Headline::new("", story.dashboard_group_id.clone(), 0);
        header.font = header_font.clone();
        header.stylesheet = header_stylesheet.to_string();
        header.margin = 0;
        if story.dashboard_compact_mode {
            header.compact_mode = true;
            w = (w as f64 * story.dashboard_compression / 100.0) as i32;
            h = (h as f64 * story.dashboard_compression / 100.0) as i32;
        }

        let (x, y) = match story.entry_type {
            DashboardDownLeftTop | DashboardInLeftTop => {
                (display.left() + margin, display.top() + margin)
            }
            DashboardDownRightTop | DashboardInRightTop => {
                (display.right() - w - margin, display.top() + margin)
            }
            DashboardUpLeftBottom | DashboardInLeftBottom => {
                (display.left() + margin, display.bottom() - h - margin)
            }
            _ => (display.right() - w - margin, display.bottom() - h - margin),
        };
        header.geometry = Rect::new(x, y, w, h);
        header.initialize(
            story.headlines_always_visible,
            story.headlines_fixed_type,
            Some(Size::new(w.max(1), h.max(1))),
            metrics,
        );
        header.geometry = Rect::new(x, y, w, h);

        tracing::debug!(target: "lane.dashboard",
            group = %story.dashboard_group_id, entry = ?story.entry_type,
            anchor = ?header.geometry, "dashboard_created");

        Self {
            id: story.dashboard_group_id.clone(),
            display: story.primary_display,
            entry_type: story.entry_type,
            motion_duration: story.anim_motion_duration,
            motion_curve: story.motion_curve,
            anchor: header.geometry,
            header,
            members: Vec::new(),
            header_driver: AnimationDriver::new(),
            anim_queue: VecDeque::new(),
            running: None,
            unsubscribe_queue: VecDeque::new(),
        }
    }

    pub fn is_id(&self, id: &str) -> bool {
        self.id == id
    }

    pub fn display(&self) -> usize {
        self.display
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[ChyronId] {
        &self.members
    }

    pub fn is_managing(&self, chyron: ChyronId) -> bool {
        self.members.contains(&chyron)
    }

    pub fn header_geometry(&self) -> Rect {
        self.header.geometry
    }

    pub fn header_paint(&self) -> HeadlinePaint {
        self.header.paint()
    }

    pub fn anim_in_progress(&self) -> bool {
        self.running.is_some() || !self.anim_queue.is_empty() || !self.unsubscribe_queue.is_empty()
    }

    pub fn add_member(&mut self, chyron: ChyronId) {
        if let Some(pos) = self.unsubscribe_queue.iter().position(|c| *c == chyron) {
            self.unsubscribe_queue.remove(pos);
        }
        if !self.members.contains(&chyron) {
            self.members.push(chyron);
        }
    }

    /// Lane slot for a member: offset from the header by
    /// `index × (extent + margin)` in the stacking direction. Compact mode
    /// compresses the extent.
    pub fn member_slot(&self, chyron: ChyronId, dims: Size, story: &StoryInfo) -> Rect {
        use AnimEntryType::*;
        let index = self
            .members
            .iter()
            .position(|m| *m == chyron)
            .unwrap_or(self.members.len()) as i32;
        let margin = story.margin;

        let (mut ew, mut eh) = (dims.width, dims.height);
        if story.dashboard_compact_mode {
            ew = (ew as f64 * story.dashboard_compression / 100.0) as i32;
            eh = (eh as f64 * story.dashboard_compression / 100.0) as i32;
        }

        let header = self.anchor;
        let (x, y) = match self.entry_type {
            DashboardDownLeftTop => {
                (header.left(), header.bottom() + margin + index * (eh + margin))
            }
            DashboardDownRightTop => (
                header.right() - ew,
                header.bottom() + margin + index * (eh + margin),
            ),
            DashboardUpLeftBottom => {
                (header.left(), header.top() - (index + 1) * (eh + margin))
            }
            DashboardUpRightBottom => (
                header.right() - ew,
                header.top() - (index + 1) * (eh + margin),
            ),
            DashboardInLeftTop => {
                (header.right() + margin + index * (ew + margin), header.top())
            }
            DashboardInLeftBottom => (
                header.right() + margin + index * (ew + margin),
                header.bottom() - eh,
            ),
            DashboardInRightTop => {
                (header.left() - (index + 1) * (ew + margin), header.top())
            }
            DashboardInRightBottom => (
                header.left() - (index + 1) * (ew + margin),
                header.bottom() - eh,
            ),
            _ => (header.left(), header.top()),
        };
        Rect::new(x, y, ew, eh)
    }

    /// Shift applied to lower-priority members when `boundaries` vacates.
    fn removal_vector(&self, boundaries: Rect) -> Vector {
        use AnimEntryType::*;
        match self.entry_type {
            DashboardInLeftTop | DashboardInLeftBottom => Vector::left(boundaries.width),
            DashboardInRightTop | DashboardInRightBottom => Vector::right(boundaries.width),
            DashboardDownLeftTop | DashboardDownRightTop => Vector::up(boundaries.height),
            _ => Vector::down(boundaries.height),
        }
    }

    /// Remove a member. Immediate removals drop the lane on the spot;
    /// queued removals wait for any running reflow and then animate.
    pub fn remove_member(
        &mut self,
        chyron: ChyronId,
        action: UnsubscribeAction,
        data: &mut HashMap<ChyronId, LaneData>,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        if !self.members.contains(&chyron) {
            return;
        }
        match action {
            UnsubscribeAction::Immediate => {
                self.members.retain(|m| *m != chyron);
                data.remove(&chyron);
                host.unsubscribed(chyron);
            }
            UnsubscribeAction::Queued => {
                if self.unsubscribe_queue.contains(&chyron) {
                    return;
                }
                let start = self.unsubscribe_queue.is_empty();
                self.unsubscribe_queue.push_back(chyron);
                if start && self.running.is_none() && self.anim_queue.is_empty() {
                    self.process_unsubscribe_queue(data, host, now);
                }
            }
        }
    }

    fn process_unsubscribe_queue(
        &mut self,
        data: &mut HashMap<ChyronId, LaneData>,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        if let Some(&head) = self.unsubscribe_queue.front() {
            self.reflow_remove(head, data, host, now);
        }
    }

    /// Suspend everyone, shift strictly lower-priority members toward the
    /// vacated slot, and queue the whole move as one animation entry.
    fn reflow_remove(
        &mut self,
        leaving: ChyronId,
        data: &mut HashMap<ChyronId, LaneData>,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        let boundaries = data
            .get(&leaving)
            .map(|l| l.lane_boundaries)
            .unwrap_or_default();
        let vector = self.removal_vector(boundaries);

        let mut shifts = Vec::new();
        let mut past_leaving = false;
        for member in self.members.clone() {
            host.suspend(member);
            if member == leaving {
                past_leaving = true;
                continue;
            }
            if !past_leaving {
                continue;
            }
            if let Some(handle) = host.shift_deferred(member, vector) {
                shifts.push(handle);
            }
            if let Some(lane) = data.get_mut(&member) {
                lane.lane = lane.lane.translated(vector);
                lane.lane_boundaries = lane.lane_boundaries.translated(vector);
            }
        }

        // drop any queued shifts that still target the leaving member
        for entry in &mut self.anim_queue {
            entry.shifts.retain(|(c, _)| *c != leaving);
        }

        self.members.retain(|m| *m != leaving);
        data.remove(&leaving);
        host.unsubscribed(leaving);
        tracing::debug!(target: "lane.dashboard",
            group = %self.id, chyron = leaving.0, shifts = shifts.len(),
            "reflow_removal_queued");

        self.anim_queue.push_back(QueueEntry {
            shifts,
            header_end: self.anchor,
        });
        if self.running.is_none() {
            self.start_next(host, now);
        }
    }

    fn start_next(&mut self, host: &mut dyn ChyronControl, now: u64) {
        let Some(entry) = self.anim_queue.pop_front() else {
            return;
        };
        for handle in &entry.shifts {
            host.start_shift(*handle, now);
        }
        self.header_driver.start_group(
            (),
            vec![Animation::geometry(
                (),
                self.header.geometry,
                entry.header_end,
                self.motion_duration,
                self.motion_curve,
            )],
            now,
        );
        self.running = Some(Running {
            remaining: entry.shifts,
            header_done: false,
        });
    }

    /// A member's deferred shift group finished.
    pub fn on_shift_complete(
        &mut self,
        handle: ShiftHandle,
        data: &mut HashMap<ChyronId, LaneData>,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        let is_running = match &mut self.running {
            Some(running) => {
                running.remaining.retain(|h| *h != handle);
                true
            }
            None => false,
        };
        if is_running {
            self.maybe_finish(data, host, now);
        }
    }

    /// Advance the header animation and the queue machinery.
    pub fn tick(
        &mut self,
        now: u64,
        data: &mut HashMap<ChyronId, LaneData>,
        host: &mut dyn ChyronControl,
    ) {
        let header = &mut self.header;
        let completions = self.header_driver.advance(now, |_, value| {
            if let PropertyValue::Geometry(rect) = value {
                header.geometry = rect;
            }
        });
        if !completions.is_empty()
            && let Some(running) = &mut self.running
        {
            running.header_done = true;
        }
        self.maybe_finish(data, host, now);
    }

    fn maybe_finish(
        &mut self,
        data: &mut HashMap<ChyronId, LaneData>,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        let finished = self
            .running
            .as_ref()
            .is_some_and(|r| r.remaining.is_empty() && r.header_done);
        if !finished {
            return;
        }
        self.running = None;

        // every member resumes once the group lands
        for member in &self.members {
            host.resume(*member);
        }
        tracing::debug!(target: "lane.dashboard", group = %self.id, "reflow_complete");

        if !self.anim_queue.is_empty() {
            self.start_next(host, now);
        } else {
            // the head removal just finished; start the next one, if any
            self.unsubscribe_queue.pop_front();
            self.process_unsubscribe_queue(data, host, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_headline::fit::ScaledMetrics;
    use core_types::FixedDisplays;
    use std::sync::Arc;

    fn story(entry: AnimEntryType) -> StoryInfoRef {
        Arc::new(StoryInfo {
            identity: "member".into(),
            entry_type: entry,
            dashboard_group_id: "alpha".into(),
            interpret_as_pixels: true,
            headlines_pixel_width: 200,
            headlines_pixel_height: 40,
            ..StoryInfo::default()
        })
    }

    fn displays() -> FixedDisplays {
        FixedDisplays::single(Rect::new(0, 0, 1000, 500))
    }

    fn dashboard(entry: AnimEntryType) -> Dashboard {
        Dashboard::new(
            &story(entry),
            &displays(),
            &FontSpec::default(),
            "color: white",
            &ScaledMetrics,
        )
    }

    #[test]
    fn down_family_header_compresses_height() {
        let d = dashboard(AnimEntryType::DashboardDownLeftTop);
        // 40 * 0.35 = 14, anchored at the top-left margin corner
        assert_eq!(d.header_geometry(), Rect::new(5, 5, 200, 14));
    }

    #[test]
    fn in_family_header_compresses_width() {
        let d = dashboard(AnimEntryType::DashboardInRightTop);
        // 200 * 0.15 = 30, anchored at the top-right corner
        assert_eq!(d.header_geometry(), Rect::new(1000 - 30 - 5, 5, 30, 40));
    }

    #[test]
    fn up_family_header_anchors_at_the_bottom() {
        let d = dashboard(AnimEntryType::DashboardUpRightBottom);
        assert_eq!(
            d.header_geometry(),
            Rect::new(1000 - 200 - 5, 500 - 14 - 5, 200, 14)
        );
    }

    #[test]
    fn down_slots_stack_below_the_header() {
        let mut d = dashboard(AnimEntryType::DashboardDownLeftTop);
        let s = story(AnimEntryType::DashboardDownLeftTop);
        d.add_member(ChyronId(1));
        d.add_member(ChyronId(2));
        let dims = Size::new(200, 40);
        // header bottom = 19; slots at 19+5, then +45 per index
        assert_eq!(d.member_slot(ChyronId(1), dims, &s), Rect::new(5, 24, 200, 40));
        assert_eq!(d.member_slot(ChyronId(2), dims, &s), Rect::new(5, 69, 200, 40));
    }

    #[test]
    fn up_slots_stack_above_the_header() {
        let mut d = dashboard(AnimEntryType::DashboardUpLeftBottom);
        let s = story(AnimEntryType::DashboardUpLeftBottom);
        d.add_member(ChyronId(1));
        d.add_member(ChyronId(2));
        let dims = Size::new(200, 40);
        let header = d.header_geometry();
        assert_eq!(
            d.member_slot(ChyronId(1), dims, &s),
            Rect::new(5, header.top() - 45, 200, 40)
        );
        assert_eq!(
            d.member_slot(ChyronId(2), dims, &s),
            Rect::new(5, header.top() - 90, 200, 40)
        );
    }

    #[test]
    fn in_slots_stack_sideways() {
        let mut d = dashboard(AnimEntryType::DashboardInLeftTop);
        let s = story(AnimEntryType::DashboardInLeftTop);
        d.add_member(ChyronId(1));
        d.add_member(ChyronId(2));
        let dims = Size::new(200, 40);
        let header = d.header_geometry();
        assert_eq!(
            d.member_slot(ChyronId(1), dims, &s),
            Rect::new(header.right() + 5, 5, 200, 40)
        );
        assert_eq!(
            d.member_slot(ChyronId(2), dims, &s),
            Rect::new(header.right() + 5 + 205, 5, 200, 40)
        );
    }

    #[test]
    fn compact_mode_compresses_slots() {
        let mut compact_story = (*story(AnimEntryType::DashboardDownLeftTop)).clone();
        compact_story.dashboard_compact_mode = true;
        compact_story.dashboard_compression = 50.0;
        let compact_story = Arc::new(compact_story);
        let d = Dashboard::new(
            &compact_story,
            &displays(),
            &FontSpec::default(),
            "color: white",
            &ScaledMetrics,
        );
        // header: 200 x 14, both halved
        assert_eq!(d.header_geometry().size(), Size::new(100, 7));
        let slot = d.member_slot(ChyronId(1), Size::new(200, 40), &compact_story);
        assert_eq!(slot.size(), Size::new(100, 20));
    }

    #[test]
    fn removal_vector_points_at_the_header() {
        let d = dashboard(AnimEntryType::DashboardDownLeftTop);
        let b = Rect::new(0, 0, 200, 40);
        assert_eq!(d.removal_vector(b), Vector::up(40));
        let d = dashboard(AnimEntryType::DashboardUpLeftBottom);
        assert_eq!(d.removal_vector(b), Vector::down(40));
        let d = dashboard(AnimEntryType::DashboardInLeftTop);
        assert_eq!(d.removal_vector(b), Vector::left(200));
        let d = dashboard(AnimEntryType::DashboardInRightBottom);
        assert_eq!(d.removal_vector(b), Vector::right(200));
    }
}
