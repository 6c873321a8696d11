//! Lane assignment and dashboard grouping.
//!
//! The lane manager is the global spatial arbitrator: every chyron
//! subscribes with its (immutable) story settings and receives an anchor
//! *lane*, a line or point the chyron places headlines on, plus a mutable
//! *lane_boundaries* rectangle it grows as headlines occupy space.
//! Dashboard-typed chyrons are grouped by id into a `Dashboard` that stacks
//! them under a header and reflows membership changes.
//!
//! The manager never holds a chyron pointer; everything it needs to do to a
//! chyron goes through the `ChyronControl` trait the desk implements.

pub mod dashboard;

use std::collections::HashMap;
use std::sync::Arc;

use core_anim::GroupId;
use core_chyron::LaneProvider;
use core_headline::HeadlinePaint;
use core_headline::fit::FontMetrics;
use core_story::StoryInfoRef;
use core_types::{
    AnimEntryType, AnimExitType, ChyronId, DisplayGeometry, FontSpec, Point, Rect, Vector,
};

use dashboard::Dashboard;

/// Deferred shift group on a specific chyron.
pub type ShiftHandle = (ChyronId, GroupId);

/// Everything a dashboard may ask the desk to do to a member chyron.
pub trait ChyronControl {
    fn suspend(&mut self, chyron: ChyronId);
    fn resume(&mut self, chyron: ChyronId);
    /// Build a deferred shift of every posted headline; `None` when the
    /// chyron has nothing visible.
    fn shift_deferred(&mut self, chyron: ChyronId, vector: Vector) -> Option<ShiftHandle>;
    fn start_shift(&mut self, handle: ShiftHandle, now: u64) -> bool;
    /// The chyron has been fully removed from its lane.
    fn unsubscribed(&mut self, chyron: ChyronId);
}

/// How a removal is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeAction {
    /// Drop the lane at once, no reflow animation.
    Immediate,
    /// Queue the removal behind any running dashboard animation.
    Queued,
}

/// Geometry record per subscribed chyron.
#[derive(Debug, Clone)]
pub struct LaneData {
    pub owner: ChyronId,
    pub story: StoryInfoRef,
    /// Static anchor the chyron's headlines are placed against.
    pub lane: Rect,
    /// Grows as headlines occupy space; reset to `lane` on each base
    /// position query.
    pub lane_boundaries: Rect,
}

pub struct LaneManager {
    displays: Arc<dyn DisplayGeometry>,
    header_font: FontSpec,
    header_stylesheet: String,
    data: HashMap<ChyronId, LaneData>,
    dashboards: Vec<Dashboard>,
}

impl LaneManager {
    pub fn new(
        displays: Arc<dyn DisplayGeometry>,
        header_font: FontSpec,
        header_stylesheet: impl Into<String>,
    ) -> Self {
        Self {
            displays,
            header_font,
            header_stylesheet: header_stylesheet.into(),
            data: HashMap::new(),
            dashboards: Vec::new(),
        }
    }

    /// Register a chyron. Dashboard-typed stories join (or create) the
    /// dashboard for their group id on their display.
    pub fn subscribe(&mut self, chyron: ChyronId, story: StoryInfoRef, metrics: &dyn FontMetrics) {
        tracing::debug!(target: "lane", chyron = chyron.0,
            entry = ?story.entry_type, "subscribe");
        if story.entry_type.is_dashboard() {
            let dashboard = match self.dashboard_index(&story.dashboard_group_id, story.primary_display) {
                Some(index) => &mut self.dashboards[index],
                None => {
                    self.dashboards.push(Dashboard::new(
                        &story,
                        self.displays.as_ref(),
                        &self.header_font,
                        &self.header_stylesheet,
                        metrics,
                    ));
                    self.dashboards.last_mut().expect("just pushed")
                }
            };
            dashboard.add_member(chyron);
        }
        self.data.insert(
            chyron,
            LaneData {
                owner: chyron,
                story,
                lane: Rect::default(),
                lane_boundaries: Rect::default(),
            },
        );
    }

    /// Remove a chyron. Non-dashboard lanes drop immediately; dashboard
    /// members reflow per `action`.
    pub fn unsubscribe(
        &mut self,
        chyron: ChyronId,
        action: UnsubscribeAction,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        let Some(lane) = self.data.get(&chyron) else {
            return;
        };
        if !lane.story.entry_type.is_dashboard() {
            self.data.remove(&chyron);
            host.unsubscribed(chyron);
            return;
        }
        let group = lane.story.dashboard_group_id.clone();
        let display = lane.story.primary_display;
        if let Some(index) = self.dashboard_index(&group, display) {
            // the dashboard drops the lane data itself: a queued removal
            // still needs the boundaries to size the reflow shift
            self.dashboards[index].remove_member(chyron, action, &mut self.data, host, now);
            if self.dashboards[index].is_empty() && !self.dashboards[index].anim_in_progress() {
                self.dashboards.remove(index);
            }
        } else {
            self.data.remove(&chyron);
        }
    }

    pub fn lane_data(&self, chyron: ChyronId) -> Option<&LaneData> {
        self.data.get(&chyron)
    }

    pub fn dashboard(&self, group_id: &str, display: usize) -> Option<&Dashboard> {
        self.dashboard_index(group_id, display)
            .map(|i| &self.dashboards[i])
    }

    fn dashboard_index(&self, group_id: &str, display: usize) -> Option<usize> {
        self.dashboards
            .iter()
            .position(|d| d.is_id(group_id) && d.display() == display)
    }

    /// Advance dashboard header animations and queue machinery.
    pub fn tick(&mut self, now: u64, host: &mut dyn ChyronControl) {
        let Self {
            dashboards, data, ..
        } = self;
        for dashboard in dashboards.iter_mut() {
            dashboard.tick(now, data, host);
        }
        self.dashboards
            .retain(|d| !d.is_empty() || d.anim_in_progress());
    }

    /// Route a member chyron's shift completion to its dashboard.
    pub fn on_shift_complete(
        &mut self,
        chyron: ChyronId,
        group: GroupId,
        host: &mut dyn ChyronControl,
        now: u64,
    ) {
        let Self {
            dashboards, data, ..
        } = self;
        for dashboard in dashboards.iter_mut() {
            dashboard.on_shift_complete((chyron, group), data, host, now);
        }
        self.dashboards
            .retain(|d| !d.is_empty() || d.anim_in_progress());
    }

    /// Header paint specs for every live dashboard.
    pub fn header_paints(&self) -> Vec<HeadlinePaint> {
        self.dashboards.iter().map(Dashboard::header_paint).collect()
    }

    fn anchor_for(&self, lane: &LaneData) -> Rect {
        let story = &lane.story;
        if story.entry_type.is_dashboard() {
            if let Some(index) =
                self.dashboard_index(&story.dashboard_group_id, story.primary_display)
            {
                let dims = story.dimensions(self.displays.as_ref());
                return self.dashboards[index].member_slot(lane.owner, dims, story.as_ref());
            }
            return Rect::default();
        }
        let display = self.displays.display_rect(story.primary_display);
        base_anchor(story.entry_type, story.exit_type, display)
    }
}

impl LaneProvider for LaneManager {
    /// Recompute the anchor and reset the boundary rect to it.
    fn base_lane_position(&mut self, chyron: ChyronId) -> Rect {
        let Some(lane) = self.data.get(&chyron) else {
            return Rect::default();
        };
        let anchor = self.anchor_for(lane);
        let lane = self.data.get_mut(&chyron).expect("lane present");
        lane.lane = anchor;
        lane.lane_boundaries = anchor;
        anchor
    }

    fn grow_lane_boundaries(&mut self, chyron: ChyronId, rect: Rect) {
        if let Some(lane) = self.data.get_mut(&chyron) {
            lane.lane_boundaries.unite(&rect);
        }
    }
}

/// Anchor geometry for non-dashboard entries. Slide and Train lanes are a
/// one-pixel line on their display edge; Fade and Pop anchors collapse
/// according to the exit type (a sliding exit opens the lane to a full
/// line, a Fade or Pop exit collapses it to a point).
pub fn base_anchor(entry: AnimEntryType, exit: AnimExitType, display: Rect) -> Rect {
    use AnimEntryType::*;
    let (left, top) = (display.left(), display.top());
    let (right, bottom) = (display.right(), display.bottom());
    let center_x = left + display.width / 2;
    let center_y = top + display.height / 2;

    let vline = |x: i32| Rect::from_points(Point::new(x, top), Point::new(x, bottom));
    let hline = |y: i32| Rect::from_points(Point::new(left, y), Point::new(right, y));

    match entry {
        SlideDownLeftTop | TrainDownLeftTop | SlideUpLeftBottom | TrainUpLeftBottom => vline(left),
        SlideDownCenterTop | TrainDownCenterTop | SlideUpCenterBottom | TrainUpCenterBottom => {
            vline(center_x)
        }
        SlideDownRightTop | TrainDownRightTop | SlideUpRightBottom | TrainUpRightBottom => {
            vline(right)
        }
        SlideInLeftTop | TrainInLeftTop | SlideInRightTop | TrainInRightTop => hline(top),
        SlideInLeftBottom | TrainInLeftBottom | SlideInRightBottom | TrainInRightBottom => {
            hline(bottom)
        }
        FadeCenter | PopCenter => {
            if exit.moves() {
                if exit.is_horizontal() {
                    hline(center_y)
                } else {
                    vline(center_x)
                }
            } else {
                Rect::at(center_x, center_y)
            }
        }
        FadeLeftTop | PopLeftTop => corner_anchor(exit, left, top, display),
        FadeRightTop | PopRightTop => corner_anchor(exit, right, top, display),
        FadeLeftBottom | PopLeftBottom => corner_anchor(exit, left, bottom, display),
        FadeRightBottom | PopRightBottom => corner_anchor(exit, right, bottom, display),
        _ => Rect::default(),
    }
}

fn corner_anchor(exit: AnimExitType, x: i32, y: i32, display: Rect) -> Rect {
    if exit.moves() {
        if exit.is_horizontal() {
            // sliding sideways opens the whole horizontal line at the corner's edge
            Rect::from_points(
                Point::new(display.left(), y),
                Point::new(display.right(), y),
            )
        } else {
            Rect::from_points(
                Point::new(x, display.top()),
                Point::new(x, display.bottom()),
            )
        }
    } else {
        Rect::at(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::AnimEntryType::*;
    use core_types::AnimExitType;

    const DISPLAY: Rect = Rect::new(0, 0, 1000, 500);

    #[test]
    fn slide_lanes_are_edge_lines() {
        let lane = base_anchor(SlideDownLeftTop, AnimExitType::Pop, DISPLAY);
        assert_eq!(lane, Rect::new(0, 0, 0, 500));
        let lane = base_anchor(TrainDownCenterTop, AnimExitType::Pop, DISPLAY);
        assert_eq!(lane, Rect::new(500, 0, 0, 500));
        let lane = base_anchor(SlideUpRightBottom, AnimExitType::Pop, DISPLAY);
        assert_eq!(lane, Rect::new(1000, 0, 0, 500));
    }

    #[test]
    fn slide_in_lanes_span_the_full_width() {
        assert_eq!(
            base_anchor(SlideInLeftTop, AnimExitType::Pop, DISPLAY),
            Rect::new(0, 0, 1000, 0)
        );
        assert_eq!(
            base_anchor(TrainInRightBottom, AnimExitType::Pop, DISPLAY),
            Rect::new(0, 500, 1000, 0)
        );
    }

    #[test]
    fn center_anchor_collapses_with_the_exit() {
        // pop exit: a point
        assert_eq!(
            base_anchor(PopCenter, AnimExitType::Pop, DISPLAY),
            Rect::at(500, 250)
        );
        // horizontal slide exit: a horizontal line through the center
        assert_eq!(
            base_anchor(FadeCenter, AnimExitType::SlideLeft, DISPLAY),
            Rect::new(0, 250, 1000, 0)
        );
        // vertical slide exit: a vertical line through the center
        assert_eq!(
            base_anchor(FadeCenter, AnimExitType::SlideFadeDown, DISPLAY),
            Rect::new(500, 0, 0, 500)
        );
    }

    #[test]
    fn corner_anchor_collapses_with_the_exit() {
        assert_eq!(
            base_anchor(PopRightBottom, AnimExitType::Fade, DISPLAY),
            Rect::at(1000, 500)
        );
        assert_eq!(
            base_anchor(FadeLeftTop, AnimExitType::SlideRight, DISPLAY),
            Rect::new(0, 0, 1000, 0)
        );
        assert_eq!(
            base_anchor(FadeRightTop, AnimExitType::SlideUp, DISPLAY),
            Rect::new(1000, 0, 0, 500)
        );
    }
}
