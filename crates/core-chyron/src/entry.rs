//! Entry geometry for every entry type.
//!
//! `initial_rect` places a headline off-lane (or in place for Pop/Fade),
//! `resting_rect` gives the on-screen endpoint of the entry animation, and
//! `sibling_shift` is the displacement applied to already-posted headlines
//! while a sliding or train entry makes room for the newcomer.
//!
//! Lane anchors for the Center variants carry the centerline in `left`/`top`
//! (a vertical centerline stores the x midpoint, the Fade/Pop center point
//! stores both), so "already positioned in the center" reads directly off
//! the lane rect.

use core_types::{AnimEntryType, Rect, Size, Vector};

/// Off-screen (or in-place) position a headline starts its entry from.
pub fn initial_rect(entry: AnimEntryType, lane: Rect, size: Size, margin: i32) -> Rect {
    use AnimEntryType::*;
    let (w, h) = (size.width, size.height);
    let (x, y) = match entry {
        SlideDownLeftTop | TrainDownLeftTop => (lane.left() + margin, lane.top() - h),
        SlideDownCenterTop | TrainDownCenterTop => (lane.left() - w / 2, lane.top() - h),
        SlideDownRightTop | TrainDownRightTop => (lane.right() - w - margin, lane.top() - h),
        SlideInLeftTop | TrainInLeftTop => (lane.left() - w, lane.top() + margin),
        SlideInRightTop | TrainInRightTop => (lane.right() + w, lane.top() + margin),
        SlideInLeftBottom | TrainInLeftBottom => (lane.left() - w, lane.bottom() - h - margin),
        SlideInRightBottom | TrainInRightBottom => (lane.right() + w, lane.bottom() - h - margin),
        SlideUpLeftBottom | TrainUpLeftBottom => (lane.left() + margin, lane.bottom() + h),
        SlideUpRightBottom | TrainUpRightBottom => (lane.right() - w - margin, lane.bottom() + h),
        SlideUpCenterBottom | TrainUpCenterBottom => (lane.left() - w / 2, lane.bottom() + h),
        FadeCenter | PopCenter => (lane.left() - w / 2, lane.top() - h / 2),
        FadeLeftTop | PopLeftTop => (lane.left() + margin, lane.top() + margin),
        FadeRightTop | PopRightTop => (lane.right() - w - margin, lane.top() + margin),
        FadeLeftBottom | PopLeftBottom => (lane.left() + margin, lane.bottom() - h - margin),
        FadeRightBottom | PopRightBottom => (lane.right() - w - margin, lane.bottom() - h - margin),
        // Dashboard headlines appear directly in the member's lane slot;
        // motion happens at the dashboard level during reflows.
        DashboardDownLeftTop | DashboardDownRightTop | DashboardInLeftTop
        | DashboardInRightTop | DashboardInLeftBottom | DashboardInRightBottom
        | DashboardUpLeftBottom | DashboardUpRightBottom => (lane.left(), lane.top()),
    };
    Rect::new(x, y, w, h)
}

/// On-screen endpoint of the entry animation. Non-moving entries rest where
/// they started.
pub fn resting_rect(entry: AnimEntryType, initial: Rect, display: Rect, margin: i32) -> Rect {
    use AnimEntryType::*;
    let r = initial;
    match entry {
        SlideDownLeftTop | SlideDownCenterTop | SlideDownRightTop | TrainDownLeftTop
        | TrainDownCenterTop | TrainDownRightTop => {
            r.with_position(r.x, display.top() + margin)
        }
        SlideInLeftTop | SlideInLeftBottom | TrainInLeftTop | TrainInLeftBottom => {
            r.with_position(display.left() + margin, r.y)
        }
        SlideInRightTop | SlideInRightBottom | TrainInRightTop | TrainInRightBottom => {
            r.with_position(display.right() - r.width - margin, r.y)
        }
        SlideUpLeftBottom | SlideUpRightBottom | SlideUpCenterBottom | TrainUpLeftBottom
        | TrainUpRightBottom | TrainUpCenterBottom => {
            r.with_position(r.x, display.bottom() - r.height - margin)
        }
        _ => r,
    }
}

/// Displacement applied to every posted headline while the new one enters.
/// `size` is the entering headline's size. Non-moving entries displace
/// nothing.
pub fn sibling_shift(entry: AnimEntryType, size: Size, margin: i32) -> Option<Vector> {
    use AnimEntryType::*;
    match entry {
        SlideDownLeftTop | SlideDownCenterTop | SlideDownRightTop | TrainDownLeftTop
        | TrainDownCenterTop | TrainDownRightTop => Some(Vector::down(size.height + margin)),
        SlideInLeftTop | SlideInLeftBottom | TrainInLeftTop | TrainInLeftBottom => {
            Some(Vector::right(size.width + margin))
        }
        SlideInRightTop | SlideInRightBottom | TrainInRightTop | TrainInRightBottom => {
            Some(Vector::left(size.width + margin))
        }
        SlideUpLeftBottom | SlideUpRightBottom | SlideUpCenterBottom | TrainUpLeftBottom
        | TrainUpRightBottom | TrainUpCenterBottom => Some(Vector::up(size.height + margin)),
        _ => None,
    }
}
