//! Logical animations advanced by the event thread.
//!
//! An animation interpolates one property (geometry or opacity) of one
//! target over a duration with an easing curve. Animations always run
//! inside a parallel group; a single animation is a group of one. The
//! driver owns every group, applies interpolated values through a caller
//! callback on each `advance`, and reports group completions exactly once.
//!
//! Groups are either started immediately or parked for a deferred start, so
//! a dashboard can collect shift handles from several chyrons and run them
//! as one coordinated reflow.

use std::collections::HashMap;
use std::hash::Hash;

use core_types::easing::{lerp_f64, lerp_rect};
use core_types::{EasingCurve, Rect};

/// Milliseconds on the desk's monotonic clock.
pub type Millis = u64;

/// Handle to a (possibly deferred) animation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimProperty {
    Geometry { start: Rect, end: Rect },
    Opacity { start: f64, end: f64 },
}

/// Interpolated value handed to the apply callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Geometry(Rect),
    Opacity(f64),
}

#[derive(Debug, Clone)]
pub struct Animation<K> {
    pub target: K,
    pub property: AnimProperty,
    pub duration: Millis,
    pub curve: EasingCurve,
}

impl<K> Animation<K> {
    pub fn geometry(target: K, start: Rect, end: Rect, duration: Millis, curve: EasingCurve) -> Self {
        Self {
            target,
            property: AnimProperty::Geometry { start, end },
            duration,
            curve,
        }
    }

    pub fn opacity(target: K, start: f64, end: f64, duration: Millis, curve: EasingCurve) -> Self {
        Self {
            target,
            property: AnimProperty::Opacity { start, end },
            duration,
            curve,
        }
    }

    fn sample(&self, t: f64) -> PropertyValue {
        match self.property {
            AnimProperty::Geometry { start, end } => {
                PropertyValue::Geometry(lerp_rect(start, end, self.curve, t))
            }
            AnimProperty::Opacity { start, end } => {
                PropertyValue::Opacity(lerp_f64(start, end, self.curve, t))
            }
        }
    }
}

#[derive(Debug)]
struct Group<K, T> {
    tag: T,
    animations: Vec<Animation<K>>,
    started_at: Option<Millis>,
}

/// Owns and advances animation groups. `K` identifies the animated target,
/// `T` is the caller's completion tag.
#[derive(Debug)]
pub struct AnimationDriver<K, T> {
    next_id: u64,
    groups: HashMap<GroupId, Group<K, T>>,
    /// Start order for deterministic completion reporting.
    order: Vec<GroupId>,
}

impl<K: Eq + Hash + Copy, T> Default for AnimationDriver<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Copy, T> AnimationDriver<K, T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            groups: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, tag: T, animations: Vec<Animation<K>>, started_at: Option<Millis>) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        tracing::trace!(target: "anim",
            group = id.0, members = animations.len(),
            deferred = started_at.is_none(), "group_created");
        self.groups.insert(
            id,
            Group {
                tag,
                animations,
                started_at,
            },
        );
        self.order.push(id);
        id
    }

    /// Start a group immediately.
    pub fn start_group(&mut self, tag: T, animations: Vec<Animation<K>>, now: Millis) -> GroupId {
        self.insert(tag, animations, Some(now))
    }

    /// Park a group for a later `start` call.
    pub fn defer_group(&mut self, tag: T, animations: Vec<Animation<K>>) -> GroupId {
        self.insert(tag, animations, None)
    }

    /// Start a deferred group. Returns false for unknown or already-started
    /// groups.
    pub fn start(&mut self, id: GroupId, now: Millis) -> bool {
        match self.groups.get_mut(&id) {
            Some(group) if group.started_at.is_none() => {
                group.started_at = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self, id: GroupId) -> bool {
        self.groups
            .get(&id)
            .is_some_and(|g| g.started_at.is_some())
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Groups in flight or parked.
    pub fn is_idle(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop a group without completing it.
    pub fn cancel(&mut self, id: GroupId) {
        self.groups.remove(&id);
        self.order.retain(|g| *g != id);
    }

    /// Drop every animation that touches `target`. A group emptied this way
    /// is removed without a completion event.
    pub fn cancel_target(&mut self, target: K) {
        let mut emptied = Vec::new();
        for (id, group) in &mut self.groups {
            group.animations.retain(|a| a.target != target);
            if group.animations.is_empty() {
                emptied.push(*id);
            }
        }
        for id in emptied {
            self.cancel(id);
        }
    }

    pub fn cancel_all(&mut self) {
        self.groups.clear();
        self.order.clear();
    }

    /// Advance every running group to `now`, applying interpolated values
    /// through `apply`. Returns the groups that completed on this call, in
    /// start order, paired with their tags.
    pub fn advance(
        &mut self,
        now: Millis,
        mut apply: impl FnMut(K, PropertyValue),
    ) -> Vec<(GroupId, T)> {
        let mut completed = Vec::new();
        for id in self.order.clone() {
            let Some(group) = self.groups.get(&id) else {
                continue;
            };
            let Some(started) = group.started_at else {
                continue;
            };
            let mut all_done = true;
            for anim in &group.animations {
                let t = if anim.duration == 0 {
                    1.0
                } else {
                    (now.saturating_sub(started)) as f64 / anim.duration as f64
                };
                apply(anim.target, anim.sample(t));
                if t < 1.0 {
                    all_done = false;
                }
            }
            if all_done {
                let group = self.groups.remove(&id).expect("group present");
                self.order.retain(|g| *g != id);
                completed.push((id, group.tag));
            }
        }
        completed
    }

    /// Tags of completed groups, when the caller does not care which group
    /// finished.
    pub fn advance_tags(
        &mut self,
        now: Millis,
        apply: impl FnMut(K, PropertyValue),
    ) -> Vec<T> {
        self.advance(now, apply)
            .into_iter()
            .map(|(_, tag)| tag)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::EasingCurve;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Key(u32);

    #[test]
    fn single_animation_reaches_endpoint_and_completes_once() {
        let mut driver: AnimationDriver<Key, &str> = AnimationDriver::new();
        let start = Rect::new(0, -20, 100, 20);
        let end = Rect::new(0, 5, 100, 20);
        driver.start_group(
            "entry",
            vec![Animation::geometry(Key(1), start, end, 500, EasingCurve::InCubic)],
            1_000,
        );

        let mut last = None;
        assert!(driver.advance(1_250, |_, v| last = Some(v)).is_empty());
        let done = driver.advance_tags(1_500, |_, v| last = Some(v));
        assert_eq!(done, vec!["entry"]);
        assert_eq!(last, Some(PropertyValue::Geometry(end)));
        assert!(driver.is_idle());
        assert!(driver.advance(2_000, |_, _| {}).is_empty());
    }

    #[test]
    fn group_completes_when_slowest_member_finishes() {
        let mut driver: AnimationDriver<Key, u8> = AnimationDriver::new();
        driver.start_group(
            7,
            vec![
                Animation::opacity(Key(1), 0.0, 1.0, 200, EasingCurve::Linear),
                Animation::geometry(
                    Key(2),
                    Rect::new(0, 0, 10, 10),
                    Rect::new(50, 0, 10, 10),
                    600,
                    EasingCurve::Linear,
                ),
            ],
            0,
        );
        assert!(driver.advance(300, |_, _| {}).is_empty());
        assert_eq!(driver.advance_tags(600, |_, _| {}), vec![7]);
    }

    #[test]
    fn deferred_groups_wait_for_start() {
        let mut driver: AnimationDriver<Key, &str> = AnimationDriver::new();
        let id = driver.defer_group(
            "reflow",
            vec![Animation::opacity(Key(1), 1.0, 0.0, 100, EasingCurve::Linear)],
        );
        assert!(!driver.is_running(id));
        assert!(driver.advance(10_000, |_, _| {}).is_empty());
        assert!(driver.start(id, 10_000));
        assert!(!driver.start(id, 10_000), "double start refused");
        assert_eq!(driver.advance_tags(10_100, |_, _| {}), vec!["reflow"]);
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let mut driver: AnimationDriver<Key, &str> = AnimationDriver::new();
        driver.start_group(
            "pop",
            vec![Animation::opacity(Key(1), 1.0, 1.0, 0, EasingCurve::Linear)],
            5,
        );
        assert_eq!(driver.advance_tags(5, |_, _| {}), vec!["pop"]);
    }

    #[test]
    fn cancel_target_drops_only_that_key() {
        let mut driver: AnimationDriver<Key, &str> = AnimationDriver::new();
        driver.start_group(
            "a",
            vec![Animation::opacity(Key(1), 0.0, 1.0, 100, EasingCurve::Linear)],
            0,
        );
        driver.start_group(
            "b",
            vec![
                Animation::opacity(Key(1), 0.0, 1.0, 100, EasingCurve::Linear),
                Animation::opacity(Key(2), 0.0, 1.0, 100, EasingCurve::Linear),
            ],
            0,
        );
        driver.cancel_target(Key(1));
        // group "a" vanished, group "b" kept its Key(2) member
        assert_eq!(driver.advance_tags(100, |_, _| {}), vec!["b"]);
        assert!(driver.is_idle());
    }

    #[test]
    fn completion_order_follows_start_order() {
        let mut driver: AnimationDriver<Key, u8> = AnimationDriver::new();
        driver.start_group(
            1,
            vec![Animation::opacity(Key(1), 0.0, 1.0, 50, EasingCurve::Linear)],
            0,
        );
        driver.start_group(
            2,
            vec![Animation::opacity(Key(2), 0.0, 1.0, 50, EasingCurve::Linear)],
            0,
        );
        assert_eq!(driver.advance_tags(100, |_, _| {}), vec![1, 2]);
    }
}
