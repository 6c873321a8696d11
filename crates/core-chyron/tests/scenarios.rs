//! End-to-end scheduler scenarios driven on a simulated 100 ms clock.

use std::sync::Arc;

use core_chyron::{Chyron, ChyronEvent, LaneProvider, TICK_INTERVAL_MS};
use core_headline::Headline;
use core_headline::fit::ScaledMetrics;
use core_story::StoryInfo;
use core_types::{AnimEntryType, AnimExitType, ChyronId, FixedDisplays, HeadlineId, Rect};

struct Lanes {
    lane: Rect,
    boundaries: Rect,
}

impl LaneProvider for Lanes {
    fn base_lane_position(&mut self, _chyron: ChyronId) -> Rect {
        self.boundaries = self.lane;
        self.lane
    }

    fn grow_lane_boundaries(&mut self, _chyron: ChyronId, rect: Rect) {
        self.boundaries.unite(&rect);
    }
}

struct Sim {
    chyron: Chyron,
    lanes: Lanes,
    displays: FixedDisplays,
    metrics: ScaledMetrics,
    now: u64,
    destroyed: Vec<HeadlineId>,
}

impl Sim {
    fn new(story: StoryInfo, lane: Rect, display: Rect) -> Self {
        let mut chyron = Chyron::new(ChyronId(1), Arc::new(story));
        chyron.display();
        Self {
            chyron,
            lanes: Lanes {
                lane,
                boundaries: Rect::default(),
            },
            displays: FixedDisplays::single(display),
            metrics: ScaledMetrics,
            now: 0,
            destroyed: Vec::new(),
        }
    }

    fn file(&mut self, text: &str) {
        let story = self.chyron.story_info().identity.clone();
        self.chyron
            .file_headline(Headline::new(story, text, self.now))
            .unwrap();
    }

    /// Run ticks up to and including `until` milliseconds.
    fn run_until(&mut self, until: u64) {
        while self.now < until {
            self.now += TICK_INTERVAL_MS;
            let events =
                self.chyron
                    .tick(self.now, &mut self.lanes, &self.displays, &self.metrics);
            for event in events {
                if let ChyronEvent::HeadlineOutOfScope(id) = event {
                    self.destroyed.push(id);
                }
            }
        }
    }
}

fn pop_story(ttl: u64) -> StoryInfo {
    StoryInfo {
        identity: "pop".into(),
        entry_type: AnimEntryType::PopCenter,
        exit_type: AnimExitType::Pop,
        ttl,
        interpret_as_pixels: true,
        headlines_pixel_width: 200,
        headlines_pixel_height: 40,
        ..StoryInfo::default()
    }
}

fn train_story() -> StoryInfo {
    StoryInfo {
        identity: "train".into(),
        entry_type: AnimEntryType::TrainDownCenterTop,
        exit_type: AnimExitType::Pop,
        ttl: 60,
        interpret_as_pixels: true,
        headlines_pixel_width: 200,
        headlines_pixel_height: 40,
        ..StoryInfo::default()
    }
}

/// Spec scenario: Pop entry, 5 s ttl, three headlines filed a second apart
/// drain out one second apart.
#[test]
fn pop_ttl_staircase() {
    let mut sim = Sim::new(
        pop_story(5),
        Rect::at(500, 250),
        Rect::new(0, 0, 1000, 500),
    );

    sim.file("first");
    sim.run_until(1_000);
    sim.file("second");
    sim.run_until(2_000);
    sim.file("third");

    // all three visible once posted
    sim.run_until(2_100);
    assert_eq!(sim.chyron.posted().len(), 3);

    // first posts at t=0.1, expires strictly after t=5.1
    sim.run_until(5_100);
    assert_eq!(sim.chyron.posted().len(), 3);
    sim.run_until(5_300);
    assert_eq!(sim.chyron.posted().len(), 2);
    assert_eq!(sim.destroyed.len(), 1);

    sim.run_until(6_300);
    assert_eq!(sim.chyron.posted().len(), 1);

    sim.run_until(7_300);
    assert_eq!(sim.chyron.posted().len(), 0);

    sim.run_until(8_000);
    assert_eq!(sim.chyron.headline_count(), 0);
    assert_eq!(sim.destroyed.len(), 3);
}

/// Spec scenario: a train entry pushes the posted sibling down by the
/// newcomer's height plus margin and lands at the top margin itself.
#[test]
fn train_push_displaces_siblings() {
    let mut sim = Sim::new(
        train_story(),
        Rect::new(500, 0, 0, 500),
        Rect::new(0, 0, 1000, 500),
    );

    sim.file("A");
    sim.run_until(600); // A entered and posted at (400, 5)
    let a = sim.chyron.posted()[0];
    assert_eq!(sim.chyron.headline(a).unwrap().geometry, Rect::new(400, 5, 200, 40));

    sim.file("B");
    sim.run_until(1_700); // B's train group has landed

    assert_eq!(sim.chyron.posted().len(), 2);
    let b = *sim.chyron.posted().last().unwrap();
    // B rests at the top margin; A was pushed down by h_B + margin
    assert_eq!(sim.chyron.headline(b).unwrap().geometry, Rect::new(400, 5, 200, 40));
    assert_eq!(
        sim.chyron.headline(a).unwrap().geometry,
        Rect::new(400, 5 + 40 + 5, 200, 40)
    );
    assert!(sim.destroyed.is_empty());
}

/// A train push that moves a headline fully off the display destroys it
/// when the group completes.
#[test]
fn train_expires_fully_offscreen_headlines() {
    let mut sim = Sim::new(
        train_story(),
        Rect::new(500, 0, 0, 60),
        Rect::new(0, 0, 1000, 60),
    );

    sim.file("A");
    sim.run_until(600);
    let a = sim.chyron.posted()[0];

    sim.file("B");
    sim.run_until(1_700);
    // A now spans y 50..90 with the display ending at 60: top corners are
    // still on-screen, so it survives
    assert_eq!(sim.chyron.posted().len(), 2);
    assert!(sim.destroyed.is_empty());

    sim.file("C");
    sim.run_until(2_800);
    // A now spans y 95..135, all four corners off-display
    assert!(sim.destroyed.contains(&a));
    assert_eq!(sim.chyron.posted().len(), 2);
}

/// Train headlines never exit; once the ttl fires they are only flagged as
/// ignored.
#[test]
fn train_headlines_never_take_the_exit_path() {
    let mut story = train_story();
    story.ttl = 1;
    let mut sim = Sim::new(story, Rect::new(500, 0, 0, 500), Rect::new(0, 0, 1000, 500));

    sim.file("A");
    sim.run_until(600);
    let a = sim.chyron.posted()[0];

    sim.run_until(2_000);
    let h = sim.chyron.headline(a).unwrap();
    assert!(h.ignore);
    assert_eq!(sim.chyron.posted().len(), 1);
    assert!(sim.destroyed.is_empty());

    // and it stays put forever
    sim.run_until(10_000);
    assert_eq!(sim.chyron.posted().len(), 1);
}
