//! Producer: the bridge between one reporter and one chyron.
//!
//! Payloads arrive from the reporter, get a style by keyword trigger, are
//! optionally split into fixed-line chunks, and leave as headlines filed
//! with the chyron. The producer also owns the story lifecycle (start,
//! stop, shelve) and the bookkeeping for reporter-drawn headlines.
//!
//! The chyron is reached through the `ChyronHandle` trait so the producer
//! never holds the chyron itself; the desk implements the handle over its
//! chyron collection.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;

use core_headline::{Headline, ProgressConfig};
use core_poller::PollerRegistry;
use core_reporter::{CoverContext, Reporter, ReporterError, ReporterEvents, ReporterSignal};
use core_story::styles::DEFAULT_STYLE;
use core_story::{StoryInfoRef, StyleList};
use core_types::{HeadlineId, ProducerId};

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("the reporter failed to start coverage: {0}")]
    ReporterCoverFailed(#[source] ReporterError),
    #[error("the reporter failed to finish coverage: {0}")]
    ReporterFinishFailed(#[source] ReporterError),
    #[error("the story is not being covered")]
    NotCovering,
}

/// The producer's view of its chyron.
pub trait ChyronHandle {
    fn display(&mut self);
    fn hide(&mut self);
    fn shelve(&mut self);
    /// Enqueue a headline; `None` when the chyron refused it.
    fn file_headline(&mut self, headline: Headline) -> Option<HeadlineId>;
    fn highlight_headline(&mut self, headline: HeadlineId, opacity: f64, timeout_ms: u64);
}

pub struct Producer {
    id: ProducerId,
    story_info: StoryInfoRef,
    style_list: Rc<RefCell<StyleList>>,
    reporter: Box<dyn Reporter>,
    reporter_draw: bool,
    covering: bool,
    shelved: bool,
    /// Live reporter-drawn headlines, oldest first.
    draw_headlines: Vec<HeadlineId>,
}

impl Producer {
    pub fn new(
        id: ProducerId,
        story_info: StoryInfoRef,
        style_list: Rc<RefCell<StyleList>>,
        reporter: Box<dyn Reporter>,
    ) -> Self {
        let reporter_draw = reporter.use_reporter_draw();
        Self {
            id,
            story_info,
            style_list,
            reporter,
            reporter_draw,
            covering: false,
            shelved: false,
            draw_headlines: Vec::new(),
        }
    }

    pub fn id(&self) -> ProducerId {
        self.id
    }

    pub fn story_info(&self) -> &StoryInfoRef {
        &self.story_info
    }

    pub fn is_covering(&self) -> bool {
        self.covering
    }

    pub fn is_shelved(&self) -> bool {
        self.shelved
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    pub fn reporter_mut(&mut self) -> &mut dyn Reporter {
        self.reporter.as_mut()
    }

    /// Attach the chyron, start the reporter. A shelved story just comes
    /// back on screen; a cover failure leaves the wiring torn down.
    pub fn start_covering_story(
        &mut self,
        chyron: &mut dyn ChyronHandle,
        pollers: &mut PollerRegistry,
        signals: UnboundedSender<ReporterSignal>,
        now: u64,
    ) -> Result<(), ProducerError> {
        if self.shelved {
            chyron.display();
            self.shelved = false;
            return Ok(());
        }
        if self.covering {
            return Ok(());
        }

        chyron.display();
        self.reporter.set_story(&self.story_info.story);
        let events = ReporterEvents::new(self.id, signals);
        match self.reporter.cover_story(CoverContext {
            events,
            pollers,
            now,
        }) {
            Ok(()) => {
                self.covering = true;
                tracing::info!(target: "producer",
                    story = %self.story_info.identity, "covering_story");
                Ok(())
            }
            Err(e) => {
                chyron.hide();
                tracing::warn!(target: "producer",
                    story = %self.story_info.identity, error = %e, "cover_failed");
                Err(ProducerError::ReporterCoverFailed(e))
            }
        }
    }

    /// Stop the reporter and hide the chyron (unless shelved, which already
    /// hid it).
    pub fn stop_covering_story(
        &mut self,
        chyron: &mut dyn ChyronHandle,
        pollers: &mut PollerRegistry,
    ) -> Result<(), ProducerError> {
        if !self.covering {
            return Ok(());
        }
        if !self.shelved {
            chyron.hide();
        }
        self.shelved = false;
        self.draw_headlines.clear();
        self.reporter
            .finish_story(pollers)
            .map_err(ProducerError::ReporterFinishFailed)?;
        self.covering = false;
        tracing::info!(target: "producer",
            story = %self.story_info.identity, "stopped_covering");
        Ok(())
    }

    /// Shelve without stopping the reporter; only valid while covering.
    pub fn shelve_story(&mut self, chyron: &mut dyn ChyronHandle) -> Result<(), ProducerError> {
        if !self.covering {
            return Err(ProducerError::NotCovering);
        }
        chyron.shelve();
        self.shelved = true;
        Ok(())
    }

    pub fn unshelve_story(&mut self, chyron: &mut dyn ChyronHandle) {
        if self.shelved {
            chyron.display();
            self.shelved = false;
        }
    }

    /// New payload from the reporter. Shelved stories drop payloads; the
    /// reporter keeps running so nothing is missed structurally.
    pub fn ingest(&mut self, chyron: &mut dyn ChyronHandle, payload: &[u8], now: u64) {
        if self.shelved {
            return;
        }
        let text = String::from_utf8_lossy(payload);
        if !self.story_info.limit_content || self.story_info.limit_content_to == 0 {
            self.file_headline(chyron, &text, now);
            return;
        }
        for chunk in chunk_payload(&text, self.story_info.limit_content_to) {
            self.file_headline(chyron, &chunk, now);
        }
    }

    fn file_headline(&mut self, chyron: &mut dyn ChyronHandle, text: &str, now: u64) {
        let stylesheet = select_stylesheet(&self.style_list.borrow(), text);

        let mut headline = Headline::new(self.story_info.identity.clone(), text, now);
        headline.stylesheet = stylesheet;
        headline.font = self.story_info.font.clone();
        headline.margin = self.story_info.margin;
        headline.compact_mode = self.story_info.dashboard_compact_mode;
        if self.story_info.include_progress_bar {
            headline.progress = Regex::new(&self.story_info.progress_text_re)
                .ok()
                .map(|regex| ProgressConfig {
                    regex,
                    on_top: self.story_info.progress_on_top,
                });
        }
        headline.reporter_draw = self.reporter_draw;

        if let Some(id) = chyron.file_headline(headline)
            && self.reporter_draw
        {
            self.draw_headlines.push(id);
        }
    }

    /// The chyron destroyed a headline; drop any reporter-draw bookkeeping.
    pub fn headline_going_out_of_scope(&mut self, headline: HeadlineId) {
        self.draw_headlines.retain(|h| *h != headline);
    }

    /// Reporter asked for a highlight; it lands on the oldest live
    /// reporter-drawn headline.
    pub fn handle_highlight(
        &mut self,
        chyron: &mut dyn ChyronHandle,
        opacity: f64,
        timeout_ms: u64,
    ) {
        if let Some(front) = self.draw_headlines.first() {
            chyron.highlight_headline(*front, opacity, timeout_ms);
        }
    }

    pub fn draw_headline_count(&self) -> usize {
        self.draw_headlines.len()
    }
}

/// First non-Default style whose trigger substring occurs in the payload
/// (case-insensitive, list order) wins; otherwise the Default style.
pub fn select_stylesheet(styles: &StyleList, payload: &str) -> String {
    let lower = payload.to_lowercase();
    for style in styles.styles() {
        if style.name == DEFAULT_STYLE {
            continue;
        }
        if style
            .triggers
            .iter()
            .any(|trigger| lower.contains(&trigger.to_lowercase()))
        {
            return style.stylesheet.clone();
        }
    }
    styles.default_style().stylesheet.clone()
}

/// Split a payload on `<br>` (when present) or newline, emitting a chunk
/// every `limit` lines with the original separator preserved; a trailing
/// remainder becomes one final chunk.
pub fn chunk_payload(payload: &str, limit: usize) -> Vec<String> {
    let separator = if payload.contains("<br>") { "<br>" } else { "\n" };
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for line in payload.split(separator) {
        if !current.is_empty() {
            current.push_str(separator);
        }
        current.push_str(line);
        count += 1;
        if count % limit == 0 && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_story::{HeadlineStyle, StoryInfo};
    use core_types::Rect;

    #[derive(Default)]
    struct MockChyron {
        displayed: u32,
        hidden: u32,
        shelved: u32,
        filed: Vec<Headline>,
        highlights: Vec<(HeadlineId, u64)>,
        next_id: u64,
    }

    impl ChyronHandle for MockChyron {
        fn display(&mut self) {
            self.displayed += 1;
        }

        fn hide(&mut self) {
            self.hidden += 1;
        }

        fn shelve(&mut self) {
            self.shelved += 1;
        }

        fn file_headline(&mut self, headline: Headline) -> Option<HeadlineId> {
            self.filed.push(headline);
            let id = HeadlineId(self.next_id);
            self.next_id += 1;
            Some(id)
        }

        fn highlight_headline(&mut self, headline: HeadlineId, _opacity: f64, timeout_ms: u64) {
            self.highlights.push((headline, timeout_ms));
        }
    }

    /// Reporter stub: configurable cover outcome, optional owner-draw.
    struct StubReporter {
        cover_ok: bool,
        owner_draw: bool,
        covering: bool,
    }

    impl StubReporter {
        fn new(cover_ok: bool, owner_draw: bool) -> Self {
            Self {
                cover_ok,
                owner_draw,
                covering: false,
            }
        }
    }

    impl Reporter for StubReporter {
        fn display_name(&self) -> (String, String) {
            ("Stub".into(), "test double".into())
        }

        fn plugin_class(&self) -> &'static str {
            "Local"
        }

        fn plugin_id(&self) -> &'static str {
            "{00000000-0000-0000-0000-000000000000}"
        }

        fn supports(&self, _story: &str) -> f32 {
            1.0
        }

        fn requires(&self, _v: u32) -> Vec<core_reporter::ParamSpec> {
            Vec::new()
        }

        fn set_requirements(&mut self, _params: &[String]) -> Result<(), ReporterError> {
            Ok(())
        }

        fn set_story(&mut self, _story: &str) {}

        fn cover_story(&mut self, _ctx: CoverContext<'_>) -> Result<(), ReporterError> {
            if self.cover_ok {
                self.covering = true;
                Ok(())
            } else {
                Err(ReporterError::CoverFailed("stub refusal".into()))
            }
        }

        fn finish_story(&mut self, _pollers: &mut PollerRegistry) -> Result<(), ReporterError> {
            self.covering = false;
            Ok(())
        }

        fn use_reporter_draw(&self) -> bool {
            self.owner_draw
        }
    }

    fn styles() -> Rc<RefCell<StyleList>> {
        let mut list = StyleList::new("default-style");
        list.upsert(HeadlineStyle {
            name: "Alert".into(),
            triggers: vec!["error".into(), "fail".into()],
            stylesheet: "alert-style".into(),
        });
        Rc::new(RefCell::new(list))
    }

    fn story() -> StoryInfoRef {
        std::sync::Arc::new(StoryInfo {
            identity: "story-1".into(),
            story: "file:///tmp/story".into(),
            ..StoryInfo::default()
        })
    }

    fn producer(reporter: StubReporter) -> Producer {
        Producer::new(ProducerId(1), story(), styles(), Box::new(reporter))
    }

    #[test]
    fn style_triggers_select_in_list_order() {
        let styles = styles();
        let styles = styles.borrow();
        assert_eq!(
            select_stylesheet(&styles, "Job finished with error: 42"),
            "alert-style"
        );
        assert_eq!(select_stylesheet(&styles, "Job succeeded"), "default-style");
        // matching is case-insensitive
        assert_eq!(select_stylesheet(&styles, "ERROR in x"), "alert-style");
    }

    #[test]
    fn chunking_splits_on_newlines() {
        let chunks = chunk_payload("a\nb\nc\nd\ne", 2);
        assert_eq!(chunks, vec!["a\nb", "c\nd", "e"]);
    }

    #[test]
    fn chunking_prefers_br_separators() {
        let chunks = chunk_payload("a<br>b<br>c", 2);
        assert_eq!(chunks, vec!["a<br>b", "c"]);
    }

    #[test]
    fn exact_multiple_leaves_no_remainder() {
        let chunks = chunk_payload("a\nb\nc\nd", 2);
        assert_eq!(chunks, vec!["a\nb", "c\nd"]);
    }

    #[test]
    fn ingest_applies_style_and_story_settings() {
        let mut p = producer(StubReporter::new(true, false));
        let mut chyron = MockChyron::default();
        p.ingest(&mut chyron, b"build error detected", 100);
        assert_eq!(chyron.filed.len(), 1);
        let filed = &chyron.filed[0];
        assert_eq!(filed.story, "story-1");
        assert_eq!(filed.stylesheet, "alert-style");
        assert_eq!(filed.margin, 5);
        assert_eq!(filed.created, 100);
    }

    #[test]
    fn ingest_chunks_when_content_is_limited() {
        let story = std::sync::Arc::new(StoryInfo {
            identity: "story-1".into(),
            limit_content: true,
            limit_content_to: 2,
            ..StoryInfo::default()
        });
        let mut p = Producer::new(
            ProducerId(1),
            story,
            styles(),
            Box::new(StubReporter::new(true, false)),
        );
        let mut chyron = MockChyron::default();
        p.ingest(&mut chyron, b"1\n2\n3\n4\n5", 0);
        assert_eq!(chyron.filed.len(), 3);
        assert_eq!(chyron.filed[0].text, "1\n2");
        assert_eq!(chyron.filed[2].text, "5");
    }

    #[test]
    fn shelved_stories_drop_payloads() {
        let mut p = producer(StubReporter::new(true, false));
        let mut chyron = MockChyron::default();
        let mut pollers = PollerRegistry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        p.start_covering_story(&mut chyron, &mut pollers, tx, 0)
            .unwrap();
        p.shelve_story(&mut chyron).unwrap();
        p.ingest(&mut chyron, b"silent", 0);
        assert!(chyron.filed.is_empty());
        assert_eq!(chyron.shelved, 1);
    }

    #[test]
    fn cover_failure_tears_down_the_wiring() {
        let mut p = producer(StubReporter::new(false, false));
        let mut chyron = MockChyron::default();
        let mut pollers = PollerRegistry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let result = p.start_covering_story(&mut chyron, &mut pollers, tx, 0);
        assert!(matches!(result, Err(ProducerError::ReporterCoverFailed(_))));
        assert!(!p.is_covering());
        assert_eq!(chyron.displayed, 1);
        assert_eq!(chyron.hidden, 1);
    }

    #[test]
    fn start_after_shelve_just_redisplays() {
        let mut p = producer(StubReporter::new(true, false));
        let mut chyron = MockChyron::default();
        let mut pollers = PollerRegistry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        p.start_covering_story(&mut chyron, &mut pollers, tx.clone(), 0)
            .unwrap();
        p.shelve_story(&mut chyron).unwrap();
        p.start_covering_story(&mut chyron, &mut pollers, tx, 0)
            .unwrap();
        assert!(p.is_covering());
        assert!(!p.is_shelved());
        assert_eq!(chyron.displayed, 2);
    }

    #[test]
    fn shelve_requires_coverage() {
        let mut p = producer(StubReporter::new(true, false));
        let mut chyron = MockChyron::default();
        assert!(matches!(
            p.shelve_story(&mut chyron),
            Err(ProducerError::NotCovering)
        ));
    }

    #[test]
    fn reporter_draw_headlines_are_tracked_and_stripped() {
        let mut p = producer(StubReporter::new(true, true));
        let mut chyron = MockChyron::default();
        p.ingest(&mut chyron, b"one", 0);
        p.ingest(&mut chyron, b"two", 0);
        assert_eq!(p.draw_headline_count(), 2);
        assert!(chyron.filed.iter().all(|h| h.reporter_draw));

        // highlight lands on the oldest live reporter-drawn headline
        p.handle_highlight(&mut chyron, 1.0, 3_000);
        assert_eq!(chyron.highlights, vec![(HeadlineId(0), 3_000)]);

        p.headline_going_out_of_scope(HeadlineId(0));
        assert_eq!(p.draw_headline_count(), 1);
        p.handle_highlight(&mut chyron, 1.0, 3_000);
        assert_eq!(chyron.highlights.last(), Some(&(HeadlineId(1), 3_000)));
    }

    #[test]
    fn progress_config_follows_the_story() {
        let story = std::sync::Arc::new(StoryInfo {
            identity: "story-1".into(),
            include_progress_bar: true,
            progress_on_top: true,
            ..StoryInfo::default()
        });
        let mut p = Producer::new(
            ProducerId(1),
            story,
            styles(),
            Box::new(StubReporter::new(true, false)),
        );
        let mut chyron = MockChyron::default();
        p.ingest(&mut chyron, b"Building ... 37% complete", 0);
        let mut filed = chyron.filed.remove(0);
        filed.geometry = Rect::new(0, 0, 200, 50);
        let paint = filed.progress_paint().expect("bar configured");
        assert!((paint.fraction - 0.37).abs() < 1e-9);
        assert_eq!(paint.rect.y, core_headline::progress::BAR_HEIGHT);
    }
}
