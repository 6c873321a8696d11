//! Reporter plug-in contract and the built-in reporters.
//!
//! A reporter is an opaque data source for one story: it advertises what
//! parameters it needs, says how confident it is about a story URL, and
//! once covering, delivers byte payloads through a `ReporterEvents` handle.
//! Reporters may run worker threads or async tasks internally, but every
//! payload re-enters the system through the event channel and is processed
//! on the event thread.
//!
//! Discovery is a static registry of in-process factories; the contract
//! would equally support dynamically loaded plug-ins.

pub mod buildwatch;
pub mod params;
pub mod registry;
pub mod textfile;

use tokio::sync::mpsc::UnboundedSender;

use core_poller::PollerRegistry;
use core_types::{ProducerId, Rect};

pub use params::{ParamError, ParamSpec, ParamType};

#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error("coverage could not start: {0}")]
    CoverFailed(String),
    #[error("story target is unusable: {0}")]
    BadStory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementsFormat {
    Simple,
}

/// Signals a reporter can raise; the desk routes them to the right
/// producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterSignal {
    NewData {
        producer: ProducerId,
        payload: Vec<u8>,
    },
    Highlight {
        producer: ProducerId,
        /// Opacity ×1000 to stay hashable; divide on receipt.
        opacity_milli: u32,
        timeout_ms: u64,
    },
    ShelveStory {
        producer: ProducerId,
    },
    UnshelveStory {
        producer: ProducerId,
    },
}

/// Payload-delivery handle given to a reporter for the duration of one
/// coverage. Cheap to clone into worker threads.
#[derive(Debug, Clone)]
pub struct ReporterEvents {
    producer: ProducerId,
    tx: UnboundedSender<ReporterSignal>,
}

impl ReporterEvents {
    pub fn new(producer: ProducerId, tx: UnboundedSender<ReporterSignal>) -> Self {
        Self { producer, tx }
    }

    pub fn new_data(&self, payload: Vec<u8>) {
        let _ = self.tx.send(ReporterSignal::NewData {
            producer: self.producer,
            payload,
        });
    }

    pub fn highlight(&self, opacity: f64, timeout_ms: u64) {
        let _ = self.tx.send(ReporterSignal::Highlight {
            producer: self.producer,
            opacity_milli: (opacity.clamp(0.0, 1.0) * 1000.0) as u32,
            timeout_ms,
        });
    }

    pub fn shelve_story(&self) {
        let _ = self.tx.send(ReporterSignal::ShelveStory {
            producer: self.producer,
        });
    }

    pub fn unshelve_story(&self) {
        let _ = self.tx.send(ReporterSignal::UnshelveStory {
            producer: self.producer,
        });
    }
}

/// Resources available to a reporter while starting coverage.
pub struct CoverContext<'a> {
    pub events: ReporterEvents,
    pub pollers: &'a mut PollerRegistry,
    pub now: u64,
}

/// Painting surface handed to owner-drawing reporters.
pub trait ReporterPainter {
    fn draw_text(&mut self, rect: Rect, text: &str);
    fn draw_bar(&mut self, rect: Rect, fraction: f64);
}

/// The reporter contract. One instance covers at most one story at a time.
pub trait Reporter {
    /// Short display name plus a tooltip-length description.
    fn display_name(&self) -> (String, String);
    /// Story category this reporter serves ("Local", "REST", ...).
    fn plugin_class(&self) -> &'static str;
    /// Globally unique, stable identifier.
    fn plugin_id(&self) -> &'static str;
    /// Confidence in `[0, 1]` that this reporter can cover the story.
    fn supports(&self, story: &str) -> f32;

    fn requires_version(&self) -> u32 {
        1
    }

    fn requires_format(&self) -> RequirementsFormat {
        RequirementsFormat::Simple
    }

    /// Upgrade persisted parameters in place from `version`; returns true
    /// when the parameters were changed.
    fn requires_upgrade(&self, _version: u32, _params: &mut Vec<String>) -> bool {
        false
    }

    fn requires(&self, target_version: u32) -> Vec<ParamSpec>;

    fn set_requirements(&mut self, params: &[String]) -> Result<(), ReporterError>;

    fn set_story(&mut self, story: &str);

    fn cover_story(&mut self, ctx: CoverContext<'_>) -> Result<(), ReporterError>;

    fn finish_story(&mut self, pollers: &mut PollerRegistry) -> Result<(), ReporterError>;

    /// Obfuscate sensitive fields in place before persistence.
    fn secure(&self, _params: &mut Vec<String>) {}

    /// Undo `secure` in place.
    fn unsecure(&self, _params: &mut Vec<String>) {}

    /// Owner-draw support: the reporter paints the headline itself.
    fn use_reporter_draw(&self) -> bool {
        false
    }

    fn reporter_draw(&mut self, _bounds: Rect, _painter: &mut dyn ReporterPainter) {}
}

/// Hex obfuscation used by reporters with password parameters. Symmetric
/// enough that securing twice still unsecures cleanly is NOT guaranteed;
/// callers keep track of which state a parameter list is in.
pub fn hex_obfuscate(value: &str) -> String {
    value.bytes().map(|b| format!("{b:02x}")).collect()
}

pub fn hex_deobfuscate(value: &str) -> Option<String> {
    if value.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(value.len() / 2);
    for i in (0..value.len()).step_by(2) {
        bytes.push(u8::from_str_radix(value.get(i..i + 2)?, 16).ok()?);
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_deliver_to_the_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let events = ReporterEvents::new(ProducerId(3), tx);
        events.new_data(b"payload".to_vec());
        events.highlight(0.8, 2_000);
        events.shelve_story();
        events.unshelve_story();

        assert_eq!(
            rx.try_recv().unwrap(),
            ReporterSignal::NewData {
                producer: ProducerId(3),
                payload: b"payload".to_vec()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ReporterSignal::Highlight {
                producer: ProducerId(3),
                opacity_milli: 800,
                timeout_ms: 2_000
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ReporterSignal::ShelveStory {
                producer: ProducerId(3)
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ReporterSignal::UnshelveStory {
                producer: ProducerId(3)
            }
        );
    }

    #[test]
    fn hex_round_trip() {
        let secret = "hunter2!";
        let secured = hex_obfuscate(secret);
        assert_ne!(secured, secret);
        assert_eq!(hex_deobfuscate(&secured).as_deref(), Some(secret));
    }

    #[test]
    fn hex_rejects_odd_input() {
        assert_eq!(hex_deobfuscate("abc"), None);
    }
}
