//! Local text-file reporter.
//!
//! Tails a slow-to-moderately updated text file, assuming new content is
//! appended. A notify watcher nudges the worker thread on filesystem
//! events, with a one-second fallback poll; a size change must hold still
//! for one observation before it is reported, so half-written flushes are
//! not picked up.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use core_poller::PollerRegistry;

use crate::params::ParamSpec;
use crate::{CoverContext, Reporter, ReporterError, ReporterEvents};

const POLL_FALLBACK: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalTrigger {
    #[default]
    NewContent,
    FileChange,
}

/// What one size observation asks the worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailAction {
    None,
    /// Announce that the file changed (FileChange trigger).
    EmitChange,
    /// Read appended content from `offset` to the current end.
    ReadFrom { offset: u64 },
}

/// Size-stabilisation state machine: growth must be observed and then hold
/// still once before content is consumed; a shrink resets to the new end.
#[derive(Debug)]
struct TailState {
    trigger: LocalTrigger,
    last_size: u64,
    seek_offset: u64,
    stabilize_count: u32,
}

impl TailState {
    fn new(trigger: LocalTrigger, initial_size: u64) -> Self {
        Self {
            trigger,
            last_size: initial_size,
            seek_offset: initial_size,
            stabilize_count: 0,
        }
    }

    fn observe(&mut self, size: u64) -> TailAction {
        if self.stabilize_count > 0 && size == self.last_size {
            self.stabilize_count = 0;
            match self.trigger {
                LocalTrigger::FileChange => {
                    self.last_size = size;
                    self.seek_offset = size;
                    TailAction::EmitChange
                }
                LocalTrigger::NewContent => {
                    let action = if size > self.seek_offset {
                        TailAction::ReadFrom {
                            offset: self.seek_offset,
                        }
                    } else {
                        TailAction::None
                    };
                    self.last_size = size;
                    self.seek_offset = size;
                    action
                }
            }
        } else if size > self.last_size {
            self.last_size = size;
            self.stabilize_count += 1;
            TailAction::None
        } else if size < self.last_size {
            self.last_size = size;
            self.seek_offset = size;
            self.stabilize_count = 0;
            TailAction::None
        } else {
            TailAction::None
        }
    }
}

/// Strip a fixed number of characters from each line edge.
fn preprocess(text: &str, left_strip: usize, right_strip: usize) -> String {
    if left_strip == 0 && right_strip == 0 {
        return text.to_string();
    }
    text.split('\n')
        .map(|line| {
            let chars: Vec<char> = line.chars().collect();
            if chars.len() <= left_strip + right_strip {
                String::new()
            } else {
                chars[left_strip..chars.len() - right_strip].iter().collect()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

struct TailWorker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

#[derive(Default)]
pub struct TextFileReporter {
    path: PathBuf,
    trigger: LocalTrigger,
    left_strip: usize,
    right_strip: usize,
    worker: Option<TailWorker>,
}

impl TextFileReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn story_to_path(story: &str) -> PathBuf {
        PathBuf::from(story.strip_prefix("file://").unwrap_or(story))
    }
}

impl Drop for TextFileReporter {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            let _ = worker.handle.join();
        }
    }
}

impl Reporter for TextFileReporter {
    fn display_name(&self) -> (String, String) {
        (
            "Text File (Log)".to_string(),
            "Reads a slow-to-moderately updated text file from the local\n\
             disc. Assumes text is appended to the end of the file."
                .to_string(),
        )
    }

    fn plugin_class(&self) -> &'static str {
        "Local"
    }

    fn plugin_id(&self) -> &'static str {
        "{F1949758-2A08-4E8A-8290-90DCD270A8B9}"
    }

    fn supports(&self, story: &str) -> f32 {
        let path = Self::story_to_path(story);
        if path.is_file() { 1.0 } else { 0.0 }
    }

    fn requires(&self, _target_version: u32) -> Vec<ParamSpec> {
        vec![
            ParamSpec::parse(
                "New headlines are triggered by",
                "combo:new content,file changes",
            )
            .expect("static spec"),
            ParamSpec::parse("Strip characters from left", "integer:0").expect("static spec"),
            ParamSpec::parse("Strip characters from right", "integer:0").expect("static spec"),
        ]
    }

    fn set_requirements(&mut self, params: &[String]) -> Result<(), ReporterError> {
        crate::params::validate(&self.requires(self.requires_version()), params)?;
        self.trigger = match params.first().map(String::as_str) {
            Some("1") | Some("file changes") => LocalTrigger::FileChange,
            _ => LocalTrigger::NewContent,
        };
        self.left_strip = params
            .get(1)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        self.right_strip = params
            .get(2)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(())
    }

    fn set_story(&mut self, story: &str) {
        self.path = Self::story_to_path(story);
    }

    fn cover_story(&mut self, ctx: CoverContext<'_>) -> Result<(), ReporterError> {
        if self.worker.is_some() {
            return Err(ReporterError::CoverFailed(
                "already covering this story".into(),
            ));
        }
        let metadata = std::fs::metadata(&self.path)
            .map_err(|e| ReporterError::BadStory(format!("{}: {e}", self.path.display())))?;

        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_tail_thread(
            self.path.clone(),
            TailState::new(self.trigger, metadata.len()),
            self.left_strip,
            self.right_strip,
            ctx.events,
            stop.clone(),
        );
        self.worker = Some(TailWorker { stop, handle });
        tracing::debug!(target: "reporter.textfile",
            path = %self.path.display(), "coverage_started");
        Ok(())
    }

    fn finish_story(&mut self, _pollers: &mut PollerRegistry) -> Result<(), ReporterError> {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            let _ = worker.handle.join();
            tracing::debug!(target: "reporter.textfile",
                path = %self.path.display(), "coverage_finished");
        }
        Ok(())
    }
}

fn spawn_tail_thread(
    path: PathBuf,
    mut state: TailState,
    left_strip: usize,
    right_strip: usize,
    events: ReporterEvents,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (tx, rx) = mpsc::channel::<()>();
        // keep the watcher alive for the thread's lifetime; a failed
        // watcher degrades to pure polling
        let _watcher = notify::recommended_watcher(move |_event| {
            let _ = tx.send(());
        })
        .and_then(|mut w| {
            w.watch(&path, RecursiveMode::NonRecursive)?;
            Ok(w)
        })
        .map_err(|e| {
            tracing::warn!(target: "reporter.textfile", error = %e,
                "watch_failed_polling_only");
            e
        })
        .ok();

        while !stop.load(Ordering::SeqCst) {
            match rx.recv_timeout(POLL_FALLBACK) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    thread::sleep(POLL_FALLBACK);
                }
            }
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            match state.observe(metadata.len()) {
                TailAction::None => {}
                TailAction::EmitChange => {
                    events.new_data(
                        format!("Story '{}' was updated", path.display()).into_bytes(),
                    );
                }
                TailAction::ReadFrom { offset } => {
                    if let Some(content) = read_appended(&path, offset) {
                        let content = preprocess(&content, left_strip, right_strip);
                        if !content.is_empty() {
                            events.new_data(content.into_bytes());
                        }
                    }
                }
            }
        }
    })
}

fn read_appended(path: &Path, offset: u64) -> Option<String> {
    let mut file = File::open(path).ok()?;
    file.seek(SeekFrom::Start(offset)).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}
