//! Shared polling substrate.
//!
//! N subscribers watching the same endpoint collapse into one poller held
//! in a refcounted registry keyed by URL. The poller itself is a pure
//! state machine: the runtime calls `pump` on a 200 ms cadence to obtain
//! the next request to issue (at most one outstanding), performs it
//! through the `Transport` seam, and feeds the body back through
//! `handle_reply`. Subscribers register per filter key
//! `"<project>::<builder>"` (lowercased, empty builder acting as a project
//! wildcard) and are invoked synchronously as events are computed.

pub mod build;
pub mod transport;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use serde_json::Value;

use build::{BuilderData, ProjectData, compute_delta};
use transport::HttpRequest;

/// Request pump cadence.
pub const REQUEST_PUMP_INTERVAL_MS: u64 = 200;
/// Build pollers never poll faster than this.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Listener interface for build events. Subscribers are long-lived and
/// invoked synchronously on the event thread.
pub trait BuildWatcher {
    fn build_started(&mut self, status: &Value);
    fn build_progress(&mut self, status: &Value);
    fn build_final(&mut self, status: &Value);
    fn build_pending(&mut self, status: &Value);
    fn error(&mut self, message: &str);
}

pub type WatcherRef = Rc<RefCell<dyn BuildWatcher>>;

#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    pub auth: Option<(String, String)>,
    pub poll_interval_secs: u64,
}

impl PollerConfig {
    pub fn new(auth: Option<(String, String)>, poll_interval_secs: u64) -> Self {
        Self {
            auth,
            poll_interval_secs: poll_interval_secs.max(MIN_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Projects,
    Builders,
    BuilderStatus,
    BuildFinal,
    PendingChanges,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    url: String,
    state: ReplyState,
    /// Context strings, typically `[project_id, builder_id, ...]`.
    data: Vec<String>,
}

fn interest_key(project: &str, builder: &str) -> String {
    format!("{}::{}", project.to_lowercase(), builder.to_lowercase())
}

pub struct SharedPoller {
    base_url: String,
    config: PollerConfig,

    requests: VecDeque<PendingRequest>,
    pending_urls: HashSet<String>,
    in_flight: Option<PendingRequest>,

    interested: HashMap<String, Vec<WatcherRef>>,
    pending_changes_keys: HashSet<String>,

    projects: BTreeMap<String, ProjectData>,
    replies_expected: usize,
    poll_active: bool,
    next_poll: u64,
}

impl SharedPoller {
    /// Create the poller and prime the discovery bootstrap: the projects
    /// listing first, then one builders request per project.
    pub fn new(base_url: impl Into<String>, config: PollerConfig) -> Self {
        let base_url = base_url.into();
        let mut poller = Self {
            base_url: base_url.clone(),
            config,
            requests: VecDeque::new(),
            pending_urls: HashSet::new(),
            in_flight: None,
            interested: HashMap::new(),
            pending_changes_keys: HashSet::new(),
            projects: BTreeMap::new(),
            replies_expected: 0,
            poll_active: false,
            next_poll: 0,
        };
        poller.enqueue(
            format!("{base_url}/httpAuth/app/rest/projects"),
            ReplyState::Projects,
            Vec::new(),
            false,
        );
        poller
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> Option<(String, String)> {
        self.config.auth.clone()
    }

    pub fn queued_len(&self) -> usize {
        self.requests.len()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn interested_is_empty(&self) -> bool {
        self.interested.values().all(Vec::is_empty)
    }

    /// Register a subscriber for `project` (and optionally one builder).
    /// If the poller is already monitoring, the poll timer resets and one
    /// immediate poll gives the newcomer a prompt first update.
    pub fn add_interest(
        &mut self,
        project: &str,
        builder: &str,
        watcher: WatcherRef,
        want_pending_changes: bool,
        now: u64,
    ) {
        let key = interest_key(project, builder);
        tracing::debug!(target: "poller", url = %self.base_url, key = %key, "add_interest");
        self.interested.entry(key.clone()).or_default().push(watcher);
        if want_pending_changes {
            self.pending_changes_keys.insert(key);
        }
        if self.poll_active {
            self.next_poll = now + self.config.poll_interval_secs * 1000;
            self.poll(now);
        }
    }

    pub fn remove_interest(&mut self, project: &str, builder: &str, watcher: &WatcherRef) {
        let key = interest_key(project, builder);
        if let Some(list) = self.interested.get_mut(&key) {
            list.retain(|w| !Rc::ptr_eq(w, watcher));
        }
    }

    /// 200 ms request pump: run a due poll, then hand out the next queued
    /// request unless one is already outstanding.
    pub fn pump(&mut self, now: u64) -> Option<HttpRequest> {
        if self.poll_active && now >= self.next_poll {
            self.next_poll = now + self.config.poll_interval_secs * 1000;
            self.poll(now);
        }
        if self.in_flight.is_some() {
            return None;
        }
        let request = self.requests.pop_front()?;
        self.pending_urls.remove(&request.url);
        let http = HttpRequest {
            url: request.url.clone(),
        };
        self.in_flight = Some(request);
        Some(http)
    }

    /// One poll cycle: request status for every builder some subscriber is
    /// filtered on.
    fn poll(&mut self, _now: u64) {
        if self.interested_is_empty() {
            return;
        }
        let mut to_enqueue = Vec::new();
        for project in self.projects.values() {
            let project_key = interest_key(project.name(), "");
            for builder in &project.builders {
                let builder_key = interest_key(project.name(), builder.name());
                if self.interested.contains_key(&project_key)
                    || self.interested.contains_key(&builder_key)
                {
                    let project_id = project
                        .project
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string();
                    to_enqueue.push((
                        format!(
                            "{}/httpAuth/app/rest/builds?locator=buildType:(id:{}),running:true,defaultFilter:false",
                            self.base_url,
                            builder.id()
                        ),
                        vec![project_id, builder.id().to_string()],
                    ));
                }
            }
        }
        for (url, data) in to_enqueue {
            self.enqueue(url, ReplyState::BuilderStatus, data, false);
        }
    }

    fn enqueue(&mut self, url: String, state: ReplyState, data: Vec<String>, front: bool) {
        if self.pending_urls.contains(&url) {
            return;
        }
        self.pending_urls.insert(url.clone());
        let request = PendingRequest { url, state, data };
        if front {
            self.requests.push_front(request);
        } else {
            self.requests.push_back(request);
        }
    }

    /// Feed the completed request's body (or error text) back in.
    pub fn handle_reply(&mut self, now: u64, body: Result<Vec<u8>, String>) {
        let Some(request) = self.in_flight.take() else {
            return;
        };
        match body {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(json) => self.process_reply(&request, &json, now),
                Err(e) => self.dispatch_failure(
                    &request,
                    &format!("<b>Network Error</b><br>The reply could not be parsed: {e}."),
                ),
            },
            Err(message) => self.dispatch_failure(
                &request,
                &format!("<b>Network Error</b><br>{message}"),
            ),
        }
    }

    fn process_reply(&mut self, request: &PendingRequest, json: &Value, now: u64) {
        match request.state {
            ReplyState::Projects => self.process_projects(json),
            ReplyState::Builders => self.process_builders(json, now),
            ReplyState::BuilderStatus => self.process_builder_status(request, json),
            ReplyState::BuildFinal => self.process_build_final(request, json),
            ReplyState::PendingChanges => self.process_pending_changes(request, json),
        }
    }

    fn process_projects(&mut self, json: &Value) {
        self.projects.clear();
        let empty = Vec::new();
        let listing = json
            .get("project")
            .and_then(Value::as_array)
            .unwrap_or(&empty);
        for project in listing {
            let Some(id) = project.get("id").and_then(Value::as_str) else {
                continue;
            };
            if id == "_Root" {
                continue;
            }
            self.projects.insert(
                id.to_string(),
                ProjectData {
                    project: project.clone(),
                    builders: Vec::new(),
                },
            );
            let url = match project.get("href").and_then(Value::as_str) {
                Some(href) => format!("{}{}", self.base_url, href),
                None => format!("{}/httpAuth/app/rest/projects/id:{}", self.base_url, id),
            };
            self.enqueue(url, ReplyState::Builders, vec![id.to_string()], false);
            self.replies_expected += 1;
        }
    }

    fn process_builders(&mut self, json: &Value, now: u64) {
        let Some(project_id) = json.get("id").and_then(Value::as_str) else {
            return;
        };
        if let Some(project) = self.projects.get_mut(project_id) {
            let empty = Vec::new();
            let builders = json
                .get("buildTypes")
                .and_then(|b| b.get("buildType"))
                .and_then(Value::as_array)
                .unwrap_or(&empty);
            project.builders = builders.iter().cloned().map(BuilderData::new).collect();
        }
        self.replies_expected = self.replies_expected.saturating_sub(1);
        if self.replies_expected == 0 && !self.poll_active {
            // discovery is complete; monitoring begins with one immediate
            // update for every watched builder
            self.poll_active = true;
            self.next_poll = now + self.config.poll_interval_secs * 1000;
            self.poll(now);
            tracing::debug!(target: "poller", url = %self.base_url,
                projects = self.projects.len(), "monitoring_started");
        }
    }

    fn process_builder_status(&mut self, request: &PendingRequest, json: &Value) {
        let [project_id, builder_id, ..] = request.data.as_slice() else {
            return;
        };
        let Some(project) = self.projects.get_mut(project_id) else {
            return;
        };
        let project_name = project.name().to_string();
        let Some(builder) = project.builders.iter_mut().find(|b| b.id() == *builder_id)
        else {
            return;
        };
        let builder_name = builder.name().to_string();
        let was_first = builder.first_update;
        let delta = compute_delta(builder, json);
        let idle = builder.build_status.is_empty();

        for build in &delta.started {
            self.notify(build::BuildEvent::Started, &project_name, &builder_name, build);
        }
        for build in &delta.progressed {
            self.notify(build::BuildEvent::Progress, &project_name, &builder_name, build);
        }
        let mut to_enqueue = Vec::new();
        for build_id in &delta.finished {
            to_enqueue.push((
                format!("{}/httpAuth/app/rest/builds/id:{}", self.base_url, build_id),
                vec![
                    project_id.clone(),
                    builder_id.clone(),
                    build_id.to_string(),
                ],
            ));
        }
        // final results jump the queue
        for (url, data) in to_enqueue {
            self.enqueue(url, ReplyState::BuildFinal, data, true);
        }

        // an idle builder with pending-changes interest gets a changes
        // probe, except on the swallowed first update
        let builder_key = interest_key(&project_name, &builder_name);
        let project_key = interest_key(&project_name, "");
        if idle
            && !was_first
            && delta.finished.is_empty()
            && (self.pending_changes_keys.contains(&builder_key)
                || self.pending_changes_keys.contains(&project_key))
        {
            self.enqueue(
                format!(
                    "{}/httpAuth/app/rest/changes?locator=buildType:(id:{}),pending:true",
                    self.base_url, builder_id
                ),
                ReplyState::PendingChanges,
                request.data.clone(),
                false,
            );
        }
    }

    fn process_build_final(&mut self, request: &PendingRequest, json: &Value) {
        let [project_id, builder_id, ..] = request.data.as_slice() else {
            return;
        };
        let (project_name, builder_name) = self.names_for(project_id, builder_id);
        self.notify(build::BuildEvent::Final, &project_name, &builder_name, json);
    }

    fn process_pending_changes(&mut self, request: &PendingRequest, json: &Value) {
        let [project_id, builder_id, ..] = request.data.as_slice() else {
            return;
        };
        let (project_name, builder_name) = self.names_for(project_id, builder_id);
        self.notify(
            build::BuildEvent::PendingChanges,
            &project_name,
            &builder_name,
            json,
        );
    }

    fn names_for(&self, project_id: &str, builder_id: &str) -> (String, String) {
        let Some(project) = self.projects.get(project_id) else {
            return (String::new(), String::new());
        };
        let builder_name = project
            .builders
            .iter()
            .find(|b| b.id() == builder_id)
            .map(|b| b.name().to_string())
            .unwrap_or_default();
        (project.name().to_string(), builder_name)
    }

    /// Invoke every subscriber whose filter key matches; the project
    /// wildcard key always participates.
    fn notify(
        &self,
        event: build::BuildEvent,
        project_name: &str,
        builder_name: &str,
        status: &Value,
    ) {
        let mut keys = vec![interest_key(project_name, "")];
        if !builder_name.is_empty() {
            keys.push(interest_key(project_name, builder_name));
        }
        for key in keys {
            let Some(watchers) = self.interested.get(&key) else {
                continue;
            };
            for watcher in watchers.clone() {
                let mut watcher = watcher.borrow_mut();
                match event {
                    build::BuildEvent::Started => watcher.build_started(status),
                    build::BuildEvent::Progress => watcher.build_progress(status),
                    build::BuildEvent::Final => watcher.build_final(status),
                    build::BuildEvent::PendingChanges => watcher.build_pending(status),
                }
            }
        }
    }

    /// Network failures become structured error messages for the affected
    /// filter key, or for everyone when the request carried no key.
    fn dispatch_failure(&mut self, request: &PendingRequest, message: &str) {
        tracing::warn!(target: "poller", url = %request.url, "request_failed");
        if let [project_id, builder_id, ..] = request.data.as_slice() {
            let (project_name, builder_name) = self.names_for(project_id, builder_id);
            if !project_name.is_empty() {
                let mut keys = vec![interest_key(&project_name, "")];
                if !builder_name.is_empty() {
                    keys.push(interest_key(&project_name, &builder_name));
                }
                for key in keys {
                    if let Some(watchers) = self.interested.get(&key) {
                        for watcher in watchers.clone() {
                            watcher.borrow_mut().error(message);
                        }
                    }
                }
                return;
            }
        }
        for watchers in self.interested.values() {
            for watcher in watchers.clone() {
                watcher.borrow_mut().error(message);
            }
        }
    }
}

/// Process-wide poller registry, owned by the event thread.
#[derive(Default)]
pub struct PollerRegistry {
    pollers: HashMap<String, (usize, SharedPoller)>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the refcount for `url`, creating the poller on the 0 → 1
    /// transition.
    pub fn acquire(&mut self, url: &str, config: PollerConfig) -> &mut SharedPoller {
        let entry = self
            .pollers
            .entry(url.to_string())
            .or_insert_with(|| (0, SharedPoller::new(url, config)));
        entry.0 += 1;
        tracing::debug!(target: "poller", url, refcount = entry.0, "poller_acquired");
        &mut entry.1
    }

    /// Decrement the refcount; the poller is destroyed on the 1 → 0
    /// transition.
    pub fn release(&mut self, url: &str) {
        let remove = match self.pollers.get_mut(url) {
            Some(entry) => {
                entry.0 = entry.0.saturating_sub(1);
                entry.0 == 0
            }
            None => false,
        };
        if remove {
            self.pollers.remove(url);
            tracing::debug!(target: "poller", url, "poller_destroyed");
        }
    }

    pub fn get_mut(&mut self, url: &str) -> Option<&mut SharedPoller> {
        self.pollers.get_mut(url).map(|(_, p)| p)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.pollers.contains_key(url)
    }

    pub fn is_empty(&self) -> bool {
        self.pollers.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        self.pollers.keys().cloned().collect()
    }

    pub fn refcount(&self, url: &str) -> usize {
        self.pollers.get(url).map_or(0, |(rc, _)| *rc)
    }
}
