//! Build-server state and the per-poll delta computation.
//!
//! Each poll returns the builds currently running on one builder. The
//! delta against the cached set decides what the subscribers hear: builds
//! that appeared start, builds that changed progress, builds that vanished
//! finished (their final report is fetched separately since the running
//! listing no longer carries them).

use serde_json::Value;
use std::collections::HashMap;

/// Event computed for one filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEvent {
    Started,
    Progress,
    Final,
    PendingChanges,
}

#[derive(Debug, Default)]
pub struct ProjectData {
    /// Raw project object from the discovery phase.
    pub project: Value,
    pub builders: Vec<BuilderData>,
}

impl ProjectData {
    pub fn name(&self) -> &str {
        self.project.get("name").and_then(Value::as_str).unwrap_or("")
    }
}

#[derive(Debug)]
pub struct BuilderData {
    /// Raw buildType object from the discovery phase.
    pub builder: Value,
    /// Swallow the very first empty status so an idle builder does not
    /// produce a spurious notification on startup.
    pub first_update: bool,
    /// Cached running builds by id.
    pub build_status: HashMap<i64, Value>,
}

impl BuilderData {
    pub fn new(builder: Value) -> Self {
        Self {
            builder,
            first_update: true,
            build_status: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.builder.get("id").and_then(Value::as_str).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.builder.get("name").and_then(Value::as_str).unwrap_or("")
    }
}

/// Outcome of one builder-status delta.
#[derive(Debug, Default)]
pub struct StatusDelta {
    /// Builds to announce as started, in listing order.
    pub started: Vec<Value>,
    /// Builds whose status changed since the last poll.
    pub progressed: Vec<Value>,
    /// Ids of builds that vanished from the running list.
    pub finished: Vec<i64>,
}

/// Compare the freshly polled running-builds listing against the cache,
/// updating the cache in place.
pub fn compute_delta(builder: &mut BuilderData, status: &Value) -> StatusDelta {
    let mut delta = StatusDelta::default();

    let count = status.get("count").and_then(Value::as_i64).unwrap_or(0);
    if count == 0 && builder.first_update {
        builder.first_update = false;
        return delta;
    }
    builder.first_update = false;

    let empty = Vec::new();
    let builds = status
        .get("build")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let current_ids: Vec<i64> = builds
        .iter()
        .filter_map(|b| b.get("id").and_then(Value::as_i64))
        .collect();

    delta.finished = builder
        .build_status
        .keys()
        .copied()
        .filter(|id| !current_ids.contains(id))
        .collect();
    delta.finished.sort_unstable();
    for id in &delta.finished {
        builder.build_status.remove(id);
    }

    for build in builds {
        let Some(id) = build.get("id").and_then(Value::as_i64) else {
            continue;
        };
        match builder.build_status.get(&id) {
            None => {
                builder.build_status.insert(id, build.clone());
                delta.started.push(build.clone());
            }
            Some(cached) if cached != build => {
                builder.build_status.insert(id, build.clone());
                delta.progressed.push(build.clone());
            }
            Some(_) => {}
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> BuilderData {
        BuilderData::new(json!({"id": "b2", "name": "B2"}))
    }

    fn listing(builds: Vec<Value>) -> Value {
        json!({"count": builds.len(), "build": builds})
    }

    #[test]
    fn first_empty_update_is_swallowed() {
        let mut b = builder();
        let delta = compute_delta(&mut b, &listing(vec![]));
        assert!(delta.started.is_empty());
        assert!(delta.finished.is_empty());
        assert!(!b.first_update);
    }

    #[test]
    fn new_build_starts() {
        let mut b = builder();
        let delta = compute_delta(
            &mut b,
            &listing(vec![json!({"id": 12, "percentageComplete": 5})]),
        );
        assert_eq!(delta.started.len(), 1);
        assert!(b.build_status.contains_key(&12));
    }

    #[test]
    fn unchanged_build_is_silent() {
        let mut b = builder();
        let build = json!({"id": 12, "percentageComplete": 5});
        compute_delta(&mut b, &listing(vec![build.clone()]));
        let delta = compute_delta(&mut b, &listing(vec![build]));
        assert!(delta.started.is_empty());
        assert!(delta.progressed.is_empty());
    }

    #[test]
    fn changed_build_progresses() {
        let mut b = builder();
        compute_delta(&mut b, &listing(vec![json!({"id": 12, "percentageComplete": 5})]));
        let delta = compute_delta(
            &mut b,
            &listing(vec![json!({"id": 12, "percentageComplete": 51})]),
        );
        assert_eq!(delta.progressed.len(), 1);
        assert!(delta.started.is_empty());
    }

    #[test]
    fn vanished_build_finishes() {
        let mut b = builder();
        compute_delta(&mut b, &listing(vec![json!({"id": 12}), json!({"id": 13})]));
        let delta = compute_delta(&mut b, &listing(vec![json!({"id": 13})]));
        assert_eq!(delta.finished, vec![12]);
        assert!(!b.build_status.contains_key(&12));
    }
}
