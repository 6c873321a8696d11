//! Build-server reporter (TeamCity-style REST API).
//!
//! Several stories watching the same server share one poller from the
//! registry; this reporter registers its interest key and turns the build
//! events fanned back out into templated headline payloads. Headline text
//! comes from a `${TOKEN}` template the user can override per story.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use core_poller::{BuildWatcher, PollerConfig, PollerRegistry, WatcherRef};

use crate::params::ParamSpec;
use crate::{
    CoverContext, Reporter, ReporterError, ReporterEvents, hex_deobfuscate, hex_obfuscate,
};

/// Parameter order as advertised by `requires`.
mod param {
    pub const USERNAME: usize = 0;
    pub const PASSWORD: usize = 1;
    pub const PROJECT: usize = 2;
    pub const BUILDER: usize = 3;
    pub const CHANGES: usize = 4;
    pub const POLL: usize = 5;
    pub const TEMPLATE: usize = 6;
}

const DEFAULT_POLL_SECS: u64 = 60;

fn default_template() -> Vec<String> {
    vec![
        "Project \"<b>${PROJECT_NAME}</b>\" :: Builder \"<b>${BUILDER_NAME}</b>\" :: Build #<b>${BUILD_NUMBER}</b>".to_string(),
        "State: ${STATE}".to_string(),
        "Status: ${STATUS}".to_string(),
        "Completed: ${COMPLETED}".to_string(),
        "ETA: <b>${ETA}</b>".to_string(),
    ]
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => lower,
    }
}

type ReportMap = HashMap<String, String>;

fn render_report(template: &[String], map: &ReportMap) -> String {
    let mut report = template.join("<br>");
    for (key, value) in map {
        report = report.replace(&format!("${{{key}}}"), value);
    }
    report
}

fn populate_report_map(
    map: &mut ReportMap,
    build: &Value,
    project_name: &str,
    builder_name: &str,
    eta: &str,
) {
    let get_str = |v: &Value, key: &str| {
        v.get(key).and_then(Value::as_str).unwrap_or("").to_string()
    };

    map.insert("PROJECT_NAME".into(), project_name.to_string());

    let builder = if !builder_name.is_empty() {
        builder_name.to_string()
    } else if let Some(name) = build.get("name").and_then(Value::as_str) {
        name.to_string()
    } else {
        build
            .get("buildType")
            .and_then(|bt| bt.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    map.insert("BUILDER_NAME".into(), builder);
    map.insert("BUILDER_ID".into(), get_str(build, "buildTypeId"));
    map.insert(
        "BUILD_ID".into(),
        build
            .get("id")
            .and_then(Value::as_i64)
            .map(|i| i.to_string())
            .unwrap_or_default(),
    );
    map.insert("BUILD_NUMBER".into(), get_str(build, "number"));
    let state = capitalize(&get_str(build, "state"));
    map.insert("STATE".into(), state.clone());
    let status = match build.get("statusText").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => capitalize(&get_str(build, "status")),
    };
    map.insert("STATUS".into(), status);
    if !map.contains_key("COMPLETED") {
        let percent = build
            .get("percentageComplete")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        map.insert("COMPLETED".into(), format!("{percent}%"));
    }
    if eta.is_empty() && state == "Running" {
        map.insert("ETA".into(), "(pending)".into());
    } else {
        map.insert("ETA".into(), eta.to_string());
    }
    map.insert(
        "AGENT".into(),
        build
            .get("agent")
            .and_then(|a| a.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    );
    if let Some(properties) = build
        .get("properties")
        .and_then(|p| p.get("property"))
        .and_then(Value::as_array)
    {
        for property in properties {
            if let (Some(name), Some(value)) = (
                property.get("name").and_then(Value::as_str),
                property.get("value").and_then(Value::as_str),
            ) {
                map.insert(format!("PROPERTY_{}", name.to_uppercase()), value.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct EtaData {
    start: u64,
    initial_completed: i64,
    last_completed: i64,
}

/// The poller-facing half: receives build events and emits payloads.
struct WatchCore {
    events: ReporterEvents,
    project_name: String,
    builder_name: String,
    template: Vec<String>,
    eta: HashMap<i64, EtaData>,
    last_changes_count: i64,
}

impl WatchCore {
    fn emit(&self, payload: String) {
        self.events.new_data(payload.into_bytes());
    }

    fn idle_status(&self) -> String {
        let mut status = format!("Project \"<b>{}</b>\"", self.project_name);
        if !self.builder_name.is_empty() {
            status += &format!(" :: Builder \"<b>{}</b>\"", self.builder_name);
        }
        status += "<br>State: idle";
        status
    }
}

impl BuildWatcher for WatchCore {
    fn build_started(&mut self, status: &Value) {
        self.last_changes_count = 0;
        let build_id = status.get("id").and_then(Value::as_i64).unwrap_or(0);
        let now = unix_now();
        let complete = status
            .get("percentageComplete")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        self.eta.insert(
            build_id,
            EtaData {
                start: now,
                initial_completed: complete,
                last_completed: complete,
            },
        );

        let mut map = ReportMap::new();
        populate_report_map(&mut map, status, &self.project_name, &self.builder_name, "");
        self.emit(render_report(&self.template, &map));
    }

    fn build_progress(&mut self, status: &Value) {
        let build_id = status.get("id").and_then(Value::as_i64).unwrap_or(0);
        let now = unix_now();
        let complete = status
            .get("percentageComplete")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let mut eta_str = String::new();
        if let Some(eta) = self.eta.get_mut(&build_id) {
            if complete != eta.last_completed {
                eta.last_completed = complete;
            }
            // a few data points in, project the remaining time
            let completed_delta = complete - eta.initial_completed;
            if completed_delta > 5 {
                let time_delta = now.saturating_sub(eta.start);
                let per_point = time_delta / completed_delta as u64;
                let seconds_left = (100 - complete).max(0) as u64 * per_point;
                eta_str = if seconds_left >= 60 {
                    format!("~{}m {}s", seconds_left / 60, seconds_left % 60)
                } else {
                    format!("~{seconds_left}s")
                };
                let hanging = status
                    .get("running_info")
                    .and_then(|r| r.get("probablyHanging"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if hanging {
                    eta_str = format!("{eta_str} (possibly hung)");
                }
            }
        }

        let mut map = ReportMap::new();
        populate_report_map(
            &mut map,
            status,
            &self.project_name,
            &self.builder_name,
            &eta_str,
        );
        self.emit(render_report(&self.template, &map));
    }

    fn build_final(&mut self, status: &Value) {
        let build_id = status.get("id").and_then(Value::as_i64).unwrap_or(0);
        self.eta.remove(&build_id);

        let mut map = ReportMap::new();
        let completed = match status.get("finishDate").and_then(Value::as_str) {
            Some(finish) => format!("100% @ {finish}"),
            None => "100%".to_string(),
        };
        map.insert("COMPLETED".into(), completed);
        populate_report_map(&mut map, status, &self.project_name, &self.builder_name, "");
        self.emit(render_report(&self.template, &map));
    }

    fn build_pending(&mut self, status: &Value) {
        let count = status.get("count").and_then(Value::as_i64).unwrap_or(0);
        if count == self.last_changes_count {
            return;
        }
        self.last_changes_count = count;
        let more = if status.get("nextHref").is_some() { "+" } else { "" };
        let payload = format!("{}<br>Changes: {count}{more} pending", self.idle_status());
        self.emit(payload);
    }

    fn error(&mut self, message: &str) {
        self.emit(message.to_string());
    }
}

pub struct BuildWatchReporter {
    story_url: String,
    username: String,
    password: String,
    project_name: String,
    builder_name: String,
    check_for_changes: bool,
    poll_timeout: u64,
    report_template: Vec<String>,
    core: Option<Rc<RefCell<WatchCore>>>,
}

impl Default for BuildWatchReporter {
    fn default() -> Self {
        Self {
            story_url: String::new(),
            username: String::new(),
            password: String::new(),
            project_name: String::new(),
            builder_name: String::new(),
            check_for_changes: false,
            poll_timeout: DEFAULT_POLL_SECS,
            report_template: default_template(),
            core: None,
        }
    }
}

impl BuildWatchReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for BuildWatchReporter {
    fn display_name(&self) -> (String, String) {
        (
            "Build Watch".to_string(),
            "Monitors projects and builders on a TeamCity-style REST API\n\
             build server and reports build lifecycle events."
                .to_string(),
        )
    }

    fn plugin_class(&self) -> &'static str {
        "REST"
    }

    fn plugin_id(&self) -> &'static str {
        "{A34020FD-80CC-48D4-9EC0-DFD52B912B2D}"
    }

    fn supports(&self, story: &str) -> f32 {
        let lower = story.to_lowercase();
        if std::path::Path::new(story).is_file() {
            return 0.0;
        }
        if lower.ends_with(".htm") || lower.ends_with(".html") {
            return 0.0;
        }
        if lower.contains("teamcity") {
            return 0.9;
        }
        // might be a build server; a network error headline settles it
        0.5
    }

    fn requires(&self, _target_version: u32) -> Vec<ParamSpec> {
        vec![
            ParamSpec::parse("Username:*", "string").expect("static spec"),
            ParamSpec::parse("Password:*", "password").expect("static spec"),
            ParamSpec::parse("Project Name:*", "string").expect("static spec"),
            ParamSpec::parse("Builder:", "string").expect("static spec"),
            ParamSpec::parse(
                "Check idle builders for pending changes",
                &format!("check:{}", self.check_for_changes),
            )
            .expect("static spec"),
            ParamSpec::parse("Polling (sec):", &format!("integer:{}", self.poll_timeout))
                .expect("static spec"),
            ParamSpec::parse(
                "Format:",
                &format!("multiline:{}", self.report_template.join("<br>\n")),
            )
            .expect("static spec"),
        ]
    }

    fn set_requirements(&mut self, params: &[String]) -> Result<(), ReporterError> {
        crate::params::validate(&self.requires(self.requires_version()), params)?;
        self.username = params[param::USERNAME].clone();
        self.password = params[param::PASSWORD].clone();
        self.project_name = params[param::PROJECT].clone();
        self.builder_name = params.get(param::BUILDER).cloned().unwrap_or_default();
        self.check_for_changes = params
            .get(param::CHANGES)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if let Some(poll) = params.get(param::POLL).filter(|v| !v.is_empty()) {
            let poll: u64 = poll.parse().unwrap_or(DEFAULT_POLL_SECS);
            self.poll_timeout = if poll < 30 { DEFAULT_POLL_SECS } else { poll };
        }
        if let Some(template) = params.get(param::TEMPLATE).filter(|v| !v.is_empty()) {
            let cleaned = template.replace(['\r', '\n'], "");
            self.report_template = cleaned.split("<br>").map(str::to_string).collect();
        }
        Ok(())
    }

    fn set_story(&mut self, story: &str) {
        self.story_url = story.to_string();
    }

    fn cover_story(&mut self, ctx: CoverContext<'_>) -> Result<(), ReporterError> {
        if self.core.is_some() {
            return Err(ReporterError::CoverFailed(
                "already covering this story".into(),
            ));
        }
        let core = Rc::new(RefCell::new(WatchCore {
            events: ctx.events.clone(),
            project_name: self.project_name.clone(),
            builder_name: self.builder_name.clone(),
            template: self.report_template.clone(),
            eta: HashMap::new(),
            last_changes_count: 0,
        }));

        let config = PollerConfig::new(
            Some((self.username.clone(), self.password.clone())),
            self.poll_timeout,
        );
        let poller = ctx.pollers.acquire(&self.story_url, config);
        poller.add_interest(
            &self.project_name,
            &self.builder_name,
            core.clone(),
            self.check_for_changes,
            ctx.now,
        );

        // an initial idle headline confirms coverage started
        let idle = core.borrow().idle_status();
        ctx.events.new_data(idle.into_bytes());

        self.core = Some(core);
        tracing::debug!(target: "reporter.buildwatch",
            url = %self.story_url, project = %self.project_name, "coverage_started");
        Ok(())
    }

    fn finish_story(&mut self, pollers: &mut PollerRegistry) -> Result<(), ReporterError> {
        if let Some(core) = self.core.take() {
            if let Some(poller) = pollers.get_mut(&self.story_url) {
                let watcher: WatcherRef = core;
                poller.remove_interest(&self.project_name, &self.builder_name, &watcher);
            }
            pollers.release(&self.story_url);
            tracing::debug!(target: "reporter.buildwatch",
                url = %self.story_url, "coverage_finished");
        }
        Ok(())
    }

    fn secure(&self, params: &mut Vec<String>) {
        if params.len() <= param::PASSWORD || params[param::PASSWORD].is_empty() {
            return;
        }
        params[param::PASSWORD] = hex_obfuscate(&params[param::PASSWORD]);
    }

    fn unsecure(&self, params: &mut Vec<String>) {
        if params.len() <= param::PASSWORD || params[param::PASSWORD].is_empty() {
            return;
        }
        if let Some(plain) = hex_deobfuscate(&params[param::PASSWORD]) {
            params[param::PASSWORD] = plain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ProducerId;
    use serde_json::json;

    fn params() -> Vec<String> {
        vec![
            "admin".into(),
            "hunter2".into(),
            "P1".into(),
            "B2".into(),
            "true".into(),
            "45".into(),
            String::new(),
        ]
    }

    #[test]
    fn requirements_apply_with_the_poll_floor() {
        let mut reporter = BuildWatchReporter::new();
        reporter.set_requirements(&params()).unwrap();
        assert_eq!(reporter.project_name, "P1");
        assert_eq!(reporter.builder_name, "B2");
        assert!(reporter.check_for_changes);
        assert_eq!(reporter.poll_timeout, 45);

        let mut fast = params();
        fast[param::POLL] = "5".into();
        reporter.set_requirements(&fast).unwrap();
        assert_eq!(reporter.poll_timeout, DEFAULT_POLL_SECS);
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut reporter = BuildWatchReporter::new();
        let mut bad = params();
        bad[param::PASSWORD] = String::new();
        assert!(reporter.set_requirements(&bad).is_err());
    }

    #[test]
    fn secure_unsecure_laws() {
        let reporter = BuildWatchReporter::new();
        let plain = params();

        let mut secured = plain.clone();
        reporter.secure(&mut secured);
        assert_ne!(secured[param::PASSWORD], plain[param::PASSWORD]);

        // unsecure(secure(x)) == x
        let mut round = secured.clone();
        reporter.unsecure(&mut round);
        assert_eq!(round, plain);

        // secure(unsecure(x)) == secure(x)
        let mut again = round;
        reporter.secure(&mut again);
        assert_eq!(again, secured);
    }

    #[test]
    fn report_rendering_substitutes_tokens() {
        let mut map = ReportMap::new();
        populate_report_map(
            &mut map,
            &json!({
                "id": 12, "number": "246", "state": "running", "status": "SUCCESS",
                "percentageComplete": 51, "buildTypeId": "p1_b2"
            }),
            "P1",
            "B2",
            "",
        );
        let report = render_report(&default_template(), &map);
        assert!(report.contains("\"<b>P1</b>\""));
        assert!(report.contains("\"<b>B2</b>\""));
        assert!(report.contains("#<b>246</b>"));
        assert!(report.contains("State: Running"));
        assert!(report.contains("Completed: 51%"));
        assert!(report.contains("ETA: <b>(pending)</b>"));
    }

    #[test]
    fn watch_core_emits_payloads_for_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut core = WatchCore {
            events: ReporterEvents::new(ProducerId(1), tx),
            project_name: "P1".into(),
            builder_name: "B2".into(),
            template: default_template(),
            eta: HashMap::new(),
            last_changes_count: 0,
        };

        core.build_started(&json!({"id": 12, "number": "1", "state": "running",
            "status": "SUCCESS", "percentageComplete": 0}));
        core.build_final(&json!({"id": 12, "number": "1", "state": "finished",
            "status": "SUCCESS", "finishDate": "20161213T205325+0000"}));
        core.error("<b>Network Error</b><br>down");

        let mut payloads = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            if let crate::ReporterSignal::NewData { payload, .. } = signal {
                payloads.push(String::from_utf8(payload).unwrap());
            }
        }
        assert_eq!(payloads.len(), 3);
        assert!(payloads[0].contains("State: Running"));
        assert!(payloads[1].contains("100% @ 20161213T205325+0000"));
        assert!(payloads[2].contains("Network Error"));
    }

    #[test]
    fn pending_changes_only_announce_deltas() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut core = WatchCore {
            events: ReporterEvents::new(ProducerId(1), tx),
            project_name: "P1".into(),
            builder_name: String::new(),
            template: default_template(),
            eta: HashMap::new(),
            last_changes_count: 0,
        };
        core.build_pending(&json!({"count": 2}));
        core.build_pending(&json!({"count": 2}));
        core.build_pending(&json!({"count": 3, "nextHref": "/more"}));

        let mut payloads = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            if let crate::ReporterSignal::NewData { payload, .. } = signal {
                payloads.push(String::from_utf8(payload).unwrap());
            }
        }
        assert_eq!(payloads.len(), 2);
        assert!(payloads[0].contains("Changes: 2 pending"));
        assert!(payloads[1].contains("Changes: 3+ pending"));
    }

    #[test]
    fn cover_and_finish_balance_the_registry() {
        let mut reporter = BuildWatchReporter::new();
        reporter.set_requirements(&params()).unwrap();
        reporter.set_story("http://teamcity.example.com");

        let mut pollers = PollerRegistry::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        reporter
            .cover_story(CoverContext {
                events: ReporterEvents::new(ProducerId(1), tx),
                pollers: &mut pollers,
                now: 0,
            })
            .unwrap();
        assert!(pollers.contains("http://teamcity.example.com"));
        // the initial idle headline went out immediately
        assert!(matches!(
            rx.try_recv(),
            Ok(crate::ReporterSignal::NewData { .. })
        ));

        reporter.finish_story(&mut pollers).unwrap();
        assert!(pollers.is_empty());
    }

    #[test]
    fn supports_sniffs_the_url() {
        let reporter = BuildWatchReporter::new();
        assert_eq!(reporter.supports("http://teamcity.example.com"), 0.9);
        assert_eq!(reporter.supports("http://builds.example.com"), 0.5);
        assert_eq!(reporter.supports("http://example.com/page.html"), 0.0);
    }
}
