#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

use chartcheck::values::ValueSource;
use chartcheck::{Renderer, Rendered, Result};
use serde_yaml::{Mapping, Value};

static START: Once = Once::new();

/// Set up logging once for the whole test binary
pub fn setup() {
    START.call_once(|| {
        // loggerv::Logger::new()
        //    .verbosity(3)
        //    .module_path(true)
        //    .init()
        //    .unwrap();
        println!("Initializing tests");
    });
}

/// Fixture chart for the real helm tests
pub fn fixture_chart() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("charts").join("auto-deploy-app")
}

/// Whether helm is around to run the fixture chart
pub fn has_helm() -> bool {
    which::which("helm").is_ok()
}

fn not_found(tpl: &str) -> Rendered {
    Rendered::Failed(format!("Error: could not find template {} in chart", tpl))
}

fn lookup<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(v, |cur, k| cur.get(k))
}

fn insert(node: &mut Value, parts: &[&str], val: Value) {
    if parts.is_empty() {
        *node = val;
        return;
    }
    if !node.is_mapping() {
        *node = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(m) = node {
        let key = Value::String(parts[0].into());
        if m.get(&key).is_none() {
            m.insert(key.clone(), Value::Null);
        }
        if let Some(child) = m.get_mut(&key) {
            insert(child, &parts[1..], val);
        }
    }
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        Some(Value::Number(_)) => true,
        Some(Value::Mapping(m)) => !m.is_empty(),
        Some(Value::Sequence(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Resolve a value source into a yaml tree like helm would
pub fn resolve(values: &ValueSource) -> Value {
    match values {
        ValueSource::Inline(map) => {
            let mut root = Value::Mapping(Mapping::new());
            for (k, v) in map {
                let parsed = serde_yaml::from_str(v).unwrap_or_else(|_| Value::String(v.clone()));
                let parts = k.split('.').collect::<Vec<_>>();
                insert(&mut root, &parts, parsed);
            }
            root
        }
        ValueSource::File(pth) => {
            let data = fs::read_to_string(pth).unwrap();
            if data.trim().is_empty() {
                Value::Mapping(Mapping::new())
            } else {
                serde_yaml::from_str(&data).unwrap()
            }
        }
    }
}

/// An in-process stand in for the auto-deploy-app chart's hpa template
///
/// Mirrors the fixture chart under tests/charts so the harness can be tested without helm.
pub struct FakeChart;

impl Renderer for FakeChart {
    fn render(&self, release: &str, templates: &[String], values: &ValueSource) -> Result<Rendered> {
        let vals = resolve(values);
        for t in templates {
            if t != "templates/hpa.yaml" {
                return Ok(not_found(t));
            }
        }
        let enabled = truthy(lookup(&vals, "hpa.enabled"));
        let requests = truthy(lookup(&vals, "resources.requests"));
        if !enabled || !requests {
            return Ok(not_found("templates/hpa.yaml"));
        }

        let mut labels = format!("    app: {}\n    release: {}\n", release, release);
        if let Some(Value::Mapping(extra)) = lookup(&vals, "extraLabels") {
            for (k, v) in extra {
                let k = k.as_str().unwrap_or_default();
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => serde_yaml::to_string(other).unwrap().trim_start_matches("---").trim().to_string(),
                };
                labels.push_str(&format!("    {}: {:?}\n", k, v));
            }
        }

        let metrics = lookup(&vals, "hpa.metrics").filter(|m| truthy(Some(*m)));
        let (api, scaling) = match metrics {
            Some(m) => {
                let encoded = serde_yaml::to_string(m).unwrap();
                let body = encoded.trim_start_matches("---\n").lines()
                    .map(|l| format!("    {}", l))
                    .collect::<Vec<_>>()
                    .join("\n");
                ("autoscaling/v2", format!("  metrics:\n{}\n", body))
            }
            None => ("autoscaling/v1", "  targetCPUUtilizationPercentage: 80\n".to_string()),
        };

        let tpl = format!(r#"---
# Source: auto-deploy-app/templates/hpa.yaml
apiVersion: {api}
kind: HorizontalPodAutoscaler
metadata:
  name: {release}-auto-deploy
  labels:
{labels}spec:
  scaleTargetRef:
    apiVersion: apps/v1
    kind: Deployment
    name: {release}
  minReplicas: 1
  maxReplicas: 5
{scaling}"#, api = api, release = release, labels = labels, scaling = scaling);
        Ok(Rendered::Manifest(tpl))
    }
}

/// Wraps a renderer and records which values files it was handed
///
/// Asserts each file exists while the render is in flight.
pub struct Recording<R> {
    pub inner: R,
    pub files: Mutex<Vec<PathBuf>>,
}

impl<R: Renderer> Recording<R> {
    pub fn new(inner: R) -> Self {
        Recording { inner, files: Mutex::new(vec![]) }
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().clone()
    }
}

impl<R: Renderer> Renderer for Recording<R> {
    fn render(&self, release: &str, templates: &[String], values: &ValueSource) -> Result<Rendered> {
        if let ValueSource::File(pth) = values {
            assert!(pth.is_file(), "values file missing during render");
            self.files.lock().unwrap().push(pth.clone());
        }
        self.inner.render(release, templates, values)
    }
}

/// Renderer that always returns the same thing
pub struct Canned(pub Rendered);

impl Renderer for Canned {
    fn render(&self, _: &str, _: &[String], _: &ValueSource) -> Result<Rendered> {
        Ok(self.0.clone())
    }
}

/// Renderer that blows up on every call
pub struct Panicking;

impl Renderer for Panicking {
    fn render(&self, release: &str, _: &[String], _: &ValueSource) -> Result<Rendered> {
        panic!("renderer crashed rendering {}", release)
    }
}

/// Renderer whose output changes on every call
#[derive(Default)]
pub struct Drifting {
    calls: AtomicUsize,
}

impl Renderer for Drifting {
    fn render(&self, release: &str, templates: &[String], values: &ValueSource) -> Result<Rendered> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match FakeChart.render(release, templates, values)? {
            Rendered::Manifest(m) => Ok(Rendered::Manifest(format!("{}# render {}\n", m, n))),
            failed => Ok(failed),
        }
    }
}
