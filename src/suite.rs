use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use maplit::btreemap;
use regex::Regex;

use super::helm::{Renderer, RenderRequest};
use super::manifest::SchemaVersion;
use super::values::Values;
use super::verify::{self, Expectation, HpaExpectation, Outcome};
use super::{ErrorKind, Result, ResultExt};

/// Diagnostic helm gives when a `--show-only` template renders to nothing
pub const HPA_NOT_FOUND: &str = "Error: could not find template templates/hpa.yaml in chart";

/// A single named render and its expectation
#[derive(Clone, Debug)]
pub struct TestCase {
    pub name: String,
    pub values: Values,
    pub expectation: Expectation,
}

/// A table of cases sharing a release, templates and schema
#[derive(Clone, Debug)]
pub struct Suite {
    pub name: String,
    pub release: String,
    pub templates: Vec<String>,
    pub schema: SchemaVersion,
    pub cases: Vec<TestCase>,
}

/// Result of running one case
#[derive(Debug)]
pub struct CaseReport {
    pub suite: String,
    pub case: String,
    pub result: Result<Outcome>,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

impl TestCase {
    pub fn request(&self, suite: &Suite) -> RenderRequest {
        RenderRequest {
            release: suite.release.clone(),
            templates: suite.templates.clone(),
            values: self.values.clone(),
        }
    }
}

impl Suite {
    /// Run a single case
    pub fn run_case(&self, case: &TestCase, renderer: &dyn Renderer) -> CaseReport {
        let req = case.request(self);
        let result = verify::verify_render(renderer, &req, self.schema, &case.expectation);
        match &result {
            Ok(_) => info!("{} / {}: ok", self.name, case.name),
            Err(e) => error!("{} / {}: {}", self.name, case.name, e),
        }
        CaseReport { suite: self.name.clone(), case: case.name.clone(), result }
    }

    /// Run every case sequentially
    ///
    /// A failing case does not stop the ones after it.
    pub fn run(&self, renderer: &dyn Renderer) -> Vec<CaseReport> {
        self.cases.iter().map(|c| self.run_case(c, renderer)).collect()
    }

    /// Read a suite definition from a yaml file
    pub fn from_file<P: AsRef<Path>>(pth: P) -> Result<Suite> {
        let pth = pth.as_ref();
        trace!("Reading suite from {}", pth.display());
        if !pth.is_file() {
            bail!("Suite file {} does not exist", pth.display())
        }
        let data = fs::read_to_string(pth)?;
        Suite::from_yaml(&data)
            .chain_err(|| format!("failed to load suite from {}", pth.display()))
    }

    pub fn from_yaml(data: &str) -> Result<Suite> {
        let raw: SuiteSource = serde_yaml::from_str(data)?;
        raw.build()
    }
}

/// Serialized form of a suite
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct SuiteSource {
    name: String,
    release: String,
    templates: Vec<String>,
    schema: SchemaVersion,
    #[serde(default)]
    cases: Vec<CaseSource>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct CaseSource {
    name: String,
    /// Inline overrides
    #[serde(default)]
    set: Option<BTreeMap<String, String>>,
    /// Raw values file body
    #[serde(default)]
    values: Option<String>,
    /// Regex the render diagnostic must match
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    expect: Option<HpaExpectation>,
}

impl SuiteSource {
    fn build(self) -> Result<Suite> {
        let suite = self.name;
        if self.templates.is_empty() {
            bail!(ErrorKind::InvalidSuite(suite, "no templates named".into()));
        }
        let mut cases = vec![];
        for c in self.cases {
            let values = match (c.set, c.values) {
                (Some(_), Some(_)) => {
                    bail!(ErrorKind::InvalidSuite(suite, format!("case {} sets both set and values", c.name)))
                }
                (Some(set), None) => Values::Inline(set),
                (None, Some(raw)) => Values::Raw(raw),
                (None, None) => Values::default(),
            };
            let expectation = match (c.error, c.expect) {
                (Some(re), None) => Expectation::Error(Regex::new(&re)?),
                (None, Some(hpa)) => Expectation::Hpa(hpa),
                _ => {
                    bail!(ErrorKind::InvalidSuite(suite, format!("case {} needs exactly one of error and expect", c.name)))
                }
            };
            cases.push(TestCase { name: c.name, values, expectation });
        }
        Ok(Suite {
            name: suite,
            release: self.release,
            templates: self.templates,
            schema: self.schema,
            cases,
        })
    }
}

fn hpa_test_auto_deploy(labels: BTreeMap<String, String>) -> Expectation {
    Expectation::Hpa(HpaExpectation {
        name: "hpa-test-auto-deploy".into(),
        min_replicas: 1,
        max_replicas: 5,
        target: 80,
        labels,
    })
}

fn set(pairs: BTreeMap<&str, &str>) -> Values {
    Values::Inline(pairs.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
}

/// HPA cases rendered with `--set` against autoscaling/v1
pub fn hpa_v1() -> Suite {
    Suite {
        name: "hpa-autoscaling-v1".into(),
        release: "hpa-test".into(),
        templates: vec!["templates/hpa.yaml".into()],
        schema: SchemaVersion::V1,
        cases: vec![
            TestCase {
                name: "defaults".into(),
                values: Values::default(),
                expectation: Expectation::error_literal(HPA_NOT_FOUND),
            },
            TestCase {
                name: "with hpa enabled, no requests".into(),
                values: set(btreemap! { "hpa.enabled" => "true" }),
                expectation: Expectation::error_literal(HPA_NOT_FOUND),
            },
            TestCase {
                name: "with hpa enabled and requests defined".into(),
                values: set(btreemap! {
                    "hpa.enabled" => "true",
                    "resources.requests.cpu" => "500",
                }),
                expectation: hpa_test_auto_deploy(btreemap! {}),
            },
            TestCase {
                name: "with hpa enabled and requests, label defined".into(),
                values: set(btreemap! {
                    "hpa.enabled" => "true",
                    "resources.requests.cpu" => "500",
                    "extraLabels.firstLabel" => "expected-label",
                }),
                expectation: hpa_test_auto_deploy(btreemap! {
                    "firstLabel".into() => "expected-label".into(),
                }),
            },
        ],
    }
}

/// Values file enabling hpa with an explicit cpu utilization metric
pub const HPA_V2_METRICS_VALUES: &str = r#"
hpa:
  enabled: true
  metrics:
    - type: Resource
      resource:
        name: cpu
        target:
          type: Utilization
          averageUtilization: 80
resources:
  requests:
    cpu: 500
"#;

/// HPA cases rendered from values files against autoscaling/v2
pub fn hpa_v2() -> Suite {
    Suite {
        name: "hpa-autoscaling-v2".into(),
        release: "hpa-test".into(),
        templates: vec!["templates/hpa.yaml".into()],
        schema: SchemaVersion::V2,
        cases: vec![
            TestCase {
                name: "defaults".into(),
                values: Values::Raw(String::new()),
                expectation: Expectation::error_literal(HPA_NOT_FOUND),
            },
            TestCase {
                name: "with hpa enabled, and both metrics and requests defined".into(),
                values: Values::Raw(HPA_V2_METRICS_VALUES.into()),
                expectation: hpa_test_auto_deploy(btreemap! {}),
            },
        ],
    }
}

/// All built in suites
pub fn builtin() -> Vec<Suite> {
    vec![hpa_v1(), hpa_v2()]
}
