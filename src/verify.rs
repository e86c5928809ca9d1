use std::collections::BTreeMap;
use std::fmt::Display;

use regex::Regex;

use super::helm::{Renderer, RenderRequest, Rendered};
use super::manifest::{DecodedHpa, SchemaVersion};
use super::{ErrorKind, Result};

/// Expected shape of a rendered HorizontalPodAutoscaler
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HpaExpectation {
    pub name: String,
    pub min_replicas: i32,
    pub max_replicas: i32,
    /// targetCPUUtilizationPercentage for v1, metrics[0] averageUtilization for v2
    pub target: i32,
    /// Labels that must be present, other labels are ignored
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// What a render should produce
#[derive(Clone, Debug)]
pub enum Expectation {
    /// Render must fail with a diagnostic matching this
    Error(Regex),
    /// Render must succeed and decode into a matching HPA
    Hpa(HpaExpectation),
}

impl Expectation {
    /// Error expectation matching a literal diagnostic
    pub fn error_literal(msg: &str) -> Expectation {
        Expectation::Error(Regex::new(&regex::escape(msg)).expect("escaped literal is a valid regex"))
    }
}

/// How a passing verification passed
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Render failed with the expected diagnostic
    FailedAsExpected(String),
    /// Render succeeded and every field matched
    Verified(SchemaVersion),
}

/// Render a request and check the result against an expectation
///
/// Values files are cleaned up before this returns, regardless of the outcome.
pub fn verify_render(renderer: &dyn Renderer, request: &RenderRequest, schema: SchemaVersion, expectation: &Expectation) -> Result<Outcome> {
    let rendered = request.render(renderer)?;
    match expectation {
        Expectation::Error(re) => match rendered {
            // any successful output is ignored
            Rendered::Manifest(_) => bail!(ErrorKind::MissingRenderFailure(re.as_str().into())),
            Rendered::Failed(diag) => {
                if !re.is_match(&diag) {
                    bail!(ErrorKind::ErrorPatternMismatch(re.as_str().into(), diag));
                }
                debug!("{} failed as expected: {}", request.release, diag);
                Ok(Outcome::FailedAsExpected(diag))
            }
        },
        Expectation::Hpa(exp) => match rendered {
            Rendered::Failed(diag) => bail!(ErrorKind::UnexpectedRenderFailure(diag)),
            Rendered::Manifest(text) => {
                let hpa = DecodedHpa::decode(schema, &text)?;
                verify_hpa(&hpa, exp)?;
                Ok(Outcome::Verified(schema))
            }
        },
    }
}

/// Render the same request twice and require identical results
pub fn verify_idempotent(renderer: &dyn Renderer, request: &RenderRequest) -> Result<()> {
    let first = request.render(renderer)?;
    let second = request.render(renderer)?;
    if first != second {
        bail!(ErrorKind::NonDeterministicRender(request.release.clone()));
    }
    Ok(())
}

fn require<T>(field: &str, val: Option<T>) -> Result<T> {
    val.ok_or_else(|| ErrorKind::MissingField(field.into()).into())
}

fn require_eq<T: PartialEq + Display>(field: &str, expected: T, actual: T) -> Result<()> {
    if expected != actual {
        bail!(ErrorKind::Mismatch(field.into(), expected.to_string(), actual.to_string()));
    }
    Ok(())
}

/// Field by field comparison of a decoded HPA
pub fn verify_hpa(hpa: &DecodedHpa, exp: &HpaExpectation) -> Result<()> {
    require_eq("metadata.name", exp.name.as_str(), require("metadata.name", hpa.name())?)?;
    match hpa {
        DecodedHpa::V1(h) => {
            let spec = require("spec", h.spec.as_ref())?;
            require_eq("spec.minReplicas", exp.min_replicas, require("spec.minReplicas", spec.min_replicas)?)?;
            require_eq("spec.maxReplicas", exp.max_replicas, spec.max_replicas)?;
            let target = require("spec.targetCPUUtilizationPercentage", spec.target_cpu_utilization_percentage)?;
            require_eq("spec.targetCPUUtilizationPercentage", exp.target, target)?;
        }
        DecodedHpa::V2(h) => {
            let spec = require("spec", h.spec.as_ref())?;
            require_eq("spec.minReplicas", exp.min_replicas, require("spec.minReplicas", spec.min_replicas)?)?;
            require_eq("spec.maxReplicas", exp.max_replicas, spec.max_replicas)?;
            let metric = require("spec.metrics[0]", spec.metrics.as_ref().and_then(|m| m.first()))?;
            let resource = require("spec.metrics[0].resource", metric.resource.as_ref())?;
            let field = "spec.metrics[0].resource.target.averageUtilization";
            require_eq(field, exp.target, require(field, resource.target.average_utilization)?)?;
        }
    }
    // vacuous when nothing is expected
    for (k, v) in &exp.labels {
        let field = format!("metadata.labels.{}", k);
        let actual = require(&field, hpa.labels().and_then(|l| l.get(k)))?;
        require_eq(&field, v, actual)?;
    }
    Ok(())
}
