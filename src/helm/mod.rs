/// Allow normal error handling from structs
pub use super::{Result, ErrorKind};
pub use super::values::{Values, ValueSource};

/// Parallel suite runners
pub mod parallel;

/// Direct helm invokers (used by abstractions)
pub mod direct;
pub use self::direct::HelmTemplate;

/// Helm related helpers
pub mod helpers;

/// What came back from the render engine
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    /// Rendered manifest text
    Manifest(String),
    /// The engine refused to render; holds its diagnostic
    Failed(String),
}

/// Something that can expand chart templates into manifest text
///
/// Failures of the chart itself come back as `Rendered::Failed`.
/// An `Err` means the engine could not be invoked at all.
pub trait Renderer: Send + Sync {
    fn render(&self, release: &str, templates: &[String], values: &ValueSource) -> Result<Rendered>;
}

/// A request to render a set of templates for a named release
#[derive(Clone, Debug)]
pub struct RenderRequest {
    /// Release name
    pub release: String,
    /// Template paths relative to the chart root, e.g. `templates/hpa.yaml`
    pub templates: Vec<String>,
    /// Overrides
    pub values: Values,
}

impl RenderRequest {
    pub fn new(release: &str, templates: &[&str], values: Values) -> RenderRequest {
        RenderRequest {
            release: release.into(),
            templates: templates.iter().map(|t| t.to_string()).collect(),
            values,
        }
    }

    pub fn verify(&self) -> Result<()> {
        if self.release.is_empty() {
            bail!(ErrorKind::InvalidRequest("release name cannot be empty".into()));
        }
        if self.templates.is_empty() {
            bail!(ErrorKind::InvalidRequest("at least one template must be named".into()));
        }
        if self.templates.iter().any(|t| t.is_empty()) {
            bail!(ErrorKind::InvalidRequest("template paths cannot be empty".into()));
        }
        Ok(())
    }

    /// Materialize values and render
    ///
    /// Any temporary values file is gone by the time this returns.
    pub fn render(&self, renderer: &dyn Renderer) -> Result<Rendered> {
        self.verify()?;
        let mat = self.values.materialize()?;
        renderer.render(&self.release, &self.templates, mat.source())
    }
}

#[cfg(test)]
mod tests {
    use super::{RenderRequest, Values};

    #[test]
    fn request_needs_templates() {
        let req = RenderRequest::new("hpa-test", &[], Values::default());
        assert!(req.verify().is_err());
        let req = RenderRequest::new("", &["templates/hpa.yaml"], Values::default());
        assert!(req.verify().is_err());
        let req = RenderRequest::new("hpa-test", &["templates/hpa.yaml"], Values::default());
        assert!(req.verify().is_ok());
    }
}
