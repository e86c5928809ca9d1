use std::path::{Path, PathBuf};

use super::helpers::{self, hout};
use super::{Renderer, Rendered, ValueSource};
use super::Result;

/// Offline `helm template` against a chart directory
///
/// Every template is passed as `--show-only`, so helm itself reports
/// `could not find template` when one of them renders to nothing.
#[derive(Clone, Debug)]
pub struct HelmTemplate {
    /// helm executable (name on PATH or full path)
    pub binary: String,
    /// Chart directory containing Chart.yaml
    pub chart: PathBuf,
    /// Extra arguments appended to every call (e.g. --kube-version)
    pub extra_args: Vec<String>,
}

impl HelmTemplate {
    pub fn new<P: AsRef<Path>>(chart: P) -> HelmTemplate {
        HelmTemplate {
            binary: "helm".into(),
            chart: chart.as_ref().to_path_buf(),
            extra_args: vec![],
        }
    }

    /// Full argument list for a render, without the binary
    pub fn args(&self, release: &str, templates: &[String], values: &ValueSource) -> Vec<String> {
        let mut tplvec = vec![
            "template".into(),
            release.into(),
            self.chart.display().to_string(),
        ];
        for t in templates {
            tplvec.push("--show-only".into());
            tplvec.push(t.clone());
        }
        tplvec.extend(values.helm_args());
        tplvec.extend(self.extra_args.iter().cloned());
        tplvec
    }
}

impl Renderer for HelmTemplate {
    fn render(&self, release: &str, templates: &[String], values: &ValueSource) -> Result<Rendered> {
        let tplvec = self.args(release, templates, values);
        // NB: offline call, never talks to a cluster
        let (tpl, tplerr, success) = hout(&self.binary, tplvec.clone())?;
        if !success {
            debug!("{} {} stderr: {}", self.binary, tplvec.join(" "), tplerr);
            return Ok(Rendered::Failed(helpers::clean_diagnostic(&tplerr)));
        }
        if !tplerr.is_empty() {
            warn!("{} template stderr: {}", self.binary, tplerr.trim_end());
        }
        trace!("Rendered {} from {}: \n{}", release, self.chart.display(), tpl);
        Ok(Rendered::Manifest(tpl))
    }
}
