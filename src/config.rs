use std::fs;
use std::path::{Path, PathBuf};

use super::helm::HelmTemplate;
use super::suite::{self, Suite};
use super::{Result, ResultExt};

fn default_helm() -> String {
    "helm".into()
}
fn default_workers() -> usize {
    4
}
fn default_true() -> bool {
    true
}

/// Main config, serializable from chartcheck.yml
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Chart directory to render (must contain Chart.yaml)
    pub chart: PathBuf,

    /// helm executable
    #[serde(default = "default_helm")]
    pub helm: String,

    /// Number of parallel render workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Extra arguments for every helm template call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Additional suite files to run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suites: Vec<PathBuf>,

    /// Whether to run the built in hpa suites
    #[serde(default = "default_true")]
    pub builtins: bool,
}

impl Config {
    /// Minimal config for a chart directory
    pub fn for_chart<P: AsRef<Path>>(chart: P) -> Config {
        Config {
            chart: chart.as_ref().to_path_buf(),
            helm: default_helm(),
            workers: default_workers(),
            extra_args: vec![],
            suites: vec![],
            builtins: true,
        }
    }

    pub fn verify(&self) -> Result<()> {
        let chart = self.chart.join("Chart.yaml");
        if !chart.is_file() {
            bail!("Chart {} does not exist", self.chart.display());
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.helm.is_empty() {
            bail!("helm binary cannot be empty");
        }
        for s in &self.suites {
            if !s.is_file() {
                bail!("Suite file {} does not exist", s.display());
            }
        }
        Ok(())
    }

    /// Renderer for the configured chart
    pub fn renderer(&self) -> HelmTemplate {
        HelmTemplate {
            binary: self.helm.clone(),
            chart: self.chart.clone(),
            extra_args: self.extra_args.clone(),
        }
    }

    /// Built in suites (if enabled) followed by any configured suite files
    pub fn load_suites(&self) -> Result<Vec<Suite>> {
        let mut suites = if self.builtins { suite::builtin() } else { vec![] };
        for s in &self.suites {
            suites.push(Suite::from_file(s)?);
        }
        Ok(suites)
    }

    /// Read a config file in an arbitrary path
    fn read_from(pwd: &Path) -> Result<Config> {
        let mpath = pwd.join("chartcheck.yml");
        trace!("Using config in {}", mpath.display());
        if !mpath.exists() {
            bail!("Config file {} does not exist", mpath.display())
        }
        let data = fs::read_to_string(&mpath)?;
        let conf = serde_yaml::from_str(&data)
            .chain_err(|| format!("invalid config in {}", mpath.display()))?;
        Ok(conf)
    }

    /// Read a config in pwd
    pub fn read() -> Result<Config> {
        Config::read_from(Path::new("."))
    }

    /// Read a config in pwd if one exists
    pub fn maybe_read() -> Result<Option<Config>> {
        if Path::new(".").join("chartcheck.yml").is_file() {
            Ok(Some(Config::read()?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::fs;

    #[test]
    fn config_defaults() {
        let conf: Config = serde_yaml::from_str("chart: charts/auto-deploy-app\n").unwrap();
        assert_eq!(conf.helm, "helm");
        assert_eq!(conf.workers, 4);
        assert!(conf.builtins);
        assert!(conf.suites.is_empty());
        assert_eq!(conf.load_suites().unwrap().len(), 2);
    }

    #[test]
    fn config_verify() {
        let dir = tempfile::tempdir().unwrap();
        let mut conf = Config::for_chart(dir.path());
        assert!(conf.verify().is_err()); // no Chart.yaml
        fs::write(dir.path().join("Chart.yaml"), "name: auto-deploy-app\n").unwrap();
        assert!(conf.verify().is_ok());
        conf.workers = 0;
        assert!(conf.verify().is_err());
        conf.workers = 2;
        conf.suites = vec![dir.path().join("missing.suite.yml")];
        assert!(conf.verify().is_err());
    }

    #[test]
    fn config_read_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::read_from(dir.path()).is_err());
        fs::write(dir.path().join("chartcheck.yml"), "chart: chart\nworkers: 2\nextraArgs: [--kube-version, 1.28.0]\nbuiltins: false\n").unwrap();
        let conf = Config::read_from(dir.path()).unwrap();
        assert_eq!(conf.workers, 2);
        assert_eq!(conf.renderer().extra_args, vec!["--kube-version", "1.28.0"]);
        assert!(conf.load_suites().unwrap().is_empty());
    }
}
