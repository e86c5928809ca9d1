use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{ErrorKind, Result};

/// Overrides handed to a chart render
///
/// Either `--set` style dotted keys, or the body of a values file.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    /// Dotted keys to string values, passed as `--set key=value`
    Inline(BTreeMap<String, String>),
    /// Raw yaml body, passed as `-f <file>`
    Raw(String),
}

impl Default for Values {
    fn default() -> Self {
        Values::Inline(BTreeMap::new())
    }
}

/// Resolved values a renderer can consume directly
#[derive(Clone, Debug, PartialEq)]
pub enum ValueSource {
    Inline(BTreeMap<String, String>),
    File(PathBuf),
}

/// Values resolved for the duration of a single render
///
/// Owns the temporary values file (if any). The file is removed when this is dropped,
/// which covers early returns and failed assertions alike.
pub struct Materialized {
    source: ValueSource,
    // held for its Drop
    _file: Option<NamedTempFile>,
}

impl Materialized {
    pub fn source(&self) -> &ValueSource {
        &self.source
    }

    /// Path of the temporary values file if one was written
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ValueSource::File(p) => Some(p.as_path()),
            ValueSource::Inline(_) => None,
        }
    }
}

impl Values {
    /// Check the values are well formed before anything is written or rendered
    pub fn verify(&self) -> Result<()> {
        match self {
            Values::Inline(map) => {
                for k in map.keys() {
                    if k.is_empty() || k.starts_with('.') || k.ends_with('.') || k.contains('=') {
                        bail!(ErrorKind::InvalidValues(format!("bad key '{}'", k)));
                    }
                }
            }
            Values::Raw(body) => {
                if body.trim().is_empty() {
                    return Ok(()); // empty values file means chart defaults
                }
                let parsed: serde_yaml::Value = serde_yaml::from_str(body)
                    .map_err(|e| ErrorKind::InvalidValues(e.to_string()))?;
                match parsed {
                    serde_yaml::Value::Mapping(_) | serde_yaml::Value::Null => {}
                    _ => bail!(ErrorKind::InvalidValues("values file must be a mapping".into())),
                }
            }
        }
        Ok(())
    }

    /// Resolve into something a renderer can use
    ///
    /// Raw bodies are written to a fresh temporary file that lives as long as the returned guard.
    pub fn materialize(&self) -> Result<Materialized> {
        self.verify()?;
        match self {
            Values::Inline(map) => Ok(Materialized {
                source: ValueSource::Inline(map.clone()),
                _file: None,
            }),
            Values::Raw(body) => {
                let mut f = tempfile::Builder::new()
                    .prefix("chartcheck-")
                    .suffix(".values.yml")
                    .tempfile()?;
                f.write_all(body.as_bytes())?;
                f.flush()?;
                let pth = f.path().to_path_buf();
                debug!("Wrote values to {}: \n{}", pth.display(), body);
                Ok(Materialized {
                    source: ValueSource::File(pth),
                    _file: Some(f),
                })
            }
        }
    }
}

impl ValueSource {
    /// Helm arguments for this source
    ///
    /// Inline keys come out sorted so the same values always give the same command.
    pub fn helm_args(&self) -> Vec<String> {
        match self {
            ValueSource::Inline(map) => {
                let mut args = vec![];
                for (k, v) in map {
                    args.push("--set".into());
                    args.push(format!("{}={}", k, v));
                }
                args
            }
            ValueSource::File(pth) => vec!["-f".into(), pth.display().to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Values, ValueSource};
    use maplit::btreemap;

    #[test]
    fn inline_args_are_sorted() {
        let vals = Values::Inline(btreemap! {
            "resources.requests.cpu".to_string() => "500".to_string(),
            "hpa.enabled".to_string() => "true".to_string(),
        });
        let mat = vals.materialize().unwrap();
        assert!(mat.path().is_none());
        assert_eq!(mat.source().helm_args(), vec![
            "--set", "hpa.enabled=true",
            "--set", "resources.requests.cpu=500",
        ]);
    }

    #[test]
    fn raw_values_file_is_removed_on_drop() {
        let vals = Values::Raw("hpa:\n  enabled: true\n".into());
        let mat = vals.materialize().unwrap();
        let pth = mat.path().unwrap().to_path_buf();
        assert!(pth.is_file());
        assert_eq!(std::fs::read_to_string(&pth).unwrap(), "hpa:\n  enabled: true\n");
        match mat.source() {
            ValueSource::File(p) => assert_eq!(p, &pth),
            _ => panic!("expected a file source"),
        }
        drop(mat);
        assert!(!pth.exists());
    }

    #[test]
    fn malformed_values_rejected() {
        assert!(Values::Raw("hpa: [unclosed".into()).materialize().is_err());
        assert!(Values::Raw("- just\n- a list\n".into()).verify().is_err());
        assert!(Values::Raw("".into()).verify().is_ok());
        let bad = Values::Inline(btreemap! { "hpa.".to_string() => "x".to_string() });
        assert!(bad.verify().is_err());
        assert!(Values::default().verify().is_ok());
    }
}
