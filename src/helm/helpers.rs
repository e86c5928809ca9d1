use std::process::Command;

use super::{ErrorKind, Result};

/// Fail early if the helm binary cannot be found
pub fn hexists(binary: &str) -> Result<()> {
    if which::which(binary).is_err() {
        bail!(ErrorKind::HelmMissing(binary.into()));
    }
    Ok(())
}

pub fn hout(binary: &str, args: Vec<String>) -> Result<(String, String, bool)> {
    debug!("{} {}", binary, args.join(" "));
    hexists(binary)?;
    let s = Command::new(binary).args(&args).output()?;
    let out : String = String::from_utf8_lossy(&s.stdout).into();
    let err : String = String::from_utf8_lossy(&s.stderr).into();
    Ok((out, err, s.status.success()))
}

/// Fetch the short client version string, e.g. `v3.12.0+gc9f554d`
pub fn version(binary: &str) -> Result<String> {
    let args = vec!["version".to_string(), "--short".to_string()];
    match hout(binary, args.clone())? {
        (vout, _, true) => Ok(vout.trim().to_string()),
        (_, verr, false) => {
            warn!("{} {} stderr: {}", binary, args.join(" "), verr);
            bail!("Could not determine helm version");
        }
    }
}

/// Trailing whitespace stripped from helm stderr
///
/// Multi-line diagnostics are kept whole.
pub fn clean_diagnostic(stderr: &str) -> String {
    stderr.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::{clean_diagnostic, hexists};

    #[test]
    fn missing_binary() {
        assert!(hexists("definitely-not-a-helm-binary-7f3a").is_err());
    }

    #[test]
    fn diagnostic_trimmed() {
        let raw = "Error: could not find template templates/hpa.yaml in chart\n\n";
        assert_eq!(clean_diagnostic(raw), "Error: could not find template templates/hpa.yaml in chart");
    }
}
