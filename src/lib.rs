#![recursion_limit = "1024"]
#![allow(renamed_and_removed_lints)]

#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate log;

#[macro_use]
extern crate error_chain;
error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
    links {}
    foreign_links {
        Io(::std::io::Error);
        SerdeY(serde_yaml::Error);
        Regex(regex::Error);
    }
    errors {
        HelmMissing(binary: String) {
            description("helm executable not found")
            display("helm executable '{}' not found", binary)
        }
        InvalidRequest(reason: String) {
            description("render request is invalid")
            display("invalid render request: {}", reason)
        }
        InvalidValues(reason: String) {
            description("values are not well formed")
            display("invalid values: {}", reason)
        }
        InvalidSuite(suite: String, reason: String) {
            description("suite definition does not validate")
            display("suite {} is invalid: {}", suite, reason)
        }
        MissingRenderFailure(pattern: String) {
            description("render succeeded when a failure was expected")
            display("expected render to fail matching /{}/ but it succeeded", pattern)
        }
        ErrorPatternMismatch(pattern: String, diagnostic: String) {
            description("render failure did not match the expected pattern")
            display("render failure did not match /{}/: {}", pattern, diagnostic)
        }
        UnexpectedRenderFailure(diagnostic: String) {
            description("render failed unexpectedly")
            display("render failed: {}", diagnostic)
        }
        EmptyManifest {
            description("rendered manifest contained no documents")
            display("rendered manifest contained no documents")
        }
        ManifestDecode(schema: String, reason: String) {
            description("rendered manifest does not match the expected schema")
            display("failed to decode manifest as {}: {}", schema, reason)
        }
        MissingField(field: String) {
            description("expected field is absent")
            display("{} is absent from the rendered manifest", field)
        }
        Mismatch(field: String, expected: String, actual: String) {
            description("rendered value differs from expectation")
            display("{}: expected {} but got {}", field, expected, actual)
        }
        NonDeterministicRender(release: String) {
            description("rendering the same request twice gave different output")
            display("rendering {} twice produced different output", release)
        }
        CasePanicked(reason: String) {
            description("case aborted before producing a report")
            display("case aborted: {}", reason)
        }
        SuiteFailures(n: usize) {
            description("one or more cases failed")
            display("{} case(s) failed", n)
        }
    }
}

/// Value sources and their materialization into helm arguments
pub mod values;

/// A small CLI helm interface
pub mod helm;
pub use helm::{Renderer, RenderRequest, Rendered};

/// Decoding of rendered manifests into kubernetes types
pub mod manifest;
pub use manifest::{DecodedHpa, SchemaVersion};

/// Assertions against rendered manifests
pub mod verify;
pub use verify::{Expectation, HpaExpectation, Outcome};

/// Test case tables
pub mod suite;
pub use suite::{Suite, TestCase, CaseReport};

/// Configuration read from chartcheck.yml
pub mod config;
pub use config::Config;

/// Smart initialiser with safety
///
/// Tricks the library into reading from your chart repository.
pub fn init() -> Result<()> {
    use std::env;
    use std::path::Path;

    // Allow chartcheck calls to work from anywhere if we know where the config is
    if let Ok(cdir) = env::var("CHARTCHECK_DIR") {
        let pth = Path::new(&cdir);
        if !pth.is_dir() {
            bail!("CHARTCHECK_DIR must exist");
        }
        env::set_current_dir(pth)?;
        debug!("Using chartcheck directory {}", pth.display());
    }
    Ok(())
}
