use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::autoscaling::v1::HorizontalPodAutoscaler as HpaV1;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler as HpaV2;
use serde::de::DeserializeOwned;

use super::{ErrorKind, Result};

/// Autoscaling api version a rendered HPA is decoded against
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v2")]
    V2,
}

impl SchemaVersion {
    pub fn api_version(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "autoscaling/v1",
            SchemaVersion::V2 => "autoscaling/v2",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.api_version())
    }
}

/// Split multi-document yaml into its non-empty documents
///
/// Documents holding only comments (like helm's `# Source:` headers) are dropped.
pub fn split_documents(text: &str) -> Vec<String> {
    let mut docs = vec![];
    let mut current: Vec<&str> = vec![];
    for l in text.lines() {
        if l.starts_with("---") {
            docs.push(current.join("\n"));
            current.clear();
            // `--- key: value` is legal yaml but helm never emits it
            let rest = l.trim_start_matches('-').trim();
            if !rest.is_empty() {
                current.push(rest);
            }
        } else {
            current.push(l);
        }
    }
    docs.push(current.join("\n"));

    docs.into_iter().filter(|d| {
        d.lines().any(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
    }).collect()
}

/// Decode a rendered manifest holding exactly one document
pub fn decode<K: DeserializeOwned>(text: &str, schema: &str) -> Result<K> {
    let docs = split_documents(text);
    match docs.len() {
        0 => bail!(ErrorKind::EmptyManifest),
        1 => {}
        n => bail!(ErrorKind::ManifestDecode(schema.into(), format!("expected one document, found {}", n))),
    }
    serde_yaml::from_str(&docs[0]).map_err(|e| {
        ErrorKind::ManifestDecode(schema.into(), e.to_string()).into()
    })
}

/// A rendered HorizontalPodAutoscaler in one of the supported api versions
#[derive(Clone, Debug)]
pub enum DecodedHpa {
    V1(HpaV1),
    V2(HpaV2),
}

impl DecodedHpa {
    pub fn decode(schema: SchemaVersion, text: &str) -> Result<DecodedHpa> {
        let schema_name = schema.api_version();
        Ok(match schema {
            SchemaVersion::V1 => DecodedHpa::V1(decode(text, schema_name)?),
            SchemaVersion::V2 => DecodedHpa::V2(decode(text, schema_name)?),
        })
    }

    pub fn schema(&self) -> SchemaVersion {
        match self {
            DecodedHpa::V1(_) => SchemaVersion::V1,
            DecodedHpa::V2(_) => SchemaVersion::V2,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            DecodedHpa::V1(h) => h.metadata.name.as_deref(),
            DecodedHpa::V2(h) => h.metadata.name.as_deref(),
        }
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            DecodedHpa::V1(h) => h.metadata.labels.as_ref(),
            DecodedHpa::V2(h) => h.metadata.labels.as_ref(),
        }
    }
}
