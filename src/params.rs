//! Serializable configuration records.
//!
//! Every transform is configured with a small options record identified by
//! a `type` discriminator, e.g.
//!
//! ```json
//! {"type": "coverage", "chrom": "chrom", "start": "start", "end": "end"}
//! ```
//!
//! A [`PipelineSpec`] is a list of such records terminated by an optional
//! collector configuration. Specs can be read from JSON or TOML.

use crate::datum::{Comparator, SortOrder};
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Transform type discriminators understood by the factory.
pub const TRANSFORM_TYPES: &[&str] = &[
    "clone",
    "coverage",
    "filter",
    "flattenCompressedExons",
    "flattenDelimited",
    "formula",
    "pileup",
    "project",
    "regexExtract",
    "regexFold",
    "sample",
    "stack",
];

/// Accepts either a single value or an array of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.clone().into_vec()
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(v: T) -> Self {
        OneOrMany::One(v)
    }
}

/// Sort keys and directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortParams {
    pub field: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OneOrMany<SortOrder>>,
}

impl SortParams {
    pub fn comparator(&self) -> Comparator {
        let fields = self.field.to_vec();
        let orders = self.order.as_ref().map(OneOrMany::to_vec).unwrap_or_default();
        Comparator::new(&fields, &orders)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupby: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaParams {
    pub expr: String,
    #[serde(rename = "as")]
    pub as_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectParams {
    pub fields: Vec<String>,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexExtractParams {
    pub regex: String,
    pub field: String,
    #[serde(rename = "as")]
    pub as_fields: OneOrMany<String>,
    #[serde(default)]
    pub skip_invalid_input: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenDelimitedParams {
    pub field: OneOrMany<String>,
    pub separator: OneOrMany<String>,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_fields: Option<OneOrMany<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenCompressedExonsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exons: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_fields: Option<[String; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexFoldParams {
    pub column_regex: OneOrMany<String>,
    pub as_value: OneOrMany<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_regex: Option<String>,
}

/// Stack offset modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackOffset {
    #[default]
    Zero,
    Center,
    Normalize,
    Information,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub groupby: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortParams>,
    #[serde(default)]
    pub offset: StackOffset,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PileupParams {
    pub start: String,
    pub end: String,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_order: Option<Vec<crate::datum::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrom: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_chrom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Options record of any transform, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransformParams {
    Clone,
    Coverage(CoverageParams),
    Filter(FilterParams),
    FlattenCompressedExons(FlattenCompressedExonsParams),
    FlattenDelimited(FlattenDelimitedParams),
    Formula(FormulaParams),
    Pileup(PileupParams),
    Project(ProjectParams),
    RegexExtract(RegexExtractParams),
    RegexFold(RegexFoldParams),
    Sample(SampleParams),
    Stack(StackParams),
}

impl TransformParams {
    /// Parse an options record.
    ///
    /// Unknown `type` discriminators are reported as
    /// [`FlowError::UnknownTransform`] rather than as a generic parse error.
    pub fn from_value(mut value: serde_json::Value) -> Result<Self> {
        let type_name = match value.get("type") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => return Err(FlowError::UnknownTransform(other.to_string())),
            None => {
                return Err(FlowError::params(
                    "transform",
                    "missing \"type\" discriminator",
                ))
            }
        };

        if type_name == "gather" {
            value["type"] = serde_json::Value::from("regexFold");
        } else if !TRANSFORM_TYPES.contains(&type_name.as_str()) {
            return Err(FlowError::UnknownTransform(type_name));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// The `type` discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            TransformParams::Clone => "clone",
            TransformParams::Coverage(_) => "coverage",
            TransformParams::Filter(_) => "filter",
            TransformParams::FlattenCompressedExons(_) => "flattenCompressedExons",
            TransformParams::FlattenDelimited(_) => "flattenDelimited",
            TransformParams::Formula(_) => "formula",
            TransformParams::Pileup(_) => "pileup",
            TransformParams::Project(_) => "project",
            TransformParams::RegexExtract(_) => "regexExtract",
            TransformParams::RegexFold(_) => "regexFold",
            TransformParams::Sample(_) => "sample",
            TransformParams::Stack(_) => "stack",
        }
    }
}

/// A linear chain of transforms terminated by a collector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSpec {
    pub transforms: Vec<TransformParams>,
    pub collect: Option<CollectParams>,
}

/// Untyped form, so that transform records go through
/// [`TransformParams::from_value`].
#[derive(Deserialize)]
struct RawPipelineSpec {
    #[serde(default)]
    transforms: Vec<serde_json::Value>,
    #[serde(default)]
    collect: Option<CollectParams>,
}

impl RawPipelineSpec {
    fn into_spec(self) -> Result<PipelineSpec> {
        let transforms = self
            .transforms
            .into_iter()
            .map(TransformParams::from_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(PipelineSpec {
            transforms,
            collect: self.collect,
        })
    }
}

impl PipelineSpec {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: RawPipelineSpec = serde_json::from_str(s)?;
        raw.into_spec()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawPipelineSpec = toml::from_str(s)?;
        raw.into_spec()
    }

    /// Load a spec, choosing the format by file extension (`.toml` or JSON).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let spec = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text)?,
            _ => Self::from_json_str(&text)?,
        };
        tracing::debug!(
            "Loaded pipeline spec from {}: {} transforms",
            path.display(),
            spec.transforms.len()
        );
        Ok(spec)
    }
}
