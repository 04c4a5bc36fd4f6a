//! Wide-to-long pivot of columns selected by regular expressions.
//!
//! Each column regex must have a capture group that extracts a sample id
//! from the column name. Columns are detected from the first record after a
//! file boundary. Every input record then yields one output record per
//! sample id carrying the non-matching columns, the sample id, and the
//! matched values under the `asValue` names.

use crate::batch::FlowBatch;
use crate::datum::{Datum, Record, Value};
use crate::error::{FlowError, Result};
use crate::flow::{Behavior, FlowNode, Output};
use crate::params::RegexFoldParams;
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxBuildHasher;

/// Columns detected for the current file.
#[derive(Debug, Clone, Default)]
struct Layout {
    /// Sample id and the source column of each value (per column regex).
    samples: Vec<(String, Vec<Option<String>>)>,
    included: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegexFold {
    column_regex: Vec<Regex>,
    as_value: Vec<String>,
    skip_regex: Option<Regex>,
    sample_key: String,
    layout: Option<Layout>,
}

impl RegexFold {
    pub fn new(params: &RegexFoldParams) -> Result<Self> {
        let column_regex = params
            .column_regex
            .to_vec()
            .iter()
            .map(|re| Regex::new(re))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let as_value = params.as_value.to_vec();

        if column_regex.len() != as_value.len() {
            return Err(FlowError::params(
                "regexFold",
                "lengths of \"columnRegex\" and \"asValue\" are not equal",
            ));
        }

        let skip_regex = params.skip_regex.as_deref().map(Regex::new).transpose()?;

        Ok(Self {
            column_regex,
            as_value,
            skip_regex,
            sample_key: params.as_key.clone().unwrap_or_else(|| "sample".to_string()),
            layout: None,
        })
    }

    fn detect_columns(&self, datum: &Datum) -> Layout {
        let mut samples: IndexMap<String, Vec<Option<String>>, FxBuildHasher> =
            IndexMap::default();

        for (i, re) in self.column_regex.iter().enumerate() {
            for column in datum.keys() {
                let sample_id = re
                    .captures(column)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());

                if let Some(sample_id) = sample_id {
                    let attrs = samples
                        .entry(sample_id)
                        .or_insert_with(|| vec![None; self.column_regex.len()]);
                    attrs[i] = Some(column.to_string());
                }
            }
        }

        let included = datum
            .keys()
            .filter(|column| {
                !self.column_regex.iter().any(|re| re.is_match(column))
                    && !self.skip_regex.as_ref().is_some_and(|re| re.is_match(column))
            })
            .map(str::to_string)
            .collect();

        let layout = Layout {
            samples: samples.into_iter().collect(),
            included,
        };
        tracing::debug!(
            "regexFold detected {} samples and {} included columns",
            layout.samples.len(),
            layout.included.len()
        );
        layout
    }
}

impl FlowNode for RegexFold {
    fn label(&self) -> &str {
        "regexFold"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Clones
    }

    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        if self.layout.is_none() {
            self.layout = Some(self.detect_columns(&record));
        }
        let Some(layout) = &self.layout else {
            return Ok(());
        };

        for (sample_id, attrs) in &layout.samples {
            let mut tidy = Datum::with_capacity(layout.included.len() + 1 + attrs.len());
            for column in &layout.included {
                if let Some(v) = record.get(column) {
                    tidy.insert(column.as_str(), v.clone());
                }
            }
            tidy.insert(self.sample_key.as_str(), sample_id.as_str());

            for (name, source) in self.as_value.iter().zip(attrs) {
                let value = source
                    .as_deref()
                    .and_then(|c| record.get(c))
                    .cloned()
                    .unwrap_or(Value::Null);
                tidy.insert(name.as_str(), value);
            }

            out.propagate_datum(tidy);
        }
        Ok(())
    }

    fn begin_batch(&mut self, batch: &FlowBatch, _out: &mut Output) -> Result<()> {
        if batch.is_file() {
            self.layout = None;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.layout = None;
    }
}
