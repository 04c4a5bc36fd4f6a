//! Splits delimited string fields into one record per element.
//!
//! With several fields, the fields are split in parallel: the i-th output
//! record receives the i-th element of every field. All fields of a record
//! must split into the same number of elements.

use crate::datum::{Datum, Field, Record, Value};
use crate::error::{FlowError, Result};
use crate::flow::{Behavior, FlowNode, Output};
use crate::params::FlattenDelimitedParams;

#[derive(Debug, Clone)]
pub struct FlattenDelimited {
    fields: Vec<Field>,
    separators: Vec<String>,
    as_fields: Vec<String>,
}

impl FlattenDelimited {
    pub fn new(params: &FlattenDelimitedParams) -> Result<Self> {
        let fields = params.field.to_vec();
        let separators = params.separator.to_vec();
        let as_fields = params
            .as_fields
            .as_ref()
            .map(|a| a.to_vec())
            .unwrap_or_else(|| fields.clone());

        if separators.len() != fields.len() {
            return Err(FlowError::params(
                "flattenDelimited",
                "\"field\" and \"separator\" must have equal lengths",
            ));
        }
        if as_fields.len() != fields.len() {
            return Err(FlowError::params(
                "flattenDelimited",
                "\"field\" and \"as\" must have equal lengths",
            ));
        }
        if let Some(empty) = separators.iter().position(String::is_empty) {
            return Err(FlowError::params(
                "flattenDelimited",
                format!("the separator of \"{}\" is empty", fields[empty]),
            ));
        }

        Ok(Self {
            fields: fields.iter().map(|f| Field::new(f)).collect(),
            separators,
            as_fields,
        })
    }
}

impl FlowNode for FlattenDelimited {
    fn label(&self) -> &str {
        "flattenDelimited"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Clones
    }

    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        let mut columns: Vec<Vec<&str>> = Vec::with_capacity(self.fields.len());
        for (field, separator) in self.fields.iter().zip(&self.separators) {
            let value = field.value(&record);
            let s = value.as_str().ok_or_else(|| {
                FlowError::input(
                    "flattenDelimited",
                    format!(
                        "the field \"{}\" is not a string but {}",
                        field.name(),
                        value.type_name()
                    ),
                )
            })?;
            columns.push(s.split(separator.as_str()).collect());
        }

        let n = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|c| c.len() != n) {
            return Err(FlowError::input(
                "flattenDelimited",
                format!(
                    "the fields {} have different numbers of elements",
                    self.fields
                        .iter()
                        .map(|f| format!("\"{}\"", f.name()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }

        for i in 0..n {
            let mut datum = Datum::clone(&record);
            for (name, column) in self.as_fields.iter().zip(&columns) {
                datum.insert(name.as_str(), Value::from(column[i]));
            }
            out.propagate_datum(datum);
        }
        Ok(())
    }
}
