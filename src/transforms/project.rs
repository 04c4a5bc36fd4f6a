//! Selects and optionally renames a fixed list of fields into a new record.

use crate::datum::{Datum, Field, Record};
use crate::error::{FlowError, Result};
use crate::flow::{Behavior, FlowNode, Output};
use crate::params::ProjectParams;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
pub struct Project {
    columns: Vec<(Field, String)>,
}

impl Project {
    pub fn new(params: &ProjectParams) -> Result<Self> {
        let names = match &params.as_fields {
            Some(as_fields) => {
                if as_fields.len() != params.fields.len() {
                    return Err(FlowError::params(
                        "project",
                        format!(
                            "\"fields\" has {} entries but \"as\" has {}",
                            params.fields.len(),
                            as_fields.len()
                        ),
                    ));
                }
                as_fields.clone()
            }
            None => params.fields.clone(),
        };

        let mut seen = FxHashSet::default();
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(FlowError::params(
                "project",
                format!("duplicate output field \"{}\"", dup),
            ));
        }

        let columns = params
            .fields
            .iter()
            .map(|f| Field::new(f))
            .zip(names)
            .collect();

        Ok(Self { columns })
    }
}

impl FlowNode for Project {
    fn label(&self) -> &str {
        "project"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Clones
    }

    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        let mut projected = Datum::with_capacity(self.columns.len());
        for (field, name) in &self.columns {
            projected.insert(name.as_str(), field.value(&record).clone());
        }
        out.propagate_datum(projected);
        Ok(())
    }
}
