//! Expands a compressed exon string into one record per exon.
//!
//! The exon string is a comma-separated list of lengths that alternate
//! between a gap and an exon, starting from the transcript start. For
//! example, with start 100, `"0,10,5,20"` describes the exons
//! `[100, 110)` and `[115, 135)`.

use crate::datum::{Datum, Field, Record};
use crate::error::{FlowError, Result};
use crate::flow::{Behavior, FlowNode, Output};
use crate::params::FlattenCompressedExonsParams;

#[derive(Debug, Clone)]
pub struct FlattenCompressedExons {
    exons: Field,
    start: Field,
    as_start: String,
    as_end: String,
}

impl FlattenCompressedExons {
    pub fn new(params: &FlattenCompressedExonsParams) -> Self {
        let [as_start, as_end] = params
            .as_fields
            .clone()
            .unwrap_or_else(|| ["exonStart".to_string(), "exonEnd".to_string()]);

        Self {
            exons: Field::new(params.exons.as_deref().unwrap_or("exons")),
            start: Field::new(params.start.as_deref().unwrap_or("start")),
            as_start,
            as_end,
        }
    }
}

impl FlowNode for FlattenCompressedExons {
    fn label(&self) -> &str {
        "flattenCompressedExons"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Clones
    }

    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        let exons = self.exons.value(&record).as_str().ok_or_else(|| {
            FlowError::input(
                "flattenCompressedExons",
                format!("the field \"{}\" is not a string", self.exons.name()),
            )
        })?;
        let start = self.start.number(&record).ok_or_else(|| {
            FlowError::input(
                "flattenCompressedExons",
                format!("the field \"{}\" is not a number", self.start.name()),
            )
        })?;

        let mut upper = start;
        let mut lower = start;
        let mut in_exon = false;

        for token in exons.split(',').filter(|t| !t.is_empty()) {
            let length: f64 = token.trim().parse().map_err(|_| {
                FlowError::input(
                    "flattenCompressedExons",
                    format!("cannot parse \"{}\" in \"{}\"", token, exons),
                )
            })?;

            if in_exon {
                upper = lower + length;
                let mut datum = Datum::clone(&record);
                datum.insert(self.as_start.as_str(), lower);
                datum.insert(self.as_end.as_str(), upper);
                out.propagate_datum(datum);
            } else {
                lower = upper + length;
            }
            in_exon = !in_exon;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Value;
    use crate::flow::process_data;

    #[test]
    fn test_decodes_exons() {
        let out = process_data(
            FlattenCompressedExons::new(&FlattenCompressedExonsParams::default()),
            vec![Datum::from([
                ("gene", Value::from("A")),
                ("start", Value::from(100)),
                ("exons", Value::from("0,10,5,20")),
            ])],
        )
        .unwrap();

        let exons: Vec<(f64, f64)> = out
            .iter()
            .map(|d| {
                (
                    d.get("exonStart").and_then(Value::as_f64).unwrap(),
                    d.get("exonEnd").and_then(Value::as_f64).unwrap(),
                )
            })
            .collect();
        assert_eq!(exons, vec![(100.0, 110.0), (115.0, 135.0)]);
        assert_eq!(out[0].get("gene"), Some(&Value::from("A")));
    }

    #[test]
    fn test_custom_fields() {
        let params = FlattenCompressedExonsParams {
            exons: Some("ex".into()),
            start: Some("txStart".into()),
            as_fields: Some(["s".into(), "e".into()]),
        };
        let out = process_data(
            FlattenCompressedExons::new(&params),
            vec![Datum::from([("txStart", Value::from(0)), ("ex", Value::from("2,3"))])],
        )
        .unwrap();
        assert_eq!(out[0].get("s"), Some(&Value::from(2)));
        assert_eq!(out[0].get("e"), Some(&Value::from(5)));
    }

    #[test]
    fn test_bad_token() {
        let result = process_data(
            FlattenCompressedExons::new(&FlattenCompressedExonsParams::default()),
            vec![Datum::from([("start", Value::from(0)), ("exons", Value::from("1,x"))])],
        );
        assert!(result.is_err());
    }
}
