//! Extracts regex capture groups from a string field into new fields.

use crate::datum::{Field, Record, Value};
use crate::error::{FlowError, Result};
use crate::flow::{make_mut, Behavior, FlowNode, Output};
use crate::params::RegexExtractParams;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct RegexExtract {
    regex: Regex,
    field: Field,
    as_fields: Vec<String>,
    skip_invalid_input: bool,
}

impl RegexExtract {
    pub fn new(params: &RegexExtractParams) -> Result<Self> {
        let regex = Regex::new(&params.regex)?;
        let as_fields = params.as_fields.to_vec();

        let groups = regex.captures_len() - 1;
        if groups != as_fields.len() {
            return Err(FlowError::params(
                "regexExtract",
                format!(
                    "the number of capture groups ({}) differs from the number of \"as\" fields ({})",
                    groups,
                    as_fields.len()
                ),
            ));
        }

        Ok(Self {
            regex,
            field: Field::new(&params.field),
            as_fields,
            skip_invalid_input: params.skip_invalid_input,
        })
    }

    fn extract(&self, value: &Value) -> std::result::Result<Vec<Value>, String> {
        let s = value.as_str().ok_or_else(|| {
            format!(
                "the field \"{}\" is not a string but {}",
                self.field.name(),
                value.type_name()
            )
        })?;

        let caps = self.regex.captures(s).ok_or_else(|| {
            format!("\"{}\" does not match the regex {}", s, self.regex.as_str())
        })?;

        Ok(caps
            .iter()
            .skip(1)
            .map(|m| Value::from(m.map(|m| m.as_str())))
            .collect())
    }

    fn invalid(&self, message: String, record: Record, out: &mut Output) -> Result<()> {
        if self.skip_invalid_input {
            tracing::warn!("regexExtract: {}; passing the record through", message);
            out.propagate(record);
            Ok(())
        } else {
            Err(FlowError::input("regexExtract", message))
        }
    }
}

impl FlowNode for RegexExtract {
    fn label(&self) -> &str {
        "regexExtract"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Modifies
    }

    fn handle(&mut self, mut record: Record, out: &mut Output) -> Result<()> {
        let extracted = match self.extract(self.field.value(&record)) {
            Ok(values) => values,
            Err(message) => return self.invalid(message, record, out),
        };

        let datum = make_mut(&mut record);
        for (name, value) in self.as_fields.iter().zip(extracted) {
            datum.insert(name.as_str(), value);
        }
        out.propagate(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Datum;
    use crate::flow::process_data;
    use crate::params::OneOrMany;

    fn params(skip: bool) -> RegexExtractParams {
        RegexExtractParams {
            regex: r"^(\w+):(\d+)-(\d+)$".into(),
            field: "locus".into(),
            as_fields: OneOrMany::Many(vec!["chrom".into(), "start".into(), "end".into()]),
            skip_invalid_input: skip,
        }
    }

    #[test]
    fn test_extracts_groups() {
        let out = process_data(
            RegexExtract::new(&params(false)).unwrap(),
            vec![Datum::from([("locus", "chr1:100-200")])],
        )
        .unwrap();
        assert_eq!(out[0].get("chrom"), Some(&Value::from("chr1")));
        assert_eq!(out[0].get("end"), Some(&Value::from("200")));
    }

    #[test]
    fn test_mismatch_raises_by_default() {
        let err = process_data(
            RegexExtract::new(&params(false)).unwrap(),
            vec![Datum::from([("locus", "garbage")])],
        )
        .unwrap_err();
        assert!(err.is_per_record());
    }

    #[test]
    fn test_non_string_raises_by_default() {
        let result = process_data(
            RegexExtract::new(&params(false)).unwrap(),
            vec![Datum::from([("locus", 5)])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_skip_invalid_input_passes_records_through() {
        let input = vec![Datum::from([("locus", "garbage")]), Datum::from([("locus", 5)])];
        let out = process_data(RegexExtract::new(&params(true)).unwrap(), input.clone()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_group_count_mismatch_is_a_config_error() {
        let mut p = params(false);
        p.as_fields = OneOrMany::One("chrom".into());
        assert!(matches!(
            RegexExtract::new(&p),
            Err(FlowError::InvalidParams { .. })
        ));
    }
}
