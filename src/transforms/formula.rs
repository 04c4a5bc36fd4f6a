//! Computes a field from an expression and writes it into the record.

use crate::datum::Record;
use crate::error::Result;
use crate::expr::Evaluate;
use crate::flow::{make_mut, Behavior, FlowNode, Output};

pub struct Formula {
    expr: Box<dyn Evaluate>,
    as_field: String,
}

impl Formula {
    pub fn new(expr: impl Evaluate + 'static, as_field: impl Into<String>) -> Self {
        Self {
            expr: Box::new(expr),
            as_field: as_field.into(),
        }
    }
}

impl FlowNode for Formula {
    fn label(&self) -> &str {
        "formula"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Modifies
    }

    #[inline]
    fn handle(&mut self, mut record: Record, out: &mut Output) -> Result<()> {
        let value = self.expr.evaluate(&record)?;
        make_mut(&mut record).insert(self.as_field.as_str(), value);
        out.propagate(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Datum, Value};
    use crate::expr::ExpressionEngine;
    use crate::flow::process_data;

    #[test]
    fn test_adds_field() {
        let expr = ExpressionEngine::new()
            .compile("datum.end - datum.start")
            .unwrap();
        let out = process_data(
            Formula::new(expr, "length"),
            vec![Datum::from([("start", 10), ("end", 25)])],
        )
        .unwrap();
        assert_eq!(out[0].get("length"), Some(&Value::from(15)));
    }

    #[test]
    fn test_overwrites_existing_field() {
        let f = |d: &Datum| -> Result<Value> {
            Ok(Value::from(d.get("a").and_then(Value::as_f64).unwrap_or(0.0) + 1.0))
        };
        let out = process_data(Formula::new(f, "a"), vec![Datum::from([("a", 1)])]).unwrap();
        assert_eq!(out, vec![Datum::from([("a", 2)])]);
    }
}
