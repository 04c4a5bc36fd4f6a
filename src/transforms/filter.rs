//! Drops records for which a predicate is not truthy.

use crate::datum::Record;
use crate::error::Result;
use crate::expr::Evaluate;
use crate::flow::{FlowNode, Output};

pub struct Filter {
    predicate: Box<dyn Evaluate>,
}

impl Filter {
    pub fn new(predicate: impl Evaluate + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl FlowNode for Filter {
    fn label(&self) -> &str {
        "filter"
    }

    #[inline]
    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        if self.predicate.evaluate(&record)?.is_truthy() {
            out.propagate(record);
        }
        Ok(())
    }
}
