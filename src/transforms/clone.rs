//! Copies each record so that a downstream node may mutate it freely.

use crate::datum::{Datum, Record};
use crate::error::Result;
use crate::flow::{Behavior, FlowNode, Output};

#[derive(Debug, Default, Clone)]
pub struct CloneTransform;

impl CloneTransform {
    pub fn new() -> Self {
        Self
    }
}

impl FlowNode for CloneTransform {
    fn label(&self) -> &str {
        "clone"
    }

    fn behavior(&self) -> Behavior {
        Behavior::Clones
    }

    #[inline]
    fn handle(&mut self, record: Record, out: &mut Output) -> Result<()> {
        out.propagate_datum(Datum::clone(&record));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_output_is_a_distinct_copy() {
        let record = Datum::from([("a", 1)]).into_record();
        let mut out = Output::new();
        CloneTransform::new()
            .handle(Rc::clone(&record), &mut out)
            .unwrap();

        let copies = out.into_records();
        assert_eq!(*copies[0], *record);
        assert!(!Rc::ptr_eq(&copies[0], &record));
    }
}
