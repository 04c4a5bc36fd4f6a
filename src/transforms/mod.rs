//! Transform library and factory.
//!
//! | Type | Behavior | Description |
//! |------|----------|-------------|
//! | `filter` | none | drops records whose predicate is falsy |
//! | `formula` | modifies | writes a computed field |
//! | `project` | clones | selects and renames fields |
//! | `regexExtract` | modifies | regex capture groups into fields |
//! | `flattenDelimited` | clones | one record per delimited element |
//! | `flattenCompressedExons` | clones | one record per encoded exon |
//! | `regexFold` / `gather` | clones | wide-to-long pivot |
//! | `stack` | modifies | grouped cumulative offsets |
//! | `pileup` | modifies | lane packing of intervals |
//! | `coverage` | clones | sweep-line coverage depth |
//! | `sample` | none | reservoir sampling |
//! | `clone` | clones | copies records |

pub mod clone;
pub mod coverage;
pub mod filter;
pub mod flatten_compressed_exons;
pub mod flatten_delimited;
pub mod formula;
pub mod pileup;
pub mod project;
pub mod regex_extract;
pub mod regex_fold;
pub mod sample;
pub mod stack;

pub use clone::CloneTransform;
pub use coverage::Coverage;
pub use filter::Filter;
pub use flatten_compressed_exons::FlattenCompressedExons;
pub use flatten_delimited::FlattenDelimited;
pub use formula::Formula;
pub use pileup::Pileup;
pub use project::Project;
pub use regex_extract::RegexExtract;
pub use regex_fold::RegexFold;
pub use sample::Sample;
pub use stack::Stack;

use crate::error::Result;
use crate::expr::ExpressionEngine;
use crate::flow::FlowNode;
use crate::params::TransformParams;

/// Construct the node for an options record.
///
/// Configuration problems (mismatched lengths, bad regexes, expressions
/// that do not compile) are reported here.
pub fn create(params: &TransformParams, engine: &ExpressionEngine) -> Result<Box<dyn FlowNode>> {
    let node: Box<dyn FlowNode> = match params {
        TransformParams::Clone => Box::new(CloneTransform::new()),
        TransformParams::Coverage(p) => Box::new(Coverage::new(p)),
        TransformParams::Filter(p) => Box::new(Filter::new(engine.compile(&p.expr)?)),
        TransformParams::FlattenCompressedExons(p) => Box::new(FlattenCompressedExons::new(p)),
        TransformParams::FlattenDelimited(p) => Box::new(FlattenDelimited::new(p)?),
        TransformParams::Formula(p) => {
            Box::new(Formula::new(engine.compile(&p.expr)?, p.as_field.as_str()))
        }
        TransformParams::Pileup(p) => Box::new(Pileup::new(p)?),
        TransformParams::Project(p) => Box::new(Project::new(p)?),
        TransformParams::RegexExtract(p) => Box::new(RegexExtract::new(p)?),
        TransformParams::RegexFold(p) => Box::new(RegexFold::new(p)?),
        TransformParams::Sample(p) => Box::new(Sample::from_params(p)),
        TransformParams::Stack(p) => Box::new(Stack::new(p)?),
    };

    tracing::debug!("Created {} ({})", node.label(), node.behavior());
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::flow::Behavior;
    use crate::params::TRANSFORM_TYPES;
    use serde_json::json;

    fn build(value: serde_json::Value) -> Result<Box<dyn FlowNode>> {
        let params = TransformParams::from_value(value)?;
        create(&params, &ExpressionEngine::new())
    }

    #[test]
    fn test_factory_builds_every_type() {
        let configs = [
            json!({"type": "clone"}),
            json!({"type": "coverage", "start": "s", "end": "e"}),
            json!({"type": "filter", "expr": "datum.x > 0"}),
            json!({"type": "flattenCompressedExons"}),
            json!({"type": "flattenDelimited", "field": "a", "separator": ","}),
            json!({"type": "formula", "expr": "1 + 1", "as": "two"}),
            json!({"type": "pileup", "start": "s", "end": "e"}),
            json!({"type": "project", "fields": ["a"]}),
            json!({"type": "regexExtract", "regex": "(a)", "field": "f", "as": "x"}),
            json!({"type": "regexFold", "columnRegex": "^(.*)_a$", "asValue": "a"}),
            json!({"type": "sample", "size": 3}),
            json!({"type": "stack", "groupby": ["g"]}),
        ];
        assert_eq!(configs.len(), TRANSFORM_TYPES.len());

        for config in configs {
            let expected = config["type"].as_str().unwrap().to_string();
            let node = build(config).unwrap();
            assert_eq!(node.label(), expected);
        }
    }

    #[test]
    fn test_behaviors() {
        let formula = build(json!({"type": "formula", "expr": "1", "as": "x"})).unwrap();
        assert_eq!(formula.behavior(), Behavior::Modifies);
        let coverage = build(json!({"type": "coverage", "start": "s", "end": "e"})).unwrap();
        assert_eq!(coverage.behavior(), Behavior::Clones);
    }

    #[test]
    fn test_config_errors_are_raised_at_construction() {
        assert!(matches!(
            build(json!({"type": "filter", "expr": "datum.x >"})),
            Err(FlowError::Expression(_))
        ));
        assert!(matches!(
            build(json!({"type": "project", "fields": ["a", "b"], "as": ["x"]})),
            Err(FlowError::InvalidParams { .. })
        ));
        assert!(matches!(
            build(json!({"type": "regexExtract", "regex": "(", "field": "f", "as": "x"})),
            Err(FlowError::Regex(_))
        ));
    }
}
