//! Expression evaluation for the Filter and Formula transforms.
//!
//! Expressions are [Rhai](https://rhai.rs) expressions with the current
//! record bound as `datum`:
//!
//! ```text
//! datum.score > 10
//! datum.end - datum.start
//! datum["field with spaces"] == "x"
//! ```
//!
//! Available helper functions:
//! - `is_valid(x)` - true unless `x` is unit (missing/null) or NaN
//!
//! The [`Evaluate`] trait is the seam between the transforms and the
//! evaluator. Closures of type `Fn(&Datum) -> Result<Value>` implement it
//! directly, which is handy for programmatic pipelines and tests.

use crate::datum::{Datum, Value};
use crate::error::{FlowError, Result};
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};
use std::fmt;
use std::sync::Arc;

/// Something that computes a value from a record.
pub trait Evaluate {
    fn evaluate(&self, datum: &Datum) -> Result<Value>;
}

impl<F> Evaluate for F
where
    F: Fn(&Datum) -> Result<Value>,
{
    fn evaluate(&self, datum: &Datum) -> Result<Value> {
        self(datum)
    }
}

/// Shared Rhai engine with the helper functions registered.
#[derive(Clone)]
pub struct ExpressionEngine {
    engine: Arc<Engine>,
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionEngine").finish_non_exhaustive()
    }
}

impl ExpressionEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();

        engine.register_fn("is_valid", |x: Dynamic| {
            if x.is_unit() {
                false
            } else if let Ok(f) = x.as_float() {
                !f.is_nan()
            } else {
                true
            }
        });

        Self {
            engine: Arc::new(engine),
        }
    }

    /// Compile an expression. Syntax errors are configuration errors.
    pub fn compile(&self, source: &str) -> Result<Expression> {
        let ast = self
            .engine
            .compile_expression(source)
            .map_err(|e| FlowError::Expression(format!("cannot compile \"{}\": {}", source, e)))?;

        tracing::debug!("Compiled expression: {}", source);

        Ok(Expression {
            engine: Arc::clone(&self.engine),
            ast,
            source: source.to_string(),
        })
    }
}

/// A compiled expression, evaluated once per record.
#[derive(Clone)]
pub struct Expression {
    engine: Arc<Engine>,
    ast: AST,
    source: String,
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .finish()
    }
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Evaluate for Expression {
    fn evaluate(&self, datum: &Datum) -> Result<Value> {
        let mut scope = Scope::new();
        scope.push_dynamic("datum", datum_to_dynamic(datum));

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(|e| {
                FlowError::Expression(format!("cannot evaluate \"{}\": {}", self.source, e))
            })?;

        Ok(dynamic_to_value(result))
    }
}

fn datum_to_dynamic(datum: &Datum) -> Dynamic {
    let mut map = Map::new();
    for (key, value) in datum.iter() {
        map.insert(key.into(), value_to_dynamic(value));
    }
    Dynamic::from_map(map)
}

fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Number(n) => Dynamic::from_float(*n),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(a) => {
            let array: Array = a.iter().map(value_to_dynamic).collect();
            Dynamic::from_array(array)
        }
        Value::Object(d) => datum_to_dynamic(d),
    }
}

fn dynamic_to_value(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(f) = value.as_float() {
        Value::Number(f)
    } else if let Ok(i) = value.as_int() {
        Value::Number(i as f64)
    } else if value.is_string() {
        value.into_string().map(Value::String).unwrap_or(Value::Null)
    } else if value.is_array() {
        value
            .into_array()
            .map(|a| Value::Array(a.into_iter().map(dynamic_to_value).collect()))
            .unwrap_or(Value::Null)
    } else if value.is_map() {
        value
            .try_cast::<Map>()
            .map(|m| {
                Value::Object(
                    m.into_iter()
                        .map(|(k, v)| (k.to_string(), dynamic_to_value(v)))
                        .collect(),
                )
            })
            .unwrap_or(Value::Null)
    } else {
        Value::String(value.to_string())
    }
}
