//! Function registry
//!
//! One registry per document session, handed by reference into ranking and
//! evaluation. Mutations (add/remove) are synchronous and immediately
//! visible to subsequent calls. Names are keyed uppercase; registration
//! order is preserved because the autocomplete ranker uses it as its final
//! tie-break.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::eval::{EvalError, Value};

/// Argument slot in a function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub optional: bool,
    pub repeatable: bool,
}

impl ArgSpec {
    pub fn required(name: &'static str) -> ArgSpec {
        ArgSpec { name, optional: false, repeatable: false }
    }

    pub fn repeating(name: &'static str) -> ArgSpec {
        ArgSpec { name, optional: true, repeatable: true }
    }
}

/// The compute behavior behind a function name.
pub type ComputeFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// A registered function: metadata plus compute behavior.
#[derive(Clone)]
pub struct FunctionDescriptor {
    /// Uppercase registry key.
    pub name: String,
    pub description: String,
    pub args: Vec<ArgSpec>,
    pub compute: ComputeFn,
    pub returns: Vec<&'static str>,
    /// Hidden functions evaluate normally but never appear in autocomplete.
    pub hidden: bool,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("args", &self.args)
            .field("returns", &self.returns)
            .field("hidden", &self.hidden)
            .finish_non_exhaustive()
    }
}

impl FunctionDescriptor {
    pub fn new(
        name: &str,
        description: &str,
        compute: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.to_ascii_uppercase(),
            description: description.to_string(),
            args: Vec::new(),
            compute: Arc::new(compute),
            returns: vec!["ANY"],
            hidden: false,
        }
    }

    pub fn with_args(mut self, args: Vec<ArgSpec>) -> FunctionDescriptor {
        self.args = args;
        self
    }

    pub fn with_returns(mut self, returns: Vec<&'static str>) -> FunctionDescriptor {
        self.returns = returns;
        self
    }

    pub fn hidden(mut self) -> FunctionDescriptor {
        self.hidden = true;
        self
    }
}

/// Registry of known functions.
///
/// Backed by an insertion-ordered vec plus an uppercase-name index, so
/// lookups are O(1) and iteration follows registration order.
#[derive(Debug, Default, Clone)]
pub struct FunctionRegistry {
    entries: Vec<FunctionDescriptor>,
    index: FxHashMap<String, usize>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    /// Register a function. Re-adding an existing name replaces the
    /// descriptor in place, keeping its original registration slot.
    pub fn add(&mut self, descriptor: FunctionDescriptor) -> &mut FunctionRegistry {
        let key = descriptor.name.clone();
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot] = descriptor,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(descriptor);
            }
        }
        self
    }

    /// Remove a function by name (case-insensitive). Returns the removed
    /// descriptor, if any. Later entries keep their relative order.
    pub fn remove(&mut self, name: &str) -> Option<FunctionDescriptor> {
        let key = name.to_ascii_uppercase();
        let slot = self.index.remove(&key)?;
        let removed = self.entries.remove(slot);
        for idx in self.index.values_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }
        Some(removed)
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<&FunctionDescriptor> {
        let key = name.to_ascii_uppercase();
        self.index.get(&key).map(|&slot| &self.entries[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_uppercase())
    }

    /// All descriptors, in registration order.
    pub fn list(&self) -> &[FunctionDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A registry pre-loaded with the builtin catalogue.
    pub fn with_builtins() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        builtins::register(&mut registry);
        registry
    }
}

/// Builtin function catalogue.
mod builtins {
    use super::*;

    fn numeric_args(args: &[Value]) -> Result<Vec<f64>, EvalError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Value::Number(n) => out.push(*n),
                Value::Boolean(b) => out.push(if *b { 1.0 } else { 0.0 }),
                Value::Empty => {}
                Value::Text(t) => match t.trim().parse::<f64>() {
                    Ok(n) => out.push(n),
                    Err(_) => {
                        return Err(EvalError::InvalidArgument(format!(
                            "expected a number, got {:?}",
                            t
                        )))
                    }
                },
                Value::Error(e) => return Err(e.clone()),
            }
        }
        Ok(out)
    }

    fn truthy(value: &Value) -> Result<bool, EvalError> {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Empty => Ok(false),
            Value::Text(t) if t.eq_ignore_ascii_case("TRUE") => Ok(true),
            Value::Text(t) if t.eq_ignore_ascii_case("FALSE") => Ok(false),
            Value::Text(t) => Err(EvalError::InvalidArgument(format!(
                "expected a boolean, got {:?}",
                t
            ))),
            Value::Error(e) => Err(e.clone()),
        }
    }

    pub fn register(registry: &mut FunctionRegistry) {
        registry.add(
            FunctionDescriptor::new("SUM", "Adds all the numbers in its arguments.", |args| {
                Ok(Value::Number(numeric_args(args)?.iter().sum()))
            })
            .with_args(vec![ArgSpec::required("number1"), ArgSpec::repeating("number2")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("AVERAGE", "Arithmetic mean of its arguments.", |args| {
                let nums = numeric_args(args)?;
                if nums.is_empty() {
                    return Err(EvalError::InvalidArgument(
                        "AVERAGE requires at least one number".to_string(),
                    ));
                }
                Ok(Value::Number(nums.iter().sum::<f64>() / nums.len() as f64))
            })
            .with_args(vec![ArgSpec::required("number1"), ArgSpec::repeating("number2")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("MIN", "Smallest numeric argument.", |args| {
                let nums = numeric_args(args)?;
                Ok(nums
                    .into_iter()
                    .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.min(n))))
                    .map(Value::Number)
                    .unwrap_or(Value::Number(0.0)))
            })
            .with_args(vec![ArgSpec::required("number1"), ArgSpec::repeating("number2")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("MAX", "Largest numeric argument.", |args| {
                let nums = numeric_args(args)?;
                Ok(nums
                    .into_iter()
                    .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.max(n))))
                    .map(Value::Number)
                    .unwrap_or(Value::Number(0.0)))
            })
            .with_args(vec![ArgSpec::required("number1"), ArgSpec::repeating("number2")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("COUNT", "Counts numeric arguments.", |args| {
                let count = args.iter().filter(|a| matches!(a, Value::Number(_))).count();
                Ok(Value::Number(count as f64))
            })
            .with_args(vec![ArgSpec::required("value1"), ArgSpec::repeating("value2")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("ABS", "Absolute value.", |args| {
                let nums = numeric_args(args)?;
                match nums.first() {
                    Some(n) => Ok(Value::Number(n.abs())),
                    None => Err(EvalError::InvalidArgument("ABS requires a number".to_string())),
                }
            })
            .with_args(vec![ArgSpec::required("number")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("ROUND", "Rounds to the given number of digits.", |args| {
                let nums = numeric_args(args)?;
                let n = *nums.first().ok_or_else(|| {
                    EvalError::InvalidArgument("ROUND requires a number".to_string())
                })?;
                let digits = nums.get(1).copied().unwrap_or(0.0) as i32;
                let factor = 10f64.powi(digits);
                Ok(Value::Number((n * factor).round() / factor))
            })
            .with_args(vec![ArgSpec::required("number"), ArgSpec::required("digits")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("IF", "Returns one value if true, another if false.", |args| {
                let cond = args.first().map(truthy).transpose()?.unwrap_or(false);
                let slot = if cond { 1 } else { 2 };
                Ok(args.get(slot).cloned().unwrap_or(Value::Empty))
            })
            .with_args(vec![
                ArgSpec::required("condition"),
                ArgSpec::required("value_if_true"),
                ArgSpec { name: "value_if_false", optional: true, repeatable: false },
            ]),
        );

        registry.add(
            FunctionDescriptor::new("AND", "True when every argument is true.", |args| {
                for arg in args {
                    if !truthy(arg)? {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            })
            .with_args(vec![ArgSpec::required("logical1"), ArgSpec::repeating("logical2")])
            .with_returns(vec!["BOOLEAN"]),
        );

        registry.add(
            FunctionDescriptor::new("OR", "True when any argument is true.", |args| {
                for arg in args {
                    if truthy(arg)? {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            })
            .with_args(vec![ArgSpec::required("logical1"), ArgSpec::repeating("logical2")])
            .with_returns(vec!["BOOLEAN"]),
        );

        registry.add(
            FunctionDescriptor::new("NOT", "Logical negation.", |args| {
                let v = args.first().map(truthy).transpose()?.unwrap_or(false);
                Ok(Value::Boolean(!v))
            })
            .with_args(vec![ArgSpec::required("logical")])
            .with_returns(vec!["BOOLEAN"]),
        );

        registry.add(
            FunctionDescriptor::new("CONCAT", "Concatenates its arguments as text.", |args| {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&arg.to_display());
                }
                Ok(Value::Text(out))
            })
            .with_args(vec![ArgSpec::required("text1"), ArgSpec::repeating("text2")])
            .with_returns(vec!["STRING"]),
        );

        registry.add(
            FunctionDescriptor::new("LEN", "Length of a text value.", |args| {
                match args.first() {
                    Some(v) => Ok(Value::Number(v.to_display().chars().count() as f64)),
                    None => Err(EvalError::InvalidArgument("LEN requires a value".to_string())),
                }
            })
            .with_args(vec![ArgSpec::required("text")])
            .with_returns(vec!["NUMBER"]),
        );

        registry.add(
            FunctionDescriptor::new("UPPER", "Uppercases a text value.", |args| {
                match args.first() {
                    Some(v) => Ok(Value::Text(v.to_display().to_uppercase())),
                    None => Err(EvalError::InvalidArgument("UPPER requires a value".to_string())),
                }
            })
            .with_args(vec![ArgSpec::required("text")])
            .with_returns(vec!["STRING"]),
        );

        registry.add(
            FunctionDescriptor::new("LOWER", "Lowercases a text value.", |args| {
                match args.first() {
                    Some(v) => Ok(Value::Text(v.to_display().to_lowercase())),
                    None => Err(EvalError::InvalidArgument("LOWER requires a value".to_string())),
                }
            })
            .with_args(vec![ArgSpec::required("text")])
            .with_returns(vec!["STRING"]),
        );

        // Boolean literal keywords. Registered as zero-arg functions so
        // `=TRUE()` evaluates, and so the ranker's exact-match rule can
        // suppress suggesting a keyword the user already typed in full.
        registry.add(
            FunctionDescriptor::new("TRUE", "The logical value TRUE.", |_| {
                Ok(Value::Boolean(true))
            })
            .with_returns(vec!["BOOLEAN"]),
        );
        registry.add(
            FunctionDescriptor::new("FALSE", "The logical value FALSE.", |_| {
                Ok(Value::Boolean(false))
            })
            .with_returns(vec!["BOOLEAN"]),
        );
    }
}
