//! Built-in Callables
//!
//! A small library of vectorised functions so that methods can be declared
//! from text (method files, the CLI) without writing Rust.

use crate::callable::{Args, CallError, CallResult, Callable, Provenance, UNARY_ARG, map_numeric};
use crate::scope::Scope;
use crate::value::{Scalar, Value};

fn provenance() -> Provenance {
    Provenance::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn input(args: &Args) -> Result<&Value, CallError> {
    args.first()
        .ok_or_else(|| CallError::MissingArgument(UNARY_ARG.to_string()))
}

fn unary(name: &'static str, f: fn(f64) -> f64) -> Callable {
    Callable::new(name, move |args: &Args| map_numeric(input(args)?, f))
        .with_provenance(provenance())
}

/// Returns its first argument unchanged
pub fn identity() -> Callable {
    Callable::new("identity", |args: &Args| Ok(input(args)?.clone())).with_provenance(provenance())
}

/// Average ranks (1-based, ties share the mean rank). Missing cells stay missing.
pub fn rank() -> Callable {
    Callable::new("rank", |args: &Args| {
        let value = input(args)?;
        let numbers = value.to_numbers().ok_or(CallError::TypeMismatch {
            argument: UNARY_ARG.to_string(),
            expected: "numeric",
            got: value.kind(),
        })?;
        let ranks = average_ranks(&numbers);
        reshape(value, ranks)
    })
    .with_provenance(provenance())
}

/// Bonferroni adjustment: `min(1, p * n)` with `n` the number of non-missing p-values
pub fn bonferroni() -> Callable {
    Callable::new("bonferroni", |args: &Args| {
        let value = input(args)?;
        let numbers = value.to_numbers().ok_or(CallError::TypeMismatch {
            argument: UNARY_ARG.to_string(),
            expected: "numeric",
            got: value.kind(),
        })?;
        let n = numbers.iter().filter(|v| !v.is_nan()).count() as f64;
        let adjusted = numbers
            .into_iter()
            .map(|p| if p.is_nan() { p } else { (p * n).min(1.0) })
            .collect();
        reshape(value, adjusted)
    })
    .with_provenance(provenance())
}

/// Scope holding every built-in, bound under its own name
pub fn scope() -> Scope {
    [
        identity(),
        unary("abs", f64::abs),
        unary("sqrt", f64::sqrt),
        unary("ln", f64::ln),
        unary("exp", f64::exp),
        unary("neg", |v| -v),
        rank(),
        bonferroni(),
    ]
    .into_iter()
    .fold(Scope::new(), |scope, f| {
        let name = f.source_text();
        scope.with(name, f)
    })
}

/// Names of the built-ins, for diagnostics
pub fn names() -> &'static [&'static str] {
    &[
        "identity",
        "abs",
        "sqrt",
        "ln",
        "exp",
        "neg",
        "rank",
        "bonferroni",
    ]
}

fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let mean_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = mean_rank;
        }
        start = end + 1;
    }
    ranks
}

/// Put numbers back into the shape of `like`; NaN becomes missing.
fn reshape(like: &Value, numbers: Vec<f64>) -> CallResult {
    let cell = |v: f64| {
        if v.is_nan() {
            Scalar::Missing
        } else {
            Scalar::Number(v)
        }
    };
    match like {
        Value::Scalar(_) => Ok(Value::Scalar(numbers.first().copied().map(cell).unwrap_or_default())),
        Value::Vector(_) => Ok(Value::Vector(numbers.into_iter().map(cell).collect())),
        Value::Keyed(entries) => Ok(Value::Keyed(
            entries
                .iter()
                .zip(numbers)
                .map(|((k, _), v)| (k.clone(), cell(v)))
                .collect(),
        )),
        Value::Function(_) => Err(CallError::msg("cannot reshape into a function")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, value: Value) -> Value {
        let scope = scope();
        let f = scope.get(name).and_then(Value::as_callable).unwrap().clone();
        f.call1(value).unwrap()
    }

    #[test]
    fn test_every_name_is_bound() {
        let scope = scope();
        for name in names() {
            let f = scope.get(name).and_then(Value::as_callable).unwrap();
            assert_eq!(f.name(), Some(*name));
            assert_eq!(f.provenance().unwrap().name, "benchdesign-logic");
        }
    }

    #[test]
    fn test_rank_ties() {
        let out = call("rank", Value::numbers([10.0, 30.0, 20.0, 20.0]));
        assert_eq!(out, Value::numbers([1.0, 4.0, 2.5, 2.5]));
    }

    #[test]
    fn test_bonferroni_caps_at_one() {
        let out = call("bonferroni", Value::numbers([0.01, 0.2, 0.5]));
        let got = out.to_numbers().unwrap();
        assert!((got[0] - 0.03).abs() < 1e-12);
        assert!((got[1] - 0.6).abs() < 1e-12);
        assert_eq!(got[2], 1.0);
    }

    #[test]
    fn test_neg_keeps_missing() {
        let out = call(
            "neg",
            Value::Vector(vec![Scalar::Number(2.0), Scalar::Missing]),
        );
        assert_eq!(
            out,
            Value::Vector(vec![Scalar::Number(-2.0), Scalar::Missing])
        );
    }
}
