// ============================================================
// Layer 5 — Optimizer Selection
// ============================================================
// Two ways to choose an optimizer:
//
//   --optimizer-name adamw             plain name
//   --optimizer adam,lr=3e-5 ...       method string, parsed by
//                                      OptimizerSpec, whose lr /
//                                      eps / weight_decay override
//                                      the individual flags
//
// Method strings follow the "method,key=value,..." form and are
// validated against the parameters each method accepts. Only
// adam and adamw can actually drive training; the rest of the
// table exists so a typo is reported as a typo.

use regex::Regex;
use std::{collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use crate::domain::error::{ConfigError, OptimizerParseError};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("Invalid number regex"));

/// Accepted parameter names per method.
const METHODS: [(&str, &[&str]); 9] = [
    ("adadelta", &["lr", "rho", "eps", "weight_decay"]),
    ("adagrad", &["lr", "lr_decay", "weight_decay", "initial_accumulator_value", "eps"]),
    ("adam", &["lr", "betas", "eps", "weight_decay", "amsgrad"]),
    ("adamw", &["lr", "betas", "eps", "weight_decay", "amsgrad"]),
    ("adamax", &["lr", "betas", "eps", "weight_decay"]),
    ("asgd", &["lr", "lambd", "alpha", "t0", "weight_decay"]),
    ("rmsprop", &["lr", "alpha", "eps", "weight_decay", "momentum", "centered"]),
    ("rprop", &["lr", "etas", "step_sizes"]),
    ("sgd", &["lr", "momentum", "dampening", "weight_decay", "nesterov"]),
];

/// A parsed optimizer string such as `adagrad,lr=0.1,lr_decay=0.05`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSpec {
    pub method: String,
    pub params: BTreeMap<String, f64>,
}

impl OptimizerSpec {
    pub fn parse(s: &str) -> Result<Self, OptimizerParseError> {
        let (method, rest) = match s.split_once(',') {
            Some((method, rest)) => (method, Some(rest)),
            None => (s, None),
        };

        let mut params = BTreeMap::new();
        for pair in rest.into_iter().flat_map(|r| r.split(',')) {
            let parts: Vec<&str> = pair.split('=').collect();
            let [key, value] = parts.as_slice() else {
                return Err(OptimizerParseError::MalformedPair(pair.to_string()));
            };
            if !NUMBER.is_match(value) {
                return Err(OptimizerParseError::NonNumericValue {
                    key:   key.to_string(),
                    value: value.to_string(),
                });
            }
            let number = value.parse::<f64>().map_err(|_| OptimizerParseError::NonNumericValue {
                key:   key.to_string(),
                value: value.to_string(),
            })?;
            params.insert(key.to_string(), number);
        }

        let accepted = METHODS
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, accepted)| *accepted)
            .ok_or_else(|| OptimizerParseError::UnknownMethod(method.to_string()))?;

        if method == "sgd" && !params.contains_key("lr") {
            return Err(OptimizerParseError::MissingParameter {
                method: method.to_string(),
                param:  "lr".to_string(),
            });
        }

        if params.keys().any(|k| !accepted.contains(&k.as_str())) {
            return Err(OptimizerParseError::UnexpectedParameters {
                expected: accepted.iter().map(|s| s.to_string()).collect(),
                got:      params.keys().cloned().collect(),
            });
        }

        Ok(Self { method: method.to_string(), params })
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }
}

/// Optimizers that can drive training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    AdamW,
}

impl FromStr for OptimizerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adam" => Ok(OptimizerKind::Adam),
            "adamw" => Ok(OptimizerKind::AdamW),
            other => Err(ConfigError::UnknownOptimizer(other.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizerKind::Adam => "adam",
            OptimizerKind::AdamW => "adamw",
        })
    }
}

/// Resolved optimizer hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    pub kind:          OptimizerKind,
    pub learning_rate: f64,
    pub weight_decay:  f64,
    pub epsilon:       f64,
}

impl OptimizerSettings {
    /// Start from the plain name and flags, then apply the
    /// overrides of an optimizer string when one is given.
    pub fn resolve(
        optimizer_name: &str,
        optimizer:      Option<&str>,
        learning_rate:  f64,
        weight_decay:   f64,
        epsilon:        f64,
    ) -> anyhow::Result<Self> {
        let mut settings = Self {
            kind: optimizer_name.parse()?,
            learning_rate,
            weight_decay,
            epsilon,
        };

        if let Some(s) = optimizer {
            let spec = OptimizerSpec::parse(s)?;
            settings.kind          = spec.method.parse()?;
            settings.learning_rate = spec.get("lr").unwrap_or(settings.learning_rate);
            settings.weight_decay  = spec.get("weight_decay").unwrap_or(settings.weight_decay);
            settings.epsilon       = spec.get("eps").unwrap_or(settings.epsilon);
        }
        Ok(settings)
    }
}
