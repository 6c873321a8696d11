//! Reporter parameter specifications.
//!
//! A reporter advertises the fields it needs as `(name, type)` pairs in a
//! compact string grammar: a trailing `*` on the name marks the field
//! required; types are `string`, `password`, `integer[:default]`,
//! `double[:default]`, `multiline:default`, `combo:csv` (one item may carry
//! a trailing `*` to be the default), and `check:{true,false}`. Specs parse
//! into a typed form and print back to the same grammar.

use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamError {
    #[error("unknown parameter type \"{0}\"")]
    UnknownType(String),
    #[error("bad default \"{1}\" for {0} parameter")]
    BadDefault(&'static str, String),
    #[error("required field \"{0}\" is empty")]
    MissingRequired(String),
    #[error("not enough parameters: expected {expected}, got {got}")]
    NotEnough { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Password,
    Integer { default: Option<i64> },
    Double { default: Option<f64> },
    Multiline { default: String },
    Combo { items: Vec<String>, default_index: usize },
    Check { default: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub required: bool,
    pub ty: ParamType,
}

impl ParamSpec {
    pub fn parse(name: &str, type_str: &str) -> Result<Self, ParamError> {
        let (name, required) = match name.strip_suffix('*') {
            Some(stripped) => (stripped.to_string(), true),
            None => (name.to_string(), false),
        };
        let (kind, arg) = match type_str.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (type_str, None),
        };
        let ty = match kind {
            "string" => ParamType::String,
            "password" => ParamType::Password,
            "integer" => ParamType::Integer {
                default: arg
                    .map(|a| {
                        a.parse()
                            .map_err(|_| ParamError::BadDefault("integer", a.to_string()))
                    })
                    .transpose()?,
            },
            "double" => ParamType::Double {
                default: arg
                    .map(|a| {
                        a.parse()
                            .map_err(|_| ParamError::BadDefault("double", a.to_string()))
                    })
                    .transpose()?,
            },
            "multiline" => ParamType::Multiline {
                default: arg.unwrap_or("").to_string(),
            },
            "combo" => {
                let raw = arg.unwrap_or("");
                let mut items = Vec::new();
                let mut default_index = 0;
                for (i, item) in raw.split(',').filter(|s| !s.is_empty()).enumerate() {
                    match item.strip_suffix('*') {
                        Some(stripped) => {
                            default_index = i;
                            items.push(stripped.to_string());
                        }
                        None => items.push(item.to_string()),
                    }
                }
                ParamType::Combo {
                    items,
                    default_index,
                }
            }
            "check" => ParamType::Check {
                default: match arg {
                    Some("true") => true,
                    Some("false") | None => false,
                    Some(other) => {
                        return Err(ParamError::BadDefault("check", other.to_string()));
                    }
                },
            },
            other => return Err(ParamError::UnknownType(other.to_string())),
        };
        Ok(Self { name, required, ty })
    }

    /// The name as advertised, trailing `*` included for required fields.
    pub fn name_string(&self) -> String {
        if self.required {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    /// The type in the advertised grammar.
    pub fn type_string(&self) -> String {
        match &self.ty {
            ParamType::String => "string".to_string(),
            ParamType::Password => "password".to_string(),
            ParamType::Integer { default: None } => "integer".to_string(),
            ParamType::Integer { default: Some(d) } => format!("integer:{d}"),
            ParamType::Double { default: None } => "double".to_string(),
            ParamType::Double { default: Some(d) } => format!("double:{d}"),
            ParamType::Multiline { default } => format!("multiline:{default}"),
            ParamType::Combo {
                items,
                default_index,
            } => {
                let rendered: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        if i == *default_index && i != 0 {
                            format!("{item}*")
                        } else {
                            item.clone()
                        }
                    })
                    .collect();
                format!("combo:{}", rendered.join(","))
            }
            ParamType::Check { default } => format!("check:{default}"),
        }
    }
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name_string(), self.type_string())
    }
}

/// Check supplied values against the specs: enough of them, and nothing
/// required left empty.
pub fn validate(specs: &[ParamSpec], values: &[String]) -> Result<(), ParamError> {
    let required_count = specs
        .iter()
        .rposition(|s| s.required)
        .map_or(0, |i| i + 1);
    if values.len() < required_count {
        return Err(ParamError::NotEnough {
            expected: required_count,
            got: values.len(),
        });
    }
    for (spec, value) in specs.iter().zip(values) {
        if spec.required && value.is_empty() {
            return Err(ParamError::MissingRequired(spec.name.clone()));
        }
    }
    Ok(())
}
