// Whitelisted Command Domain Model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Argument map as received from a caller
pub type CommandArgs = serde_json::Map<String, serde_json::Value>;

/// Expected JSON type of a declared argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ArgType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Integer => value.is_i64() || value.is_u64(),
            ArgType::Number => value.is_number(),
            ArgType::Boolean => value.is_boolean(),
        }
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::String => write!(f, "string"),
            ArgType::Integer => write!(f, "integer"),
            ArgType::Number => write!(f, "number"),
            ArgType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Definition of a permitted action (immutable after startup)
#[derive(Debug, Clone, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    pub executable: PathBuf,
    /// Fixed leading argument vector
    pub args: Vec<String>,
    pub description: String,
    pub default_timeout_secs: u64,
    pub args_schema: BTreeMap<String, ArgType>,
}

impl CommandDefinition {
    /// Check caller arguments against the schema.
    ///
    /// An empty schema accepts no arguments. Otherwise every supplied key must
    /// be declared with a matching type; declared keys are optional.
    pub fn check_args(&self, args: &CommandArgs) -> std::result::Result<(), String> {
        if self.args_schema.is_empty() {
            if args.is_empty() {
                return Ok(());
            }
            return Err("command takes no arguments".to_string());
        }

        for (key, value) in args {
            let Some(expected) = self.args_schema.get(key) else {
                return Err(format!("unexpected argument '{}'", key));
            };
            if !expected.matches(value) {
                return Err(format!("argument '{}' must be of type {}", key, expected));
            }
        }
        Ok(())
    }

    /// Build the full argument vector: fixed args, then `--key value` pairs
    /// in key order. Strings are passed raw, other values as JSON text.
    pub fn argv(&self, args: &CommandArgs) -> Vec<String> {
        let mut argv = self.args.clone();
        let ordered: BTreeMap<&String, &serde_json::Value> = args.iter().collect();
        for (key, value) in ordered {
            argv.push(format!("--{}", key));
            argv.push(match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        argv
    }
}
