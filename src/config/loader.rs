//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Inline JSON document.
pub const CONFIG_JSON_VAR: &str = "SIGNAL_RELAY_CONFIG_JSON";
/// Opt-in flag (`1`/`true`/`yes`) to read a JSON document from stdin.
pub const CONFIG_STDIN_VAR: &str = "SIGNAL_RELAY_CONFIG_STDIN";
/// Path to a JSON file.
pub const CONFIG_PATH_VAR: &str = "SIGNAL_RELAY_CONFIG_PATH";
/// Prefix of per-field overrides, e.g. `SIGNAL_RELAY__RELAY__MALFORMED_POLICY`.
pub const OVERRIDE_PREFIX: &str = "SIGNAL_RELAY__";

const CONFIG_FILE_NAME: &str = "config.json";

/// Load configuration with the following precedence (highest first):
/// 1) `SIGNAL_RELAY_CONFIG_JSON` env var containing raw JSON
/// 2) If `SIGNAL_RELAY_CONFIG_STDIN=true/1`, read JSON from stdin
/// 3) File pointed by `SIGNAL_RELAY_CONFIG_PATH` env var
/// 4) config.json in current working directory
/// 5) config.json next to the executable
/// 6) Defaults compiled into the binary
///
/// Individual fields are then overridden by `SIGNAL_RELAY__SECTION__FIELD=value`
/// variables, e.g. `SIGNAL_RELAY__PORT=9000` or
/// `SIGNAL_RELAY__RELAY__MALFORMED_POLICY=broadcast`.
///
/// Never fails: read and parse errors are printed to stderr and the affected
/// layer is skipped. Validation problems are printed too but not returned;
/// call [`validate_config`] on the result for a hard failure.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Map::new()));

    // Lowest precedence first so later layers win
    for layer in document_layers().into_iter().rev() {
        merge_values(&mut merged, layer);
    }

    apply_env_overrides(&mut merged, env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// Every JSON document source that is present, highest precedence first.
fn document_layers() -> Vec<Value> {
    let mut layers = Vec::new();

    if let Ok(json) = env::var(CONFIG_JSON_VAR) {
        layers.extend(parse_json_document(&json, CONFIG_JSON_VAR));
    }

    if env::var(CONFIG_STDIN_VAR).is_ok_and(|flag| env_var_truthy(&flag)) {
        let mut buf = String::new();
        match std::io::stdin().read_to_string(&mut buf) {
            Ok(_) => layers.extend(parse_json_document(&buf, "stdin")),
            Err(e) => eprintln!("Failed to read config from stdin: {e}"),
        }
    }

    if let Ok(path) = env::var(CONFIG_PATH_VAR) {
        layers.extend(read_file_source(Path::new(&path)));
    }

    layers.extend(read_file_source(Path::new(CONFIG_FILE_NAME)));

    if let Some(beside_exe) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
    {
        // Skip when the executable runs from the working directory
        if beside_exe != PathBuf::from(CONFIG_FILE_NAME) {
            layers.extend(read_file_source(&beside_exe));
        }
    }

    layers
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    serde_json::from_str(raw)
        .map_err(|err| eprintln!("Failed to parse config from {label}: {err}"))
        .ok()
}

fn read_file_source(path: &Path) -> Option<Value> {
    if path.as_os_str().is_empty() || !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(contents) => parse_json_document(&contents, &format!("file {}", path.display())),
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
            None
        }
    }
}

/// Deep-merge `source` into `target`; objects merge key by key, anything else
/// replaces.
fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides<I>(root: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(OVERRIDE_PREFIX) else {
            continue;
        };

        let path: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if path.is_empty() {
            continue;
        }

        set_nested_value(root, &path, parse_env_value(&raw_value));
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Scalars parse as JSON when they can (`8080`, `true`), otherwise stay
/// strings; comma-separated values become arrays.
fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') {
        return Value::Array(
            trimmed
                .split(',')
                .map(|segment| parse_scalar(segment.trim()))
                .collect(),
        );
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry(head.clone()).or_insert(Value::Null);
        set_nested_value(slot, rest, value);
    }
}
