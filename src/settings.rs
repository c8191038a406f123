use std::collections::BTreeMap;

use serde_json::Value;

/// Configuration variables of an application
pub type ConfigSettings = BTreeMap<String, String>;

/// Settings to write to the application and whether anything differs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsDiff {
    /// All declared variables, with normalized keys and stringified values
    pub write: ConfigSettings,
    pub changed: bool,
}

/// Convert a declared setting value to the string stored by the platform
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Compare declared settings against the ones currently on the application
///
/// The returned set always holds every declared variable, writes overwrite
/// the declared keys and leave any other variable alone.
pub fn diff_settings(
    current: &ConfigSettings,
    desired: &BTreeMap<String, Value>,
    uppercase: bool,
) -> SettingsDiff {
    let mut diff = SettingsDiff::default();
    for (name, value) in desired {
        let key = if uppercase {
            name.to_uppercase()
        } else {
            name.clone()
        };
        let value = stringify(value);

        diff.changed |= current.get(&key) != Some(&value);
        diff.write.insert(key, value);
    }
    diff
}
