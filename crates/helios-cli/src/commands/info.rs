//! Info command implementation

use anyhow::Result;
use colored::Colorize;
use helios_transformers::settings::SettingDescriptor;
use std::path::Path;
use std::process::ExitCode;

use super::Session;

/// Run the info command
pub fn run(config: Option<&Path>, id_or_name: &str, json: bool) -> Result<ExitCode> {
    let session = Session::open(config)?;
    let t = session.find(id_or_name)?;
    let descriptors = t.settings().descriptors();

    if json {
        let mut value = super::list::summary(&t);
        value["settings"] = serde_json::Value::Array(
            descriptors
                .iter()
                .map(|d| setting_json(d, t.settings().get(d.key)))
                .collect(),
        );
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", t.name().cyan().bold());
    println!("  id:   {}", t.id());
    println!("  type: {}", t.transformer_type());

    if descriptors.is_empty() {
        println!("  {}", "no settings".dimmed());
    } else {
        println!("  {}", "settings:".bold());
        for d in &descriptors {
            let current = t
                .settings()
                .get(d.key)
                .map(|v| v.to_string())
                .unwrap_or_default();
            println!(
                "    {} = {}  {}",
                d.key,
                current,
                format!("({}, {})", d.kind, d.label).dimmed()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn setting_json(
    descriptor: &SettingDescriptor,
    current: Option<helios_transformers::SettingValue>,
) -> serde_json::Value {
    serde_json::json!({
        "key": descriptor.key,
        "label": descriptor.label,
        "kind": descriptor.kind.to_string(),
        "default": descriptor.default_value(),
        "value": current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_json() {
        let d = SettingDescriptor::integer("bytes_per_row", "Bytes per row", 16);
        let value = setting_json(&d, Some(helios_transformers::SettingValue::Integer(8)));
        assert_eq!(value["kind"], "integer");
        assert_eq!(value["default"], 16);
        assert_eq!(value["value"], 8);
    }
}
