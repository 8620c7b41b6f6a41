//! Command execution.

use crate::Commands;
use bertrem_client::Client;
use colored::Colorize;
use serde_json::Value;

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &Client,
    cmd: Commands,
    options: Option<&Value>,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Call {
            module,
            function,
            args,
        } => {
            let args = parse_args(args.as_deref())?;
            let result = client
                .call(options)?
                .invoke(module.as_str(), function.as_str(), args)
                .await?;
            Ok(format_json(&result))
        }

        Commands::Cast {
            module,
            function,
            args,
        } => {
            let args = parse_args(args.as_deref())?;
            client
                .cast(options)?
                .invoke(module.as_str(), function.as_str(), args)
                .await?;
            Ok(format!(
                "{} {}:{}",
                "Cast sent".green(),
                module.cyan(),
                function.cyan()
            ))
        }

        Commands::ShowConfig => Err("show-config is handled before connecting".into()),
    }
}

/// Parses the argument list. A single non-array value becomes a one-element list.
fn parse_args(arg: Option<&str>) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let value = match arg {
        None => return Ok(Vec::new()),
        Some(arg) => parse_json_arg(arg)?,
    };
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_args() {
        assert!(parse_args(None).unwrap().is_empty());
        assert_eq!(
            parse_args(Some("[1, \"two\"]")).unwrap(),
            vec![json!(1), json!("two")]
        );
        assert_eq!(parse_args(Some("42")).unwrap(), vec![json!(42)]);
        assert!(parse_args(Some("[1,")).is_err());
    }

    #[test]
    fn test_format_json() {
        assert_eq!(format_json(&json!(null)), "null");
        assert!(format_json(&json!({"a": 1})).contains("\"a\": 1"));
    }
}
