//! Output formatting for CLI commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cli::args::{OutputFormat, SvmTextArgs};
use crate::dataset::Label;
use crate::error::Result;

/// Result structure for training.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingResult {
    pub accuracy: f64,
    pub feature_count: usize,
    pub vocabulary_size: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub classes: Vec<Label>,
    pub generation: Uuid,
    pub model_dir: String,
    pub duration_ms: u64,
}

/// One classified text.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResult {
    pub category: String,
    #[serde(skip)]
    pub text: String,
    #[serde(skip)]
    pub label: Label,
}

/// Metadata of the persisted model.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub present: bool,
    pub model_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<Label>>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &SvmTextArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output predictions, one line per text.
pub fn output_predictions(predictions: &[PredictionResult], args: &SvmTextArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            for prediction in predictions {
                println!(
                    "{} => {} ({})",
                    prediction.text, prediction.category, prediction.label
                );
            }
            Ok(())
        }
        OutputFormat::Json => predictions.iter().try_for_each(|p| output_json(p, args)),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &SvmTextArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    // Convert to JSON value for easier manipulation
    let value = serde_json::to_value(result)?;
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in &obj {
                println!("{key}: {}", format_value(val));
            }
        }
        other => println!("{}", format_value(&other)),
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &SvmTextArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}
