//! Validate command implementation.

use commsync_protocol::{decode, find_platform, ping_request_schema, Platform, WireFormat};
use commsync_schema::{redact, validate};
use serde_json::Value;
use std::path::Path;

/// Validation result.
#[derive(Debug)]
pub struct ValidateReport {
    /// Schema issues, empty if the request is well formed.
    pub issues: Vec<String>,
    /// The input with sensitive fields masked.
    pub redacted: Value,
    /// Platform named anywhere in the input.
    pub platform: Option<Platform>,
}

impl ValidateReport {
    fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks the request stored at `path`.
pub fn check(path: &Path, format: WireFormat) -> Result<ValidateReport, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let input: Value = decode(format, &bytes)?;
    let schema = ping_request_schema();
    let issues = match validate(&schema, &input) {
        Ok(()) => Vec::new(),
        Err(err) => err.issues.iter().map(ToString::to_string).collect(),
    };
    Ok(ValidateReport {
        issues,
        redacted: redact(&schema, &input),
        platform: find_platform(&input),
    })
}

/// Runs the validate command.
pub fn run(path: &Path, format: WireFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {:?}", path);
    println!();

    let report = check(path, format)?;
    println!("{}", serde_json::to_string_pretty(&report.redacted)?);
    println!();
    match report.platform {
        Some(platform) => println!("Platform: {platform}"),
        None => println!("Platform: not reported"),
    }

    if report.is_ok() {
        println!("✓ Request is well formed");
        Ok(())
    } else {
        for issue in &report.issues {
            println!("  - {issue}");
        }
        println!("✗ Request failed validation");
        Err("Validation failed".into())
    }
}
