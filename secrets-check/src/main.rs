use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{error, info, warn};
use thing_secrets::{
    file::{self, SecretsFile},
    keypair, Endpoint, Issue,
};

/// Checks a thing's secrets file before it is baked into firmware.
#[derive(Parser)]
struct Cli {
    /// Secrets file
    #[arg(short, long, default_value = "secrets.toml")]
    file: PathBuf,

    /// Treat template placeholders as warnings (to check the template itself)
    #[arg(long)]
    allow_placeholders: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let outcome = match SecretsFile::load(&cli.file).and_then(|f| check(&f, cli.allow_placeholders))
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}: {e}", cli.file.display());
            return ExitCode::from(2);
        }
    };

    for line in &outcome.summary {
        info!("{line}");
    }
    for warning in &outcome.warnings {
        warn!("{warning}");
    }
    for issue in &outcome.issues {
        println!("{issue}");
    }

    if outcome.issues.is_empty() {
        info!("{}: OK", cli.file.display());
        ExitCode::SUCCESS
    } else {
        error!(
            "{}: {} problem(s) found",
            cli.file.display(),
            outcome.issues.len()
        );
        ExitCode::from(1)
    }
}

#[derive(Debug, Default)]
struct Outcome {
    issues: Vec<Issue>,
    warnings: Vec<String>,
    summary: Vec<String>,
}

fn check(file: &SecretsFile, allow_placeholders: bool) -> Result<Outcome, file::Error> {
    let owned = file.secrets()?;
    let secrets = owned.borrow();
    let report = secrets.validate();

    let mut outcome = Outcome {
        warnings: report.warnings().iter().map(ToString::to_string).collect(),
        ..Default::default()
    };

    for issue in report.issues() {
        if allow_placeholders && issue.problem.is_placeholder() {
            outcome.warnings.push(issue.to_string());
        } else {
            outcome.issues.push(*issue);
        }
    }

    outcome.summary.push(format!("thing name: {}", secrets.thing_name));
    if let Ok(endpoint) = Endpoint::parse(secrets.endpoint) {
        outcome.summary.push(format!(
            "endpoint: {}:{} (region {}{}, {})",
            endpoint.host,
            secrets.port,
            endpoint.region,
            if endpoint.china { ", China" } else { "" },
            if endpoint.ats { "ATS" } else { "legacy" },
        ));
    }
    if let Ok(count) = keypair::check_anchor(&file.root_ca) {
        outcome.summary.push(format!("root CA: {count} certificate(s)"));
    }
    if let Ok(kind) = keypair::check(&file.device_cert, &file.private_key) {
        outcome.summary.push(format!("device key: {kind}, matches certificate"));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use thing_secrets::{keypair::Error as KeyPairError, Field, Problem};

    use super::*;

    const ROOT_CA: &str = include_str!("../../thing-secrets/tests/data/root_ca.pem");
    const DEVICE_CRT: &str = include_str!("../../thing-secrets/tests/data/device_ec.crt");
    const DEVICE_KEY: &str = include_str!("../../thing-secrets/tests/data/device_ec.key");
    const OTHER_KEY: &str = include_str!("../../thing-secrets/tests/data/other_ec.key");
    const TEMPLATE: &str = include_str!("../../secrets.example.toml");

    fn provisioned(private_key: &str) -> SecretsFile {
        SecretsFile::from_toml(&format!(
            r#"
thing_name = "ESP32-thing"
wifi_ssid = "workshop"
wifi_psk = "correct horse battery staple"
endpoint = "a1b2c3d4e5f6g7-ats.iot.eu-west-1.amazonaws.com"
root_ca = """
{ROOT_CA}"""
device_cert = """
{DEVICE_CRT}"""
private_key = """
{private_key}"""
"#
        ))
        .unwrap()
    }

    #[test]
    fn clean_file() {
        let outcome = check(&provisioned(DEVICE_KEY), false).unwrap();

        assert!(outcome.issues.is_empty(), "{:?}", outcome.issues);
        assert!(outcome.warnings.is_empty());
        assert!(outcome
            .summary
            .contains(&"device key: ECDSA P-256, matches certificate".to_string()));
        assert!(outcome
            .summary
            .contains(&"root CA: 1 certificate(s)".to_string()));
    }

    #[test]
    fn mismatched_key() {
        let outcome = check(&provisioned(OTHER_KEY), false).unwrap();

        assert_eq!(
            outcome.issues,
            [Issue {
                field: Field::PrivateKey,
                problem: Problem::KeyPair(KeyPairError::Mismatch),
            }]
        );
    }

    #[test]
    fn template_fails() {
        let template = SecretsFile::from_toml(TEMPLATE).unwrap();
        let outcome = check(&template, false).unwrap();

        assert_eq!(outcome.issues.len(), 6);
        assert!(outcome.issues.iter().all(|i| i.problem.is_placeholder()));
    }

    #[test]
    fn template_passes_with_placeholders_allowed() {
        let template = SecretsFile::from_toml(TEMPLATE).unwrap();
        let outcome = check(&template, true).unwrap();

        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.warnings.len(), 6);
    }
}
