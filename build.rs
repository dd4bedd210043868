use std::{env, error::Error, fs, path::Path};

use thing_secrets::file::SecretsFile;

const DEFAULT_SECRETS_PATH: &str = "secrets.toml";

fn main() -> Result<(), Box<dyn Error>> {
    // Tell Cargo to rerun if the secrets change
    println!("cargo:rerun-if-env-changed=THING_SECRETS");
    let path = env::var("THING_SECRETS").unwrap_or_else(|_| DEFAULT_SECRETS_PATH.into());
    println!("cargo:rerun-if-changed={path}");

    // Read, parse and check
    let file = SecretsFile::load(&path)?;
    let owned = file.secrets()?;
    let secrets = owned.borrow();
    let report = secrets.validate();

    for warning in report.warnings() {
        println!("cargo:warning={warning}");
    }
    if !report.is_ok() {
        for issue in report.issues() {
            println!("cargo:warning={issue}");
        }
        return Err(format!(
            "{path}: {} problem(s) found, run `secrets-check --file {path}` for details",
            report.issues().len()
        )
        .into());
    }

    // Generate Rust code, PEM data as C string literals so it stays
    // NUL-terminated in flash
    let code = format!(
        r#"
        pub static SECRETS: Secrets<'static> = Secrets {{
            thing_name: {thing:?},
            wifi_ssid: {ssid:?},
            wifi_psk: {psk:?},
            endpoint: {endpoint:?},
            port: {port},
            root_ca: c{ca:?},
            device_cert: c{cert:?},
            private_key: c{key:?},
        }};
    "#,
        thing = secrets.thing_name,
        ssid = secrets.wifi_ssid,
        psk = secrets.wifi_psk,
        endpoint = secrets.endpoint,
        port = secrets.port,
        ca = file.root_ca,
        cert = file.device_cert,
        key = file.private_key,
    );

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("secrets.rs");
    fs::write(dest_path, code)?;
    Ok(())
}
