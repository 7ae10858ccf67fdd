use clap::{Arg, Command};
use ocsp_core::logging::{self, LoggingConfig};
use ocsp_core::ocsp::config::{OcspConfig, RevocationCheckMode};
use ocsp_core::tls::config::TlsConfig;
use ocsp_core::tls::create_tls_client_with_config;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

fn cli() -> Command {
    Command::new("ocsp_check")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Connects to a TLS server and checks its certificate's revocation status over OCSP")
        .arg(
            Arg::new("url")
                .help("URL to connect to")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("cert-store")
                .long("cert-store")
                .short('s')
                .help("Path to a PEM root certificate bundle")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("ocsp-mode")
                .long("ocsp-mode")
                .help("What to do when the OCSP check fails")
                .value_name("MODE")
                .default_value("enabled")
                .value_parser(["enabled", "advisory", "disabled"]),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .help("Deadline for each OCSP verification in milliseconds")
                .value_name("MILLIS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("hash")
                .long("hash")
                .help("Hash algorithm for the OCSP request CertID")
                .value_name("ALGORITHM")
                .default_value("SHA1")
                .value_parser(["SHA1", "SHA256"]),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write logs to this file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable verbose logging")
                .action(clap::ArgAction::Count),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    let stderr_level = match matches.get_count("verbose") {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let mut log_config = LoggingConfig::new(
        matches.get_one::<String>("log-file").map(PathBuf::from),
        true,
        false,
    );
    log_config.stderr_level = stderr_level;
    log_config.filter = Some(format!("warn,ocsp_core={stderr_level},ocsp_check={stderr_level}"));
    let log_handle = logging::init(log_config)?;

    let Some(url) = matches.get_one::<String>("url") else {
        return Err("missing url".into());
    };

    let check_mode = match matches.get_one::<String>("ocsp-mode").map(String::as_str) {
        Some("advisory") => RevocationCheckMode::Advisory,
        Some("disabled") => RevocationCheckMode::Disabled,
        _ => RevocationCheckMode::Enabled,
    };
    let hash = match matches.get_one::<String>("hash").map(String::as_str) {
        Some("SHA256") => ocsp_core::ocsp::HashAlgorithm::Sha256,
        _ => ocsp_core::ocsp::HashAlgorithm::Sha1,
    };
    let ocsp_config = OcspConfig {
        check_mode,
        verification_timeout: matches
            .get_one::<u64>("timeout-ms")
            .map(|ms| Duration::from_millis(*ms)),
        hash,
        ..OcspConfig::default()
    };
    let tls_config = TlsConfig {
        ocsp_config,
        custom_root_store_path: matches.get_one::<String>("cert-store").map(PathBuf::from),
        ..TlsConfig::default()
    };

    info!("Checking {url} with OCSP mode {check_mode:?}");
    let client = create_tls_client_with_config(tls_config)
        .map_err(|e| format!("Failed to build TLS client: {e}"))?;

    let start_time = std::time::Instant::now();
    let result = client.get(url).send().await;
    let elapsed = start_time.elapsed();

    let outcome: Result<(), Box<dyn std::error::Error>> = match result {
        Ok(response) => {
            let status = response.status();
            println!("OK: {url} accepted ({status}) in {elapsed:?}");
            if !status.is_success() {
                warn!("Server answered with non-success status: {status}");
            }
            Ok(())
        }
        Err(e) => {
            error!("Request failed after {elapsed:?}: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            println!("FAILED: {url}");
            Err(e.into())
        }
    };
    log_handle.shutdown()?;
    outcome
}
