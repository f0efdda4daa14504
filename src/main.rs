use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

use shipit::config::{Config, ConfigLoader};
use shipit::deploy::{DeployOutcome, DeployRunner, DeployStatus};
use shipit::logging::*;
use shipit::transport::ftp::FtpTransfer;
use shipit::transport::http::HttpTrigger;
use shipit::transport::local::{self, LocalHost};
use shipit::types::ActionKind;

///////////////////////
// Utility functions //
///////////////////////

fn print_outcome(outcome: &DeployOutcome, verbosity: u8) {
	for action in &outcome.actions {
		println!("{}", action);
		if let ActionKind::Error { message } = &action.kind {
			println!("  message: {}", message);
		}
	}

	if outcome.status == DeployStatus::UpToDate {
		println!("No actions required.");
	}

	if let Some(report) = &outcome.report {
		if report.has_failure() || verbosity >= 2 {
			print!("{}", report.text());
		}
	}

	if !outcome.status.is_success() {
		println!("Deploy failed.");
	}
}

async fn deploy(config: &Config, dry_run: bool) -> Result<DeployOutcome, Box<dyn Error>> {
	debug!("Deploying {} to {}{}", config.local_root, config.host, config.remote_root);

	if config.is_loopback() {
		let root = local::host_root(&config.host).ok_or("file:// host must be an absolute path")?;
		let host = LocalHost::new(root, config.public_dir.as_str(), config.base_url.as_str());
		return Ok(DeployRunner::new(config, &host, &host).run(dry_run).await?);
	}

	let transfer = FtpTransfer::new(
		config.host.as_str(),
		config.port,
		config.user.as_str(),
		config.password.as_str(),
	);
	let trigger = HttpTrigger::new()?;
	Ok(DeployRunner::new(config, &transfer, &trigger).run(dry_run).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = Command::new("shipit")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("Transactional deploys over FTP and HTTP")
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("PATH")
				.help("Config file (default: searched upwards from the working directory)"),
		)
		.arg(
			Arg::new("dry-run")
				.short('d')
				.long("dry-run")
				.action(ArgAction::SetTrue)
				.help("Compute and print the actions without deploying"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.action(ArgAction::Count)
				.help("More diagnostics; -vv also prints the agent report"),
		)
		.get_matches();

	let verbosity = matches.get_count("verbose");
	init_tracing(verbosity);

	let config = match ConfigLoader::new().load(matches.get_one::<String>("config").map(Path::new))
	{
		Ok(config) => config,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::FAILURE;
		}
	};

	match deploy(&config, matches.get_flag("dry-run")).await {
		Ok(outcome) => {
			print_outcome(&outcome, verbosity);
			if outcome.status.is_success() {
				ExitCode::SUCCESS
			} else {
				ExitCode::FAILURE
			}
		}
		Err(e) => {
			error!("{}", e);
			eprintln!("{}", e);
			println!("Deploy failed.");
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
