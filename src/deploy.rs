//! Deploy orchestration
//!
//! Strictly sequential: scan the remote tree through a scan agent, scan the
//! local tree, diff, then build, deliver and trigger a deploy agent. A diff
//! containing errors stops the run before any deploy agent exists.

use std::io::Write;

use crate::archive::{self, ArchiveBuilder};
use crate::compare::Comparator;
use crate::config::Config;
use crate::error::{ArchiveError, DeployError};
use crate::exclusion::{FileFilter, Side};
use crate::logging::*;
use crate::protocol::{scan as wire, AgentReport};
use crate::scan::LocalScanner;
use crate::transport::{AgentRunner, Transfer, Trigger};
use crate::types::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
	/// Nothing to do
	UpToDate,
	/// Dry run: actions computed, no agent built
	Planned,
	/// Deploy agent ran without a single `[FAIL]`
	Deployed,
	/// The diff contains errors; nothing was deployed
	DiffFailed,
	/// The deploy agent reported at least one `[FAIL]`
	DeployFailed,
}

impl DeployStatus {
	pub fn is_success(self) -> bool {
		matches!(self, DeployStatus::UpToDate | DeployStatus::Planned | DeployStatus::Deployed)
	}
}

#[derive(Debug, Clone)]
pub struct DeployOutcome {
	/// Absolute remote root as reported by the scan agent
	pub remote_root: String,
	pub actions: Vec<Action>,
	pub status: DeployStatus,
	/// Deploy agent output, when one ran
	pub report: Option<AgentReport>,
}

pub struct DeployRunner<'a> {
	config: &'a Config,
	transfer: &'a dyn Transfer,
	trigger: &'a dyn Trigger,
}

impl<'a> DeployRunner<'a> {
	pub fn new(config: &'a Config, transfer: &'a dyn Transfer, trigger: &'a dyn Trigger) -> Self {
		Self { config, transfer, trigger }
	}

	pub async fn run(&self, dry_run: bool) -> Result<DeployOutcome, DeployError> {
		let config = self.config;
		let local_filter = FileFilter::for_side(&config.files, Side::Local)?;
		let remote_filter = FileFilter::for_side(&config.files, Side::Remote)?;
		let runner =
			AgentRunner::new(self.transfer, self.trigger, &config.public_dir, &config.base_url);
		let agent_root = config.remote_root_relative_to_public_dir.as_str();

		info!("Scanning remote tree {}", config.remote_root);
		let response = runner
			.run(|out, secret| {
				out.write_all(archive::scan_agent(agent_root, secret, &remote_filter).as_bytes())
					.map_err(|e| ArchiveError::Io { path: "<scan agent>".into(), source: e })
			})
			.await?;
		let remote = wire::decode_report(&response)?;
		debug!("Remote tree {} has {} entries", remote.root, remote.len());

		info!("Scanning local tree {}", config.local_root);
		let local = LocalScanner::new(&config.local_root, local_filter).scan()?;

		let actions = Comparator::new(config.local_root.as_str()).compare(local, &remote);
		let outcome = |status, report| DeployOutcome {
			remote_root: remote.root.clone(),
			actions: actions.clone(),
			status,
			report,
		};

		if actions.iter().any(|a| a.kind.is_error()) {
			warn!("Diff contains errors, not deploying");
			return Ok(outcome(DeployStatus::DiffFailed, None));
		}
		if actions.is_empty() {
			return Ok(outcome(DeployStatus::UpToDate, None));
		}
		if dry_run {
			return Ok(outcome(DeployStatus::Planned, None));
		}

		let mut builder = ArchiveBuilder::new(agent_root);
		for action in &actions {
			builder.add(action.clone())?;
		}
		let archive = builder.compile()?;

		info!("Deploying {} actions", actions.len());
		let response = runner.run(|out, secret| archive.write_to(out, secret).map(|_| ())).await?;
		let report = AgentReport::new(response);
		let status =
			if report.has_failure() { DeployStatus::DeployFailed } else { DeployStatus::Deployed };
		Ok(outcome(status, Some(report)))
	}
}

// vim: ts=4
