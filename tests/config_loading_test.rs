//! Integration tests for config loading
//! A config file found by walking up from the working directory drives a
//! whole deploy against a file:// host.

use std::fs;
use std::iter;
use tempfile::TempDir;

use shipit::{ConfigError, ConfigLoader, DeployRunner, DeployStatus};
use shipit::transport::LocalHost;

fn no_env() -> iter::Empty<(String, String)> {
	iter::empty()
}

#[tokio::test]
async fn test_config_file_drives_deploy() {
	let dir = TempDir::new().unwrap();
	let project = fs::canonicalize(dir.path()).unwrap().join("project");
	let host = fs::canonicalize(dir.path()).unwrap().join("host");
	fs::create_dir_all(project.join(".git")).unwrap();
	fs::create_dir_all(project.join("dist/css")).unwrap();
	fs::create_dir_all(project.join("src")).unwrap();
	fs::create_dir_all(host.join("site/public")).unwrap();
	fs::write(project.join("dist/index.html"), "<html></html>").unwrap();
	fs::write(project.join("dist/css/site.css"), "body {}").unwrap();
	fs::write(project.join("dist/build.log"), "noise").unwrap();
	fs::write(
		project.join("deploy.toml"),
		format!(
			"host = \"file://{}\"\n\
			 localRoot = \"dist\"\n\
			 remoteRoot = \"site\"\n\
			 publicDir = \"public\"\n\
			 baseUrl = \"http://site.test/\"\n\
			 files = [\"!*.log\", \"remote:!/public\"]\n",
			host.display()
		),
	)
	.unwrap();

	let config = ConfigLoader::with_env(project.join("src").to_string_lossy(), no_env())
		.load(None)
		.unwrap();
	assert!(config.is_loopback());
	assert_eq!(config.local_root, project.join("dist").display().to_string());
	assert_eq!(config.remote_root, "/site");
	assert_eq!(config.public_dir, "/site/public");
	assert_eq!(config.remote_root_relative_to_public_dir, "..");
	assert_eq!(config.base_url, "http://site.test");

	let local = LocalHost::new(&host, config.public_dir.as_str(), config.base_url.as_str());
	let outcome = DeployRunner::new(&config, &local, &local).run(false).await.unwrap();
	assert_eq!(outcome.status, DeployStatus::Deployed, "{:?}", outcome.report);
	assert_eq!(fs::read_to_string(host.join("site/css/site.css")).unwrap(), "body {}");
	assert_eq!(fs::read_to_string(host.join("site/index.html")).unwrap(), "<html></html>");
	assert!(!host.join("site/build.log").exists());
	assert_eq!(fs::read_dir(host.join("site/public")).unwrap().count(), 0);

	let outcome = DeployRunner::new(&config, &local, &local).run(false).await.unwrap();
	assert_eq!(outcome.status, DeployStatus::UpToDate);
}

#[test]
fn test_search_stops_at_repository_root() {
	let dir = TempDir::new().unwrap();
	let repo = dir.path().join("repo");
	fs::create_dir_all(repo.join(".git")).unwrap();
	// Above the repository root, never picked up
	fs::write(dir.path().join("deploy.toml"), "host = \"outside\"\n").unwrap();

	let loader = ConfigLoader::with_env(repo.to_string_lossy(), no_env());
	assert_eq!(loader.find_file(), None);
	let err = loader.load(None).unwrap_err();
	assert!(matches!(err, ConfigError::Missing { key: "host" }), "{}", err);
}

#[test]
fn test_loopback_needs_no_credentials_but_ftp_does() {
	let dir = TempDir::new().unwrap();
	fs::create_dir(dir.path().join(".git")).unwrap();
	let env = |host: &str| {
		vec![
			("DEPLOY_HOST".to_string(), host.to_string()),
			("DEPLOY_LOCAL_ROOT".to_string(), "out".to_string()),
			("DEPLOY_BASE_URL".to_string(), "http://x".to_string()),
		]
	};

	let config = ConfigLoader::with_env(dir.path().to_string_lossy(), env("file:///srv/fake"))
		.load(None)
		.unwrap();
	assert_eq!(config.user, "");

	let err = ConfigLoader::with_env(dir.path().to_string_lossy(), env("ftp.example.com"))
		.load(None)
		.unwrap_err();
	assert!(matches!(err, ConfigError::Missing { key: "user" }));
}

// vim: ts=4
