use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cromwell_api::{
    ClientConfig, CredentialInputs, CromwellAuth, CromwellClient, CromwellResponse, MetadataOptions,
    ServiceAccountKeySource, SubmitRequest, UserConfig, WaitOptions,
};
use cromwell_types::{Dependencies, FileSource};
use serde_json::Value;
use tracing::{debug, info};

const DEFAULT_TIMEOUT_MINUTES: u64 = 120;
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;

#[derive(Debug, Parser)]
#[command(name = "cromwell-tools", version, about = "Submit and track workflows on a Cromwell server")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a WDL workflow on Cromwell.
    Submit(SubmitArgs),
    /// Wait for one or more running workflows to finish.
    Wait(WaitArgs),
    /// Get the status of one or more workflows.
    Status {
        #[command(flatten)]
        auth: AuthArgs,
        /// A Cromwell workflow UUID. Repeat to check several workflows.
        #[arg(long = "uuid", required = true)]
        uuids: Vec<String>,
    },
    /// Request Cromwell to abort a running workflow.
    Abort {
        #[command(flatten)]
        auth: AuthArgs,
        #[arg(long)]
        uuid: String,
    },
    /// Release the hold on a workflow submitted "On Hold".
    #[command(name = "release_hold", alias = "release-hold")]
    ReleaseHold {
        #[command(flatten)]
        auth: AuthArgs,
        #[arg(long)]
        uuid: String,
    },
    /// Query workflows with a JSON object of query keys.
    Query {
        #[command(flatten)]
        auth: AuthArgs,
        /// JSON file holding the query object, e.g. {"status": ["Running"], "label": {"k": "v"}}.
        #[arg(long)]
        query_file: PathBuf,
    },
    /// Fetch workflow metadata.
    Metadata {
        #[command(flatten)]
        auth: AuthArgs,
        #[arg(long)]
        uuid: String,
        #[arg(long = "include-key", conflicts_with = "exclude_keys")]
        include_keys: Vec<String>,
        #[arg(long = "exclude-key")]
        exclude_keys: Vec<String>,
        #[arg(long)]
        expand_sub_workflows: bool,
    },
    /// Check that Cromwell is running and the credentials are accepted.
    Health {
        #[command(flatten)]
        auth: AuthArgs,
    },
}

/// Credential flags. Exactly one credential shape must result after the
/// user config file fills in what the flags leave out.
#[derive(Debug, Default, Args)]
struct AuthArgs {
    /// The URL to the Cromwell server, e.g. "https://cromwell.server.org/".
    #[arg(long, env = "CROMWELL_URL")]
    url: Option<String>,
    /// Username for HTTP Basic auth.
    #[arg(long, env = "CROMWELL_USERNAME")]
    username: Option<String>,
    /// Password for HTTP Basic auth.
    #[arg(long, env = "CROMWELL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// JSON file with url, username and password fields.
    #[arg(long, env = "CROMWELL_SECRETS_FILE")]
    secrets_file: Option<PathBuf>,
    /// Service account JSON key used to mint OAuth tokens.
    #[arg(long, alias = "caas-key", env = "CROMWELL_SERVICE_ACCOUNT_KEY")]
    service_account_key: Option<PathBuf>,
}

impl AuthArgs {
    /// Merge flags with the config file. Credential files from the config
    /// are only used when no credential flag was given.
    fn credential_inputs(self, config: &UserConfig) -> CredentialInputs {
        let explicit = self.username.is_some()
            || self.password.is_some()
            || self.secrets_file.is_some()
            || self.service_account_key.is_some();
        let (secrets_file, service_account_key) = if explicit {
            (self.secrets_file, self.service_account_key)
        } else {
            (config.secrets_file.clone(), config.service_account_key.clone())
        };

        CredentialInputs {
            username: self.username,
            password: self.password,
            url: self.url.or_else(|| config.url.clone()),
            secrets_file,
            service_account_key: service_account_key.map(ServiceAccountKeySource::from),
        }
    }
}

#[derive(Debug, Args)]
struct SubmitArgs {
    #[command(flatten)]
    auth: AuthArgs,
    /// Workflow source, as a local path or an http(s) URL.
    #[arg(long)]
    wdl_file: String,
    /// Inputs JSON. Repeat to send workflowInputs_2, workflowInputs_3, ...
    #[arg(long = "inputs-file")]
    inputs_files: Vec<String>,
    /// A dependency zip, or WDL files to bundle into one. Repeatable.
    #[arg(long = "deps-file", alias = "zip-file")]
    deps_files: Vec<String>,
    /// Workflow options JSON.
    #[arg(long)]
    options_file: Option<String>,
    /// JSON object of workflow labels.
    #[arg(long = "label-file", alias = "label")]
    label_file: Option<String>,
    /// Collection the workflow should belong to.
    #[arg(long)]
    collection_name: Option<String>,
    /// Submit in the "On Hold" state.
    #[arg(long)]
    on_hold: bool,
    /// Check labels against Cromwell's legacy label rules before sending.
    #[arg(long)]
    validate_labels: bool,
    /// Execution root for the JES backend. Only used with a service account key.
    #[arg(long)]
    execution_bucket: Option<String>,
}

impl SubmitArgs {
    fn request(&self) -> SubmitRequest {
        let mut request = SubmitRequest::new(self.wdl_file.as_str())
            .with_inputs(self.inputs_files.iter().map(String::as_str))
            .on_hold(self.on_hold)
            .validate_labels(self.validate_labels);

        if !self.deps_files.is_empty() {
            let sources: Vec<FileSource> = self.deps_files.iter().map(|path| FileSource::from(path.as_str())).collect();
            request = request.with_dependencies(Dependencies::List(sources));
        }
        if let Some(options) = &self.options_file {
            request = request.with_options(options.as_str());
        }
        if let Some(labels) = &self.label_file {
            request = request.with_labels(labels.as_str());
        }
        if let Some(collection_name) = &self.collection_name {
            request = request.with_collection_name(collection_name.as_str());
        }
        if let Some(bucket) = &self.execution_bucket {
            request = request.with_execution_bucket(bucket.as_str());
        }
        request
    }
}

#[derive(Debug, Args)]
struct WaitArgs {
    #[command(flatten)]
    auth: AuthArgs,
    #[arg(value_name = "WORKFLOW_ID", required = true)]
    workflow_ids: Vec<String>,
    /// Minutes to wait before giving up. Defaults to 120.
    #[arg(long)]
    timeout_minutes: Option<u64>,
    /// Seconds between status polls. Defaults to 30.
    #[arg(long)]
    poll_interval_seconds: Option<u64>,
    /// Do not log each workflow's status every round.
    #[arg(long, short)]
    quiet: bool,
}

impl WaitArgs {
    fn options(&self, config: &UserConfig) -> WaitOptions {
        let timeout_minutes = self
            .timeout_minutes
            .or(config.timeout_minutes)
            .unwrap_or(DEFAULT_TIMEOUT_MINUTES);
        let poll_interval_seconds = self
            .poll_interval_seconds
            .or(config.poll_interval_seconds)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS);
        WaitOptions {
            verbose: !self.quiet,
            ..WaitOptions::from_minutes_and_seconds(timeout_minutes, poll_interval_seconds)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = UserConfig::load();
    run(cli.command, &config)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Command, config: &UserConfig) -> Result<()> {
    match command {
        Command::Submit(args) => {
            let request = args.request();
            let client = connect(args.auth, config)?;
            let response = client.submit(&request).context("workflow submission failed")?;
            print_response(response)
        }
        Command::Wait(args) => {
            let options = args.options(config);
            let client = connect(args.auth, config)?;
            client.wait(args.workflow_ids.as_slice(), &options)?;
            Ok(())
        }
        Command::Status { auth, uuids } => {
            let client = connect(auth, config)?;
            for uuid in &uuids {
                let response = client.status(uuid)?;
                print_response(response).with_context(|| format!("status lookup for {uuid} failed"))?;
            }
            Ok(())
        }
        Command::Abort { auth, uuid } => {
            let client = connect(auth, config)?;
            print_response(client.abort(&uuid)?).with_context(|| format!("abort of {uuid} failed"))
        }
        Command::ReleaseHold { auth, uuid } => {
            let client = connect(auth, config)?;
            print_response(client.release_hold(&uuid)?).with_context(|| format!("release hold of {uuid} failed"))
        }
        Command::Query { auth, query_file } => {
            let query = read_query(&query_file)?;
            let client = connect(auth, config)?;
            print_response(client.query(&query)?).context("workflow query failed")
        }
        Command::Metadata {
            auth,
            uuid,
            include_keys,
            exclude_keys,
            expand_sub_workflows,
        } => {
            let options = MetadataOptions {
                include_keys,
                exclude_keys,
                expand_sub_workflows,
            };
            let client = connect(auth, config)?;
            print_response(client.metadata(&uuid, &options)?).with_context(|| format!("metadata for {uuid} failed"))
        }
        Command::Health { auth } => {
            let client = connect(auth, config)?;
            print_response(client.health()?).context("health check failed")
        }
    }
}

fn connect(auth: AuthArgs, config: &UserConfig) -> Result<CromwellClient> {
    let auth = CromwellAuth::harmonize(auth.credential_inputs(config)).context("could not resolve Cromwell credentials")?;
    debug!(url = auth.url(), shape = %auth.shape(), "connecting to Cromwell");
    let client = CromwellClient::new(auth, config.apply_to(ClientConfig::default()))?;
    Ok(client)
}

fn read_query(path: &Path) -> Result<serde_json::Map<String, Value>> {
    let data = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match serde_json::from_str::<Value>(&data).with_context(|| format!("{} is not valid JSON", path.display()))? {
        Value::Object(query) => Ok(query),
        _ => anyhow::bail!("{} must contain a JSON object", path.display()),
    }
}

/// Print the body, pretty when it is JSON. Non-2xx answers become errors carrying the body.
fn print_response(response: CromwellResponse) -> Result<()> {
    let response = response.error_for_status()?;
    info!(status = response.status, "Cromwell answered");
    match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.body),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cromwell_types::manifest::{COLLECTION_NAME, WORKFLOW_DEPENDENCIES, WORKFLOW_ON_HOLD};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cromwell-tools").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn status_accepts_several_uuids() {
        let cli = parse(&["status", "--url", "https://cromwell.example.org", "--uuid", "a", "--uuid", "b"]);
        let Command::Status { uuids, auth } = cli.command else {
            panic!("expected status");
        };
        assert_eq!(uuids, vec!["a", "b"]);
        assert_eq!(auth.url.as_deref(), Some("https://cromwell.example.org"));
    }

    #[test]
    fn release_hold_keeps_its_underscore_name() {
        let cli = parse(&["release_hold", "--uuid", "abc"]);
        assert!(matches!(cli.command, Command::ReleaseHold { ref uuid, .. } if uuid == "abc"));
        let cli = parse(&["release-hold", "--uuid", "abc"]);
        assert!(matches!(cli.command, Command::ReleaseHold { .. }));
    }

    #[test]
    fn metadata_rejects_include_and_exclude_together() {
        let result = Cli::try_parse_from([
            "cromwell-tools",
            "metadata",
            "--uuid",
            "abc",
            "--include-key",
            "status",
            "--exclude-key",
            "calls",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn wait_flags_override_the_config_file() {
        let cli = parse(&["wait", "wf-1", "wf-2", "--poll-interval-seconds", "5", "--quiet"]);
        let Command::Wait(args) = cli.command else {
            panic!("expected wait");
        };
        assert_eq!(args.workflow_ids, vec!["wf-1", "wf-2"]);

        let config = UserConfig {
            timeout_minutes: Some(10),
            poll_interval_seconds: Some(60),
            ..UserConfig::default()
        };
        let options = args.options(&config);
        assert_eq!(options.timeout, std::time::Duration::from_secs(600));
        assert_eq!(options.poll_interval, std::time::Duration::from_secs(5));
        assert!(!options.verbose);
    }

    #[test]
    fn config_credentials_fill_in_only_without_credential_flags() {
        let config = UserConfig {
            url: Some("https://from-config.example.org".into()),
            secrets_file: Some(PathBuf::from("/etc/cromwell/secrets.json")),
            ..UserConfig::default()
        };

        let inputs = AuthArgs::default().credential_inputs(&config);
        assert_eq!(inputs.url.as_deref(), Some("https://from-config.example.org"));
        assert_eq!(inputs.secrets_file.as_deref(), Some(Path::new("/etc/cromwell/secrets.json")));

        let flags = AuthArgs {
            username: Some("user".into()),
            password: Some("pass".into()),
            ..AuthArgs::default()
        };
        let inputs = flags.credential_inputs(&config);
        assert!(inputs.secrets_file.is_none());
        assert_eq!(inputs.url.as_deref(), Some("https://from-config.example.org"));
        assert_eq!(inputs.detected_shapes().len(), 1);
    }

    #[test]
    fn submit_flags_build_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path.to_str().unwrap().to_string()
        };
        let wdl = write("main.wdl", "workflow main {}");
        let inputs = write("inputs.json", "{}");
        let tasks = write("tasks.wdl", "task t {}");

        let cli = parse(&[
            "submit",
            "--wdl-file",
            &wdl,
            "--inputs-file",
            &inputs,
            "--deps-file",
            &tasks,
            "--collection-name",
            "team",
            "--on-hold",
        ]);
        let Command::Submit(args) = cli.command else {
            panic!("expected submit");
        };

        let manifest = cromwell_api::prepare_workflow_manifest(&args.request()).unwrap();
        let entries = cromwell_util::extract_zip(manifest.file(WORKFLOW_DEPENDENCIES).unwrap()).unwrap();
        assert!(entries.contains_key("tasks.wdl"));
        assert_eq!(manifest.text(COLLECTION_NAME), Some("team"));
        assert_eq!(manifest.text(WORKFLOW_ON_HOLD), Some("true"));
    }

    #[test]
    fn query_file_must_hold_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.json");
        fs::write(&path, r#"[{"status": "Running"}]"#).unwrap();
        assert!(read_query(&path).is_err());

        fs::write(&path, r#"{"status": "Running"}"#).unwrap();
        assert_eq!(read_query(&path).unwrap()["status"], "Running");
    }
}
