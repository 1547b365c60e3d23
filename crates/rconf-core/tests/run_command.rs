use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rconf_core::prelude::*;
use tempfile::TempDir;

#[derive(Default)]
struct Uploads {
    connects: AtomicUsize,
    files: Mutex<HashMap<(String, String), Vec<u8>>>,
    runs: Mutex<Vec<(String, String, bool)>>,
}

#[derive(Default)]
struct MemoryConnector {
    uploads: Arc<Uploads>,
    refuse: HashSet<String>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        _auth: Authenticator,
    ) -> Result<Box<dyn RemoteSession>, ConnectError> {
        if self.refuse.contains(descriptor.host()) {
            return Err(ConnectError::AuthRejected(descriptor.identity()));
        }
        self.uploads.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            host: descriptor.host().to_string(),
            uploads: Arc::clone(&self.uploads),
        }))
    }
}

struct MemorySession {
    host: String,
    uploads: Arc<Uploads>,
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn upload(&mut self, content: &[u8], remote_path: &str) -> anyhow::Result<()> {
        self.uploads.files.lock().unwrap().insert(
            (self.host.clone(), remote_path.to_string()),
            content.to_vec(),
        );
        Ok(())
    }

    async fn run_script(
        &mut self,
        remote_path: &str,
        elevate: bool,
    ) -> anyhow::Result<CommandOutput> {
        self.uploads.runs.lock().unwrap().push((
            self.host.clone(),
            remote_path.to_string(),
            elevate,
        ));
        Ok(CommandOutput {
            exit_status: Some(0),
            output: Vec::new(),
        })
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

struct MapFetcher {
    bodies: HashMap<String, String>,
}

#[async_trait]
impl ScriptFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone().into_bytes()),
            None => anyhow::bail!("Cannot GET file content: HTTP 404 Not Found from {}", url),
        }
    }
}

fn no_fetch() -> Arc<MapFetcher> {
    Arc::new(MapFetcher {
        bodies: HashMap::new(),
    })
}

fn script_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    std::fs::write(root.join("a.sh"), "echo a\n").unwrap();
    std::fs::write(root.join("b.sh"), "echo b\n").unwrap();
    std::fs::write(root.join("notes.txt"), "not a script\n").unwrap();
    std::fs::create_dir(root.join("nested")).unwrap();
    std::fs::write(root.join("nested/c.sh"), "echo c\n").unwrap();
    temp
}

fn config(filenames: Vec<String>, hosts: &[&str]) -> RunConfig {
    RunConfig {
        filenames,
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn run_uploads_every_script_to_every_reachable_host() {
    let tree = script_tree();
    let connector = MemoryConnector {
        refuse: HashSet::from(["down".to_string()]),
        ..MemoryConnector::default()
    };
    let uploads = Arc::clone(&connector.uploads);
    let command = RunCommand::new(Arc::new(connector), no_fetch());

    let report = command
        .execute(&config(
            vec![tree.path().to_string_lossy().into_owned()],
            &["root:pw@web1", "deploy:pw@web2:2222?sudo=false", "root:pw@down"],
        ))
        .await
        .unwrap();

    assert_eq!(report.hosts.len(), 3);
    assert_eq!(report.outcome("root@web1:22"), Some(&HostOutcome::Success));
    assert_eq!(report.outcome("deploy@web2:2222"), Some(&HostOutcome::Success));
    assert_eq!(
        report.outcome("root@down:22").map(ToString::to_string),
        Some("SSH Failed".to_string())
    );
    assert!(!report.all_succeeded());

    let files = uploads.files.lock().unwrap();
    assert_eq!(files.len(), 6);
    assert_eq!(
        files.get(&("web1".to_string(), "/tmp/c.sh".to_string())),
        Some(&b"echo c\n".to_vec())
    );
    assert!(!files.keys().any(|(_, path)| path.ends_with("notes.txt")));

    let runs = uploads.runs.lock().unwrap();
    assert!(runs.iter().filter(|r| r.0 == "web2").all(|r| !r.2));
    assert!(runs.iter().filter(|r| r.0 == "web1").all(|r| r.2));
}

#[tokio::test]
async fn non_recursive_run_skips_nested_scripts() {
    let tree = script_tree();
    let connector = MemoryConnector::default();
    let uploads = Arc::clone(&connector.uploads);
    let command = RunCommand::new(Arc::new(connector), no_fetch());

    let mut cfg = config(
        vec![tree.path().to_string_lossy().into_owned()],
        &["root:pw@web1"],
    );
    cfg.recursive = false;
    command.execute(&cfg).await.unwrap();

    let files = uploads.files.lock().unwrap();
    let mut paths: Vec<_> = files.keys().map(|(_, p)| p.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["/tmp/a.sh", "/tmp/b.sh"]);
}

#[tokio::test]
async fn remote_scripts_are_fetched_once_and_uploaded_by_base_name() {
    let url = "https://scripts.example.com/raw/bootstrap.sh";
    let fetcher = Arc::new(MapFetcher {
        bodies: HashMap::from([(url.to_string(), "echo boot\n".to_string())]),
    });
    let connector = MemoryConnector::default();
    let uploads = Arc::clone(&connector.uploads);
    let command = RunCommand::new(Arc::new(connector), fetcher);

    let mut cfg = config(vec![url.to_string()], &["root:pw@web1", "root:pw@web2"]);
    cfg.staging_dir = "/var/tmp".to_string();
    let report = command.execute(&cfg).await.unwrap();

    assert!(report.all_succeeded());
    let files = uploads.files.lock().unwrap();
    assert_eq!(
        files.get(&("web2".to_string(), "/var/tmp/bootstrap.sh".to_string())),
        Some(&b"echo boot\n".to_vec())
    );
}

#[tokio::test]
async fn bad_connection_string_aborts_before_connecting() {
    let tree = script_tree();
    let connector = MemoryConnector::default();
    let uploads = Arc::clone(&connector.uploads);
    let command = RunCommand::new(Arc::new(connector), no_fetch());

    let err = command
        .execute(&config(
            vec![tree.path().to_string_lossy().into_owned()],
            &["root:pw@web1", "@nouser"],
        ))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Config(ConfigError::Connection { index: 1, .. })
    ));
    assert_eq!(uploads.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_script_path_aborts_before_connecting() {
    let tree = script_tree();
    let connector = MemoryConnector::default();
    let uploads = Arc::clone(&connector.uploads);
    let command = RunCommand::new(Arc::new(connector), no_fetch());

    let missing = tree.path().join("gone.sh").to_string_lossy().into_owned();
    let err = command
        .execute(&config(vec![missing], &["root:pw@web1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Resolve(ResolveError::Access { .. })));
    assert_eq!(uploads.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_fetch_aborts_before_connecting() {
    let connector = MemoryConnector::default();
    let uploads = Arc::clone(&connector.uploads);
    let command = RunCommand::new(Arc::new(connector), no_fetch());

    let err = command
        .execute(&config(
            vec!["https://scripts.example.com/missing.sh".to_string()],
            &["root:pw@web1"],
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Load(LoadError::Fetch { .. })));
    assert_eq!(uploads.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_workers_is_a_config_error() {
    let tree = script_tree();
    let command = RunCommand::new(Arc::new(MemoryConnector::default()), no_fetch());

    let mut cfg = config(
        vec![tree.path().to_string_lossy().into_owned()],
        &["root:pw@web1"],
    );
    cfg.workers = 0;

    let err = command.execute(&cfg).await.unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::ZeroWorkers)));
}
