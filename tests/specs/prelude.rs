//! Shared fixtures for worker specs

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use assert_cmd::Command;
use tempfile::TempDir;

/// Agent config with a valid identity and no helper or login
pub const BASIC_CONFIG: &str = r#"
agent_id = "agent-1"
tenant_id = "tenant-a"
handle = "poster"

[platform]
base_url = "http://127.0.0.1:9"
request_timeout = "1s"
"#;

/// Locate the worker binary, building it on first use
fn pbw_binary() -> &'static Path {
    static BIN: OnceLock<PathBuf> = OnceLock::new();
    BIN.get_or_init(|| {
        let name = format!("pbw{}", std::env::consts::EXE_SUFFIX);
        // target/<profile>/deps/specs-<hash> -> target/<profile>
        let exe = std::env::current_exe().unwrap();
        let profile_dir = exe.parent().and_then(Path::parent).unwrap();
        let bin = profile_dir.join(&name);
        if bin.exists() {
            return bin;
        }
        // A separate target dir avoids waiting on the lock held by `cargo test`
        let target = profile_dir.parent().unwrap().join("specs");
        let status = std::process::Command::new(env!("CARGO"))
            .args(["build", "-p", "pb-worker", "--bin", "pbw", "--target-dir"])
            .arg(&target)
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .status()
            .unwrap();
        assert!(status.success(), "failed to build pbw");
        target.join("debug").join(name)
    })
}

/// A temporary state directory plus agent config
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("agent.toml")
    }

    pub fn write_config(&self, content: &str) -> &Self {
        std::fs::write(self.config_path(), content).unwrap();
        self
    }

    /// Store a session cookie for a tenant, as a previous run would have
    pub fn store_session(&self, tenant_id: &str, token: &str) -> &Self {
        let dir = self.state_dir().join("credentials");
        std::fs::create_dir_all(&dir).unwrap();
        let doc = serde_json::json!([{
            "tenant_id": tenant_id,
            "key": "auth_token",
            "value": token,
            "updated_at": "2026-01-01T00:00:00Z",
        }]);
        std::fs::write(
            dir.join(format!("{}.json", tenant_id)),
            serde_json::to_vec_pretty(&doc).unwrap(),
        )
        .unwrap();
        self
    }

    /// `pbw` with the state directory pointed at this workspace
    pub fn pbw(&self) -> Cli {
        let mut cmd = Command::new(pbw_binary());
        cmd.env_clear()
            .env("PB_STATE_DIR", self.state_dir())
            .env("RUST_LOG", "info")
            .timeout(std::time::Duration::from_secs(30));
        Cli { cmd }
    }

    /// Start `pbw <config>` in the background, stdin held open
    pub fn spawn_pbw(&self) -> std::process::Child {
        std::process::Command::new(pbw_binary())
            .arg(self.config_path())
            .env_clear()
            .env("PB_STATE_DIR", self.state_dir())
            .env("RUST_LOG", "info")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap()
    }

    /// Write an executable shell script next to the config
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// `pbw <config>`
    pub fn pbw_with_config(&self) -> Cli {
        let mut cli = self.pbw();
        cli.cmd.arg(self.config_path());
        cli
    }

    /// Parsed status snapshot for an agent
    pub fn snapshot(&self, agent_id: &str) -> serde_json::Value {
        let path = self
            .state_dir()
            .join("status")
            .join(format!("{}.json", agent_id));
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("no snapshot at {}: {}", path.display(), e));
        serde_json::from_str(&content).unwrap()
    }

    pub fn log(&self, agent_id: &str) -> String {
        let path = self
            .state_dir()
            .join("agents")
            .join(agent_id)
            .join("worker.log");
        std::fs::read_to_string(path).unwrap_or_default()
    }

    pub fn lock_path(&self, agent_id: &str) -> PathBuf {
        self.state_dir()
            .join("agents")
            .join(agent_id)
            .join("worker.pid")
    }
}

/// Command under construction
pub struct Cli {
    cmd: Command,
}

impl Cli {
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn stdin(mut self, input: &str) -> Self {
        self.cmd.write_stdin(input.to_string());
        self
    }

    pub fn passes(mut self) -> Output {
        let output = self.cmd.output().unwrap();
        let out = Output::from(output);
        assert_eq!(out.code, Some(0), "expected success\n{}", out);
        out
    }

    pub fn fails(mut self) -> Output {
        let output = self.cmd.output().unwrap();
        let out = Output::from(output);
        assert_eq!(out.code, Some(1), "expected exit code 1\n{}", out);
        out
    }
}

/// Finished run
pub struct Output {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for Output {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "code: {:?}", self.code)?;
        writeln!(f, "--- stdout ---\n{}", self.stdout)?;
        write!(f, "--- stderr ---\n{}", self.stderr)
    }
}

impl Output {
    pub fn stdout_has(&self, needle: &str) -> &Self {
        assert!(
            self.stdout.contains(needle),
            "stdout missing {:?}\n{}",
            needle,
            self
        );
        self
    }

    pub fn stderr_has(&self, needle: &str) -> &Self {
        assert!(
            self.stderr.contains(needle),
            "stderr missing {:?}\n{}",
            needle,
            self
        );
        self
    }

    /// Non-empty stdout lines, in order
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.lines().filter(|l| !l.trim().is_empty()).collect()
    }
}

/// Poll until `check` holds, panicking with `what` after ten seconds
pub fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    panic!("timed out waiting for {}", what);
}

/// Wait for a child to exit, killing it after ten seconds
pub fn wait_exit(child: &mut std::process::Child) -> Option<i32> {
    let mut status = None;
    wait_for("pbw to exit", || {
        status = child.try_wait().unwrap();
        status.is_some()
    });
    status.and_then(|s| s.code())
}

pub fn process_alive(pid: i32) -> bool {
    if nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_err() {
        return false;
    }
    // Zombies count as dead; whoever inherited them reaps on its own schedule
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat
            .rsplit_once(") ")
            .is_some_and(|(_, rest)| rest.starts_with('Z')),
        Err(_) => true,
    }
}
