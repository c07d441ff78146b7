//! Packaging through an external command.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;

use super::{parse_total_tokens, PackReport, PackRequest, Packager};
use crate::config::PackagerConfig;
use crate::error::{PackSplitError, Result};
use crate::unit::{
    IgnoreSection, OutputSection, PackConfigFile, SecuritySection, TokenCountSection,
};

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs the configured packaging command (e.g. `repomix`) as a child process.
#[derive(Debug, Clone)]
pub struct ProcessPackager {
    config: PackagerConfig,
}

impl ProcessPackager {
    /// Packager running `config.command`.
    #[must_use]
    pub fn new(config: PackagerConfig) -> Self {
        Self { config }
    }

    /// The tool invocation for `request`, reading its exclusions from `config_file`.
    ///
    /// Patterns travel in a configuration file rather than as a
    /// comma-separated `--ignore` value, which would tear brace globs such as
    /// `**/*.{png,jpg}` apart.
    fn command(&self, request: &PackRequest<'_>, config_file: &Path) -> Result<Command> {
        let mut parts = self.config.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| PackSplitError::PackagerUnavailable {
                command: self.config.command.clone(),
                reason: "empty command".to_string(),
            })?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .arg("--config")
            .arg(config_file)
            .arg("--output")
            .arg(request.output)
            .arg("--style")
            .arg("xml")
            .arg("--token-count-encoding")
            .arg(request.encoding);
        cmd.current_dir(request.workdir)
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // Already-exited races are fine; we only care that it is gone.
                let _ = child.kill();
                let _ = child.wait();
                return Err(PackSplitError::PackagerTimeout {
                    command: self.config.command.clone(),
                    secs: self.config.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Packager for ProcessPackager {
    fn pack(&self, request: &PackRequest<'_>) -> Result<PackReport> {
        let config_file = write_request_config(request)?;
        let mut cmd = self.command(request, config_file.path())?;
        tracing::debug!(
            cwd = %request.workdir.display(),
            command = %self.config.command,
            patterns = request.ignore.len(),
            "running packaging tool"
        );

        let mut child = cmd.spawn().map_err(|e| PackSplitError::PackagerUnavailable {
            command: self.config.command.clone(),
            reason: e.to_string(),
        })?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = self.wait_with_timeout(&mut child)?;
        let stdout = stdout
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        let stderr = stderr
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        if !status.success() {
            return Err(PackSplitError::PackagerFailed {
                status: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim(), "packaging tool stderr (non-fatal)");
        }

        Ok(PackReport {
            total_tokens: parse_total_tokens(&stdout),
        })
    }
}

/// Write the configuration the tool reads for one invocation.
///
/// The file is removed when the returned handle is dropped.
fn write_request_config(request: &PackRequest<'_>) -> Result<NamedTempFile> {
    let config = PackConfigFile {
        output: OutputSection {
            file_path: request.output.to_string_lossy().into_owned(),
            style: "xml".to_string(),
        },
        ignore: IgnoreSection {
            use_gitignore: true,
            use_default_patterns: true,
            custom_patterns: request.ignore.to_vec(),
        },
        security: SecuritySection {
            enable_security_check: true,
        },
        token_count: TokenCountSection {
            encoding: request.encoding.to_string(),
        },
    };
    let mut file = tempfile::Builder::new()
        .prefix("packsplit-request-")
        .suffix(".json")
        .tempfile()?;
    serde_json::to_writer_pretty(file.as_file_mut(), &config)?;
    Ok(file)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::rules::RuleSet;

    fn packager(command: &str, timeout: Duration) -> ProcessPackager {
        ProcessPackager::new(PackagerConfig {
            command: command.to_string(),
            timeout,
        })
    }

    fn request<'a>(dir: &'a Path, rules: &'a RuleSet, output: &'a Path) -> PackRequest<'a> {
        PackRequest {
            workdir: dir,
            ignore: rules,
            encoding: "o200k_base",
            output,
        }
    }

    #[test]
    fn test_patterns_reach_tool_intact() {
        let tmp = tempfile::tempdir().unwrap();
        let rules: RuleSet = ["**/*.{png,jpg}", "gen/**"].into_iter().collect();
        let output = tmp.path().join("out.xml");
        let request = request(tmp.path(), &rules, &output);

        let config_file = write_request_config(&request).unwrap();
        let cmd = packager("npx repomix", Duration::from_secs(5))
            .command(&request, config_file.path())
            .unwrap();

        assert_eq!(cmd.get_program(), "npx");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "repomix");
        assert!(!args.iter().any(|a| a == "--ignore"));
        let at = args.iter().position(|a| a == "--config").unwrap();
        assert_eq!(Path::new(&args[at + 1]), config_file.path());

        let text = std::fs::read_to_string(config_file.path()).unwrap();
        let written: PackConfigFile = serde_json::from_str(&text).unwrap();
        assert_eq!(
            written.ignore.custom_patterns,
            vec!["**/*.{png,jpg}", "gen/**"]
        );
        assert_eq!(Path::new(&written.output.file_path), output);
        assert_eq!(written.token_count.encoding, "o200k_base");
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let rules = RuleSet::new();
        let output = tmp.path().join("out.xml");
        let err = packager("packsplit-no-such-tool", Duration::from_secs(5))
            .pack(&request(tmp.path(), &rules, &output))
            .unwrap_err();
        assert!(matches!(err, PackSplitError::PackagerUnavailable { .. }));
    }

    #[test]
    fn test_silent_success_has_no_token_count() {
        let tmp = tempfile::tempdir().unwrap();
        let rules = RuleSet::new();
        let output = tmp.path().join("out.xml");
        let report = packager("true", Duration::from_secs(5))
            .pack(&request(tmp.path(), &rules, &output))
            .unwrap();
        assert_eq!(report.total_tokens, None);
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let rules = RuleSet::new();
        let output = tmp.path().join("out.xml");
        let err = packager("false", Duration::from_secs(5))
            .pack(&request(tmp.path(), &rules, &output))
            .unwrap_err();
        assert!(matches!(err, PackSplitError::PackagerFailed { .. }));
    }

    #[test]
    fn test_summary_is_parsed_from_stdout() {
        let tmp = tempfile::tempdir().unwrap();
        let rules = RuleSet::new();
        let output = tmp.path().join("out.xml");
        // `echo` prints its arguments, including the ones we append.
        let report = packager("echo Total Tokens: 4,321 tokens", Duration::from_secs(5))
            .pack(&request(tmp.path(), &rules, &output))
            .unwrap();
        assert_eq!(report.total_tokens, Some(4_321));
    }

    #[test]
    fn test_timeout_kills_child() {
        let tmp = tempfile::tempdir().unwrap();
        let rules = RuleSet::new();
        let output = tmp.path().join("out.xml");
        let script = tmp.path().join("slow.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 10\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let started = Instant::now();
        let err = packager(&script.to_string_lossy(), Duration::from_millis(200))
            .pack(&request(tmp.path(), &rules, &output))
            .unwrap_err();
        assert!(matches!(err, PackSplitError::PackagerTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
