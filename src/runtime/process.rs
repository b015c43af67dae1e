//! Job executor that runs the configured command as a child process.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{CommandsConfig, SIGNATURE_PLACEHOLDER};
use crate::core::{JobClass, JobExecutor, JobOutcome, JobSpec, SchedulerError};

/// A whitespace tokenized command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    tokens: Vec<String>,
}

impl CommandTemplate {
    /// Parse `template`, requiring exactly `placeholders` occurrences of `%s`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Config`] for an empty template or a wrong
    /// placeholder count.
    pub fn parse(template: &str, placeholders: usize) -> Result<Self, SchedulerError> {
        let tokens: Vec<String> = template.split_whitespace().map(str::to_owned).collect();
        if tokens.is_empty() {
            return Err(SchedulerError::Config("command template is empty".into()));
        }
        let found: usize = tokens
            .iter()
            .map(|t| t.matches(SIGNATURE_PLACEHOLDER).count())
            .sum();
        if found != placeholders {
            return Err(SchedulerError::Config(format!(
                "command template `{template}` has {found} placeholder(s), expected {placeholders}"
            )));
        }
        Ok(Self { tokens })
    }

    /// Arguments with the placeholder replaced by `argument`.
    ///
    /// The placeholder is substituted inside its token, so an argument
    /// containing spaces stays a single argument.
    #[must_use]
    pub fn render(&self, argument: Option<&str>) -> Vec<String> {
        self.tokens
            .iter()
            .map(|token| match argument {
                Some(arg) => token.replace(SIGNATURE_PLACEHOLDER, arg),
                None => token.clone(),
            })
            .collect()
    }
}

#[derive(Debug)]
struct Templates {
    single: CommandTemplate,
    update: CommandTemplate,
    maintenance: CommandTemplate,
}

/// Runs `executable` with the rendered class template for each job.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    executable: Arc<str>,
    templates: Arc<Templates>,
}

impl ShellExecutor {
    /// Executor for `executable` using the class templates in `commands`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Config`] when a template is invalid.
    pub fn new(executable: &str, commands: &CommandsConfig) -> Result<Self, SchedulerError> {
        if executable.trim().is_empty() {
            return Err(SchedulerError::Config("executable must not be empty".into()));
        }
        Ok(Self {
            executable: Arc::from(executable.trim()),
            templates: Arc::new(Templates {
                single: CommandTemplate::parse(&commands.single, 1)?,
                update: CommandTemplate::parse(&commands.update, 1)?,
                maintenance: CommandTemplate::parse(&commands.maintenance, 0)?,
            }),
        })
    }

    /// Template used for `class`.
    #[must_use]
    pub fn template(&self, class: JobClass) -> &CommandTemplate {
        match class {
            JobClass::Pending => &self.templates.single,
            JobClass::Update => &self.templates.update,
            JobClass::Maintenance => &self.templates.maintenance,
        }
    }

    /// Rendered argument list for `job`.
    #[must_use]
    pub fn arguments(&self, job: &JobSpec) -> Vec<String> {
        self.template(job.class).render(job.argument.as_deref())
    }
}

async fn next_line<R>(lines: &mut Option<Lines<R>>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await.unwrap_or_else(|e| {
            warn!(error = %e, "cannot read job output");
            None
        }),
        None => None,
    }
}

fn keep(line: String, output: &mut Vec<String>) {
    if !line.trim().is_empty() {
        info!("{line}");
        output.push(line);
    }
}

#[async_trait]
impl JobExecutor for ShellExecutor {
    async fn execute(&self, job: &JobSpec) -> JobOutcome {
        let args = self.arguments(job);
        debug!(executable = %self.executable, ?args, "launching job process");

        let mut command = Command::new(&*self.executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: terminal interrupts aimed at the worker do not reach jobs.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(executable = %self.executable, error = %e, "cannot execute command");
                return JobOutcome::failed(vec![e.to_string()]);
            }
        };

        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut stderr = child.stderr.take().map(|s| BufReader::new(s).lines());
        let mut output = Vec::new();
        loop {
            tokio::select! {
                line = next_line(&mut stdout), if stdout.is_some() => match line {
                    Some(line) => keep(line, &mut output),
                    None => stdout = None,
                },
                line = next_line(&mut stderr), if stderr.is_some() => match line {
                    Some(line) => keep(line, &mut output),
                    None => stderr = None,
                },
                else => break,
            }
        }

        match child.wait().await {
            Ok(status) if status.success() => JobOutcome::success(output),
            Ok(status) => {
                warn!(exit_code = ?status.code(), "job process exited with failure");
                JobOutcome {
                    successful: false,
                    exit_code: status.code(),
                    output,
                }
            }
            Err(e) => {
                error!(error = %e, "cannot wait for job process");
                JobOutcome::failed(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::MAINTENANCE_JOB_ID;
    use uuid::Uuid;

    fn commands(single: &str, update: &str, maintenance: &str) -> CommandsConfig {
        CommandsConfig {
            single: single.into(),
            update: update.into(),
            maintenance: maintenance.into(),
        }
    }

    fn job(class: JobClass, argument: Option<&str>) -> JobSpec {
        JobSpec {
            class,
            id: argument.unwrap_or(MAINTENANCE_JOB_ID).into(),
            name: "test".into(),
            argument: argument.map(Into::into),
            run_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn renders_signature_into_its_token() {
        let template = CommandTemplate::parse("artisan  query:run --sig=%s -v", 1).unwrap();
        assert_eq!(
            template.render(Some("abc 123")),
            vec!["artisan", "query:run", "--sig=abc 123", "-v"]
        );
    }

    #[test]
    fn rejects_wrong_placeholder_counts() {
        assert!(CommandTemplate::parse("run", 1).is_err());
        assert!(CommandTemplate::parse("run %s %s", 1).is_err());
        assert!(CommandTemplate::parse("maint %s", 0).is_err());
        assert!(CommandTemplate::parse("   ", 0).is_err());
        assert!(CommandTemplate::parse("maint --all", 0).is_ok());
    }

    #[test]
    fn picks_template_per_class() {
        let exec = ShellExecutor::new("php", &commands("single %s", "update %s", "maint")).unwrap();
        assert_eq!(exec.arguments(&job(JobClass::Pending, Some("s1"))), vec!["single", "s1"]);
        assert_eq!(exec.arguments(&job(JobClass::Update, Some("s2"))), vec!["update", "s2"]);
        assert_eq!(exec.arguments(&job(JobClass::Maintenance, None)), vec!["maint"]);
        assert!(ShellExecutor::new(" ", &commands("a %s", "b %s", "c")).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn collects_combined_output_and_exit_status() {
        let exec = ShellExecutor::new("sh", &commands("-c %s", "-c %s", "-c true")).unwrap();

        let outcome = exec
            .execute(&job(JobClass::Pending, Some("echo hello; echo; echo oops >&2")))
            .await;
        assert!(outcome.successful);
        assert_eq!(outcome.exit_code, Some(0));
        let mut lines = outcome.output;
        lines.sort();
        assert_eq!(lines, vec!["hello", "oops"]);

        let failed = exec.execute(&job(JobClass::Update, Some("exit 3"))).await;
        assert!(!failed.successful);
        assert_eq!(failed.exit_code, Some(3));

        let maint = exec.execute(&job(JobClass::Maintenance, None)).await;
        assert!(maint.successful);
        assert!(maint.output.is_empty());
    }

    #[tokio::test]
    async fn launch_failure_is_a_failed_outcome() {
        let exec = ShellExecutor::new(
            "/nonexistent/query-queue-worker-test-binary",
            &commands("a %s", "b %s", "c"),
        )
        .unwrap();
        let outcome = exec.execute(&job(JobClass::Pending, Some("x"))).await;
        assert!(!outcome.successful);
        assert_eq!(outcome.exit_code, None);
    }
}
