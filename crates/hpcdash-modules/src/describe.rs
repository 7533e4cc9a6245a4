//! Collect family descriptions with a bounded worker pool.

use crate::spider::family_description;
use hpcdash_parsers::{CommandRunner, CommandSpec, run_collector};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Upper bound for a single `module spider <family>` lookup.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of lookups in flight.
pub const DEFAULT_WORKERS: usize = 8;

/// Configuration for description collection.
#[derive(Debug, Clone)]
pub struct DescribeOptions {
    /// Maximum concurrent lookups
    pub workers: usize,
    /// Per-family deadline
    pub timeout: Duration,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: LOOKUP_TIMEOUT,
        }
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Command that prints spider details for one family.
pub fn spider_command(family: &str) -> CommandSpec {
    CommandSpec::login_shell(format!("module spider {} 2>&1", shell_quote(family)))
}

/// Look up one family's description.
///
/// Every failure (missing tool, non-zero exit, timeout) degrades to an empty
/// description.
pub async fn describe_family<R: CommandRunner>(
    runner: &R,
    family: &str,
    timeout: Duration,
) -> String {
    match run_collector(runner, &spider_command(family), timeout).await {
        Ok(Some(text)) => family_description(family, &text),
        Ok(None) => {
            tracing::debug!(family, "module command not available");
            String::new()
        }
        Err(e) => {
            tracing::warn!(family, error = %e, "Description lookup failed");
            String::new()
        }
    }
}

/// Describe every family, running up to `options.workers` lookups at once.
///
/// Each worker hands back its own `(family, description)` pair and the pairs
/// are merged here, so ordering between families does not matter. Results
/// are keyed by the family name exactly as given.
pub async fn collect_descriptions<R, I>(
    runner: Arc<R>,
    families: I,
    options: &DescribeOptions,
) -> BTreeMap<String, String>
where
    R: CommandRunner + 'static,
    I: IntoIterator<Item = String>,
{
    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut tasks = JoinSet::new();

    for family in families {
        let runner = Arc::clone(&runner);
        let semaphore = Arc::clone(&semaphore);
        let timeout = options.timeout;
        tasks.spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await;
            let description = describe_family(runner.as_ref(), &family, timeout).await;
            (family, description)
        });
    }

    let mut descriptions = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((family, description)) => {
                descriptions.insert(family, description);
            }
            Err(e) => tracing::warn!(error = %e, "Description worker aborted"),
        }
    }

    let described = descriptions.values().filter(|d| !d.is_empty()).count();
    tracing::info!(
        families = descriptions.len(),
        described,
        "Collected module descriptions"
    );
    descriptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpcdash_parsers::testing::{Reply, ScriptedRunner};
    use tokio::time::Instant;

    const RULE: &str =
        "----------------------------------------------------------------------------";

    const GCC_SPIDER: &str = "\
----------------------------------------------------------------------------
  GCC:
----------------------------------------------------------------------------
    Description:
      The GNU Compiler Collection
      (C, C++, Fortran).

     Versions:
        GCC/11.2.0
";

    #[test]
    fn test_spider_command_quotes_family() {
        let spec = spider_command("it's");
        assert_eq!(spec.args[1], r"module spider 'it'\''s' 2>&1");
    }

    #[tokio::test]
    async fn test_describe_family_parses_output() {
        let runner = ScriptedRunner::new().on(spider_command("GCC"), Reply::stdout(GCC_SPIDER));
        let description = describe_family(&runner, "GCC", LOOKUP_TIMEOUT).await;
        assert_eq!(description, "The GNU Compiler Collection (C, C++, Fortran).");
    }

    #[tokio::test]
    async fn test_describe_family_failure_is_empty() {
        let runner = ScriptedRunner::new().on(spider_command("GCC"), Reply::exit(1, "boom"));
        assert_eq!(describe_family(&runner, "GCC", LOOKUP_TIMEOUT).await, "");
        assert_eq!(describe_family(&runner, "Missing", LOOKUP_TIMEOUT).await, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_lookup_times_out_without_failing_run() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(spider_command("GCC"), Reply::stdout(GCC_SPIDER))
                .on(spider_command("Stuck"), Reply::Hang)
                .on(
                    spider_command("R"),
                    Reply::stdout("    Description:\n      R language\n"),
                ),
        );

        let started = Instant::now();
        let descriptions = collect_descriptions(
            Arc::clone(&runner),
            ["GCC", "Stuck", "R"].map(String::from),
            &DescribeOptions::default(),
        )
        .await;

        assert!(started.elapsed() >= LOOKUP_TIMEOUT);
        assert_eq!(descriptions.len(), 3);
        assert_eq!(descriptions["Stuck"], "");
        assert_eq!(
            descriptions["GCC"],
            "The GNU Compiler Collection (C, C++, Fortran)."
        );
        assert_eq!(descriptions["R"], "R language");
    }

    #[tokio::test]
    async fn test_collect_descriptions_keys_by_family_and_bounds_workers() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(
                    spider_command("foo/1.2/extra"),
                    Reply::stdout("Description: Foo tools\n"),
                )
                .on(
                    spider_command("a/b/c"),
                    Reply::stdout("Description: Tool C\n"),
                )
                .on(
                    spider_command("a/b/d"),
                    Reply::stdout("Description: Tool D\n"),
                ),
        );

        let options = DescribeOptions {
            workers: 1,
            ..DescribeOptions::default()
        };
        let families = ["foo/1.2/extra", "a/b/c", "a/b/d", "bar"].map(String::from);
        let descriptions = collect_descriptions(Arc::clone(&runner), families, &options).await;

        assert_eq!(descriptions.len(), 4);
        assert_eq!(descriptions["foo/1.2/extra"], "Foo tools");
        assert_eq!(descriptions["a/b/c"], "Tool C");
        assert_eq!(descriptions["a/b/d"], "Tool D");
        assert_eq!(descriptions["bar"], "");
        assert!(!descriptions.contains_key("foo/1.2"));
        assert_eq!(runner.call_count(), 4);
    }

    #[tokio::test]
    async fn test_describe_family_picks_matching_block() {
        let raw = format!(
            "{RULE}\n  samtools: samtools/1.17\n{RULE}\n    Description:\n      Other things\n\n{RULE}\n  bio/tools/samtools/1.17\n{RULE}\n    Description:\n      Samtools for SAM files\n"
        );
        let runner = ScriptedRunner::new().on(
            spider_command("bio/tools/samtools"),
            Reply::stdout(&raw),
        );
        let description = describe_family(&runner, "bio/tools/samtools", LOOKUP_TIMEOUT).await;
        assert_eq!(description, "Samtools for SAM files");
    }
}
