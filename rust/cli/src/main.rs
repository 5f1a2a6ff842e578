mod report;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rtdemo_core::{
    run_workload, Demo, DemoFactory, Progress, RunMetrics, RunOptions, Snapshot, Workload,
    WorkloadFile,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rtdemo", version, about = "Runtime behaviour demos on a sampling measurement harness")]
struct Cli {
    #[arg(long, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a demo and print its report
    Run {
        /// Demo name (see list-demos); defaults to the workload file's demo
        #[arg(long)]
        demo: Option<String>,
        /// Path to workload YAML, layered over the demo's defaults
        #[arg(long)]
        workload: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
        /// Output directory base (results go into a demo-workload folder)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List available demos
    ListDemos,
    /// List available workloads in the repo
    ListWorkloads {
        #[arg(long, default_value = "workloads")]
        path: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct Overrides {
    /// Run for this long, e.g. 30s or 5m (clears --iterations)
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,
    /// Run exactly this many units of work (clears --duration)
    #[arg(long)]
    iterations: Option<u64>,
    /// Pace each worker to one call per interval, e.g. 100us
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,
    /// Concurrent workers; 0 means one per CPU
    #[arg(long)]
    workers: Option<usize>,
    /// Print a progress line this often
    #[arg(long, value_parser = humantime::parse_duration)]
    report_every: Option<Duration>,
    /// Unmeasured warm-up before the measured run
    #[arg(long, value_parser = humantime::parse_duration)]
    warmup: Option<Duration>,
    /// Demo option key=value (repeatable)
    #[arg(long, num_args=0.., value_parser = parse_key_val::<String, String>)]
    option: Vec<(String, String)>,
}

fn parse_key_val<K, V>(s: &str) -> std::result::Result<(K, V), String>
where
    K: std::str::FromStr,
    V: std::str::FromStr,
{
    match s.split_once('=') {
        Some((k, v)) => {
            let key = k.parse().map_err(|_| format!("invalid key: {k}"))?;
            let value = v.parse().map_err(|_| format!("invalid value: {v}"))?;
            Ok((key, value))
        }
        None => Err(format!("invalid KEY=VALUE: no `=` in `{s}`")),
    }
}

/// Layer a workload file over the demo defaults. Options and thresholds the
/// file leaves out keep their default values.
fn layer_file(defaults: Workload, file: Workload) -> Workload {
    let mut options = defaults.options;
    options.extend(file.options);
    let thresholds = if file.thresholds.is_empty() {
        defaults.thresholds
    } else {
        file.thresholds
    };
    Workload {
        options,
        thresholds,
        ..file
    }
}

fn apply_overrides(mut wl: Workload, o: Overrides) -> Workload {
    if let Some(d) = o.duration {
        wl.duration = Some(d);
        wl.iterations = 0;
    }
    if let Some(n) = o.iterations {
        wl.iterations = n;
        wl.duration = None;
    }
    if let Some(i) = o.interval {
        wl.interval = Some(i);
    }
    if let Some(w) = o.workers {
        wl.workers = w;
    }
    if let Some(r) = o.report_every {
        wl.report_every = Some(r);
    }
    if let Some(w) = o.warmup {
        wl.warmup = Some(w);
        wl.warmup_iterations = 0;
    }
    wl.options.extend(o.option);
    wl
}

fn resolve(
    demo: Option<String>,
    workload: Option<&Path>,
    overrides: Overrides,
) -> Result<(Box<dyn DemoFactory>, Workload)> {
    let file = workload.map(WorkloadFile::load).transpose()?;
    let name = match (&demo, &file) {
        (Some(d), _) => d.to_lowercase(),
        (None, Some(f)) => f.demo.clone(),
        (None, None) => bail!("either --demo or --workload is required"),
    };
    let factory = rtdemo_demos::find(&name).ok_or_else(|| {
        anyhow::anyhow!("unknown demo: {name} (try `rtdemo list-demos`)")
    })?;
    let wl = match file {
        Some(f) if f.demo != name => {
            bail!("workload {} is for demo {}, not {name}", f.name, f.demo)
        }
        Some(f) => layer_file(factory.default_workload(), f),
        None => factory.default_workload(),
    };
    Ok((factory, apply_overrides(wl, overrides)))
}

fn write_outputs(base: &Path, metrics: &RunMetrics, workload: &Workload) -> Result<PathBuf> {
    let s = &metrics.summary;
    let run_dir = base.join(format!("{}-{}", s.demo, s.workload));
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating {}", run_dir.display()))?;

    fs::write(run_dir.join("summary.json"), serde_json::to_string_pretty(s)?)?;
    // JSON Lines for samples
    let mut lines = String::new();
    for sample in &metrics.samples {
        lines.push_str(&serde_json::to_string(sample)?);
        lines.push('\n');
    }
    fs::write(run_dir.join("samples.jsonl"), lines)?;
    fs::write(
        run_dir.join("run.meta.json"),
        json!({
            "demo": s.demo,
            "workload": workload,
            "started_at": s.started_at,
        })
        .to_string(),
    )?;
    Ok(run_dir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::ListDemos => {
            for f in rtdemo_demos::factories() {
                println!("{:<18} {}", f.name(), f.about());
            }
            Ok(())
        }
        Commands::ListWorkloads { path } => {
            let mut found: Vec<PathBuf> = fs::read_dir(&path)
                .with_context(|| format!("reading {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")))
                .collect();
            found.sort();
            for p in found {
                println!("{}", p.display());
            }
            Ok(())
        }
        Commands::Run {
            demo,
            workload,
            overrides,
            output,
        } => {
            let (factory, wl) = resolve(demo, workload.as_deref(), overrides)?;
            info!(demo = factory.name(), workload = %wl.name, "starting run");

            let progress: Progress = Arc::new(|snap: &Snapshot, demo: &dyn Demo| {
                println!(
                    "{}",
                    report::progress_line(snap, demo.kind(), demo.unit_label(), &demo.status())
                );
            });
            let opts = RunOptions {
                progress: Some(progress),
                ..RunOptions::default()
            };
            let cancel = opts.cancel.clone();

            let rt = Runtime::new()?;
            let run_wl = wl.clone();
            let metrics = rt.block_on(async move {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted, stopping run");
                        cancel.cancel();
                    }
                });
                run_workload(factory.as_ref(), run_wl, opts).await
            })?;

            print!("{}", report::render(&metrics.summary));
            if let Some(base) = output {
                let run_dir = write_outputs(&base, &metrics, &wl)?;
                println!("Outputs written to {}", run_dir.display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_parsing() {
        let (k, v): (String, String) = parse_key_val("variant=branch-free").unwrap();
        assert_eq!((k.as_str(), v.as_str()), ("variant", "branch-free"));
        assert!(parse_key_val::<String, String>("novalue").is_err());
    }

    #[test]
    fn iterations_override_clears_duration() {
        let wl = rtdemo_demos::find("latency").unwrap().default_workload();
        let wl = apply_overrides(
            wl,
            Overrides {
                iterations: Some(100),
                option: vec![("request_objects".into(), "3".into())],
                ..Overrides::default()
            },
        );
        assert_eq!(wl.iterations, 100);
        assert!(wl.duration.is_none());
        assert_eq!(wl.options["request_objects"], "3");
        assert_eq!(wl.options["object_bytes"], "1024");
        assert!(wl.run_config().validate().is_ok());
    }

    #[test]
    fn file_layers_over_defaults() {
        let file = WorkloadFile::parse("name: quick\ndemo: mixed\nduration: 2s\noptions:\n  keys: \"50\"\n").unwrap();
        let wl = layer_file(rtdemo_demos::find("mixed").unwrap().default_workload(), file);
        assert_eq!(wl.name, "quick");
        assert_eq!(wl.duration, Some(Duration::from_secs(2)));
        assert_eq!(wl.options["keys"], "50");
        assert_eq!(wl.options["value_bytes"], "10240");
        assert_eq!(wl.thresholds().len(), 2);
    }

    #[test]
    fn demo_and_workload_must_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.yaml");
        fs::write(&path, "name: b\ndemo: branch\niterations: 10\n").unwrap();

        let (factory, wl) = resolve(None, Some(path.as_path()), Overrides::default()).unwrap();
        assert_eq!(factory.name(), "branch");
        assert_eq!(wl.iterations, 10);
        assert!(resolve(Some("latency".into()), Some(path.as_path()), Overrides::default()).is_err());
        assert!(resolve(None, None, Overrides::default()).is_err());
    }
}
