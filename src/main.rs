mod analysis;
mod config;
mod export;
mod extract;
mod plot;
mod report;
mod stats;

use clap::Parser;
use config::CompareConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Compare one CSV column before and after a process change:
/// extract it from both captures, print descriptive statistics side by side,
/// and render comparison charts for every configured metric.
#[derive(Parser, Debug)]
#[command(name = "column-compare", version, about)]
pub struct Cli {
    /// Capture taken before the change (overrides config)
    #[arg(value_name = "BEFORE")]
    before: Option<PathBuf>,

    /// Capture taken after the change (overrides config)
    #[arg(value_name = "AFTER")]
    after: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, default_value = "compare.toml")]
    config: PathBuf,

    /// Output directory for charts (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Only analyze metrics whose title contains this text (repeatable)
    #[arg(short, long = "metric", value_name = "TITLE")]
    metrics: Vec<String>,

    /// Skip chart rendering
    #[arg(long)]
    no_plots: bool,

    /// Also write the summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-file extraction details)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file and fold CLI overrides into it.
fn resolve_config(cli: &Cli) -> Result<CompareConfig, String> {
    let mut cfg = CompareConfig::load(&cli.config).map_err(|e| e.to_string())?;

    if let Some(before) = &cli.before {
        cfg.inputs.before = Some(before.clone());
    }
    if let Some(after) = &cli.after {
        cfg.inputs.after = Some(after.clone());
    }
    if let Some(dir) = &cli.output_dir {
        cfg.output.dir = dir.clone();
    }
    if cli.no_plots {
        cfg.output.plots = false;
    }
    if let Some(json) = &cli.json {
        cfg.output.summary_json = Some(json.clone());
    }

    cfg.metrics = analysis::select_metrics(&cfg.metrics, &cli.metrics);
    if cfg.metrics.is_empty() && !cli.metrics.is_empty() {
        return Err(format!(
            "no configured metric matches {}",
            cli.metrics.join(", ")
        ));
    }

    cfg.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

fn run(cli: &Cli) -> Result<bool, String> {
    let cfg = resolve_config(cli)?;
    tracing::debug!(?cfg, "resolved configuration");

    if cli.dry_run {
        let rendered = toml::to_string_pretty(&cfg)
            .map_err(|e| format!("failed to render config: {e}"))?;
        println!("# resolved from {}", cli.config.display());
        println!("{rendered}");
        println!("Dry run mode: config validated, no files read.");
        return Ok(true);
    }

    let (Some(before), Some(after)) = (cfg.inputs.before.clone(), cfg.inputs.after.clone()) else {
        return Err(
            "both BEFORE and AFTER captures are required (arguments or [inputs] in config)"
                .to_string(),
        );
    };
    for path in [&before, &after] {
        if !path.is_file() {
            return Err(format!("{} not found", path.display()));
        }
    }

    println!("Before: {}", before.display());
    println!("After:  {}", after.display());

    let outcome = analysis::run(&cfg, &before, &after).map_err(|e| e.to_string())?;

    let failed: Vec<String> = outcome.failures.iter().map(|f| f.title.clone()).collect();
    if let Some(path) = cfg.summary_json_path() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        let summary = export::SummaryReport::new(&before, &after, &outcome.summary, failed.clone());
        export::write_summary(&path, &summary).map_err(|e| e.to_string())?;
    }

    if !outcome.charts.is_empty() {
        println!();
        println!("Charts written to {}:", cfg.output.dir.display());
        for chart in &outcome.charts {
            println!("  {}", chart.display());
        }
    }

    println!();
    if failed.is_empty() {
        println!("{} analyses completed.", outcome.analyses.len());
        Ok(true)
    } else {
        println!(
            "{} analyses completed, {} failed: {}",
            outcome.analyses.len(),
            failed.len(),
            failed.join(", ")
        );
        for failure in &outcome.failures {
            eprintln!("  {}: {}", failure.title, failure.error);
        }
        Ok(false)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    tracing::debug!(?cli, "parsed CLI arguments");

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["column-compare"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_overrides_config() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("compare.toml");
        std::fs::write(
            &config,
            "[inputs]\nbefore = \"old.csv\"\nafter = \"old2.csv\"\n[output]\ndir = \"cfg-out\"\n",
        )
        .unwrap();
        let config = config.to_string_lossy().to_string();

        let c = cli(&[
            "new.csv",
            "-c",
            &config,
            "-o",
            "cli-out",
            "--no-plots",
            "-m",
            "sensor 1",
        ]);
        let cfg = resolve_config(&c).unwrap();
        assert_eq!(cfg.inputs.before, Some(PathBuf::from("new.csv")));
        assert_eq!(cfg.inputs.after, Some(PathBuf::from("old2.csv")));
        assert_eq!(cfg.output.dir, PathBuf::from("cli-out"));
        assert!(!cfg.output.plots);
        assert_eq!(cfg.metrics.len(), 1);
    }

    #[test]
    fn unknown_metric_filter_is_an_error() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("missing.toml");
        let config = config.to_string_lossy().to_string();
        let c = cli(&["-c", &config, "-m", "pressure"]);
        let err = resolve_config(&c).unwrap_err();
        assert!(err.contains("pressure"));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["column-compare", "-q", "-v"]).is_err());
    }

    #[test]
    fn missing_inputs_are_reported() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("missing.toml");
        let config = config.to_string_lossy().to_string();
        let c = cli(&["-c", &config, "--no-plots"]);
        let err = run(&c).unwrap_err();
        assert!(err.contains("BEFORE and AFTER"));

        let c = cli(&[
            dir.path().join("a.csv").to_str().unwrap(),
            dir.path().join("b.csv").to_str().unwrap(),
            "-c",
            &config,
        ]);
        let err = run(&c).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn end_to_end_writes_json_summary() {
        let dir = tempdir().unwrap();
        let mut text = String::from("% capture\n");
        for i in 0..20 {
            text.push_str(&format!("{},{}.5,{}\n", i * 30, i % 4, 95 + i % 2 * 5));
        }
        let before = dir.path().join("before.csv");
        let after = dir.path().join("after.csv");
        std::fs::write(&before, &text).unwrap();
        std::fs::write(&after, &text).unwrap();

        let config = dir.path().join("compare.toml");
        std::fs::write(
            &config,
            r#"
[[metrics]]
column = 1
min_columns = 2
title = "Level"
ylabel = "mm"

[[metrics]]
column = -1
min_columns = 3
title = "Fill"
ylabel = "%"
percentage = true
"#,
        )
        .unwrap();

        let out = dir.path().join("out");
        let c = cli(&[
            before.to_str().unwrap(),
            after.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--json",
            "summary.json",
        ]);
        assert!(run(&c).unwrap());

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(parsed["metrics"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["metrics"][1]["metric"], "Fill");
        assert_eq!(parsed["metrics"][1]["mean_diff"], 0.0);
        assert!(out.join("level.svg").exists());
        assert!(out.join("fill.svg").exists());
        assert!(out.join("summary.svg").exists());
    }
}
