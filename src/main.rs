use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cochange_core::{CochangeConfig, OutputFormat};
use cochange_eval::curve::PrecisionRecallCurve;
use cochange_eval::evaluate::{evaluate, read_candidate_rules, EvaluationReport};
use cochange_eval::groundtruth::GroundTruth;
use cochange_fpm::bands::{aggregate, BandReport, BandSummary, BandThresholds};
use cochange_fpm::miner::{mine_with, MinerOptions};
use cochange_fpm::partition::{partition_by_size, write_size_groups};
use cochange_history::classify::BugFixClassifier;
use cochange_history::mining::{mine_history, MiningOptions};
use cochange_history::stats::{build_file_stats, read_file_stats, write_file_stats};
use cochange_history::transactions::{build_transactions, read_transactions, write_transactions};

#[derive(Parser)]
#[command(
    name = "cochange",
    version,
    about = "Mine files that change together in git history",
    long_about = "Cochange mines frequent co-change patterns from a repository's commit history.\n\n\
                   Extract a transaction log and per-file change statistics from git, mine the\n\
                   sets of files that change together, compare change volume across frequency\n\
                   bands, and score mined rules against a hand-curated ground truth.\n\n\
                   Examples:\n  \
                     cochange extract --repo ../project     Build the transaction log\n  \
                     cochange mine --min-support 0.006      Mine and band co-change sets\n  \
                     cochange evaluate --rules sup0.006-set-3.txt  Score rules of size 3\n  \
                     cochange init                          Create a .cochange.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .cochange.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown tables"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the transaction log and file statistics from git history
    #[command(long_about = "Build the transaction log and file statistics from git history.\n\n\
        Walks the branch oldest first. Each commit becomes one transaction listing the\n\
        files it touched; per-file line counts, authors, commits, and bug-fix commits\n\
        are accumulated into the statistics table.\n\n\
        Examples:\n  cochange extract --repo .\n  cochange extract --repo ../joda-time --branch main --stats joda-stats.csv")]
    Extract {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Branch to walk (default: HEAD)
        #[arg(long)]
        branch: Option<String>,

        /// Where to write the transaction log
        #[arg(long)]
        transactions: Option<PathBuf>,

        /// Where to write the file statistics table
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Skip commits touching more files than this
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Mine frequent co-change sets, band them, and split them by size
    #[command(long_about = "Mine frequent co-change sets, band them, and split them by size.\n\n\
        Prints per-band averages of the member files' change statistics, writes one CSV\n\
        per band and one itemset file per set size into the output directory.\n\n\
        Examples:\n  cochange mine\n  cochange mine --min-support 0.004 --low-threshold 10 --high-threshold 30")]
    Mine {
        /// Transaction log to mine
        #[arg(long)]
        transactions: Option<PathBuf>,

        /// File statistics table
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Minimum support as a fraction of all transactions
        #[arg(long)]
        min_support: Option<f64>,

        /// Number of parallel partitions
        #[arg(long)]
        partitions: Option<usize>,

        /// Frequency at which a set stops being infrequent
        #[arg(long)]
        low_threshold: Option<u64>,

        /// Frequency at which a set becomes very frequent
        #[arg(long)]
        high_threshold: Option<u64>,

        /// Directory for band tables and size files
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Score mined rules against ground truth
    #[command(long_about = "Score mined rules against ground truth.\n\n\
        Each line of the rules file is read as antecedent followed by consequent. Every\n\
        subset of the consequent is compared with the ground-truth rules for the same\n\
        antecedent and the most precise match is kept. Rules whose antecedent has no\n\
        ground truth are reported as unscored.\n\n\
        Examples:\n  cochange evaluate --rules sup0.006-set-6.txt\n  cochange evaluate --rules sup0.006-set-3.txt --curve pr.csv --strict")]
    Evaluate {
        /// Size group file with one rule per line
        #[arg(long)]
        rules: PathBuf,

        /// Ground-truth rule file
        #[arg(long)]
        ground_truth: Option<PathBuf>,

        /// Where to write the precision/recall curve
        #[arg(long)]
        curve: Option<PathBuf>,

        /// Fail if any rule cannot be scored
        #[arg(long)]
        strict: bool,
    },
    /// Create a default .cochange.toml in the current directory
    Init,
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

const CONFIG_FILE: &str = ".cochange.toml";

const DEFAULT_CONFIG: &str = r#"# Cochange Configuration

[history]
# branch = "master"
# max_files_per_commit = 50
# bug_fix_keywords = ["FIX", "BUG", "CHANGE", "UPDATE", "REMOVE"]

[mining]
# min_support = 0.005
# num_partitions = 5

[bands]
# low_threshold = 14
# high_threshold = 35

[paths]
# transactions = "commit-transactions.txt"
# file_stats = "file-stats.csv"
# ground_truth = "ground-truth.txt"
# output_dir = "."
"#;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<CochangeConfig> {
    let config = match path {
        Some(path) => CochangeConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                CochangeConfig::from_file(default_path)?
            } else {
                CochangeConfig::default()
            }
        }
    };
    Ok(config)
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mcochange\x1b[0m v{version}: files that change together\n");
        println!("Quick start:");
        println!("  \x1b[36mcochange init\x1b[0m                 Create a .cochange.toml config file");
        println!("  \x1b[36mcochange extract --repo .\x1b[0m     Build the transaction log from git");
        println!("  \x1b[36mcochange mine\x1b[0m                 Mine and band co-change sets\n");

        println!("All commands:");
        println!("  \x1b[32mextract\x1b[0m   Transaction log and file statistics from git history");
        println!("  \x1b[32mmine\x1b[0m      Frequent co-change sets, frequency bands, size files");
        println!("  \x1b[32mevaluate\x1b[0m  Precision and recall of mined rules against ground truth");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("cochange v{version}: files that change together\n");
        println!("Quick start:");
        println!("  cochange init                 Create a .cochange.toml config file");
        println!("  cochange extract --repo .     Build the transaction log from git");
        println!("  cochange mine                 Mine and band co-change sets\n");

        println!("All commands:");
        println!("  extract   Transaction log and file statistics from git history");
        println!("  mine      Frequent co-change sets, frequency bands, size files");
        println!("  evaluate  Precision and recall of mined rules against ground truth");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'cochange <command> --help' for details.");
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .into_diagnostic()
        .wrap_err(format!("creating {}", dir.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractSummary {
    commits: usize,
    transactions: usize,
    files: usize,
    bug_fix_commits: usize,
    transactions_path: PathBuf,
    stats_path: PathBuf,
}

fn run_extract(
    config: &CochangeConfig,
    repo: &Path,
    transactions_path: &Path,
    stats_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let options = MiningOptions {
        branch: config.history.branch.clone(),
        max_files_per_commit: config.history.max_files_per_commit,
    };

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
            pb.set_style(style);
        }
        pb.set_message(format!("Walking history of {}...", repo.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let commits = mine_history(repo, &options).inspect_err(|_e| {
        if let Some(pb) = &spinner {
            pb.finish_with_message("Failed");
        }
    })?;

    if let Some(pb) = spinner {
        pb.finish_with_message(format!("{} commits", commits.len()));
    }

    let classifier = BugFixClassifier::new(&config.history.bug_fix_keywords);
    let bug_fix_commits = commits.iter().filter(|c| classifier.classify(c)).count();
    let transactions = build_transactions(&commits);
    let stats = build_file_stats(&commits, &classifier);

    ensure_parent(transactions_path)?;
    ensure_parent(stats_path)?;
    write_transactions(transactions_path, &transactions)?;
    write_file_stats(stats_path, &stats)?;
    info!(commits = commits.len(), files = stats.len(), "history extracted");

    let summary = ExtractSummary {
        commits: commits.len(),
        transactions: transactions.len(),
        files: stats.len(),
        bug_fix_commits,
        transactions_path: transactions_path.to_path_buf(),
        stats_path: stats_path.to_path_buf(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("## History extraction\n");
            println!("| | |");
            println!("|---|---|");
            println!("| Commits | {} |", summary.commits);
            println!("| Bug-fix commits | {} |", summary.bug_fix_commits);
            println!("| Files | {} |", summary.files);
            println!("| Transaction log | `{}` |", summary.transactions_path.display());
            println!("| File statistics | `{}` |", summary.stats_path.display());
        }
        OutputFormat::Text => {
            println!(
                "Extracted {} commits ({} bug-fix) touching {} files",
                summary.commits, summary.bug_fix_commits, summary.files
            );
            println!("  transactions: {}", summary.transactions_path.display());
            println!("  statistics:   {}", summary.stats_path.display());
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SizeGroupSummary {
    size: usize,
    itemsets: usize,
    path: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MineSummary {
    transactions: usize,
    min_support: f64,
    min_count: u64,
    itemsets: usize,
    skipped_singletons: usize,
    bands: Vec<BandSummary>,
    band_files: Vec<PathBuf>,
    size_groups: Vec<SizeGroupSummary>,
}

fn run_mine(
    config: &CochangeConfig,
    transactions_path: &Path,
    stats_path: &Path,
    out_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let options = MinerOptions::try_from(&config.mining)?;
    let thresholds = BandThresholds::try_from(&config.bands)?;

    // Both inputs are read before anything is written.
    let transactions = read_transactions(transactions_path)?;
    let stats = read_file_stats(stats_path)?;

    let itemsets = mine_with(&transactions, &options);
    info!(
        transactions = transactions.len(),
        itemsets = itemsets.len(),
        "mining finished"
    );
    let report: BandReport = aggregate(&itemsets, &stats, &thresholds);
    let groups = partition_by_size(&itemsets);

    ensure_dir(out_dir)?;
    let band_files = report.write_csvs(out_dir)?;
    let written = write_size_groups(out_dir, options.min_support(), &groups)?;

    let summary = MineSummary {
        transactions: transactions.len(),
        min_support: options.min_support(),
        min_count: options.min_count(transactions.len()),
        itemsets: itemsets.len(),
        skipped_singletons: report.skipped_singletons,
        bands: report.bands().map(|b| b.summary()).collect(),
        band_files,
        size_groups: written
            .into_iter()
            .map(|(size, path)| SizeGroupSummary {
                size,
                itemsets: groups.get(&size).map_or(0, Vec::len),
                path,
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("## Co-change mining\n");
            println!(
                "{} itemsets from {} transactions (min support {}, min count {})\n",
                summary.itemsets, summary.transactions, summary.min_support, summary.min_count
            );
            for band in &summary.bands {
                println!("### {} ({} itemsets)\n", band.band.title(), band.itemsets);
                println!("| Statistic | Average |");
                println!("|---|---:|");
                for (label, value) in band.rows() {
                    println!("| {label} | {value:.2} |");
                }
                println!();
            }
            if !summary.size_groups.is_empty() {
                println!("| Size | Itemsets | File |");
                println!("|---:|---:|---|");
                for g in &summary.size_groups {
                    println!("| {} | {} | `{}` |", g.size, g.itemsets, g.path.display());
                }
            }
        }
        OutputFormat::Text => {
            println!(
                "Mined {} itemsets from {} transactions (min support {}, min count {})\n",
                summary.itemsets, summary.transactions, summary.min_support, summary.min_count
            );
            for band in &summary.bands {
                println!("{band}");
            }
            for g in &summary.size_groups {
                println!("size {:>2}: {:>6} itemsets  {}", g.size, g.itemsets, g.path.display());
            }
            for path in &summary.band_files {
                println!("wrote {}", path.display());
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateSummary<'a> {
    #[serde(flatten)]
    report: &'a EvaluationReport,
    mean_precision: Option<f64>,
    mean_recall: Option<f64>,
    curve: &'a Path,
}

fn run_evaluate(
    rules_path: &Path,
    ground_truth_path: &Path,
    curve_path: &Path,
    strict: bool,
    format: OutputFormat,
) -> Result<()> {
    let rules = read_candidate_rules(rules_path)?;
    let ground_truth = GroundTruth::from_file(ground_truth_path)?;
    debug!(
        rules = rules.len(),
        ground_truth = ground_truth.len(),
        "evaluating"
    );

    let report = evaluate(&rules, &ground_truth);
    if strict && !report.unscored.is_empty() {
        return Err(miette::miette!(
            help = "add ground truth for these antecedents or run without --strict",
            "{} of {} rules have no score: {}",
            report.unscored.len(),
            report.rules.len(),
            report.unscored.join(", ")
        ));
    }

    let title = format!(
        "Precision/recall for {}",
        rules_path
            .file_name()
            .map_or_else(|| rules_path.display().to_string(), |n| n.to_string_lossy().into_owned())
    );
    let curve = PrecisionRecallCurve::from_report(&report, title);
    ensure_parent(curve_path)?;
    curve.write_csv(curve_path)?;

    let summary = EvaluateSummary {
        report: &report,
        mean_precision: report.mean_precision(),
        mean_recall: report.mean_recall(),
        curve: curve_path,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("## {}\n", curve.title);
            println!("| Antecedent | Consequent | Precision | Recall |");
            println!("|---|---|---:|---:|");
            for r in &report.rules {
                let consequent = r.rule.consequent.join(" ");
                match &r.best {
                    Some(best) => println!(
                        "| `{}` | {} | {:.3} | {:.3} |",
                        r.rule.antecedent, consequent, best.precision, best.recall
                    ),
                    None => println!("| `{}` | {} | - | - |", r.rule.antecedent, consequent),
                }
            }
            println!();
            print_means_line(&report);
        }
        OutputFormat::Text => {
            println!("{:<40} {:>9} {:>9}", "Rule", "Precision", "Recall");
            for r in &report.rules {
                let label = format!("{} -> {}", r.rule.antecedent, r.rule.consequent.join(" "));
                match (&r.best, &r.reason) {
                    (Some(best), _) => {
                        println!("{label:<40} {:>9.3} {:>9.3}", best.precision, best.recall)
                    }
                    (None, reason) => println!(
                        "{label:<40} unscored ({})",
                        reason.as_deref().unwrap_or("no score")
                    ),
                }
            }
            println!();
            print_means_line(&report);
            println!("curve: {}", curve_path.display());
        }
    }
    Ok(())
}

fn print_means_line(report: &EvaluationReport) {
    let scored = report.scored_count();
    match (report.mean_precision(), report.mean_recall()) {
        (Some(p), Some(r)) => println!(
            "Scored {scored} of {} rules: mean precision {p:.3}, mean recall {r:.3}",
            report.rules.len()
        ),
        _ => println!("Scored 0 of {} rules", report.rules.len()),
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    debug!(format = %cli.format, "configuration loaded");

    match cli.command {
        None => {
            let use_color =
                std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err();
            print_welcome(use_color);
        }
        Some(Command::Extract {
            ref repo,
            ref branch,
            ref transactions,
            ref stats,
            max_files,
        }) => {
            if branch.is_some() {
                config.history.branch = branch.clone();
            }
            if max_files.is_some() {
                config.history.max_files_per_commit = max_files;
            }
            config.validate()?;
            let transactions = transactions
                .clone()
                .unwrap_or_else(|| config.paths.transactions.clone());
            let stats = stats.clone().unwrap_or_else(|| config.paths.file_stats.clone());
            run_extract(&config, repo, &transactions, &stats, cli.format)?;
        }
        Some(Command::Mine {
            ref transactions,
            ref stats,
            min_support,
            partitions,
            low_threshold,
            high_threshold,
            ref out_dir,
        }) => {
            if let Some(s) = min_support {
                config.mining.min_support = s;
            }
            if let Some(n) = partitions {
                config.mining.num_partitions = n;
            }
            if let Some(l) = low_threshold {
                config.bands.low_threshold = l;
            }
            if let Some(h) = high_threshold {
                config.bands.high_threshold = h;
            }
            config.validate()?;
            let transactions = transactions
                .clone()
                .unwrap_or_else(|| config.paths.transactions.clone());
            let stats = stats.clone().unwrap_or_else(|| config.paths.file_stats.clone());
            let out_dir = out_dir.clone().unwrap_or_else(|| config.paths.output_dir.clone());
            run_mine(&config, &transactions, &stats, &out_dir, cli.format)?;
        }
        Some(Command::Evaluate {
            ref rules,
            ref ground_truth,
            ref curve,
            strict,
        }) => {
            let ground_truth = ground_truth
                .clone()
                .unwrap_or_else(|| config.paths.ground_truth.clone());
            let curve = curve
                .clone()
                .unwrap_or_else(|| config.paths.output_dir.join("precision-recall.csv"));
            run_evaluate(rules, &ground_truth, &curve, strict, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "cochange", &mut std::io::stdout());
        }
    }

    Ok(())
}
