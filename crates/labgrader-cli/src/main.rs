//! Labgrader CLI
//!
//! A command-line tool for grading lab submissions against test cases.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labgrader::report::format_grade;
use labgrader::{
    Config, EXAMPLE_CONFIG, Grader, GradingMode, GradingRun, LabGrader, RunOptions,
    SubmissionFile,
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labgrader")]
#[command(about = "A tool for grading student lab submissions")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: labgrader.toml)
        #[arg(short, long, default_value = "labgrader.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List configured courses
    Courses,

    /// List the labs of a course
    Labs {
        course: String,
    },

    /// Grade every submission of a lab and write the reports
    Grade {
        course: String,
        lab: String,

        /// Only use the lab's public test cases
        #[arg(short, long)]
        student: bool,

        /// Upload batch to grade
        #[arg(short, long)]
        batch: Option<String>,

        /// Number of submissions graded in parallel
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Replace a lab's submissions with an already-extracted upload
    Add {
        course: String,
        lab: String,

        /// Directory holding one subdirectory per submission
        #[arg(value_name = "DIR")]
        source: PathBuf,

        #[arg(short, long)]
        batch: Option<String>,
    },

    /// List the report files of a lab
    Results {
        course: String,
        lab: String,

        #[arg(short, long)]
        batch: Option<String>,

        /// Bundle the reports into a zip archive and print its path
        #[arg(short, long)]
        zip: bool,
    },

    /// Print the diff dump of the last grading run
    Diff {
        course: String,
        lab: String,

        #[arg(short, long)]
        batch: Option<String>,
    },

    /// Print the chart data of the last grading run
    Chart {
        course: String,
        lab: String,

        #[arg(short, long)]
        batch: Option<String>,
    },

    /// Inspect or edit a single submission
    Submission {
        #[command(subcommand)]
        action: SubmissionAction,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[derive(Subcommand)]
enum SubmissionAction {
    /// Print the files of a submission
    Show {
        course: String,
        lab: String,
        id: String,

        #[arg(short, long)]
        batch: Option<String>,
    },

    /// Store a single submission from local files, replacing any earlier one
    Save {
        course: String,
        lab: String,
        id: String,

        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        batch: Option<String>,
    },

    /// Overwrite files of a submission with local files
    Update {
        course: String,
        lab: String,
        id: String,

        /// Files to copy into the submission (by file name)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        batch: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };
    let config = Arc::new(config);

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Courses => {
            list_courses(&config);
            Ok(())
        }
        Commands::Labs { course } => list_labs(&config, &course),
        Commands::Grade {
            course,
            lab,
            student,
            batch,
            workers,
        } => {
            let mode = if student {
                GradingMode::Student
            } else {
                GradingMode::Full
            };
            let options = RunOptions {
                mode,
                batch,
                workers,
            };
            run_grade(config, &course, &lab, &options).await
        }
        Commands::Add {
            course,
            lab,
            source,
            batch,
        } => {
            let grader = grader_for(config, &course)?;
            let units = grader
                .add_submissions(&lab, batch.as_deref(), &source)
                .await
                .context("failed to add submissions")?;
            println!("Added {} submissions", units.len());
            for unit in units {
                println!("  {}", unit.id);
            }
            Ok(())
        }
        Commands::Results {
            course,
            lab,
            batch,
            zip,
        } => {
            let grader = grader_for(config, &course)?;
            if zip {
                let archive = grader
                    .context()
                    .compress_results(&lab, batch.as_deref())
                    .context("failed to archive results")?;
                println!("{}", archive.display());
                return Ok(());
            }
            let files = grader
                .results_to_download(&lab, batch.as_deref())
                .context("failed to list results")?;
            for file in files {
                println!("{}", file.display());
            }
            Ok(())
        }
        Commands::Diff { course, lab, batch } => {
            let grader = grader_for(config, &course)?;
            let diff = grader
                .context()
                .read_diff_dump(&lab, batch.as_deref())
                .context("failed to read diff dump")?;
            println!("{}", serde_json::to_string_pretty(&diff)?);
            Ok(())
        }
        Commands::Chart { course, lab, batch } => {
            let grader = grader_for(config, &course)?;
            let chart = grader
                .context()
                .read_chart(&lab, batch.as_deref())
                .context("failed to read chart data")?;
            println!("{}", serde_json::to_string_pretty(&chart)?);
            Ok(())
        }
        Commands::Submission { action } => run_submission(config, action).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

fn grader_for(config: Arc<Config>, course: &str) -> Result<LabGrader> {
    LabGrader::for_course(config, course).context("unknown course")
}

async fn run_grade(config: Arc<Config>, course: &str, lab: &str, options: &RunOptions) -> Result<()> {
    let grader = grader_for(config, course)?;
    info!(course, lab, kind = %grader.kind(), mode = ?options.mode, "grading lab");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing submissions in progress");
            on_interrupt.cancel();
        }
    });

    let run = grader
        .run_grader(lab, options, &cancel)
        .await
        .context("grading failed")?;

    print_run(&run);
    Ok(())
}

fn print_run(run: &GradingRun) {
    println!("{} results:\n", run.summary.lab);
    for result in &run.results {
        let status = if result.compile_error.is_some() {
            " (compilation failed)"
        } else {
            ""
        };
        println!(
            "  {:<20} {:>6}  {}/{}{}",
            result.id,
            format_grade(result.grade),
            result.passed.len(),
            result.total(),
            status
        );
    }
    println!();
    println!("Submissions: {}", run.summary.submission_count());
    println!("Pass percentage: {}", format_grade(run.summary.pass_percentage));
}

async fn run_submission(config: Arc<Config>, action: SubmissionAction) -> Result<()> {
    match action {
        SubmissionAction::Show {
            course,
            lab,
            id,
            batch,
        } => {
            let grader = grader_for(config, &course)?;
            let files = grader
                .get_submission_files(&lab, batch.as_deref(), &id)
                .await
                .context("failed to read submission")?;
            for file in files {
                println!("==> {} <==", file.name);
                println!("{}", file.content);
            }
            Ok(())
        }
        SubmissionAction::Save {
            course,
            lab,
            id,
            files,
            batch,
        } => {
            let grader = grader_for(config, &course)?;
            let mut saved = Vec::with_capacity(files.len());
            for path in &files {
                saved.push(read_submission_file(path).await?);
            }
            let unit = grader
                .context()
                .save_submission(&lab, batch.as_deref(), &id, &saved)
                .await
                .context("failed to save submission")?;
            println!("Saved {} files to '{}'", saved.len(), unit.path.display());
            Ok(())
        }
        SubmissionAction::Update {
            course,
            lab,
            id,
            files,
            batch,
        } => {
            let grader = grader_for(config, &course)?;
            let mut updates = Vec::with_capacity(files.len());
            for path in &files {
                updates.push(read_submission_file(path).await?);
            }
            grader
                .update_submission_files(&lab, batch.as_deref(), &id, &updates)
                .await
                .context("failed to update submission")?;
            println!("Updated {} files of '{id}'", updates.len());
            Ok(())
        }
    }
}

async fn read_submission_file(path: &Path) -> Result<SubmissionFile> {
    let name = path
        .file_name()
        .with_context(|| format!("'{}' has no file name", path.display()))?
        .to_string_lossy()
        .into_owned();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    Ok(SubmissionFile { name, content })
}

fn list_courses(config: &Config) {
    println!("Configured courses:\n");

    for name in config.course_names() {
        if let Ok((_, course)) = config.get_course(name) {
            println!(
                "  {:<15} {} grader, toolchain {} ({} labs)",
                name,
                course.grader,
                course.toolchain,
                course.labs.len()
            );
        }
    }
}

fn list_labs(config: &Config, course: &str) -> Result<()> {
    let (name, found) = config.get_course(course).context("unknown course")?;
    println!("Labs of {name}:\n");

    for lab in &found.labs {
        let network = if lab.disable_internet {
            "no network"
        } else {
            "network"
        };
        println!(
            "  {:<24} {}s, {}, public: [{}]",
            lab.name,
            lab.runtime_limit,
            network,
            lab.public_test_cases.join(", ")
        );
    }
    Ok(())
}

fn show_config(config: &Config) {
    println!("Courses root: {}", config.root.display());
    println!("Work directory: {}", config.work_dir().display());
    println!("Workers: {}", config.worker_count());
    println!("Compile timeout: {}s", config.compile_timeout);
    println!("Max output: {} bytes", config.max_output);
    println!();
    match config.sandbox_profile() {
        Some(sandbox) => {
            println!("Sandbox: {}", sandbox.wrapper.join(" "));
            if let Some(profile) = &sandbox.profile {
                println!("  Profile: {}", profile.display());
            }
        }
        None => println!("Sandbox: disabled"),
    }
    println!();

    let mut toolchains: Vec<_> = config.toolchains.iter().collect();
    toolchains.sort_by_key(|(id, _)| *id);
    println!("Toolchains configured: {}", toolchains.len());
    for (id, toolchain) in toolchains {
        let kind = if toolchain.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<15} {} ({}, .{})", id, toolchain.name, kind, toolchain.extension);
    }
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
