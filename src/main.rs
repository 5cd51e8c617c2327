use anyhow::{anyhow, Result};
use cidflow::app::{handle_fatal_error, init_logging, AppConfig};
use cidflow::config::ConfigLoader;
use cidflow::job::{ContentReference, JobId, JobType};
use cidflow::subprocess::SubprocessManager;
use cidflow::workflow::{WorkflowOrchestrator, WorkflowRun};
use cidflow::FlowError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Two-phase local/aggregate job workflows over content-addressed inputs
#[derive(Parser)]
#[command(name = "cidflow", version)]
#[command(about = "Run local jobs per input CID, then aggregate their outputs", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv adds thread ids)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML workflow configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full workflow over an input reference list
    Run {
        /// File with one content reference per line
        #[arg(default_value = "hashes_train.txt")]
        input: PathBuf,

        /// Only process the first N references
        #[arg(short = 'n', long)]
        max_jobs: Option<usize>,

        /// Directory for the final artifact (defaults to a scratch directory)
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the current status of one job
    Status {
        job_id: String,
    },
    /// Download the published output of one job
    Fetch {
        job_id: String,

        /// Destination directory (defaults to a scratch directory)
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,
    },
    /// Submit a single job and print its id
    Submit {
        #[arg(value_enum)]
        job_type: JobType,

        /// Input content references
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app = AppConfig::new(cli.verbose, cli.config.clone());
    init_logging(&app);

    if let Err(e) = run(cli.command, &app).await {
        handle_fatal_error(e, app.verbose);
    }
}

async fn run(command: Commands, app: &AppConfig) -> Result<()> {
    let mut config = ConfigLoader::load(app.config_path.as_deref())
        .await
        .map_err(FlowError::from)?;

    if let Commands::Run {
        output_dir: Some(dir),
        ..
    } = &command
    {
        config.output_dir = Some(dir.clone());
    }

    let orchestrator = WorkflowOrchestrator::new(config, &SubprocessManager::production());

    match command {
        Commands::Run {
            input,
            max_jobs,
            json,
            ..
        } => {
            let run = orchestrator.run(&input, max_jobs).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                print_summary(&run);
            }
        }
        Commands::Status { job_id } => {
            let status = orchestrator.monitor().poll(&JobId::new(job_id)?).await?;
            let output = status.output().map(|o| o.as_str()).unwrap_or("-");
            println!("{}\t{}", status.state(), output);
        }
        Commands::Fetch { job_id, output_dir } => {
            let job_id = JobId::new(job_id)?;
            let fetcher = orchestrator.fetcher();
            let fetched = match output_dir {
                Some(dir) => fetcher.fetch_into(&job_id, &dir).await?,
                None => fetcher.fetch(&job_id).await?,
            };
            if !fetched.succeeded {
                return Err(anyhow!(
                    "could not download results for job {} after {} attempts (directory: {})",
                    job_id,
                    fetched.attempts,
                    fetched.dir.display()
                ));
            }
            println!("{}", fetched.dir.display());
        }
        Commands::Submit { job_type, inputs } => {
            let inputs = inputs
                .into_iter()
                .map(ContentReference::new)
                .collect::<cidflow::Result<Vec<_>>>()?;
            let handle = orchestrator.submitter().submit(job_type, &inputs).await?;
            if handle.id.is_empty() {
                return Err(FlowError::SubmissionFailed {
                    job_type,
                    inputs: inputs
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                }
                .into());
            }
            println!("{}", handle.id);
        }
    }

    Ok(())
}

fn print_summary(run: &WorkflowRun) {
    println!("Local jobs: {}", run.local_jobs.len());
    for ((job, output), fetched) in run
        .local_jobs
        .iter()
        .zip(&run.local_outputs)
        .zip(&run.local_results)
    {
        println!("  {} -> {} ({})", job.id, output, fetched.dir.display());
    }

    if let Some(job) = &run.aggregate_job {
        let output = run
            .aggregate_output
            .as_ref()
            .map(|o| o.as_str())
            .unwrap_or("-");
        println!("Aggregate job: {} -> {}", job.id, output);
    }

    if let Some(fetched) = &run.final_result {
        let state = if fetched.succeeded { "ok" } else { "incomplete" };
        println!("Final artifact: {} ({})", fetched.dir.display(), state);
    }
}
