use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pagewise::db::Database;
use pagewise::{
    load_config, telemetry, AnalysisKind, AnalysisService, Config, GeminiClient,
    InMemoryOwnerStore, JobStatus, OwnerId, OwnerStore, SqliteOwnerStore, SubmitRequest,
    SyntheticUsageRecorder,
};

const DEFAULT_OWNER: &str = "local";

#[derive(Parser, Debug)]
#[command(name = "pagewise", version, about = "Page-aware AI document analysis")]
struct Cli {
    /// JSON configuration file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse one or more documents, one job per file.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// metadata, compliance or manuscript
        #[arg(long)]
        kind: AnalysisKind,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
        /// Write a text report per job into this directory.
        #[arg(long = "report-dir")]
        report_dir: Option<PathBuf>,
        /// Keep results in memory instead of the database.
        #[arg(long)]
        ephemeral: bool,
    },
    /// List jobs committed for an owner.
    Jobs {
        #[arg(long, default_value = DEFAULT_OWNER)]
        owner: String,
    },
}

fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<SqliteOwnerStore> {
    let path = config.storage.resolved_database_path();
    let db = Database::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(SqliteOwnerStore::new(db))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load(cli.config.as_deref())?;
    telemetry::init(&config.logging);

    match cli.command {
        Commands::Analyze {
            files,
            kind,
            model,
            owner,
            report_dir,
            ephemeral,
        } => {
            analyze(
                config,
                &files,
                kind,
                model,
                OwnerId::new(owner),
                report_dir.as_deref(),
                ephemeral,
            )
            .await
        }
        Commands::Jobs { owner } => list_jobs(&config, &OwnerId::new(owner)),
    }
}

async fn analyze(
    config: Config,
    files: &[PathBuf],
    kind: AnalysisKind,
    model: Option<String>,
    owner: OwnerId,
    report_dir: Option<&Path>,
    ephemeral: bool,
) -> Result<()> {
    let client = Arc::new(GeminiClient::from_settings(&config.inference)?);
    let owners: Arc<dyn OwnerStore> = if ephemeral {
        Arc::new(InMemoryOwnerStore::new())
    } else {
        Arc::new(open_store(&config)?)
    };
    let usage = Arc::new(SyntheticUsageRecorder::new(Arc::clone(&owners)));
    let service = AnalysisService::new(config, client, owners, usage);

    let mut rejected = 0;
    let mut requests = Vec::with_capacity(files.len());
    for path in files {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Skipping {}: {}", path.display(), e);
                rejected += 1;
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut request = SubmitRequest::new(owner.clone(), kind, name, bytes);
        request.model = model.clone();
        requests.push(request);
    }

    let names: Vec<String> = requests.iter().map(|r| r.source_name.clone()).collect();
    let mut submitted = Vec::with_capacity(requests.len());
    for (name, result) in names.iter().zip(service.submit_batch(requests)) {
        match result {
            Ok(job_id) => submitted.push(job_id),
            Err(e) => {
                eprintln!("Skipping {}: {}", name, e);
                rejected += 1;
            }
        }
    }

    tracing::info!("Submitted {} job(s), processing", submitted.len());
    service.run_until_idle().await;

    if let Some(dir) = report_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut failed = 0;
    for job_id in &submitted {
        let Some(job) = service.job(job_id) else {
            continue;
        };
        println!(
            "{}  {:<9}  {:>3} findings  {}",
            job.id,
            job.status.to_string(),
            job.finding_count(),
            job.source_name
        );
        if job.status != JobStatus::Completed {
            failed += 1;
            if let Some(last) = job.logs.last() {
                println!("    {}", last.message);
            }
        }

        if let Some(dir) = report_dir {
            let report = service.export(job_id)?;
            let path = dir.join(format!("{}.{}.txt", job.source_name, job.id));
            std::fs::write(&path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    if failed > 0 || rejected > 0 {
        bail!(
            "{} of {} files failed ({} not submitted)",
            failed + rejected,
            files.len(),
            rejected
        );
    }
    Ok(())
}

fn list_jobs(config: &Config, owner: &OwnerId) -> Result<()> {
    let store = open_store(config)?;
    let data = store.load(owner)?;

    if data.jobs.is_empty() {
        println!("No jobs for {}", owner);
        return Ok(());
    }

    for job in &data.jobs {
        println!(
            "{}  {}  {:<9}  {:<21}  {:>3} findings  {}",
            job.created_at.format("%Y-%m-%d %H:%M"),
            job.id,
            job.status.to_string(),
            job.kind.to_string(),
            job.finding_count(),
            job.source_name
        );
    }

    let total = data.total_usage();
    println!(
        "\n{} jobs, {} prompt / {} response units recorded",
        data.jobs.len(),
        total.prompt_units,
        total.response_units
    );
    Ok(())
}
