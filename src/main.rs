use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use archive_index::{
    Config, FilterSet, IndexedEntry, Ingestor, JobRunner, LifecycleTracker, MemoryIndexStore,
    MemoryProjectStore, Paged, Project, ProjectService, UploadRequest,
};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

/// The CLI runs as a single local user.
const LOCAL_USER: u64 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "archive-index",
    about = "Index the contents of a ZIP archive, including nested JAR files, without extracting it"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Archive to index.
    archive: PathBuf,
    /// Project name; defaults to the archive file name.
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Maximum nested-container depth (unbounded when omitted).
    #[arg(long)]
    max_depth: Option<usize>,
    /// Total bytes that may be materialized for nested containers.
    #[arg(long)]
    max_nested_bytes: Option<u64>,
    /// Base-name globs opened as nested containers (e.g. "*.war"); replaces the configured list.
    #[arg(long = "container-glob")]
    container_globs: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index an archive and print one page of the listing.
    Ingest {
        #[command(flatten)]
        ingest: IngestArgs,
        /// Only list the direct children of this logical directory.
        #[arg(long)]
        directory: Option<String>,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Index an archive and print the preview of one logical path.
    Show {
        #[command(flatten)]
        ingest: IngestArgs,
        /// Logical path, e.g. "lib/app.jar/META-INF/MANIFEST.MF".
        path: String,
    },
    /// Index an archive and print every directory that has entries.
    Dirs {
        #[command(flatten)]
        ingest: IngestArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env().context("failed to read configuration")?;

    match cli.command {
        Commands::Ingest { ingest, directory, page, limit, json } => {
            let (service, project) = ingest_archive(&config, ingest).await?;
            let listing = service.list_entries(LOCAL_USER, project.id, directory.as_deref(), page, limit)?;
            if json {
                let body = json!({ "project": project, "files": listing.items, "pagination": listing.pagination });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_listing(&project, &listing);
            }
        }
        Commands::Show { ingest, path } => {
            let (service, project) = ingest_archive(&config, ingest).await?;
            let content = service
                .file_content(LOCAL_USER, project.id, &path)
                .with_context(|| format!("no entry at {path}"))?;
            println!("{}", serde_json::to_string_pretty(&content)?);
        }
        Commands::Dirs { ingest } => {
            let (service, project) = ingest_archive(&config, ingest).await?;
            for dir in service.directories(LOCAL_USER, project.id)? {
                println!("{dir}");
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Creates a project for the archive, runs its ingestion job to the end and
/// returns the service together with the final project row.
async fn ingest_archive(config: &Config, args: IngestArgs) -> anyhow::Result<(ProjectService, Project)> {
    let config = config.clone().with_overrides(args.max_depth, args.max_nested_bytes, args.container_globs);

    let mut containers = FilterSet::new();
    for glob in &config.container_globs {
        containers = containers.add_glob(glob)?;
    }

    let projects = Arc::new(MemoryProjectStore::new());
    let index = Arc::new(MemoryIndexStore::new());
    let ingestor = Ingestor::new(index.clone())
        .with_policy(config.walk_policy())
        .with_containers(containers);
    let jobs = JobRunner::new(ingestor, LifecycleTracker::new(projects.clone()));
    let service = ProjectService::new(projects, index, jobs).with_page_defaults(config.page_defaults());

    let name = match args.name {
        Some(name) => name,
        None => args
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("archive path has no file name")?,
    };

    let (project, job) = service
        .upload(LOCAL_USER, UploadRequest {
            name,
            description: args.description,
            archive_path: args.archive.clone(),
            original_filename: None,
        })
        .with_context(|| format!("cannot register {}", args.archive.display()))?;

    match job.await.context("ingestion task panicked")? {
        Ok(report) => info!(
            project_id = project.id,
            recorded = report.recorded,
            issues = report.issues(),
            "ingestion finished"
        ),
        Err(err) => warn!(project_id = project.id, error = %err, "ingestion failed"),
    }

    let project = service.get_project(LOCAL_USER, project.id)?;
    if project.status != archive_index::ProjectStatus::Completed {
        bail!("project {} ended with status {}", project.id, project.status);
    }
    Ok((service, project))
}

fn print_listing(project: &Project, listing: &Paged<IndexedEntry>) {
    println!("{} [{}] {}", project.name, project.status, project.archive_path.display());
    for entry in &listing.items {
        let kind = if entry.is_directory { "dir " } else { "file" };
        let size = entry.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        println!("{kind} {size:>10}  {}", entry.path);
    }
    let p = &listing.pagination;
    println!("page {}/{} ({} entries, {} per page)", p.page, p.pages, p.total, p.limit);
}
