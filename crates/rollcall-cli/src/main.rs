use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Captures per enrollment burst the daemon expects by default.
const DEFAULT_ENROLL_BURST: usize = 5;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new subject from capture images
    Enroll {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        department: String,
        /// Capture images for the enrollment burst (typically 5)
        images: Vec<PathBuf>,
    },
    /// Replace an enrolled subject's template
    Reenroll {
        id: i64,
        images: Vec<PathBuf>,
    },
    /// Recognize a live capture and mark attendance
    Recognize {
        image: PathBuf,
    },
    /// List enrolled subjects
    List,
    /// Show attendance history for a subject
    History {
        id: i64,
    },
    /// Reset a subject's attendance score
    ResetScore {
        id: i64,
    },
    /// Remove a subject and their history
    Remove {
        id: i64,
    },
    /// Show daemon status
    Status,
}

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn register(
        &self,
        name: &str,
        department: &str,
        images: Vec<Vec<u8>>,
    ) -> zbus::Result<String>;
    async fn reenroll(&self, subject_id: i64, images: Vec<Vec<u8>>) -> zbus::Result<String>;
    async fn recognize(&self, image: Vec<u8>) -> zbus::Result<String>;
    async fn list_subjects(&self) -> zbus::Result<String>;
    async fn history(&self, subject_id: i64) -> zbus::Result<String>;
    async fn reset_score(&self, subject_id: i64) -> zbus::Result<String>;
    async fn remove_subject(&self, subject_id: i64) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
}

fn read_images(paths: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    paths
        .iter()
        .map(|p| std::fs::read(p).with_context(|| format!("reading {}", p.display())))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("connecting to session bus — is rollcalld running?")?;
    let proxy = AttendanceProxy::new(&connection).await?;

    match cli.command {
        Commands::Enroll {
            name,
            department,
            images,
        } => {
            if images.len() != DEFAULT_ENROLL_BURST {
                tracing::warn!(
                    got = images.len(),
                    expected = DEFAULT_ENROLL_BURST,
                    "unusual enrollment burst size"
                );
            }
            let payload = read_images(&images)?;
            println!("{}", proxy.register(&name, &department, payload).await?);
        }
        Commands::Reenroll { id, images } => {
            let payload = read_images(&images)?;
            println!("{}", proxy.reenroll(id, payload).await?);
        }
        Commands::Recognize { image } => {
            let payload = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            println!("{}", proxy.recognize(payload).await?);
        }
        Commands::List => {
            println!("{}", proxy.list_subjects().await?);
        }
        Commands::History { id } => {
            println!("{}", proxy.history(id).await?);
        }
        Commands::ResetScore { id } => {
            println!("{}", proxy.reset_score(id).await?);
        }
        Commands::Remove { id } => {
            if proxy.remove_subject(id).await? {
                println!("removed subject {id}");
            } else {
                println!("subject {id} not found");
            }
        }
        Commands::Status => {
            println!("{}", proxy.status().await?);
        }
    }

    Ok(())
}
