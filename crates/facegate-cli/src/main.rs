use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::blocking::multipart::{Form, Part};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate enrollment and recognition CLI")]
struct Cli {
    /// Base URL of the facegated daemon.
    #[arg(long, default_value = "http://127.0.0.1:8090")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll one face image for a user
    Enroll {
        /// Username to enroll under
        #[arg(short, long)]
        name: String,
        /// Path to the image file
        image: PathBuf,
    },
    /// Train the user's model from the enrolled images
    Train {
        /// Username to train
        user: String,
    },
    /// Check a probe photo against a user's trained model
    Recognize {
        /// Username to check against
        #[arg(short, long)]
        name: String,
        /// Path to the probe image file
        image: PathBuf,
    },
    /// Show daemon status
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let http = reqwest::blocking::Client::new();
    let addr = cli.addr.trim_end_matches('/');

    let response = match cli.command {
        Commands::Enroll { name, image } => http
            .post(format!("{addr}/enroll"))
            .multipart(upload_form("name", &name, &image)?)
            .send(),
        Commands::Train { user } => http
            .post(format!("{addr}/train"))
            .json(&serde_json::json!({"user_name": user}))
            .send(),
        Commands::Recognize { name, image } => http
            .post(format!("{addr}/recognize"))
            .multipart(upload_form("username", &name, &image)?)
            .send(),
        Commands::Health => http.get(format!("{addr}/health")).send(),
    };

    let response = response.with_context(|| format!("daemon unreachable at {addr}"))?;
    let status = response.status();
    let body: serde_json::Value = response.json().context("daemon returned non-JSON")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        anyhow::bail!("request failed with status {status}");
    }
    Ok(())
}

fn upload_form(name_field: &str, name: &str, image: &Path) -> Result<Form> {
    let bytes =
        std::fs::read(image).with_context(|| format!("reading image {}", image.display()))?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(Form::new()
        .text(name_field.to_string(), name.to_string())
        .part("image", Part::bytes(bytes).file_name(file_name)))
}
