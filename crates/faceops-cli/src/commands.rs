//! Subcommand handlers.

use crate::prompt;
use crate::ImageSource;
use anyhow::{bail, Context, Result};
use faceops_client::{ApiClient, CancellationToken, ClientError, Config, FaceTest, ImageUpload};
use faceops_core::view::filter_users;
use faceops_core::{scan_directory, BulkProgressEvent, BulkStatus, Dashboard, User, UserUpdate};
use faceops_hw::Camera;
use std::path::Path;

const PASSWORD_ENV: &str = "FACEOPS_PASSWORD";

pub async fn login(client: &mut ApiClient, username: Option<String>, password_stdin: bool) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt::read_line("Username: ")?,
    };
    let password = if password_stdin {
        prompt::read_line("")?
    } else if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        pw
    } else {
        prompt::read_password("Password: ")?
    };

    client.login(&username, &password).await?;
    println!("Logged in as {}", username.trim());
    Ok(())
}

pub fn logout(client: &mut ApiClient) -> Result<()> {
    client.logout()?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(client: &ApiClient) -> Result<()> {
    if !client.session().is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    let operator = client.current_operator().await?;
    println!("{}", operator.username);
    Ok(())
}

pub async fn health(client: &ApiClient) -> Result<()> {
    let health = client.health().await.context("querying backend health")?;
    println!("status:       {}", health.status);
    println!("model loaded: {}", health.model_loaded);
    println!("device:       {}", health.device);
    Ok(())
}

pub async fn dashboard(client: &ApiClient) -> Result<()> {
    let users = client.list_users().await?;
    let health = match client.health().await {
        Ok(h) => Some(h),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            None
        }
    };
    let dash = Dashboard::build(&users, health.as_ref());

    println!("Total users:   {}", dash.total_users);
    println!("Active users:  {}", dash.active_users);
    println!("Backend:       {}", dash.backend);
    println!("Device:        {}", dash.device.as_deref().unwrap_or("-"));
    println!();
    println!("Recent registrations:");
    print_users(dash.recent.iter());
    Ok(())
}

pub async fn list_users(client: &ApiClient, filter: Option<&str>) -> Result<()> {
    let users = client.list_users().await?;
    let shown = filter_users(&users, filter.unwrap_or(""));
    print_users(shown.iter().copied());
    println!("{} of {} users", shown.len(), users.len());
    Ok(())
}

fn print_users<'a>(users: impl Iterator<Item = &'a User>) {
    println!("{:>6}  {:<20}  {:<38}  {:<8}  CREATED", "ID", "NAME", "IDENTITY", "STATUS");
    for u in users {
        let status = if u.is_active { "active" } else { "inactive" };
        let created = u
            .created_at_utc()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| u.created_at.clone());
        println!(
            "{:>6}  {:<20}  {:<38}  {:<8}  {}",
            u.id, u.name, u.identity_id, status, created
        );
    }
}

pub async fn register(client: &ApiClient, config: &Config, name: &str, source: &ImageSource) -> Result<()> {
    let image = load_image(config, source).await?;
    let user = client
        .register_user(name, image)
        .await
        .context("registering user")?;
    println!("Registered {} (id {}, identity {})", user.name, user.id, user.identity_id);
    Ok(())
}

pub async fn update(client: &ApiClient, id: i64, name: Option<String>, is_active: Option<bool>) -> Result<()> {
    let update = UserUpdate { name, is_active };
    if update.is_empty() {
        bail!("nothing to update: pass --name, --active or --inactive");
    }
    let user = client.update_user(id, &update).await?;
    let status = if user.is_active { "active" } else { "inactive" };
    println!("Updated user {}: {} ({status})", user.id, user.name);
    Ok(())
}

pub async fn delete(client: &ApiClient, id: i64, yes: bool) -> Result<()> {
    if !yes && !prompt::confirm(&format!("Delete user {id}?"))? {
        println!("Aborted");
        return Ok(());
    }
    client.delete_user(id).await?;
    println!("Deleted user {id}");
    Ok(())
}

pub async fn thumbnail(client: &ApiClient, identity_id: &str, out: &Path) -> Result<()> {
    let bytes = client.preprocessed_image(identity_id).await?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    println!("Saved {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

pub async fn bulk(client: &ApiClient, dir: &Path, yes: bool, dry_run: bool) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let candidates = scan_directory(dir);
    if candidates.is_empty() {
        bail!("no images found in the subfolders of {}", dir.display());
    }

    println!("{} identities found:", candidates.len());
    for c in &candidates {
        println!("  {:<24} {}", c.name, c.file.display());
    }
    if dry_run {
        return Ok(());
    }
    if !yes && !prompt::confirm(&format!("Register {} identities?", candidates.len()))? {
        println!("Aborted");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let result = client
        .register_bulk_cancellable(&candidates, print_progress, &cancel)
        .await;
    ctrl_c.abort();

    let summary = match result {
        Err(ClientError::Cancelled) => {
            println!("Cancelled; the server may have registered some identities already");
            return Ok(());
        }
        other => other.context("bulk registration")?,
    };

    println!();
    println!("Scanned: {}", summary.total_folders_scanned);
    println!("Success: {}", summary.success_count);
    println!("Failed:  {}", summary.failed_count);
    for f in &summary.failures {
        println!("  {}: {}", f.folder, f.reason);
    }
    Ok(())
}

fn print_progress(event: &BulkProgressEvent) {
    match event.status {
        BulkStatus::Success => println!(
            "[{:>3}/{}] {:>5.1}%  ok    {}",
            event.current,
            event.total,
            event.percent(),
            event.name
        ),
        BulkStatus::Failed => println!(
            "[{:>3}/{}] {:>5.1}%  FAIL  {}: {}",
            event.current,
            event.total,
            event.percent(),
            event.name,
            event.reason.as_deref().unwrap_or("unknown error")
        ),
    }
}

pub async fn face_test(
    client: &ApiClient,
    config: &Config,
    source: &ImageSource,
    save_reference: Option<&Path>,
) -> Result<()> {
    let image = load_image(config, source).await?;
    let mut view = FaceTest::new(client);
    let outcome = view.run(image).await?;
    println!("{outcome}");

    if let Some(dest) = save_reference {
        match view.reference_preview() {
            Some(preview) => {
                preview.save_copy(dest)?;
                println!("Reference image saved to {}", dest.display());
            }
            None => println!("No reference image available"),
        }
    }
    Ok(())
}

pub fn cameras() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No capture devices found");
    }
    for d in devices {
        println!("{}  {} ({})", d.path, d.name, d.driver);
    }
}

async fn load_image(config: &Config, source: &ImageSource) -> Result<ImageUpload> {
    if let Some(path) = &source.image {
        return ImageUpload::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()));
    }

    let device = config.camera_device.clone();
    let warmup = config.warmup_frames;
    println!("Capturing from {device}...");
    let jpeg = tokio::task::spawn_blocking(move || faceops_hw::capture_jpeg(&device, warmup))
        .await?
        .with_context(|| format!("capturing from {}", config.camera_device))?;
    Ok(ImageUpload::captured(jpeg))
}
