use std::process::Stdio;

use camino::Utf8Path as Path;
use tokio::process::Command;

use crate::config::BinPaths;

use super::video::transcode::canonical_ffmpeg_flags;

pub async fn run_self_check(bin_paths: &BinPaths) -> Result<(), ()> {
    let ffmpeg_bin_path = bin_paths.ffmpeg.as_deref();
    check_can_run(
        "ffprobe",
        bin_paths.ffprobe.as_deref(),
        &["-version"],
    )
    .await?;
    check_can_run("ffmpeg", ffmpeg_bin_path, &["-version"]).await?;
    check_can_run("yt-dlp", bin_paths.yt_dlp.as_deref(), &["--version"]).await?;
    check_can_encode_canonical(ffmpeg_bin_path).await?;
    Ok(())
}

async fn check_can_run(name: &str, bin_path: Option<&Path>, args: &[&str]) -> Result<(), ()> {
    let spawn_result = Command::new(bin_path.map(|p| p.as_str()).unwrap_or(name))
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let child = match spawn_result {
        Ok(c) => c,
        Err(err) => match err.kind() {
            std::io::ErrorKind::NotFound => {
                tracing::error!("Could not find {}. Is it installed?", name);
                return Err(());
            }
            _kind => {
                tracing::error!("Error running {}: {}", name, err);
                return Err(());
            }
        },
    };
    let output = match child.wait_with_output().await {
        Ok(o) => o,
        Err(err) => {
            tracing::error!(
                "{} test failed, error waiting for {} process: {}",
                name,
                name,
                err
            );
            return Err(());
        }
    };
    if !output.status.success() {
        tracing::error!(
            "{} test failed, error running {}:\n{}",
            name,
            name,
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(());
    }
    tracing::debug!("ok: can run {}", name);
    Ok(())
}

async fn check_can_encode_canonical(ffmpeg_bin_path: Option<&Path>) -> Result<(), ()> {
    let out_dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(err) => {
            tracing::error!("Could not create temp dir for encoder test: {}", err);
            return Err(());
        }
    };
    let out_path = out_dir.path().join("_reelbin_test_canonical.mp4");
    let mut command = Command::new(ffmpeg_bin_path.map(|p| p.as_str()).unwrap_or("ffmpeg"));
    command
        .arg("-nostdin")
        .arg("-y")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command.args(["-loglevel", "warning"]);
    command.args(["-f", "lavfi", "-i", "color=white:640x480:duration=2"]);
    command.args(["-f", "lavfi", "-i", "sine=frequency=500:duration=2"]);
    command.args(canonical_ffmpeg_flags());
    command.arg("-shortest");
    command.arg(&out_path);
    let ffmpeg = match command.spawn() {
        Ok(c) => c,
        Err(err) => {
            tracing::error!("Error running ffmpeg: {}", err);
            return Err(());
        }
    };
    let output = match ffmpeg.wait_with_output().await {
        Ok(o) => o,
        Err(err) => {
            tracing::error!(
                "ffmpeg test failed, error waiting for ffmpeg process: {}",
                err
            );
            return Err(());
        }
    };
    if !output.status.success() {
        tracing::error!(
            "Error producing test file at {} with ffmpeg\nCommand:\n{:?}\nffmpeg output:\n{}",
            out_path.display(),
            command.as_std(),
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(());
    }
    tracing::debug!("ok: can encode canonical h264/aac mp4");
    Ok(())
}
