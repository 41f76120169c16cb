use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Error, Result};

/// How a playback attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    Interrupted,
}

/// Stream one reference: yt-dlp writes raw audio to stdout, ffplay decodes
/// it from stdin. Blocks until playback ends or the user interrupts; an
/// interrupt tears down only this pipe, never the process.
pub async fn stream(reference: &str, volume_percent: u16) -> Result<PlaybackEnd> {
    // 0..=200 percent maps to a 0.0..=2.0 linear multiplier
    let volume = f64::from(volume_percent) / 100.0;

    let mut extractor = Command::new("yt-dlp")
        .args(["-f", "bestaudio", "-o", "-", reference])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::from_spawn("yt-dlp", e))?;

    let audio = extractor
        .stdout
        .take()
        .ok_or_else(|| Error::ToolFailed {
            tool: "yt-dlp",
            code: -1,
        })?;

    let player = Command::new("ffplay")
        .args([
            "-i",
            "-",
            "-nodisp",
            "-autoexit",
            "-af",
            &format!("volume={}", volume),
            "-loglevel",
            "quiet",
        ])
        .stdin(TryInto::<Stdio>::try_into(audio).map_err(Error::Io)?)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut player = match player {
        Ok(child) => child,
        Err(e) => {
            let _ = extractor.kill().await;
            return Err(Error::from_spawn("ffplay", e));
        }
    };

    tokio::select! {
        status = player.wait() => {
            let status = status?;
            let _ = extractor.kill().await;
            let _ = extractor.wait().await;
            if status.success() {
                Ok(PlaybackEnd::Finished)
            } else {
                Err(Error::from_exit("ffplay", status))
            }
        }
        _ = tokio::signal::ctrl_c() => {
            let _ = player.kill().await;
            let _ = extractor.kill().await;
            let _ = player.wait().await;
            let _ = extractor.wait().await;
            Ok(PlaybackEnd::Interrupted)
        }
    }
}
