//! External render boundary: invokes `manim` on a generated script and
//! locates the artifact it produced.
//!
//! Manim writes to `media/videos/<script_stem>/<resolution>/<scene_id>.mp4`
//! under its working directory. Render-process failure and a missing
//! artifact after a successful run are distinct errors; intermediates are
//! never cleaned up here.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::errors::CodedError;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
    FourK,
}

impl Quality {
    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "4k" => Ok(Self::FourK),
            _ => Err(anyhow!(CodedError::usage(format!(
                "invalid quality '{value}', expected low, medium, high, or 4k"
            )))),
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::Low => "-ql",
            Self::Medium => "-qm",
            Self::High => "-qh",
            Self::FourK => "-qk",
        }
    }
}

/// Runs `manim` on `script` and returns the located artifact path.
pub fn render_scene(
    script: &Path,
    scene_id: &str,
    quality: Quality,
    timeout: Duration,
    work_dir: &Path,
) -> Result<PathBuf> {
    let output_name = format!("{scene_id}.mp4");
    let mut child = Command::new("manim")
        .arg(quality.flag())
        .arg("-o")
        .arg(&output_name)
        .arg(script)
        .arg(scene_id)
        .current_dir(work_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|error| {
            anyhow!(CodedError::render_failure(format!(
                "failed to launch manim: {error}"
            )))
        })?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().context("failed to poll manim process")? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(CodedError::render_failure(format!(
                    "manim timed out after {}s rendering scene {scene_id}",
                    timeout.as_secs()
                ))));
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    if !status.success() {
        return Err(anyhow!(CodedError::render_failure(format!(
            "manim exited with {status} for scene {scene_id}"
        ))));
    }

    let media_root = work_dir.join("media").join("videos");
    find_artifact(&media_root, &output_name)?.ok_or_else(|| {
        anyhow!(CodedError::artifact_not_found(format!(
            "render succeeded but no {output_name} under {}",
            media_root.display()
        )))
    })
}

/// Depth-first scan for `file_name`, visiting directories in sorted order so
/// the located path is deterministic when duplicates exist.
pub fn find_artifact(root: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    if !root.is_dir() {
        return Ok(None);
    }
    let mut entries: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("failed to read {}", root.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    entries.sort();

    for entry in &entries {
        if entry.is_file() && entry.file_name().is_some_and(|name| name == file_name) {
            return Ok(Some(entry.clone()));
        }
    }
    for entry in entries {
        if entry.is_dir() {
            if let Some(found) = find_artifact(&entry, file_name)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn quality_keywords_parse() {
        assert_eq!(Quality::from_keyword("LOW").unwrap(), Quality::Low);
        assert_eq!(Quality::from_keyword("4k").unwrap(), Quality::FourK);
        assert_eq!(Quality::default().flag(), "-qm");
        assert!(Quality::from_keyword("ultra").is_err());
    }

    #[test]
    fn artifact_scan_finds_nested_file() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("Demo").join("1080p60");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Demo.mp4"), b"fake").unwrap();

        let found = find_artifact(dir.path(), "Demo.mp4").unwrap();
        assert_eq!(found, Some(nested.join("Demo.mp4")));
    }

    #[test]
    fn artifact_scan_is_deterministic_across_duplicates() {
        let dir = tempdir().unwrap();
        for sub in ["b_dir", "a_dir"] {
            let nested = dir.path().join(sub);
            fs::create_dir_all(&nested).unwrap();
            fs::write(nested.join("Demo.mp4"), b"fake").unwrap();
        }
        let found = find_artifact(dir.path(), "Demo.mp4").unwrap().unwrap();
        assert!(found.ends_with(Path::new("a_dir").join("Demo.mp4")));
    }

    #[test]
    fn missing_root_yields_none_not_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("media").join("videos");
        assert_eq!(find_artifact(&missing, "Demo.mp4").unwrap(), None);
    }
}
