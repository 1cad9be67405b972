use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    let mut langs = Vec::new();
    for (idx, line) in stdout.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let value = line.trim();
        if !value.is_empty() {
            langs.push(value.to_string());
        }
    }
    langs
}

pub(super) fn tesseract_version() -> Result<String> {
    let output = Command::new("tesseract")
        .arg("--version")
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --version failed: {}", stderr.trim()));
    }
    // Older builds print the banner on stderr.
    let banner = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };
    Ok(banner
        .lines()
        .next()
        .map(|line| line.trim().trim_start_matches("tesseract").trim().to_string())
        .unwrap_or_default())
}

pub(super) fn normalize_ocr_languages(requested: &str) -> Result<String> {
    let available = list_tesseract_languages()?;
    choose_languages(requested, &available)
}

fn choose_languages(requested: &str, available: &[String]) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in trimmed.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}

/// Runs tesseract on `path` and returns its TSV output. With a `limit`, the child is
/// killed once it has run that long.
pub(super) fn run_tesseract_tsv(
    path: &Path,
    languages: &str,
    psm: u32,
    limit: Option<Duration>,
) -> Result<String> {
    let dir = tempfile::tempdir().with_context(|| "failed to create temp dir for OCR")?;
    let out_base = dir.path().join("tokens");
    let stderr_path = dir.path().join("stderr.log");
    let stderr = File::create(&stderr_path).with_context(|| "failed to create OCR log file")?;

    let mut child = Command::new("tesseract")
        .arg(path)
        .arg(&out_base)
        .arg("-l")
        .arg(languages)
        .arg("--psm")
        .arg(psm.to_string())
        .arg("--dpi")
        .arg("300")
        .arg("tsv")
        .stdout(Stdio::null())
        .stderr(stderr)
        .spawn()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    let status = wait_with_deadline(&mut child, limit)?;
    if !status.success() {
        let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    fs::read_to_string(out_base.with_extension("tsv"))
        .with_context(|| "failed to read tesseract output")
}

fn wait_with_deadline(child: &mut Child, limit: Option<Duration>) -> Result<ExitStatus> {
    let Some(limit) = limit else {
        return child.wait().with_context(|| "failed to wait for tesseract");
    };
    let started = Instant::now();
    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| "failed to poll tesseract")?
        {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            if let Err(err) = child.kill() {
                warn!("failed to kill tesseract: {}", err);
            }
            // Reap the child so it does not linger as a zombie.
            let _ = child.wait();
            return Err(anyhow!(
                "tesseract killed after {} ms",
                limit.as_millis()
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
