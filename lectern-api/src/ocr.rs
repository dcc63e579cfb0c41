//! Tesseract-backed OCR engine.
//!
//! Runs the `tesseract` binary as a child process, writing the image to its
//! stdin and reading the recognized text from stdout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lectern_core::{LecternResult, OcrEngine, OcrError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::OcrConfig;
use crate::constants::{
    DEFAULT_EXTERNAL_TIMEOUT, DEFAULT_OCR_LANGUAGES, DEFAULT_OCR_OEM, DEFAULT_OCR_PSM,
    DEFAULT_TESSERACT_BINARY,
};

const ENGINE_NAME: &str = "tesseract";

/// OCR engine shelling out to the Tesseract CLI.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    languages: String,
    oem: u8,
    psm: u8,
    timeout: Duration,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            binary: DEFAULT_TESSERACT_BINARY.to_string(),
            languages: DEFAULT_OCR_LANGUAGES.to_string(),
            oem: DEFAULT_OCR_OEM,
            psm: DEFAULT_OCR_PSM,
            timeout: DEFAULT_EXTERNAL_TIMEOUT,
        }
    }
}

impl TesseractOcr {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            languages: config.languages.clone(),
            oem: config.oem,
            psm: config.psm,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command-line arguments, reading from stdin and writing to stdout.
    pub fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.languages.clone(),
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
        ]
    }

    fn failure(&self, reason: impl Into<String>) -> OcrError {
        OcrError::EngineFailed {
            engine: ENGINE_NAME.to_string(),
            reason: reason.into(),
        }
    }

    async fn run(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failure(format!("failed to spawn {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| self.failure(format!("failed to write image: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failure(format!("failed to wait for process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("exited with {}: {}", output.status, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn extract_text(&self, image: &[u8]) -> LecternResult<String> {
        match tokio::time::timeout(self.timeout, self.run(image)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(self
                .failure(format!("timed out after {}s", self.timeout.as_secs()))
                .into()),
        }
    }

    fn engine_name(&self) -> &str {
        ENGINE_NAME
    }
}
