//! Email intake: polls a drop directory for .eml files and submits
//! their attachments into the pipeline.
//!
//! The LLM extracts the four business identifiers from the message
//! subject, body, and attachment text before submission, so routing can
//! use them even when the document itself never mentions an account.
//! Processed messages move to a sibling directory; messages that fail
//! to parse move to a failed directory instead of being retried forever.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mail_parser::{MessageParser, MimeHeaders};
use tracing::{info, warn};

use crate::classify::Classifier;
use crate::models::Identifiers;
use crate::ocr::TextExtractor;
use crate::services::SubmitService;

/// Intake settings.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Directory watched for incoming .eml files.
    pub inbox_dir: PathBuf,
    pub poll_interval: Duration,
}

/// Polls a directory of RFC 822 messages and feeds the pipeline.
pub struct EmailIntake {
    submit: SubmitService,
    classifier: Arc<dyn Classifier>,
    extractor: Arc<dyn TextExtractor>,
    config: IntakeConfig,
}

impl EmailIntake {
    pub fn new(
        submit: SubmitService,
        classifier: Arc<dyn Classifier>,
        extractor: Arc<dyn TextExtractor>,
        config: IntakeConfig,
    ) -> Self {
        Self {
            submit,
            classifier,
            extractor,
            config,
        }
    }

    /// Poll the inbox until the process is stopped.
    pub async fn run(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.config.inbox_dir).await?;
        info!(inbox = %self.config.inbox_dir.display(), "email intake started");

        loop {
            if let Err(e) = self.scan_once().await {
                warn!("intake scan failed: {e:#}");
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Process every .eml currently in the inbox. Returns the number of
    /// documents submitted.
    pub async fn scan_once(&self) -> anyhow::Result<usize> {
        let mut submitted = 0;
        let mut entries = tokio::fs::read_dir(&self.config.inbox_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("eml") {
                continue;
            }

            match self.process_message(&path).await {
                Ok(count) => {
                    submitted += count;
                    self.archive(&path, "processed").await?;
                }
                Err(e) => {
                    warn!(message = %path.display(), "intake failed: {e:#}");
                    self.archive(&path, "failed").await?;
                }
            }
        }
        Ok(submitted)
    }

    /// Parse one message and submit each named attachment.
    async fn process_message(&self, path: &Path) -> anyhow::Result<usize> {
        let raw = tokio::fs::read(path).await?;
        let message = MessageParser::default()
            .parse(&raw)
            .ok_or_else(|| anyhow::anyhow!("unparseable message: {}", path.display()))?;

        let subject = message.subject().unwrap_or("").to_string();
        let body = message.body_text(0).unwrap_or_default().to_string();

        let attachments: Vec<(String, Vec<u8>)> = message
            .attachments()
            .filter_map(|part| {
                part.attachment_name()
                    .map(|name| (name.to_string(), part.contents().to_vec()))
            })
            .collect();

        if attachments.is_empty() {
            warn!(message = %path.display(), "message carries no attachments, skipping");
            return Ok(0);
        }

        let mut submitted = 0;
        for (filename, bytes) in attachments {
            // Attachment text is best effort here; the worker re-extracts
            // properly after submission.
            let attachment_text = self
                .extractor
                .extract(&bytes, &filename)
                .await
                .unwrap_or_default();

            let identifiers: Identifiers = self
                .classifier
                .extract_metadata(&subject, &body, &attachment_text)
                .await;

            self.submit
                .submit(&filename, &bytes, Some(identifiers))
                .await?;
            submitted += 1;
        }

        info!(message = %path.display(), submitted, "intake message handled");
        Ok(submitted)
    }

    /// Move a handled message into a sibling directory.
    async fn archive(&self, path: &Path, outcome: &str) -> anyhow::Result<()> {
        let dir = self
            .config
            .inbox_dir
            .parent()
            .unwrap_or(&self.config.inbox_dir)
            .join(outcome);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("message path has no filename"))?;
        tokio::fs::rename(path, dir.join(filename)).await?;
        Ok(())
    }
}
