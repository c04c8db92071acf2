// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cover page collaborator.
//
// A provider turns a plain `CoverSheet` record into a standalone PDF on disk.
// The assembler then treats that file as one more source with no edits.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use faxkit_core::PaperSize;
use faxkit_core::error::{FaxkitError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::pdf::writer::{PdfWriter, TextLine};

/// What goes on the cover page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverSheet {
    pub recipient_name: String,
    pub recipient_fax: String,
    pub sender_name: String,
    pub sender_fax: String,
    pub subject: String,
    pub message: String,
    pub urgent: bool,
    pub reply_requested: bool,
    /// Pages following the cover, when known.
    pub page_count_hint: Option<usize>,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
}

impl CoverSheet {
    pub fn validate(&self) -> Result<()> {
        if self.recipient_name.trim().is_empty() {
            return Err(FaxkitError::InvalidEdit("cover sheet needs a recipient".into()));
        }
        let digits = self.recipient_fax.chars().filter(char::is_ascii_digit).count();
        if digits < 7 {
            return Err(FaxkitError::InvalidEdit(format!(
                "recipient fax number {:?} is too short",
                self.recipient_fax
            )));
        }
        Ok(())
    }
}

/// Produces a cover page PDF for a sheet inside `dir`.
pub trait CoverPageProvider: Send + Sync {
    fn render(&self, sheet: &CoverSheet, dir: &Path) -> Result<PathBuf>;
}

/// Plain text cover page laid out with the PDF writer.
#[derive(Debug, Clone, Copy)]
pub struct TextCoverPage {
    paper_size: PaperSize,
}

impl Default for TextCoverPage {
    fn default() -> Self {
        Self::new(PaperSize::Letter)
    }
}

fn check_box(checked: bool) -> &'static str {
    if checked { "[X]" } else { "[ ]" }
}

impl TextCoverPage {
    pub fn new(paper_size: PaperSize) -> Self {
        Self { paper_size }
    }

    fn lines(sheet: &CoverSheet) -> Vec<TextLine> {
        let date = sheet.date.unwrap_or_else(|| Local::now().date_naive());
        let pages = match sheet.page_count_hint {
            Some(count) => format!("{} (including this one)", count + 1),
            None => "-".into(),
        };
        let mut lines = vec![
            TextLine::new("FAX", 32.0).bold(),
            TextLine::gap(12.0),
            TextLine::new(format!("To: {}", sheet.recipient_name), 14.0),
            TextLine::new(format!("Fax: {}", sheet.recipient_fax), 12.0),
            TextLine::gap(8.0),
            TextLine::new(format!("From: {}", sheet.sender_name), 14.0),
            TextLine::new(format!("Fax: {}", sheet.sender_fax), 12.0),
            TextLine::gap(8.0),
            TextLine::new(format!("Subject: {}", sheet.subject), 12.0),
            TextLine::new(format!("Pages: {pages}    Date: {}", date.format("%m/%d/%Y")), 12.0),
            TextLine::gap(8.0),
            TextLine::new(
                format!(
                    "{} Urgent    {} Please reply",
                    check_box(sheet.urgent),
                    check_box(sheet.reply_requested)
                ),
                12.0,
            )
            .bold(),
        ];
        if !sheet.message.trim().is_empty() {
            lines.push(TextLine::gap(16.0));
            lines.push(TextLine::new("Message:", 12.0).bold());
            lines.extend(sheet.message.lines().map(|line| TextLine::new(line, 11.0)));
        }
        lines
    }
}

impl CoverPageProvider for TextCoverPage {
    #[instrument(skip_all, fields(dir = %dir.display()))]
    fn render(&self, sheet: &CoverSheet, dir: &Path) -> Result<PathBuf> {
        sheet.validate()?;
        let title = format!("Fax to {}", sheet.recipient_name);
        let bytes = PdfWriter::new(self.paper_size, title).create_from_lines(&Self::lines(sheet));

        let mut file = tempfile::Builder::new()
            .prefix("cover-")
            .suffix(".pdf")
            .tempfile_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        let (_, path) = file.keep().map_err(|err| FaxkitError::Io(err.error))?;
        info!(path = %path.display(), bytes_len = bytes.len(), "cover page written");
        Ok(path)
    }
}
