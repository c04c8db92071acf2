// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blocking document work moved off the session task.
//
// Each call takes owned inputs (a render job, or an edit snapshot plus input
// list) and runs on tokio's blocking pool. There is no cancellation: a job
// either completes or fails.

use std::path::PathBuf;

use faxkit_core::error::{FaxkitError, Result};
use faxkit_document::{AssemblyInput, AssemblyReport, AssemblyValidation, DocumentAssembler, RenderedPage};
use faxkit_edit::EditSnapshot;
use tokio::task::JoinError;
use tracing::{debug, error};

use super::session::RenderJob;

fn join_failed(err: JoinError) -> FaxkitError {
    error!(error = %err, "worker task did not complete");
    FaxkitError::Io(std::io::Error::other(format!("worker task failed: {err}")))
}

/// Runs rendering and assembly on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentWorker {
    assembler: DocumentAssembler,
}

impl DocumentWorker {
    pub fn new(assembler: DocumentAssembler) -> Self {
        Self { assembler }
    }

    pub async fn render(&self, job: RenderJob) -> Result<RenderedPage> {
        tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(join_failed)?
    }

    pub async fn render_png(&self, job: RenderJob) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || job.run_png())
            .await
            .map_err(join_failed)?
    }

    pub async fn assemble(
        &self,
        inputs: Vec<AssemblyInput>,
        snapshot: EditSnapshot,
        dest: PathBuf,
    ) -> Result<AssemblyReport> {
        let assembler = self.assembler;
        debug!(documents = inputs.len(), edited = snapshot.len(), "assembly queued");
        tokio::task::spawn_blocking(move || assembler.assemble(&inputs, &snapshot, &dest))
            .await
            .map_err(join_failed)?
    }

    pub async fn validate(
        &self,
        inputs: Vec<AssemblyInput>,
        snapshot: EditSnapshot,
    ) -> Result<AssemblyValidation> {
        let assembler = self.assembler;
        tokio::task::spawn_blocking(move || assembler.validate(&inputs, &snapshot))
            .await
            .map_err(join_failed)
    }
}
