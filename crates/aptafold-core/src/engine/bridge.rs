//! A subprocess bridge to an external molecular toolkit.
//!
//! Every request is one invocation of the driver executable:
//!
//! ```text
//! <driver> <verb> <request.toml> <response.toml>
//! ```
//!
//! run with the run directory as its working directory. Requests and responses are TOML
//! documents kept under `jobs/`, so a failed call can be replayed by hand.

use crate::core::models::sequence::{DnaSequence, PeptideSequence};
use crate::engine::analysis::backend::{BindingSummary, TrajectoryBackend, TrajectoryPair};
use crate::engine::artifacts::JOBS_DIR;
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use crate::engine::process;
use crate::engine::stages::complex::PeptideBuilder;
use crate::engine::stages::sampling::{
    MdEngine, PreparationRequest, SimulationJob, SimulationReport,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

pub const VERB_PREPARE: &str = "prepare";
pub const VERB_SIMULATE: &str = "simulate";
pub const VERB_STRIP_SOLVENT: &str = "strip-solvent";
pub const VERB_PAIRING: &str = "pairing";
pub const VERB_DIHEDRALS: &str = "dihedrals";
pub const VERB_CONTACTS: &str = "contacts";
pub const VERB_EXTRACT_FRAME: &str = "extract-frame";
pub const VERB_BUILD_PEPTIDE: &str = "build-peptide";

#[derive(Debug, Deserialize)]
struct Acknowledgement {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct StripRequest<'a> {
    input: &'a TrajectoryPair,
    output: &'a TrajectoryPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct TrajectoryRequest<'a> {
    pair: &'a TrajectoryPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct ContactRequest<'a> {
    sequence: String,
    peptide: String,
    pair: &'a TrajectoryPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct FrameRequest<'a> {
    frame: usize,
    output: &'a Path,
    pair: &'a TrajectoryPair,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct PeptideRequest<'a> {
    sequence: String,
    output: &'a Path,
}

#[derive(Debug, Deserialize)]
struct FrameSeries<T> {
    frames: Vec<Vec<T>>,
}

#[derive(Debug, Clone)]
pub struct DriverBridge {
    executable: PathBuf,
    label: String,
}

impl DriverBridge {
    pub fn new(executable: PathBuf) -> Self {
        let label = executable
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "driver".to_string());
        Self { executable, label }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn tool(&self, verb: &str) -> String {
        format!("{} {}", self.label, verb)
    }

    fn call<Req, Resp>(
        &self,
        verb: &str,
        request: &Req,
        ctx: &RunContext,
    ) -> Result<Resp, PipelineError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let jobs = ctx.path(JOBS_DIR);
        fs::create_dir_all(&jobs).map_err(|e| PipelineError::io(&jobs, e))?;
        let request_path = jobs.join(format!("{verb}.request.toml"));
        let response_path = jobs.join(format!("{verb}.response.toml"));

        let text = toml::to_string_pretty(request).map_err(|e| PipelineError::Serialization {
            path: request_path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&request_path, text).map_err(|e| PipelineError::io(&request_path, e))?;
        match fs::remove_file(&response_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(&response_path, e)),
        }

        let mut command = Command::new(&self.executable);
        command
            .arg(verb)
            .arg(&request_path)
            .arg(&response_path)
            .current_dir(&ctx.work_dir);
        if let Some(lib) = &ctx.library_path {
            command.env("LD_LIBRARY_PATH", lib);
        }
        let tool = self.tool(verb);
        process::run_captured(&tool, &mut command)?;

        let response = fs::read_to_string(&response_path).map_err(|e| {
            let reason = format!("no response at {}: {e}", response_path.display());
            PipelineError::malformed_output(&tool, reason)
        })?;
        debug!(verb, "Driver call completed.");
        toml::from_str(&response).map_err(|e| PipelineError::malformed_output(&tool, e))
    }
}

impl MdEngine for DriverBridge {
    fn name(&self) -> &str {
        self.label()
    }

    fn prepare(&self, request: &PreparationRequest, ctx: &RunContext) -> Result<(), PipelineError> {
        self.call::<_, Acknowledgement>(VERB_PREPARE, request, ctx)
            .map(|_| ())
    }

    fn simulate(
        &self,
        job: &SimulationJob,
        ctx: &RunContext,
    ) -> Result<SimulationReport, PipelineError> {
        self.call(VERB_SIMULATE, job, ctx)
    }
}

impl TrajectoryBackend for DriverBridge {
    fn name(&self) -> &str {
        self.label()
    }

    fn strip_solvent(
        &self,
        input: &TrajectoryPair,
        output: &TrajectoryPair,
        ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        self.call::<_, Acknowledgement>(VERB_STRIP_SOLVENT, &StripRequest { input, output }, ctx)
            .map(|_| ())
    }

    fn pairing_trajectory(
        &self,
        pair: &TrajectoryPair,
        ctx: &RunContext,
    ) -> Result<Vec<Vec<usize>>, PipelineError> {
        self.call::<_, FrameSeries<usize>>(VERB_PAIRING, &TrajectoryRequest { pair }, ctx)
            .map(|series| series.frames)
    }

    fn dihedral_trajectory(
        &self,
        pair: &TrajectoryPair,
        ctx: &RunContext,
    ) -> Result<Vec<Vec<f64>>, PipelineError> {
        self.call::<_, FrameSeries<f64>>(VERB_DIHEDRALS, &TrajectoryRequest { pair }, ctx)
            .map(|series| series.frames)
    }

    fn binding_contacts(
        &self,
        pair: &TrajectoryPair,
        sequence: &DnaSequence,
        peptide: &PeptideSequence,
        ctx: &RunContext,
    ) -> Result<BindingSummary, PipelineError> {
        let request = ContactRequest {
            sequence: sequence.to_string(),
            peptide: peptide.to_string(),
            pair,
        };
        self.call(VERB_CONTACTS, &request, ctx)
    }

    fn extract_frame(
        &self,
        pair: &TrajectoryPair,
        frame: usize,
        output: &Path,
        ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        let request = FrameRequest {
            frame,
            output,
            pair,
        };
        self.call::<_, Acknowledgement>(VERB_EXTRACT_FRAME, &request, ctx)
            .map(|_| ())
    }
}

impl PeptideBuilder for DriverBridge {
    fn name(&self) -> &str {
        self.label()
    }

    fn build(
        &self,
        peptide: &PeptideSequence,
        output: &Path,
        ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        let request = PeptideRequest {
            sequence: peptide.to_string(),
            output,
        };
        self.call::<_, Acknowledgement>(VERB_BUILD_PEPTIDE, &request, ctx)
            .map(|_| ())
    }
}
