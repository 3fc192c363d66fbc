use super::{StageAdapter, StageDiagnostics, StageOutput};
use crate::core::models::secondary::SecondaryStructure;
use crate::core::models::sequence::DnaSequence;
use crate::engine::artifacts::{
    self, COMMAND_TEMPLATE, ENGINE_FRAME, FOLD_LOG, FOLD_SCRIPT, FOLDED_STRUCTURE,
    PREFOLD_OVERRIDE,
};
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, instrument};

pub const SEQUENCE_TOKEN: &str = "SEQUENCE";
pub const PAIR_ANCHOR: &str = "#baseInteraction A IND WatsonCrick A IND2 WatsonCrick Cis";
const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

fn pair_directive(i: usize, j: usize) -> String {
    format!("baseInteraction A {i} WatsonCrick A {j} WatsonCrick Cis")
}

/// The folding engine's parameterized command script.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    path: PathBuf,
    text: String,
}

impl CommandTemplate {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Ok(Self::from_text(path.to_path_buf(), text))
    }

    pub fn from_text(path: PathBuf, text: String) -> Self {
        Self { path, text }
    }

    /// Substitutes the sequence and inserts one pairing directive per base pair, in pair order,
    /// directly after the first anchor line. All template lines are kept unchanged otherwise.
    pub fn render(
        &self,
        sequence: &DnaSequence,
        structure: &SecondaryStructure,
    ) -> Result<String, PipelineError> {
        let substituted = self.text.replace(SEQUENCE_TOKEN, &sequence.to_string());
        let lines: Vec<&str> = substituted.lines().collect();
        let anchor = lines
            .iter()
            .position(|line| line.trim() == PAIR_ANCHOR)
            .ok_or_else(|| PipelineError::TemplateAnchorNotFound {
                anchor: PAIR_ANCHOR.to_string(),
                path: self.path.clone(),
            })?;

        let directives = structure
            .pairs()
            .iter()
            .map(|pair| pair_directive(pair.i, pair.j));

        let mut script: Vec<String> = Vec::with_capacity(lines.len() + structure.pairs().len());
        script.extend(lines[..=anchor].iter().map(|s| s.to_string()));
        script.extend(directives);
        script.extend(lines[anchor + 1..].iter().map(|s| s.to_string()));

        let mut rendered = script.join("\n");
        rendered.push('\n');
        Ok(rendered)
    }
}

/// The external coarse-grained folding engine.
pub trait FoldingRunner {
    fn name(&self) -> &str;

    /// Executes `script` inside the run directory. On success the engine has written its final
    /// frame to the run directory.
    fn run(&self, script: &Path, ctx: &RunContext) -> Result<(), PipelineError>;
}

/// Runs the folding engine binary as `<exe> -c <script>` in the run directory.
#[derive(Debug, Clone)]
pub struct MmbRunner {
    executable: PathBuf,
}

impl MmbRunner {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }
}

impl FoldingRunner for MmbRunner {
    fn name(&self) -> &str {
        "MMB"
    }

    fn run(&self, script: &Path, ctx: &RunContext) -> Result<(), PipelineError> {
        let log_path = artifacts::ensure_outfiles(ctx)?.join(FOLD_LOG);
        let log = File::create(&log_path).map_err(|e| PipelineError::io(&log_path, e))?;
        let log_err = log
            .try_clone()
            .map_err(|e| PipelineError::io(&log_path, e))?;

        let mut command = Command::new(&self.executable);
        command
            .arg("-c")
            .arg(script)
            .current_dir(&ctx.work_dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err);
        if let Some(lib) = &ctx.library_path {
            command.env(LIBRARY_PATH_VAR, lib);
        }

        debug!(command = ?command, "Launching folding engine.");
        let status = command.status().map_err(|e| {
            PipelineError::engine_failure(self.name(), "failed to start", &e.to_string())
        })?;
        if !status.success() {
            let log_text = fs::read_to_string(&log_path).unwrap_or_default();
            return Err(PipelineError::engine_failure(self.name(), status, &log_text));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FoldingInput {
    pub sequence: DnaSequence,
    pub structure: SecondaryStructure,
    pub template: PathBuf,
    pub prefold_override: PathBuf,
    pub script: PathBuf,
    pub engine_output: PathBuf,
    pub folded: PathBuf,
}

impl FoldingInput {
    pub fn in_run(sequence: DnaSequence, structure: SecondaryStructure, ctx: &RunContext) -> Self {
        Self {
            sequence,
            structure,
            template: ctx.path(COMMAND_TEMPLATE),
            prefold_override: ctx.path(PREFOLD_OVERRIDE),
            script: ctx.path(FOLD_SCRIPT),
            engine_output: ctx.path(ENGINE_FRAME),
            folded: ctx.path(FOLDED_STRUCTURE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedStructure {
    pub path: PathBuf,
    pub from_override: bool,
}

pub struct FoldingStage<'a> {
    runner: &'a dyn FoldingRunner,
}

impl<'a> FoldingStage<'a> {
    pub fn new(runner: &'a dyn FoldingRunner) -> Self {
        Self { runner }
    }
}

impl StageAdapter for FoldingStage<'_> {
    type Input = FoldingInput;
    type Output = FoldedStructure;

    fn name(&self) -> &'static str {
        "folding"
    }

    #[instrument(skip_all, name = "folding_stage")]
    fn execute(
        &self,
        input: &Self::Input,
        ctx: &RunContext,
    ) -> Result<StageOutput<Self::Output>, PipelineError> {
        let started = Instant::now();

        if input.prefold_override.exists() {
            info!("Using pre-folded structure {:?}.", input.prefold_override);
            artifacts::copy(&input.prefold_override, &input.folded)?;
            return Ok(StageOutput {
                artifacts: FoldedStructure {
                    path: input.folded.clone(),
                    from_override: true,
                },
                diagnostics: StageDiagnostics::new(self.name(), started.elapsed())
                    .with_note(format!("folding bypassed by {PREFOLD_OVERRIDE}")),
            });
        }

        let template_path =
            artifacts::require(self.name(), "command template", input.template.clone())?;
        let script =
            CommandTemplate::load(&template_path)?.render(&input.sequence, &input.structure)?;
        fs::write(&input.script, script).map_err(|e| PipelineError::io(&input.script, e))?;
        info!(
            pairs = input.structure.pairs().len(),
            engine = self.runner.name(),
            "Folding sequence."
        );

        // A stale frame from an interrupted attempt must not be mistaken for fresh output.
        if input.engine_output.exists() {
            fs::remove_file(&input.engine_output)
                .map_err(|e| PipelineError::io(&input.engine_output, e))?;
        }
        self.runner.run(&input.script, ctx)?;

        if !input.engine_output.exists() {
            return Err(PipelineError::malformed_output(
                self.runner.name(),
                format!("expected output {:?} was not written", input.engine_output),
            ));
        }
        artifacts::relabel(&input.engine_output, &input.folded)?;

        Ok(StageOutput {
            artifacts: FoldedStructure {
                path: input.folded.clone(),
                from_override: false,
            },
            diagnostics: StageDiagnostics::new(self.name(), started.elapsed()),
        })
    }
}
