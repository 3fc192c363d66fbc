use super::{StageAdapter, StageDiagnostics, StageOutput};
use crate::core::models::secondary::SecondaryStructure;
use crate::core::models::sequence::DnaSequence;
use crate::engine::artifacts::{self, PREFOLD_OVERRIDE, SECONDARY_STRUCTURE};
use crate::engine::config::{ConditionsConfig, SecondaryStructureEngine};
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use crate::engine::process;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use tracing::{info, instrument, warn};

const KELVIN_OFFSET: f64 = 273.15;

/// An external secondary-structure predictor.
pub trait FoldingOracle {
    fn name(&self) -> &str;

    fn predict(
        &self,
        sequence: &DnaSequence,
        conditions: &ConditionsConfig,
    ) -> Result<SecondaryStructure, PipelineError>;
}

/// A predictor run as a subprocess that prints the dot-bracket structure on stdout.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    engine: SecondaryStructureEngine,
    executable: PathBuf,
}

impl CommandOracle {
    pub fn new(engine: SecondaryStructureEngine, executable: PathBuf) -> Self {
        Self { engine, executable }
    }

    pub fn engine(&self) -> SecondaryStructureEngine {
        self.engine
    }

    fn arguments(&self, sequence: &DnaSequence, conditions: &ConditionsConfig) -> Vec<String> {
        let celsius = format!("{:.2}", conditions.temperature_kelvin - KELVIN_OFFSET);
        match self.engine {
            SecondaryStructureEngine::Seqfold => {
                vec![sequence.to_string(), "-t".into(), celsius, "-d".into()]
            }
            SecondaryStructureEngine::Nupack => vec![
                sequence.to_string(),
                "--temperature".into(),
                celsius,
                "--sodium".into(),
                conditions.ionic_strength_molar.to_string(),
                "--material".into(),
                "dna".into(),
            ],
        }
    }
}

impl FoldingOracle for CommandOracle {
    fn name(&self) -> &str {
        match self.engine {
            SecondaryStructureEngine::Seqfold => "seqfold",
            SecondaryStructureEngine::Nupack => "nupack",
        }
    }

    fn predict(
        &self,
        sequence: &DnaSequence,
        conditions: &ConditionsConfig,
    ) -> Result<SecondaryStructure, PipelineError> {
        let mut command = Command::new(&self.executable);
        command.args(self.arguments(sequence, conditions));
        let output = process::run_captured(self.name(), &mut command)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let notation = find_dot_bracket(&stdout, sequence.len()).ok_or_else(|| {
            PipelineError::malformed_output(
                self.name(),
                format!(
                    "no dot-bracket line of length {} in output:\n{}",
                    sequence.len(),
                    stdout
                ),
            )
        })?;
        SecondaryStructure::from_dot_bracket(notation)
            .map_err(|e| PipelineError::malformed_output(self.name(), e))
    }
}

/// First line made only of dot-bracket symbols with the expected length.
fn find_dot_bracket(stdout: &str, length: usize) -> Option<&str> {
    stdout.lines().map(str::trim).find(|line| {
        line.chars().count() == length
            && line
                .chars()
                .all(|c| matches!(c, '.' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'))
    })
}

#[derive(Debug, Clone)]
pub struct SecondaryStructureInput {
    pub sequence: DnaSequence,
    pub conditions: ConditionsConfig,
    /// A structure dropped here bypasses prediction.
    pub prefold_override: PathBuf,
    pub output: PathBuf,
}

impl SecondaryStructureInput {
    pub fn in_run(sequence: DnaSequence, conditions: ConditionsConfig, ctx: &RunContext) -> Self {
        Self {
            sequence,
            conditions,
            prefold_override: ctx.path(PREFOLD_OVERRIDE),
            output: ctx.path(SECONDARY_STRUCTURE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictedStructure {
    pub structure: SecondaryStructure,
    pub path: PathBuf,
    pub from_override: bool,
}

pub struct SecondaryStructureStage<'a> {
    oracle: &'a dyn FoldingOracle,
}

impl<'a> SecondaryStructureStage<'a> {
    pub fn new(oracle: &'a dyn FoldingOracle) -> Self {
        Self { oracle }
    }

    fn from_override(
        &self,
        input: &SecondaryStructureInput,
    ) -> Result<SecondaryStructure, PipelineError> {
        if input.output.exists() {
            info!("Pre-folded structure present; reusing {:?}.", input.output);
            return artifacts::read_toml(&input.output);
        }
        info!("Pre-folded structure present; recording the strand as unpaired.");
        let structure = SecondaryStructure::unpaired(input.sequence.len());
        artifacts::write_toml(&input.output, &structure)?;
        Ok(structure)
    }
}

impl StageAdapter for SecondaryStructureStage<'_> {
    type Input = SecondaryStructureInput;
    type Output = PredictedStructure;

    fn name(&self) -> &'static str {
        "secondary-structure"
    }

    #[instrument(skip_all, name = "secondary_structure_stage")]
    fn execute(
        &self,
        input: &Self::Input,
        _ctx: &RunContext,
    ) -> Result<StageOutput<Self::Output>, PipelineError> {
        let started = Instant::now();

        if input.prefold_override.exists() {
            let structure = self.from_override(input)?;
            let diagnostics = StageDiagnostics::new(self.name(), started.elapsed())
                .with_note(format!("prediction bypassed by {PREFOLD_OVERRIDE}"));
            return Ok(StageOutput {
                artifacts: PredictedStructure {
                    structure,
                    path: input.output.clone(),
                    from_override: true,
                },
                diagnostics,
            });
        }

        info!(
            oracle = self.oracle.name(),
            length = input.sequence.len(),
            "Predicting secondary structure."
        );
        let structure = self.oracle.predict(&input.sequence, &input.conditions)?;
        if structure.len() != input.sequence.len() {
            return Err(PipelineError::malformed_output(
                self.oracle.name(),
                format!(
                    "structure covers {} bases, sequence has {}",
                    structure.len(),
                    input.sequence.len()
                ),
            ));
        }
        if structure.pairs().is_empty() {
            warn!("Predictor found no base pairs for {}.", input.sequence);
        }
        artifacts::write_toml(&input.output, &structure)?;
        info!(dot_bracket = %structure.dot_bracket(), "Secondary structure predicted.");

        let diagnostics = StageDiagnostics::new(self.name(), started.elapsed())
            .with_note(format!("{}: {}", self.oracle.name(), structure.dot_bracket()));
        Ok(StageOutput {
            artifacts: PredictedStructure {
                structure,
                path: input.output.clone(),
                from_override: false,
            },
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use tempfile::tempdir;

    struct FixedOracle {
        notation: &'static str,
        calls: Cell<usize>,
    }

    impl FoldingOracle for FixedOracle {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict(
            &self,
            _sequence: &DnaSequence,
            _conditions: &ConditionsConfig,
        ) -> Result<SecondaryStructure, PipelineError> {
            self.calls.set(self.calls.get() + 1);
            Ok(SecondaryStructure::from_dot_bracket(self.notation)?)
        }
    }

    fn conditions() -> ConditionsConfig {
        ConditionsConfig {
            temperature_kelvin: 298.0,
            ionic_strength_molar: 0.163,
            ph: 7.4,
        }
    }

    fn input_in(ctx: &RunContext, sequence: &str) -> SecondaryStructureInput {
        SecondaryStructureInput::in_run(sequence.parse().unwrap(), conditions(), ctx)
    }

    #[test]
    fn prediction_is_persisted_for_later_stages() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new(1, dir.path().to_path_buf(), None);
        let oracle = FixedOracle {
            notation: "((....))",
            calls: Cell::new(0),
        };
        let stage = SecondaryStructureStage::new(&oracle);

        let output = stage.execute(&input_in(&ctx, "GCATATGC"), &ctx).unwrap();
        assert_eq!(oracle.calls.get(), 1);
        assert!(!output.artifacts.from_override);

        let persisted: SecondaryStructure =
            artifacts::read_toml(&ctx.path(SECONDARY_STRUCTURE)).unwrap();
        assert_eq!(persisted, output.artifacts.structure);
        assert_eq!(persisted.dot_bracket(), "((....))");
    }

    #[test]
    fn prefold_override_skips_the_oracle() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new(1, dir.path().to_path_buf(), None);
        fs::write(ctx.path(PREFOLD_OVERRIDE), "ATOM\n").unwrap();
        let oracle = FixedOracle {
            notation: "((....))",
            calls: Cell::new(0),
        };

        let output = SecondaryStructureStage::new(&oracle)
            .execute(&input_in(&ctx, "GCATATGC"), &ctx)
            .unwrap();
        assert_eq!(oracle.calls.get(), 0);
        assert!(output.artifacts.from_override);
        assert_eq!(output.artifacts.structure.dot_bracket(), "........");
    }

    #[test]
    fn prefold_override_reuses_a_persisted_structure() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new(1, dir.path().to_path_buf(), None);
        fs::write(ctx.path(PREFOLD_OVERRIDE), "ATOM\n").unwrap();
        let cached = SecondaryStructure::from_dot_bracket("(......)").unwrap();
        artifacts::write_toml(&ctx.path(SECONDARY_STRUCTURE), &cached).unwrap();
        let oracle = FixedOracle {
            notation: "((....))",
            calls: Cell::new(0),
        };

        let output = SecondaryStructureStage::new(&oracle)
            .execute(&input_in(&ctx, "GCATATGC"), &ctx)
            .unwrap();
        assert_eq!(output.artifacts.structure, cached);
        assert_eq!(oracle.calls.get(), 0);
    }

    #[test]
    fn structure_of_wrong_length_is_malformed_output() {
        let dir = tempdir().unwrap();
        let ctx = RunContext::new(1, dir.path().to_path_buf(), None);
        let oracle = FixedOracle {
            notation: "(..)",
            calls: Cell::new(0),
        };
        let err = SecondaryStructureStage::new(&oracle)
            .execute(&input_in(&ctx, "GCATATGC"), &ctx)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EngineFailure { .. }));
        assert!(!ctx.path(SECONDARY_STRUCTURE).exists());
    }

    #[test]
    fn dot_bracket_line_is_found_among_other_output() {
        let stdout = "ATCGATCG\n  ((....))\n-1.3\n";
        assert_eq!(find_dot_bracket(stdout, 8), Some("((....))"));
        assert_eq!(find_dot_bracket(stdout, 9), None);
    }

    #[test]
    fn seqfold_arguments_use_celsius() {
        let oracle = CommandOracle::new(SecondaryStructureEngine::Seqfold, "seqfold".into());
        let args = oracle.arguments(&"ATCG".parse().unwrap(), &conditions());
        assert_eq!(args, vec!["ATCG", "-t", "24.85", "-d"]);
    }

    #[cfg(unix)]
    #[test]
    fn command_oracle_parses_subprocess_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let script = dir.path().join("fake-seqfold");
        fs::write(&script, "#!/bin/sh\necho \"$1\"\necho '((....))'\necho ' -2.1'\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let oracle = CommandOracle::new(SecondaryStructureEngine::Seqfold, script);
        let structure = oracle
            .predict(&"GCATATGC".parse().unwrap(), &conditions())
            .unwrap();
        assert_eq!(structure.pairs().len(), 2);
    }
}
