use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use hwp_host_core::{GenerationError, GenerationOutput, GenerationService};
use tracing::{debug, instrument, warn};

/// Generation service backed by a command-line client.
///
/// Runs `<program> --model <model>`, writes the prompt to stdin and reads the
/// generated text from stdout. The call blocks until the process exits.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    model: String,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl GenerationService for CommandGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), level = "debug", fields(model = %self.model, prompt_len = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        let mut child = Command::new(&self.program)
            .arg("--model")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GenerationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from a separate thread so a chatty child cannot fill its
        // stdout pipe while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.to_owned();
            thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // A client that exits without reading its whole input is reported by its status.
                Ok(Err(e)) => debug!("Generator closed stdin early: {}", e),
                Err(_) => warn!("Prompt writer thread panicked"),
            }
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| GenerationError::Encoding)?;
        let diagnostics = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let status = output.status.code();

        if output.status.success() {
            debug!(bytes = stdout.len(), "Generator succeeded");
            Ok(GenerationOutput {
                text: stdout.trim().to_string(),
                success: true,
                status,
                diagnostics,
            })
        } else {
            warn!(?status, "Generator {} failed: {}", self.program, diagnostics);
            Ok(GenerationOutput::failed(status, diagnostics))
        }
    }
}
