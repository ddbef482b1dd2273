//! Project instructions file: loading, system prompt assembly, and template creation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub const BASE_SYSTEM_PROMPT: &str =
    "You are Codybot, a CLI coding agent. Be concise and practical. Ask clarifying questions only when required.";

pub const DEFAULT_INSTRUCTIONS_PATH: &str = "agents.md";

#[derive(Debug, Error)]
pub enum InstructionsError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Project instructions folded into the system message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInstructions {
    label: String,
    content: String,
}

impl Default for ProjectInstructions {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS_PATH, String::new())
    }
}

impl ProjectInstructions {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the base prompt alone when the content is blank.
    pub fn system_prompt(&self) -> String {
        if self.content.trim().is_empty() {
            return BASE_SYSTEM_PROMPT.to_string();
        }

        format!(
            "{BASE_SYSTEM_PROMPT}\n\nProject instructions ({}):\n{}",
            self.label, self.content
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedInstructions {
    pub instructions: ProjectInstructions,
    pub file_exists: bool,
}

/// Reads the instructions file at `path`.
///
/// A missing file, a directory, or an unreadable file all yield empty
/// instructions; only a regular file counts as existing.
pub fn load_instructions(path: &Path) -> LoadedInstructions {
    let label = instructions_label(path);
    let file_exists = path.is_file();

    let content = if file_exists {
        match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read instructions file");
                String::new()
            }
        }
    } else {
        debug!(path = %path.display(), "instructions file not found");
        String::new()
    };

    LoadedInstructions {
        instructions: ProjectInstructions::new(label, content),
        file_exists,
    }
}

/// Writes [`default_template`] to `path`, creating parent directories.
pub fn write_template(path: &Path) -> Result<(), InstructionsError> {
    if let Some(parent) = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        fs::create_dir_all(parent).map_err(|source| InstructionsError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, default_template()).map_err(|source| InstructionsError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn default_template() -> &'static str {
    "# agents.md

## Mission
You are Codybot, a CLI coding agent. Keep responses concise and practical.

## Project context
- Describe the product and stack here.
- Note any constraints or policies.

## Workflow
- Prefer small, safe changes.
- Call out risks and unknowns.
- Summarize steps taken after each change.
"
}

fn instructions_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_INSTRUCTIONS_PATH.to_string())
}
