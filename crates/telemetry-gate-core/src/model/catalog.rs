// telemetry-gate-core/src/model/catalog.rs
// ============================================================================
// Module: Catalog Data Model
// Description: Types describing one atomic test as loaded from the catalog.
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::model::identifiers::TechniqueId;
use crate::model::identifiers::TestGuid;

/// A supported target platform for an atomic test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux.
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
    /// FreeBSD.
    Freebsd,
}

impl Platform {
    /// Parses a platform name, case-insensitively, accepting the common
    /// spellings used in catalog YAML (`macos`, `darwin`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "macos" | "darwin" => Some(Self::Macos),
            "windows" => Some(Self::Windows),
            "freebsd" => Some(Self::Freebsd),
            _ => None,
        }
    }
}

/// One entry in `TestCase::input_args`: a declared argument with its default
/// value, human-readable description, and type hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputArg {
    /// Default value substituted when the caller does not override it.
    pub default: Option<String>,
    /// Human-readable description, carried through for diagnostics only.
    pub description: String,
    /// Declared type hint (`string`, `path`, `url`, `integer`, ...); advisory
    /// only, not enforced by the loader.
    pub arg_type: String,
}

/// The interpreter used to execute a test's command, plus the command
/// itself. Interpreter kinds are a fixed closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// POSIX `bash`.
    Bash,
    /// POSIX `sh`.
    Sh,
    /// Windows `cmd.exe`.
    CommandPrompt,
    /// Windows PowerShell.
    Powershell,
}

impl ExecutorKind {
    /// Parses the catalog's `executor.name` field, returning `None` for an
    /// unrecognised interpreter so the caller can classify it as
    /// `InvalidArgs`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bash" => Some(Self::Bash),
            "sh" => Some(Self::Sh),
            "command_prompt" => Some(Self::CommandPrompt),
            "powershell" => Some(Self::Powershell),
            _ => None,
        }
    }

    /// The script file extension conventionally used for this interpreter.
    #[must_use]
    pub fn script_extension(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
            Self::CommandPrompt => "bat",
            Self::Powershell => "ps1",
        }
    }

    /// Default interpreter when the catalog leaves `executor.name` absent:
    /// `powershell` on Windows, `sh` elsewhere.
    #[must_use]
    pub fn default_for_host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Powershell
        } else {
            Self::Sh
        }
    }
}

/// The executable body of a test: interpreter, command, optional cleanup,
/// and whether elevated privileges are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executor {
    /// Interpreter kind, if recognised; `None` preserves an unknown name for
    /// reporting rather than guessing.
    pub kind: Option<ExecutorKind>,
    /// Raw interpreter name as it appeared in the catalog, for diagnostics.
    pub raw_name: String,
    /// The test command, before argument interpolation.
    pub command: String,
    /// The cleanup command, before argument interpolation.
    pub cleanup_command: Option<String>,
    /// Whether the test requires elevated (root/admin) privileges.
    pub elevation_required: bool,
}

/// One step required before a test can run: a check and, on failure, an
/// install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Human-readable description of what this dependency provides.
    pub description: String,
    /// Script that exits zero when the dependency is already satisfied.
    pub check_script: String,
    /// Script that installs the dependency when the check fails.
    pub install_script: String,
}

/// The catalog's description of one atomic action, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Owning technique.
    pub technique_id: TechniqueId,
    /// 1-based position of this test within its technique.
    pub test_index: u32,
    /// 128-bit test identifier; first 8 hex characters are the short form.
    pub test_guid: TestGuid,
    /// Human-readable test name.
    pub display_name: String,
    /// Platforms this test is declared to support.
    pub supported_platforms: BTreeSet<Platform>,
    /// Declared arguments, in catalog order.
    pub input_args: Vec<(String, InputArg)>,
    /// Interpreter, command, and elevation requirement.
    pub executor: Executor,
    /// Name of the executor used to run dependency scripts, if distinct from
    /// the test's own executor.
    pub dependency_executor_name: Option<String>,
    /// Ordered prerequisites.
    pub dependencies: Vec<Dependency>,
    /// Whether the catalog YAML marked this test's GUID as machine
    /// generated rather than hand-authored.
    pub auto_generated_guid: bool,
}

impl TestCase {
    /// Looks up a declared input argument's default value by name.
    #[must_use]
    pub fn default_arg(&self, name: &str) -> Option<&str> {
        self.input_args
            .iter()
            .find(|(arg_name, _)| arg_name == name)
            .and_then(|(_, arg)| arg.default.as_deref())
    }

    /// Resolves the final effective argument map: catalog defaults
    /// overridden by `overrides`, in that precedence order.
    #[must_use]
    pub fn resolve_args(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut resolved: BTreeMap<String, String> = self
            .input_args
            .iter()
            .filter_map(|(name, arg)| arg.default.clone().map(|v| (name.clone(), v)))
            .collect();
        for (name, value) in overrides {
            resolved.insert(name.clone(), value.clone());
        }
        resolved
    }
}
