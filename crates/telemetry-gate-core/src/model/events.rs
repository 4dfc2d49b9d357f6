// telemetry-gate-core/src/model/events.rs
// ============================================================================
// Module: Normalized Event Data Model
// Description: The inbound event schema consumed by the matcher, one value
//              per line of `simple_telemetry<suffix>.json`.
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Process start payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessFields {
    /// Full command line.
    pub cmdline: String,
    /// Process id.
    pub pid: i64,
    /// Parent process id.
    pub parent_pid: i64,
    /// Resolved executable path, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe_path: Option<String>,
    /// Environment block, when captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Whether the process ran with elevated privileges.
    #[serde(default)]
    pub is_elevated: bool,
    /// Agent-assigned identifier unique across process restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_pid: Option<String>,
    /// Same identifier for the parent process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_unique_pid: Option<String>,
    /// Shared across processes piped together by a shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

/// Process exit payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessExitFields {
    /// Process exit code.
    pub exit_code: i32,
    /// Process id.
    pub pid: i64,
}

/// Normalized file-system action, the fixed closed set produced by every
/// telemetry tool regardless of native event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileAction {
    /// Opened or accessed read-only.
    OpenRead,
    /// Opened to modify, or updated.
    OpenWrite,
    /// Permission bits changed.
    Chmod,
    /// Ownership changed.
    Chown,
    /// Removed.
    Delete,
    /// Truncated.
    Truncate,
    /// Created.
    Create,
    /// Renamed or moved.
    Rename,
    /// Extended attributes changed.
    Chattr,
}

/// File event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFields {
    /// Normalized action.
    pub action: FileAction,
    /// Underlying syscall/API exit code.
    #[serde(default)]
    pub exit_code: i32,
    /// Path acted upon.
    pub target_path: String,
    /// Destination path, present for rename/move.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
    /// Resulting permission bits, when captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perm_flags: Option<String>,
    /// Acting process id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    /// Acting process's unique id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_pid: Option<String>,
    /// Acting process's executable path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe_path: Option<String>,
}

/// Network flow payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetflowFields {
    /// `proto:ip:port->ip:port`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_str: Option<String>,
    /// Same shape with the remote address resolved to a hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_dns: Option<String>,
    /// Flow flags, e.g. `"SE"` for start+end observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    /// Acting process id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    /// Acting process's unique id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_pid: Option<String>,
    /// Acting process's executable path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exe_path: Option<String>,
}

/// Body of an event whose `evt_type` is none of the codes with a dedicated
/// struct (Module, Alert, Auth, PTrace, Netsniff, Volume, Registry, Etw,
/// Amsi, Api). The original tag is kept alongside the raw JSON body so the
/// matcher can still discriminate kind and evaluate field predicates
/// against it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OtherFields {
    /// The `evt_type` value as it appeared on the wire, e.g. `"M"`, `"W"`.
    pub evt_type: String,
    /// Every other field on the event, untouched.
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// Kind-specific payload carried by a `NormalizedEvent`. `evt_type` is
/// internally tagged for the kinds with a dedicated struct; any other value
/// falls through to [`OtherFields`]. This dispatch is implemented by hand
/// (see the `Serialize`/`Deserialize` impls below) because serde's
/// `#[serde(other)]` catch-all only supports unit variants, and this one
/// needs to keep both the original tag and the event's remaining fields.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// `P` — process start.
    Process(ProcessFields),
    /// Process exit, reported with the `X!` code.
    ProcessExit(ProcessExitFields),
    /// `F` — file mutation.
    File(FileFields),
    /// `f` — file read.
    FileRead(FileFields),
    /// `N` — network flow.
    Netflow(NetflowFields),
    /// Any other kind, carried with its original tag alongside the raw body.
    Other(OtherFields),
}

impl Serialize for EventPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::Error as _;

        let value = match self {
            Self::Process(fields) => tag_value("P", fields),
            Self::ProcessExit(fields) => tag_value("X!", fields),
            Self::File(fields) => tag_value("F", fields),
            Self::FileRead(fields) => tag_value("f", fields),
            Self::Netflow(fields) => tag_value("N", fields),
            Self::Other(fields) => serde_json::to_value(fields).map_err(|e| S::Error::custom(e.to_string())),
        }?;
        value.serialize(serializer)
    }
}

fn tag_value<T: Serialize, E: serde::ser::Error>(tag: &str, fields: &T) -> Result<serde_json::Value, E> {
    let mut value = serde_json::to_value(fields).map_err(|e| E::custom(e.to_string()))?;
    if let serde_json::Value::Object(map) = &mut value {
        map.insert("evt_type".to_string(), serde_json::Value::String(tag.to_string()));
    }
    Ok(value)
}

impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let mut value = serde_json::Value::deserialize(deserializer)?;
        let object = value.as_object_mut().ok_or_else(|| D::Error::custom("expected a JSON object"))?;
        let evt_type = object
            .remove("evt_type")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| D::Error::custom("missing evt_type"))?;

        match evt_type.as_str() {
            "P" => serde_json::from_value(value).map(Self::Process).map_err(|e| D::Error::custom(e.to_string())),
            "X!" => serde_json::from_value(value).map(Self::ProcessExit).map_err(|e| D::Error::custom(e.to_string())),
            "F" => serde_json::from_value(value).map(Self::File).map_err(|e| D::Error::custom(e.to_string())),
            "f" => serde_json::from_value(value).map(Self::FileRead).map_err(|e| D::Error::custom(e.to_string())),
            "N" => serde_json::from_value(value).map(Self::Netflow).map_err(|e| D::Error::custom(e.to_string())),
            other => {
                let raw = match value {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                Ok(Self::Other(OtherFields { evt_type: other.to_string(), raw }))
            }
        }
    }
}

/// One line of `simple_telemetry<suffix>.json`: a normalized event ready
/// for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Nanosecond timestamp, monotonic within a batch.
    pub timestamp_ns: i64,
    /// MITRE technique tags the producing tool attached to this event, if
    /// any.
    #[serde(default)]
    pub mitre_techniques: Vec<String>,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl NormalizedEvent {
    /// The single-character kind code for this event, used in the compact
    /// match-string report.
    #[must_use]
    pub fn kind_char(&self) -> char {
        match &self.payload {
            EventPayload::Process(_) | EventPayload::ProcessExit(_) => 'P',
            EventPayload::File(_) => 'F',
            EventPayload::FileRead(_) => 'f',
            EventPayload::Netflow(_) => 'N',
            EventPayload::Other(fields) => {
                crate::model::EventKind::from_other_tag(&fields.evt_type).map_or('?', crate::model::EventKind::char_code)
            }
        }
    }

    /// Returns the process `cmdline` when this is a process-start event.
    #[must_use]
    pub fn cmdline(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Process(p) => Some(p.cmdline.as_str()),
            _ => None,
        }
    }
}
