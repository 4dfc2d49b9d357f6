// telemetry-gate-core/src/matcher/attribution.rs
// ============================================================================
// Module: Attribution Window
// Description: The shell-process and working-directory gates that isolate
//              events caused by the test body from ambient telemetry.
// ============================================================================

use crate::model::AttributionWindow;
use crate::model::EventPayload;
use crate::model::FileAction;
use crate::model::NormalizedEvent;
use crate::model::Stage;

/// A recognised runner marker: a shell invocation of the script the runner
/// wrote for a given stage, identified by the `artwork-T<tid>_<idx>-…`
/// working-directory prefix embedded in its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerMarker {
    /// Technique id parsed out of the marker path.
    pub technique_id: String,
    /// Test index parsed out of the marker path.
    pub test_index: u32,
    /// Stage this marker script belongs to.
    pub stage: Stage,
}

/// Recognises a cmdline as a runner marker for `(technique_id, test_index)`:
/// a shell invocation of a path containing `artwork-T<tid>_<idx>-` and
/// ending in `goart-T<tid>-<stage>.{sh,bash,ps1,bat}`.
#[must_use]
pub fn recognise_marker(cmdline: &str, technique_id: &str, test_index: u32) -> Option<RunnerMarker> {
    let work_dir_marker = format!("artwork-{technique_id}_{test_index}-");
    if !cmdline.contains(&work_dir_marker) {
        return None;
    }
    let looks_like_shell = ["bash", "sh ", "/sh", "powershell", "pwsh", "cmd"]
        .iter()
        .any(|needle| cmdline.contains(needle));
    if !looks_like_shell {
        return None;
    }
    let stage = if cmdline.contains(&format!("goart-{technique_id}-prereq")) {
        Stage::Prereq
    } else if cmdline.contains(&format!("goart-{technique_id}-cleanup")) {
        Stage::Cleanup
    } else if cmdline.contains(&format!("goart-{technique_id}-test")) {
        Stage::Test
    } else {
        return None;
    };
    Some(RunnerMarker {
        technique_id: technique_id.to_string(),
        test_index,
        stage,
    })
}

/// Applies a normalized event to the running attribution-window state,
/// updating the shell-process and working-directory gates. Returns whether
/// the event itself was a marker (and therefore never eligible to match
/// user criteria).
pub fn observe_event(
    window: &mut AttributionWindow,
    event: &NormalizedEvent,
    technique_id: &str,
    test_index: u32,
    work_dir: &str,
) -> bool {
    if let EventPayload::Process(p) = &event.payload {
        if let Some(marker) = recognise_marker(&p.cmdline, technique_id, test_index) {
            match marker.stage {
                Stage::Test if window.time_of_parent_shell == 0 => {
                    window.time_of_parent_shell = event.timestamp_ns;
                    window.shell_pid = p.pid;
                }
                Stage::Test => {}
                _ if window.time_of_parent_shell != 0 && window.time_of_next_stage == 0 => {
                    window.time_of_next_stage = event.timestamp_ns;
                }
                _ => {}
            }
            return true;
        }
    }

    if let EventPayload::File(f) = &event.payload {
        if f.target_path == work_dir {
            match f.action {
                FileAction::Create | FileAction::OpenWrite | FileAction::Rename => {
                    if window.time_work_dir_create == 0 {
                        window.time_work_dir_create = event.timestamp_ns;
                    }
                }
                FileAction::Delete => {
                    if window.time_work_dir_delete == 0 {
                        window.time_work_dir_delete = event.timestamp_ns;
                    }
                }
                _ => {}
            }
            return true;
        }
    }

    false
}

/// Both independently-enabled attribution gates, bundled for convenience so
/// callers can toggle them via configuration without threading two booleans
/// through every call site.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributionGates {
    /// Whether the shell-process gate is enabled.
    pub shell_gate_enabled: bool,
    /// Whether the working-directory gate is enabled.
    pub work_dir_gate_enabled: bool,
}

impl AttributionGates {
    /// Whether `event` is eligible for matching under the currently enabled
    /// gates and window state.
    #[must_use]
    pub fn is_eligible(&self, window: &AttributionWindow, event: &NormalizedEvent) -> bool {
        let shell_ok = !self.shell_gate_enabled || window.contains_shell(event.timestamp_ns);
        let work_dir_ok = !self.work_dir_gate_enabled || window.work_dir_gate_open();
        shell_ok && work_dir_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessFields;

    fn process_event(ts: i64, cmdline: &str, pid: i64) -> NormalizedEvent {
        NormalizedEvent {
            timestamp_ns: ts,
            mitre_techniques: vec![],
            payload: EventPayload::Process(ProcessFields {
                cmdline: cmdline.to_string(),
                pid,
                ..ProcessFields::default()
            }),
        }
    }

    #[test]
    fn attribution_window_isolates_test_stage_events() {
        let mut window = AttributionWindow::default();
        let events = [
            process_event(1, "/bin/bash -c warm-up", 100),
            process_event(
                2,
                "sh /tmp/artwork-T1560.002_3-458617291/goart-T1560.002-test.bash",
                200,
            ),
            process_event(3, "tar czf /tmp/x .", 201),
            process_event(
                4,
                "sh /tmp/artwork-T1560.002_3-458617291/goart-T1560.002-cleanup.bash",
                202,
            ),
            process_event(5, "/usr/bin/other", 203),
        ];
        let gates = AttributionGates {
            shell_gate_enabled: true,
            work_dir_gate_enabled: false,
        };
        let mut eligible_timestamps = Vec::new();
        for event in &events {
            let is_marker = observe_event(&mut window, event, "T1560.002", 3, "/tmp/x");
            if !is_marker && gates.is_eligible(&window, event) {
                eligible_timestamps.push(event.timestamp_ns);
            }
        }
        assert_eq!(eligible_timestamps, vec![3]);
    }
}
