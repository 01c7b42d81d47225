//! Overlay live state onto a pipeline definition

use crate::models::pipeline::{Action, Pipeline, Stage};

/// Merge `state` onto `definition`.
///
/// Stages and actions are matched by name, not position. Fields present in
/// the state win; fields it leaves empty keep the definition's value.
/// Entries that exist only in the state are dropped since the definition
/// owns the structure.
pub fn merge_state(definition: Pipeline, state: &Pipeline) -> Pipeline {
    let mut merged = definition;
    if state.version > 0 {
        merged.version = state.version;
    }

    for stage in merged.stages.iter_mut() {
        if let Some(live) = state.stage(&stage.name) {
            merge_stage(stage, live);
        }
    }

    merged
}

fn merge_stage(stage: &mut Stage, live: &Stage) {
    overlay(&mut stage.id, &live.id);
    overlay(&mut stage.status, &live.status);

    for action in stage.actions.iter_mut() {
        if let Some(live) = live.action(&action.name) {
            merge_action(action, live);
        }
    }
}

fn merge_action(action: &mut Action, live: &Action) {
    overlay(&mut action.id, &live.id);
    overlay(&mut action.action_type, &live.action_type);
    overlay(&mut action.status, &live.status);
    overlay(&mut action.details, &live.details);
    overlay(&mut action.status_time, &live.status_time);
    overlay(&mut action.branch, &live.branch);
    overlay(&mut action.repo, &live.repo);
}

fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}
