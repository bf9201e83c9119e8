//! Animation state replication.
//!
//! The authority publishes a looping state name and one-shot triggers. A
//! trigger is a name plus a counter, so firing the same trigger twice in a row
//! is still seen as two changes. Each node plays `anim:<name>` when it notices
//! either one.

use crate::error::BehaviorError;
use crate::replication::{keys, ChangeSet, Value};

use super::{ReconcileContext, StepContext};

/// Publish the looping animation state.
pub fn set_state(ctx: &mut StepContext<'_>, name: &str) -> Result<(), BehaviorError> {
    ctx.write(keys::ANIM_STATE, name)?;
    Ok(())
}

/// Fire a one-shot trigger.
pub fn fire_trigger(ctx: &mut StepContext<'_>, name: &str) -> Result<(), BehaviorError> {
    let seq = ctx
        .read(&keys::ANIM_TRIGGER_SEQ)
        .and_then(Value::as_int)
        .unwrap_or(0);
    ctx.write(keys::ANIM_TRIGGER, name)?;
    ctx.write(keys::ANIM_TRIGGER_SEQ, seq + 1)?;
    Ok(())
}

pub fn reconcile(changes: &ChangeSet, ctx: &ReconcileContext<'_>) {
    if let Some(state) = changes.current(&keys::ANIM_STATE).and_then(Value::as_text) {
        ctx.play_effect(&format!("anim:{state}"));
    }
    if changes.contains(&keys::ANIM_TRIGGER_SEQ) {
        if let Some(trigger) = ctx.read(&keys::ANIM_TRIGGER).and_then(Value::as_text) {
            ctx.play_effect(&format!("anim:{trigger}"));
        }
    }
}
