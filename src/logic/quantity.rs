use crate::model::{QuantityChange, QuantityOutcome};

/// Largest relative step a single request may apply
pub const MAX_DELTA: i32 = 10_000;

/// Resolve a change against the stored quantity.
///
/// Results outside `0..=i32::MAX` are rejected, never clamped, so callers
/// can tell a refused change apart from a successful write.
pub fn resolve_change(current: i32, change: QuantityChange) -> QuantityOutcome {
    let attempted = match change {
        QuantityChange::Delta(delta) => i64::from(current) + i64::from(delta),
        QuantityChange::Set(target) => i64::from(target),
    };

    if attempted < 0 {
        return QuantityOutcome::Rejected { current, attempted };
    }

    match i32::try_from(attempted) {
        Ok(quantity) => QuantityOutcome::Updated {
            previous: current,
            quantity,
        },
        Err(_) => QuantityOutcome::OutOfRange { current, attempted },
    }
}

/// Shape checks that do not need the stored value
pub fn validate_change(change: QuantityChange) -> Result<(), String> {
    match change {
        QuantityChange::Delta(0) => Err("delta must be non-zero".to_string()),
        QuantityChange::Delta(delta) if delta.abs() > MAX_DELTA => {
            Err(format!("delta must be between -{0} and {0}", MAX_DELTA))
        }
        _ => Ok(()),
    }
}
