use std::collections::BTreeMap;

use tracing::debug;

use crate::dyno::DynoType;
use crate::error::ValidationError;
use crate::formation::Formation;
use crate::options::TargetState;

/// Turn the declared dyno inputs into a canonical [`Formation`]
///
/// Inputs are ignored when `state` leaves no dynos running (`absent`,
/// `stopped`). Otherwise exactly one of `formation` or the `size`/`count` pair
/// must be given, and the resulting formation must allocate at least one dyno.
///
/// `present` never scales the application, so it allows a formation with zero
/// dynos, but the inputs must still be given and valid.
pub fn normalize(
    state: TargetState,
    formation: &BTreeMap<String, i64>,
    size: Option<DynoType>,
    count: Option<i64>,
) -> Result<Formation, ValidationError> {
    if state.implies_no_dynos() {
        return Ok(Formation::new());
    }

    let given_pair = size.is_some() || count.is_some();
    let normalized = match (formation.is_empty(), size, count) {
        (false, _, _) if given_pair => return Err(ValidationError::ConflictingInputs),
        (false, _, _) => canonical_formation(formation)?,
        (true, Some(size), Some(count)) => {
            if count < 0 {
                return Err(ValidationError::NegativeCount(count));
            }
            let quantity = quantity(size.as_str(), count)?;
            Formation::single(size, quantity)
        }
        _ => return Err(ValidationError::ConflictingInputs),
    };

    if state != TargetState::Present && normalized.total() == 0 {
        return Err(ValidationError::EmptyFormation);
    }

    debug!(formation = %normalized, "declared formation");
    Ok(normalized)
}

fn canonical_formation(formation: &BTreeMap<String, i64>) -> Result<Formation, ValidationError> {
    let mut seen = BTreeMap::new();
    for (name, count) in formation {
        let invalid = || ValidationError::InvalidFormation {
            dyno_type: name.clone(),
            quantity: *count,
        };

        let size = DynoType::canonicalize(name).ok_or_else(invalid)?;
        if *count < 0 || seen.contains_key(&size) {
            return Err(invalid());
        }
        seen.insert(size, quantity(name, *count)?);
    }
    Ok(seen.into())
}

fn quantity(name: &str, count: i64) -> Result<u32, ValidationError> {
    u32::try_from(count).map_err(|_| ValidationError::InvalidFormation {
        dyno_type: name.to_string(),
        quantity: count,
    })
}
