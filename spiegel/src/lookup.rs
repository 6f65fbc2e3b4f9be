use std::sync::Arc;

use crate::dispatch::DispatchError;
use crate::registry::{MethodDef, ParamSpec, PropertyDef, Registry};
use crate::{CallShape, OpKind, ParamFlags, TypeTag};

/// The member a call shape resolved to.
#[derive(Debug, Clone)]
pub enum Resolution {
    Property(Arc<PropertyDef>),
    Method(Arc<MethodDef>),
    /// Receiver is a dynamic object; the member lives in the instance's
    /// own slot table and is looked up per call, not per type.
    DynamicSlot,
}

/// Resolve `shape` against the registered members of its receiver tag.
///
/// Pure: the same registry content and shape always resolve to the same
/// member. Candidate enumeration uses the receiver's runtime tag only;
/// whatever narrower type the caller knew statically never participates.
pub fn resolve(
    registry: &Registry,
    shape: &CallShape,
) -> Result<Resolution, DispatchError> {
    if shape.receiver == TypeTag::Object {
        return Ok(Resolution::DynamicSlot);
    }

    match shape.op {
        OpKind::Get => {
            let property = registry
                .property(shape.receiver, &shape.name)
                .filter(|p| p.is_gettable())
                .ok_or_else(|| no_match(shape))?;
            Ok(Resolution::Property(property))
        }
        OpKind::Set => {
            let property = registry
                .property(shape.receiver, &shape.name)
                .filter(|p| p.is_settable())
                .ok_or_else(|| no_match(shape))?;
            Ok(Resolution::Property(property))
        }
        OpKind::Invoke | OpKind::InvokeVoid => {
            resolve_overload(registry, shape)
        }
    }
}

/// Score every same-named overload and keep the single best one.
///
/// An exact tag match outranks a widening conversion, which outranks the
/// catch-all `Any` parameter. Scores sum across positions; two candidates
/// tied at the best score are ambiguous rather than arbitrarily ordered.
fn resolve_overload(
    registry: &Registry,
    shape: &CallShape,
) -> Result<Resolution, DispatchError> {
    let mut best: Option<(u32, Arc<MethodDef>)> = None;
    let mut tied = false;

    for candidate in registry.overloads(shape.receiver, &shape.name) {
        let Some(score) =
            match_params(&candidate.params, &shape.args, &shape.dirs)
        else {
            continue;
        };
        match best.as_ref().map(|(top, _)| *top) {
            Some(top) if score > top => {
                best = Some((score, candidate));
                tied = false;
            }
            Some(top) if score == top => tied = true,
            Some(_) => {}
            None => {
                best = Some((score, candidate));
                tied = false;
            }
        }
    }

    let Some((score, chosen)) = best else {
        return Err(no_match(shape));
    };
    if tied {
        log::trace!(
            "ambiguous overloads for `{}` on {} at score {score}",
            shape.name,
            shape.receiver.name()
        );
        return Err(DispatchError::AmbiguousMatch {
            receiver: shape.receiver,
            name: shape.name.clone(),
        });
    }
    if shape.op == OpKind::Invoke && !chosen.has_return {
        return Err(DispatchError::VoidReturnMismatch {
            name: shape.name.clone(),
        });
    }
    log::trace!(
        "resolved `{}` on {} to overload {:?} (score {score})",
        shape.name,
        shape.receiver.name(),
        chosen.params
    );
    Ok(Resolution::Method(chosen))
}

/// Compatibility score of one candidate signature, or `None` when arity,
/// a direction, or an argument type rules it out. Output-only positions
/// carry no input, so they contribute no type score.
pub(crate) fn match_params(
    params: &[ParamSpec],
    args: &[TypeTag],
    dirs: &[ParamFlags],
) -> Option<u32> {
    if params.len() != args.len() {
        return None;
    }
    let mut total = 0;
    for (i, param) in params.iter().enumerate() {
        if param.flags != dirs[i] {
            return None;
        }
        if param.flags == ParamFlags::OUT {
            continue;
        }
        total += param.ty.accepts(args[i])?.score();
    }
    Some(total)
}

fn no_match(shape: &CallShape) -> DispatchError {
    DispatchError::NoMatchingMember {
        receiver: shape.receiver,
        name: shape.name.clone(),
        op: shape.op,
    }
}
