//! Recoverable faults raised on the calling thread

use std::cell::RefCell;
use std::collections::HashMap;
use std::hint::black_box;

use crashlab_core::domain::FaultError;
use tracing::info;

use super::OrRaise;
use crate::catalog::FaultArgs;
use crate::context::FaultContext;

pub(crate) fn null_ref(_ctx: &FaultContext, _args: &FaultArgs) {
    let target: Option<String> = black_box(None);
    let len = target
        .as_deref()
        .map(str::len)
        .ok_or_else(|| FaultError::NullReference("target".to_string()))
        .or_raise();
    info!(len, "Null reference target resolved");
}

pub(crate) fn div_zero(_ctx: &FaultContext, _args: &FaultArgs) {
    let divisor: i32 = black_box("0").parse().unwrap_or_default();
    let result = 1i32
        .checked_div(divisor)
        .ok_or(FaultError::DivideByZero)
        .or_raise();
    info!(result, "Division produced a result");
}

pub(crate) fn unhandled(_ctx: &FaultContext, _args: &FaultArgs) {
    FaultError::Unhandled("CrashLab: unhandled exception".to_string()).raise()
}

pub(crate) fn index_out_of_range(_ctx: &FaultContext, _args: &FaultArgs) {
    let values = [0i32; 1];
    let index = black_box(2usize);
    let value = values
        .get(index)
        .copied()
        .ok_or(FaultError::IndexOutOfRange {
            index,
            len: values.len(),
        })
        .or_raise();
    info!(value, "Index lookup produced a value");
}

pub(crate) fn key_not_found(_ctx: &FaultContext, _args: &FaultArgs) {
    let map: HashMap<String, i32> = HashMap::new();
    let key = black_box("missing");
    let value = map
        .get(key)
        .copied()
        .ok_or_else(|| FaultError::KeyNotFound(key.to_string()))
        .or_raise();
    info!(value, "Key lookup produced a value");
}

/// Appends to a list while iterating it.
pub(crate) fn invalid_operation(_ctx: &FaultContext, _args: &FaultArgs) {
    let list = RefCell::new(vec![1, 2, 3]);
    for _ in list.borrow().iter() {
        list.try_borrow_mut()
            .map_err(|e| {
                FaultError::ConcurrentModification(format!(
                    "enumeration operation may not execute ({e})"
                ))
            })
            .or_raise()
            .push(4);
    }
}

/// Two concurrent workers fail; their errors are flattened into one.
pub(crate) fn aggregate(_ctx: &FaultContext, _args: &FaultArgs) {
    let failures: Vec<FaultError> = std::thread::scope(|scope| {
        let t1 = scope.spawn(|| -> Result<(), FaultError> {
            Err(FaultError::InvalidOperation("t1".to_string()))
        });
        let t2 = scope.spawn(|| -> Result<(), FaultError> {
            Err(FaultError::InvalidArgument("t2".to_string()))
        });

        [t1, t2]
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(FaultError::Unhandled(
                    crashlab_core::domain::panic_message(payload.as_ref()),
                )),
            })
            .collect()
    });

    if !failures.is_empty() {
        FaultError::Aggregate(flatten(failures)).raise();
    }
}

/// Splices nested aggregates into a single level.
pub(crate) fn flatten(errors: Vec<FaultError>) -> Vec<FaultError> {
    errors
        .into_iter()
        .flat_map(|e| match e {
            FaultError::Aggregate(inner) => flatten(inner),
            other => vec![other],
        })
        .collect()
}
