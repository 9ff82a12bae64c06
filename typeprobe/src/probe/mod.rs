//! Operator probing
//!
//! Empirically decides, for every operator and every pair (or single) of
//! catalogued types, whether applying the operator to the dummy instances
//! completes. The answer is yes/no only: raised faults, timeouts, panics and
//! missing instances all read as "no".

pub mod dummy;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{FrozenCatalog, TypeIndex};
use crate::runtime::sandbox::Sandbox;
use crate::runtime::{BinaryOp, Runtime, UnaryOp};

pub use dummy::{DummyInstances, build_dummies, build_instance};

/// Compatibility tables for one probe run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorTables {
    /// `binary[op][left]` lists the right operands for which `left op right`
    /// completed. Row 0 (top type) is always empty.
    pub binary: Vec<Vec<Vec<TypeIndex>>>,
    /// `unary[op]` lists the operands for which `op operand` completed.
    pub unary: Vec<Vec<TypeIndex>>,
}

/// Probe every operator over every probed type of `catalog`.
pub fn probe_operators<R: Runtime>(
    sandbox: &mut Sandbox<R>,
    catalog: &FrozenCatalog,
    dummies: &DummyInstances<R::Value>,
    binary_ops: &[BinaryOp],
    unary_ops: &[UnaryOp],
) -> OperatorTables {
    let before = sandbox.stats();
    let mut tables = OperatorTables::default();

    for &op in binary_ops {
        let table = probe_binary(sandbox, catalog, dummies, op);
        debug!(
            op = op.symbol(),
            pairs = table.iter().map(Vec::len).sum::<usize>(),
            "binary operator probed"
        );
        tables.binary.push(table);
    }

    for &op in unary_ops {
        let row = probe_unary(sandbox, catalog, dummies, op);
        debug!(op = op.symbol(), operands = row.len(), "unary operator probed");
        tables.unary.push(row);
    }

    let after = sandbox.stats();
    info!(
        probes = after.total() - before.total(),
        completed = after.completed - before.completed,
        timed_out = after.timed_out - before.timed_out,
        panicked = after.panicked - before.panicked,
        "operator probing finished"
    );
    tables
}

/// One row per catalog index; row 0 stays empty.
pub fn probe_binary<R: Runtime>(
    sandbox: &mut Sandbox<R>,
    catalog: &FrozenCatalog,
    dummies: &DummyInstances<R::Value>,
    op: BinaryOp,
) -> Vec<Vec<TypeIndex>> {
    let mut rows = Vec::with_capacity(catalog.len());
    rows.push(Vec::new());
    for left in catalog.probe_indices() {
        let mut row = Vec::new();
        if let Some(lhs) = dummies.get(left) {
            for right in catalog.probe_indices() {
                let Some(rhs) = dummies.get(right) else {
                    continue;
                };
                let (lhs, rhs) = (lhs.clone(), rhs.clone());
                if sandbox
                    .invoke(move |rt: &R| rt.apply_binary(op, &lhs, &rhs).map(drop))
                    .is_ok()
                {
                    row.push(right);
                }
            }
        }
        rows.push(row);
    }
    rows
}

pub fn probe_unary<R: Runtime>(
    sandbox: &mut Sandbox<R>,
    catalog: &FrozenCatalog,
    dummies: &DummyInstances<R::Value>,
    op: UnaryOp,
) -> Vec<TypeIndex> {
    let mut row = Vec::new();
    for index in catalog.probe_indices() {
        let Some(operand) = dummies.get(index) else {
            continue;
        };
        let operand = operand.clone();
        if sandbox
            .invoke(move |rt: &R| rt.apply_unary(op, &operand).map(drop))
            .is_ok()
        {
            row.push(index);
        }
    }
    row
}
