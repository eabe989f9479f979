//! The timeout sweep that an external periodic driver runs.

use crate::context::Context;
use crate::deposit::TimeoutCheck;
use crate::registry::ContractAddress;
use crate::registry::DepositRegistry;
use crate::state::DepositState;

/// What one sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// The deposits that moved, with the states they moved between.
    pub transitioned: Vec<(ContractAddress, DepositState, DepositState)>,
    /// The deposits whose timeout could not be applied.
    pub failed: Vec<(ContractAddress, crate::error::Error)>,
}

/// Apply every deadline that has passed, visiting each deposit once.
///
/// A deposit whose timeout fails to apply is reported and skipped. It
/// does not stop the sweep.
#[tracing::instrument(skip_all)]
pub fn sweep_timeouts<C: Context>(registry: &mut DepositRegistry, ctx: &C) -> SweepReport {
    let mut report = SweepReport::default();

    for deposit in registry.iter_mut() {
        let address = deposit.address();
        match deposit.notify_timeout(ctx) {
            Ok(TimeoutCheck::Transitioned { from, to }) => report.transitioned.push((address, from, to)),
            Ok(TimeoutCheck::NotElapsed | TimeoutCheck::NoDeadline) => {}
            Err(error) => {
                tracing::error!(deposit_address = %address, %error, "could not apply timeout");
                report.failed.push((address, error));
            }
        }
    }

    tracing::debug!(
        transitioned = report.transitioned.len(),
        failed = report.failed.len(),
        "timeout sweep finished"
    );
    report
}
