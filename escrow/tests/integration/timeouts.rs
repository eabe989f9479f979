use escrow::deposit::TimeoutCheck;
use escrow::factory::DepositFactory;
use escrow::housekeeping;
use escrow::registry::ContractAddress;
use escrow::registry::DepositRegistry;
use escrow::state::DepositState;
use escrow::testing;
use escrow::testing::LedgerOperation;
use escrow::testing::TestContext;
use escrow::testing::LOT_SIZE;

#[test]
fn unfunded_deposits_time_out_through_the_sweep() {
    let ctx = TestContext::new();
    let mut registry = DepositRegistry::new();
    let mut factory = DepositFactory::new(ContractAddress::new([0x20; 20]), &mut registry).unwrap();
    let address = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    ctx.custody.publish_secret_key(testing::signer_secret_key());
    registry.get_mut(&address).unwrap().retrieve_signer_pubkey(&ctx).unwrap();

    let timeout = ctx.config.deposit.funding_proof_timeout.as_secs();
    ctx.advance_clock(timeout);
    assert!(housekeeping::sweep_timeouts(&mut registry, &ctx).transitioned.is_empty());

    ctx.advance_clock(1);
    let report = housekeeping::sweep_timeouts(&mut registry, &ctx);
    assert_eq!(
        report.transitioned,
        vec![(address, DepositState::AwaitingBtcFundingProof, DepositState::FundingTimedOut)]
    );
    assert!(registry.get(&address).unwrap().state().is_failure());
}

#[test]
fn unsigned_redemptions_liquidate() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    deposit
        .request_redemption(&ctx, LOT_SIZE - 2_000, testing::redeemer_script())
        .unwrap();

    ctx.advance_clock(ctx.config.deposit.redemption_signature_timeout.as_secs() + 1);
    assert_eq!(
        deposit.notify_timeout(&ctx).unwrap(),
        TimeoutCheck::Transitioned {
            from: DepositState::AwaitingWithdrawalSignature,
            to: DepositState::Liquidated,
        }
    );

    let operations: Vec<_> = ctx.ledger.entries().into_iter().map(|entry| entry.operation).collect();
    assert_eq!(operations, vec![LedgerOperation::Mint, LedgerOperation::SettleLiquidation]);
}

#[test]
fn the_proof_deadline_counts_from_the_request() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    let digest = deposit
        .request_redemption(&ctx, LOT_SIZE - 2_000, testing::redeemer_script())
        .unwrap();
    let proof_timeout = ctx.config.deposit.redemption_proof_timeout.as_secs();

    // Sign late, just before the signature deadline.
    ctx.advance_clock(ctx.config.deposit.redemption_signature_timeout.as_secs());
    deposit
        .provide_redemption_signature(&ctx, &ctx.custody.sign(digest))
        .unwrap();

    let requested_at = deposit.timers().withdrawal_requested_at.unwrap();
    ctx.set_time(requested_at + proof_timeout);
    assert_eq!(deposit.notify_timeout(&ctx).unwrap(), TimeoutCheck::NotElapsed);

    ctx.set_time(requested_at + proof_timeout + 1);
    assert_eq!(
        deposit.notify_timeout(&ctx).unwrap(),
        TimeoutCheck::Transitioned {
            from: DepositState::AwaitingWithdrawalProof,
            to: DepositState::Liquidated,
        }
    );
}

#[test]
fn courtesy_calls_that_are_not_answered_liquidate() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    ctx.custody.set_bonded_value(u128::from(LOT_SIZE));
    deposit.notify_courtesy_call(&ctx).unwrap();

    ctx.advance_clock(ctx.config.deposit.courtesy_call_timeout.as_secs() + 1);
    deposit.notify_timeout(&ctx).unwrap();
    assert_eq!(deposit.state(), DepositState::Liquidated);

    // A second nudge has nothing left to do.
    assert_eq!(deposit.notify_timeout(&ctx).unwrap(), TimeoutCheck::NoDeadline);
}
