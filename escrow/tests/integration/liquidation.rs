use bitcoin::hashes::sha256d;
use bitcoin::hashes::Hash as _;
use escrow::error::Error;
use escrow::events::Event;
use escrow::state::DepositState;
use escrow::testing;
use escrow::testing::LedgerOperation;
use escrow::testing::TestContext;
use escrow::testing::LOT_SIZE;

#[test]
fn a_price_drop_walks_the_deposit_into_liquidation() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    // Bonds worth 150% of the lot at one unit per satoshi.
    ctx.custody.set_bonded_value(u128::from(LOT_SIZE) * 3 / 2);

    assert!(matches!(
        deposit.notify_courtesy_call(&ctx),
        Err(Error::CollateralCheckFailed { collateralization: 150, .. })
    ));

    ctx.price_feed.set_price(5);
    assert_eq!(deposit.collateralization_percent(&ctx).unwrap(), 30);
    deposit.notify_courtesy_call(&ctx).unwrap();
    deposit.notify_undercollateralized_liquidation(&ctx).unwrap();

    assert_eq!(deposit.state(), DepositState::Liquidated);
    assert_eq!(
        ctx.transitions_of(deposit.address()).last(),
        Some(&(DepositState::CourtesyCall, DepositState::Liquidated))
    );
    let last = ctx.ledger.entries().pop().unwrap();
    assert_eq!(last.operation, LedgerOperation::SettleLiquidation);
    assert_eq!(last.amount, LOT_SIZE);
}

#[test]
fn liquidated_deposits_accept_nothing() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    ctx.custody.set_bonded_value(0);
    deposit.notify_undercollateralized_liquidation(&ctx).unwrap();
    let before = deposit.clone();

    assert!(deposit.notify_courtesy_call(&ctx).is_err());
    assert!(deposit.request_redemption(&ctx, 1_000, testing::redeemer_script()).is_err());
    assert!(deposit.notify_undercollateralized_liquidation(&ctx).is_err());
    assert!(deposit.provide_ecdsa_fraud_proof(&ctx, &[1; 64], b"x").is_err());
    ctx.advance_clock(u64::from(u32::MAX));
    deposit.notify_timeout(&ctx).unwrap();

    assert_eq!(deposit, before);
}

#[test]
fn fraud_during_a_pending_redemption_liquidates() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    let digest = deposit
        .request_redemption(&ctx, LOT_SIZE - 3_000, testing::redeemer_script())
        .unwrap();
    deposit
        .provide_redemption_signature(&ctx, &ctx.custody.sign(digest))
        .unwrap();

    let preimage = b"a second spend of the funding output";
    let fraudulent = sha256d::Hash::hash(preimage).to_byte_array();
    deposit
        .provide_ecdsa_fraud_proof(&ctx, &ctx.custody.sign(fraudulent), preimage)
        .unwrap();

    assert_eq!(deposit.state(), DepositState::Liquidated);
    assert!(ctx.events().contains(&Event::FraudDetected {
        deposit_address: deposit.address(),
        digest: hex::encode(fraudulent),
    }));
}
