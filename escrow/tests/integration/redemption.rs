use escrow::deposit;
use escrow::deposit::Progress;
use escrow::events::Event;
use escrow::factory::DepositFactory;
use escrow::registry::ContractAddress;
use escrow::registry::DepositRegistry;
use escrow::state::DepositState;
use escrow::testing;
use escrow::testing::LedgerOperation;
use escrow::testing::TestContext;
use escrow::testing::LOT_SIZE;

#[test_log::test]
fn a_deposit_runs_from_creation_to_redemption() {
    let ctx = TestContext::new();
    let mut registry = DepositRegistry::new();
    let mut factory = DepositFactory::new(ContractAddress::new([0x10; 20]), &mut registry).unwrap();
    let address = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    let deposit = registry.get_mut(&address).unwrap();

    assert_eq!(deposit.retrieve_signer_pubkey(&ctx).unwrap(), Progress::NotReady);
    ctx.custody.publish_secret_key(testing::signer_secret_key());
    deposit.retrieve_signer_pubkey(&ctx).unwrap();

    let funding_tx = testing::funding_transaction(&deposit.signer_pubkey().unwrap().signer_script(), LOT_SIZE);
    deposit
        .provide_btc_funding_proof(&ctx, &testing::funding_proof(&funding_tx, 0))
        .unwrap();

    let output_value = LOT_SIZE - 5_000;
    let redeemer = testing::redeemer_script();
    deposit.request_redemption(&ctx, output_value, redeemer.clone()).unwrap();
    ctx.custody.set_auto_sign(true);
    assert_eq!(
        deposit.retrieve_redemption_signature(&ctx).unwrap(),
        Progress::Advanced(DepositState::AwaitingWithdrawalProof)
    );

    let outpoint = deposit.funding().unwrap().outpoint;
    let redemption_tx = deposit::unsigned_redemption_transaction(outpoint, output_value, &redeemer);
    deposit
        .provide_redemption_proof(&ctx, &testing::inclusion_proof(&redemption_tx))
        .unwrap();
    assert_eq!(deposit.state(), DepositState::Redeemed);

    let expected = [
        (DepositState::Start, DepositState::AwaitingSignerSetup),
        (DepositState::AwaitingSignerSetup, DepositState::AwaitingBtcFundingProof),
        (DepositState::AwaitingBtcFundingProof, DepositState::Active),
        (DepositState::Active, DepositState::AwaitingWithdrawalSignature),
        (DepositState::AwaitingWithdrawalSignature, DepositState::AwaitingWithdrawalProof),
        (DepositState::AwaitingWithdrawalProof, DepositState::Redeemed),
    ];
    assert_eq!(ctx.transitions_of(address), expected);

    let ledger: Vec<_> = ctx
        .ledger
        .entries()
        .into_iter()
        .map(|entry| (entry.operation, entry.deposit, entry.amount))
        .collect();
    assert_eq!(
        ledger,
        vec![
            (LedgerOperation::Mint, address, LOT_SIZE),
            (LedgerOperation::Burn, address, LOT_SIZE),
        ]
    );
}

#[test]
fn redemption_is_possible_during_a_courtesy_call() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    ctx.custody.set_bonded_value(u128::from(LOT_SIZE));
    deposit.notify_courtesy_call(&ctx).unwrap();

    let digest = deposit
        .request_redemption(&ctx, LOT_SIZE - 2_000, testing::redeemer_script())
        .unwrap();
    deposit
        .provide_redemption_signature(&ctx, &ctx.custody.sign(digest))
        .unwrap();

    assert_eq!(deposit.state(), DepositState::AwaitingWithdrawalProof);
    assert!(ctx.events().contains(&Event::GotRedemptionSignature {
        deposit_address: deposit.address(),
        digest: hex::encode(digest),
    }));
}

#[test]
fn lifecycle_ranks_never_decrease() {
    let ctx = TestContext::new();
    let (mut deposit, _) = testing::funded_deposit(&ctx);
    ctx.custody.set_bonded_value(u128::from(LOT_SIZE));
    deposit.notify_courtesy_call(&ctx).unwrap();
    ctx.custody.set_bonded_value(u128::from(LOT_SIZE) * 2);
    deposit.exit_courtesy_call(&ctx).unwrap();
    let digest = deposit
        .request_redemption(&ctx, LOT_SIZE - 2_000, testing::redeemer_script())
        .unwrap();
    deposit
        .provide_redemption_signature(&ctx, &ctx.custody.sign(digest))
        .unwrap();

    for (old_state, new_state) in ctx.transitions_of(deposit.address()) {
        match (old_state.rank(), new_state.rank()) {
            (Some(old), Some(new)) => assert!(new >= old, "{old_state} -> {new_state}"),
            _ => assert!(new_state.is_failure(), "{old_state} -> {new_state}"),
        }
    }
}
