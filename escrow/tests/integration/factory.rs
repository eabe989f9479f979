use escrow::deposit::Progress;
use escrow::error::Error;
use escrow::events::Event;
use escrow::factory::DepositFactory;
use escrow::registry::ContractAddress;
use escrow::registry::DepositRegistry;
use escrow::state::DepositState;
use escrow::testing;
use escrow::testing::TestContext;
use escrow::testing::LOT_SIZE;
use spv::testing::fixtures;

const FACTORY: ContractAddress = ContractAddress::new([0x0f; 20]);

fn setup() -> (TestContext, DepositRegistry, DepositFactory) {
    let ctx = TestContext::new();
    let mut registry = DepositRegistry::new();
    let factory = DepositFactory::new(FACTORY, &mut registry).unwrap();
    (ctx, registry, factory)
}

#[test_log::test]
fn funding_one_clone_leaves_the_other_waiting() {
    let (ctx, mut registry, mut factory) = setup();
    ctx.relay.set(fixtures::EPOCH_DIFFICULTY, fixtures::EPOCH_DIFFICULTY);
    let (x, y) = testing::mainnet_signer_coordinates();
    ctx.custody.publish_coordinates(x, y);

    let first = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    let second = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    for address in [first, second] {
        let progress = registry.get_mut(&address).unwrap().retrieve_signer_pubkey(&ctx).unwrap();
        assert_eq!(progress, Progress::Advanced(DepositState::AwaitingBtcFundingProof));
    }

    let proof = testing::mainnet_funding_proof();
    registry.get_mut(&second).unwrap().provide_btc_funding_proof(&ctx, &proof).unwrap();

    let first = registry.get(&first).unwrap();
    let second = registry.get(&second).unwrap();
    assert_eq!(first.state(), DepositState::AwaitingBtcFundingProof);
    assert!(first.funding().is_none());
    assert_eq!(second.state(), DepositState::Active);
    let funding = second.funding().unwrap();
    assert_eq!(funding.txid.to_string(), fixtures::FUNDING_TXID);
    assert_eq!(funding.utxo_value, fixtures::FUNDING_VALUE_SATS);
    assert_eq!(
        registry.get(&factory.template_address()).unwrap().state(),
        DepositState::Start
    );
}

#[test]
fn a_fee_one_below_the_quote_creates_nothing() {
    let (ctx, mut registry, mut factory) = setup();

    let err = factory
        .create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE - 1)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::InsufficientFee { provided, required }
            if provided == testing::OPEN_FEE - 1 && required == testing::OPEN_FEE
    ));
    assert_eq!(registry.len(), 1);
    assert!(ctx.custody.groups().is_empty());
    assert!(ctx.events().is_empty());
}

#[test]
fn the_whole_fee_is_forwarded() {
    let (ctx, mut registry, mut factory) = setup();

    factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    factory
        .create_deposit(&ctx, &mut registry, 1_000_000, testing::OPEN_FEE + 500)
        .unwrap();

    assert_eq!(ctx.custody.fees_received(), vec![testing::OPEN_FEE, testing::OPEN_FEE + 500]);
    let lot_sizes: Vec<u64> = ctx.custody.groups().into_iter().map(|(_, group)| group.lot_size).collect();
    assert_eq!(lot_sizes, vec![LOT_SIZE, 1_000_000]);
}

#[test]
fn creation_events_carry_the_clone_address() {
    let (ctx, mut registry, mut factory) = setup();

    let address = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();

    assert_eq!(
        ctx.events(),
        vec![
            Event::StateTransition {
                deposit_address: address,
                old_state: DepositState::Start,
                new_state: DepositState::AwaitingSignerSetup,
            },
            Event::DepositCloneCreated { deposit_address: address },
        ]
    );
}

#[test]
fn clones_never_observe_each_other() {
    let (ctx, mut registry, mut factory) = setup();
    let first = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    let second = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();

    let second_before = registry.get(&second).unwrap().clone();
    let template_before = registry.get(&factory.template_address()).unwrap().clone();

    ctx.custody.publish_secret_key(testing::signer_secret_key());
    ctx.advance_clock(60);
    let deposit = registry.get_mut(&first).unwrap();
    deposit.retrieve_signer_pubkey(&ctx).unwrap();
    let script = deposit.signer_pubkey().unwrap().signer_script();
    let tx = testing::funding_transaction(&script, LOT_SIZE);
    deposit.provide_btc_funding_proof(&ctx, &testing::funding_proof(&tx, 0)).unwrap();
    assert_eq!(deposit.state(), DepositState::Active);

    assert_eq!(registry.get(&second).unwrap(), &second_before);
    assert_eq!(registry.get(&factory.template_address()).unwrap(), &template_before);
}

#[test]
fn the_template_can_be_driven_on_its_own() {
    let (ctx, mut registry, mut factory) = setup();
    let clone = factory.create_deposit(&ctx, &mut registry, LOT_SIZE, testing::OPEN_FEE).unwrap();
    let clone_before = registry.get(&clone).unwrap().clone();

    let template = registry.get_mut(&factory.template_address()).unwrap();
    template.initialize(&ctx, 1_000_000, testing::OPEN_FEE).unwrap();
    assert_eq!(template.state(), DepositState::AwaitingSignerSetup);
    assert_eq!(template.lot_size(), 1_000_000);

    assert_eq!(registry.get(&clone).unwrap(), &clone_before);
}
