use escrow::deposit::Deposit;
use escrow::error::Error;
use escrow::error::FundingProofError;
use escrow::registry::ContractAddress;
use escrow::state::DepositState;
use escrow::testing;
use escrow::testing::TestContext;
use escrow::testing::LOT_SIZE;
use rand::Rng as _;
use spv::error::HeaderChainError;
use spv::testing::fixtures;
use test_case::test_case;

/// A deposit waiting for its funding proof. Unless `foreign_key` is set,
/// it is keyed to the mainnet fixture.
fn awaiting_mainnet_funding(ctx: &TestContext, foreign_key: bool) -> Deposit {
    ctx.relay.set(fixtures::EPOCH_DIFFICULTY, fixtures::EPOCH_DIFFICULTY);
    if foreign_key {
        ctx.custody.publish_secret_key(testing::signer_secret_key());
    } else {
        let (x, y) = testing::mainnet_signer_coordinates();
        ctx.custody.publish_coordinates(x, y);
    }

    let mut deposit = testing::initialized_deposit(ctx, ContractAddress::new([0xaa; 20]));
    deposit.retrieve_signer_pubkey(ctx).unwrap();
    deposit
}

fn assert_unchanged(ctx: &TestContext, deposit: &Deposit, before: &Deposit, events: usize) {
    assert_eq!(deposit, before);
    assert_eq!(deposit.state(), DepositState::AwaitingBtcFundingProof);
    assert!(deposit.funding().is_none());
    assert_eq!(ctx.events().len(), events);
    assert!(ctx.ledger.entries().is_empty());
}

#[test]
fn the_mainnet_proof_activates_the_deposit() {
    let ctx = TestContext::new();
    let mut deposit = awaiting_mainnet_funding(&ctx, false);

    deposit
        .provide_btc_funding_proof(&ctx, &testing::mainnet_funding_proof())
        .unwrap();

    assert_eq!(deposit.state(), DepositState::Active);
    assert_eq!(deposit.funding().unwrap().outpoint.vout, 0);
}

#[derive(Debug, Clone, Copy)]
enum Corruption {
    WrongScript,
    MerkleProof,
    DeepMerkleProof,
    IndexBeyondDepth,
    ChainWork,
    OutputVector,
}

#[test_case(Corruption::WrongScript; "wrong script")]
#[test_case(Corruption::MerkleProof; "invalid merkle proof")]
#[test_case(Corruption::DeepMerkleProof; "merkle proof deeper than the index")]
#[test_case(Corruption::IndexBeyondDepth; "index beyond the proof depth")]
#[test_case(Corruption::ChainWork; "insufficient chain work")]
#[test_case(Corruption::OutputVector; "malformed output vector")]
fn rejected_proofs_change_nothing(corruption: Corruption) {
    let ctx = TestContext::new();
    let foreign_key = matches!(corruption, Corruption::WrongScript);
    let mut deposit = awaiting_mainnet_funding(&ctx, foreign_key);
    let mut proof = testing::mainnet_funding_proof();

    match corruption {
        Corruption::WrongScript => {}
        Corruption::MerkleProof => proof.transaction.merkle_proof[40] ^= 0x01,
        Corruption::DeepMerkleProof => proof.transaction.merkle_proof = vec![0; 65 * spv::MERKLE_NODE_LENGTH],
        Corruption::IndexBeyondDepth => proof.transaction.tx_index_in_block |= 1 << 40,
        Corruption::ChainWork => proof.transaction.bitcoin_headers.truncate(5 * spv::HEADER_LENGTH),
        Corruption::OutputVector => proof.transaction.tx_output_vector.push(0x00),
    }
    let before = deposit.clone();
    let events = ctx.events().len();

    let err = deposit.provide_btc_funding_proof(&ctx, &proof).unwrap_err();
    let Error::FundingProofInvalid(reason) = err else {
        panic!("expected an invalid funding proof, got {err:?}");
    };
    match corruption {
        Corruption::WrongScript => assert!(matches!(reason, FundingProofError::ScriptMismatch { .. })),
        Corruption::MerkleProof | Corruption::DeepMerkleProof | Corruption::IndexBeyondDepth => {
            assert!(matches!(reason, FundingProofError::MerkleProof(_)))
        }
        Corruption::ChainWork => assert!(matches!(
            reason,
            FundingProofError::HeaderChain(HeaderChainError::InsufficientAccumulatedDifficulty { .. })
        )),
        Corruption::OutputVector => assert!(matches!(reason, FundingProofError::Malformed(_))),
    }
    assert_unchanged(&ctx, &deposit, &before, events);
}

#[test]
fn a_relay_on_another_epoch_rejects_the_headers() {
    let ctx = TestContext::new();
    let mut deposit = awaiting_mainnet_funding(&ctx, false);
    ctx.relay.set(fixtures::EPOCH_DIFFICULTY * 2, fixtures::EPOCH_DIFFICULTY * 3);
    let before = deposit.clone();
    let events = ctx.events().len();

    let err = deposit
        .provide_btc_funding_proof(&ctx, &testing::mainnet_funding_proof())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::FundingProofInvalid(FundingProofError::HeaderChain(HeaderChainError::DifficultyMismatch { .. }))
    ));
    assert_unchanged(&ctx, &deposit, &before, events);
}

#[test]
fn underfunded_outputs_are_rejected() {
    let ctx = TestContext::new();
    ctx.custody.publish_secret_key(testing::signer_secret_key());
    let mut deposit = testing::initialized_deposit(&ctx, ContractAddress::new([0xac; 20]));
    deposit.retrieve_signer_pubkey(&ctx).unwrap();

    let script = deposit.signer_pubkey().unwrap().signer_script();
    let tx = testing::funding_transaction(&script, LOT_SIZE - 1);
    let err = deposit
        .provide_btc_funding_proof(&ctx, &testing::funding_proof(&tx, 0))
        .unwrap_err();

    assert!(matches!(
        err,
        Error::FundingProofInvalid(FundingProofError::ValueBelowLotSize { value, lot_size })
            if value == LOT_SIZE - 1 && lot_size == LOT_SIZE
    ));
}

#[test]
fn any_corrupted_merkle_byte_is_rejected() {
    let ctx = TestContext::new();
    ctx.custody.publish_secret_key(testing::signer_secret_key());
    let mut deposit = testing::initialized_deposit(&ctx, ContractAddress::new([0xad; 20]));
    deposit.retrieve_signer_pubkey(&ctx).unwrap();

    let script = deposit.signer_pubkey().unwrap().signer_script();
    let tx = testing::funding_transaction(&script, LOT_SIZE);
    let proof = testing::funding_proof(&tx, 0);
    let mut rng = rand::thread_rng();

    for _ in 0..16 {
        let mut corrupted = proof.clone();
        let index = rng.gen_range(0..corrupted.transaction.merkle_proof.len());
        corrupted.transaction.merkle_proof[index] ^= rng.gen_range(1..=u8::MAX);

        let err = deposit.provide_btc_funding_proof(&ctx, &corrupted).unwrap_err();
        assert!(matches!(err, Error::FundingProofInvalid(FundingProofError::MerkleProof(_))));
        assert_eq!(deposit.state(), DepositState::AwaitingBtcFundingProof);
    }

    deposit.provide_btc_funding_proof(&ctx, &proof).unwrap();
    assert_eq!(deposit.state(), DepositState::Active);
}
