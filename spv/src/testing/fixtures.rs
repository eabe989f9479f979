//! A funding transaction confirmed on bitcoin mainnet, with its inclusion
//! proof and the six headers that follow its block.

use crate::proof::TxInclusionProof;

/// The display form of the transaction ID.
pub const FUNDING_TXID: &str = "7c48181cb5c030655eea651c5e9aa808983f646465cbe9d01c227d99cfbc405f";

/// The value of output 0, which pays to the signer's P2WPKH address.
pub const FUNDING_VALUE_SATS: u64 = 490_029_088;

/// The difficulty declared by every header in the chain.
pub const EPOCH_DIFFICULTY: u128 = 6_353_030_562_983;

/// The x-coordinate of the key that controls output 0.
pub const SIGNER_PUBKEY_X: &str = "d4aee75e57179f7cd18adcbaa7e2fca4ff7b1b446df88bf0b4398e4a26965a6e";

/// The y-coordinate of the key that controls output 0.
pub const SIGNER_PUBKEY_Y: &str = "e8bfb23428a4efecb3ebdc636139de9a568ed427fff20d28baa33ed48e9c44e1";

const VERSION: &str = "01000000";

const TX_INPUT_VECTOR: &str =
    "01913e39197867de39bff2c93c75173e086388ee7e8707c90ce4a02dd23f7d2c0d0000000000ffffffff";

const TX_OUTPUT_VECTOR: &str = "012040351d0000000016001486e7303082a6a21d5837176bc808bf4828371ab6";

const TX_LOCKTIME: &str = "4ec10800";

const TX_INDEX_IN_BLOCK: u64 = 129;

/// Twelve sibling hashes, one per line.
const MERKLE_PROOF: [&str; 12] = [
    "886f7da48f4ccfe49283c678dedb376c89853ba46d9a297fe39e8dd557d1f8de",
    "b0fb1a28c03f71b267f3a33459b2566975b1653a1238947ed05edca17ef64181",
    "b1f09d858a6e25bae4b0e245993d4ea77facba8ed0371bb9b8a6724475bcdc9e",
    "df9ead30b61cf6714758b7c93d1b725f86c2a66a07dd291ef566eaa5a5951682",
    "3d57fd50557f1d938cc2fb61fe0e1acee6f9cb618a9210688a2965c52feabee6",
    "6d660a5e7f158e363dc464fca2bb1cc856173366d5d20b5cd513a3aab8ebc5be",
    "2bd196b783b8773af2472abcea3e32e97938283f7b454769aa1c064c311c3342",
    "a755029ee338664999bd8d432080eafae3ca86b52ad2e321e9e634a46c1bd0d1",
    "74e38bcd4c59a0f0a78c5906c015ef4daf6beb0500a59f4cae00cd46069ce60d",
    "b2182e74561028e4462f59f639c89b8e254602d6ad9c212b7c2af5db9275e48c",
    "467539c6af678d6f09214182df848bd79a06df706f7c3fddfdd95e6f27326c62",
    "17ee446543a443f82b711f48c173a769ae8d1e92a986bc76fca732f088bbe049",
];

/// One header per line.
const BITCOIN_HEADERS: [&str; 7] = [
    "00e0ff3fd877ad23af1d0d3e0eb6a700d85b692975dacd36e47b1b00000000000000000095ba61df5961d7fa0a45cd7467e11f20932c7a0b74c59318e86581c6b509554876f6c65c114e2c17e42524d3",
    "00000020994d3802da5adf80345261bcff2eb87ab7b70db786cb0000000000000000000003169efc259f6e4b5e1bfa469f06792d6f07976a098bff2940c8e7ed3105fdc5eff7c65c114e2c170c4dffc3",
    "0000c020f898b7ea6a405728055b0627f53f42c57290fe78e0b91900000000000000000075472c91a94fa2aab73369c0686a58796949cf60976e530f6eb295320fa15a1b77f8c65c114e2c17387f1df0",
    "0000002069137421fc274aa2c907dbf0ec4754285897e8aa36332b0000000000000000004308f2494b702c40e9d61991feb7a15b3be1d73ce988e354e52e7a4e611bd9c2a2f8c65c114e2c1740287df2",
    "00000020ab63607b09395f856adaa69d553755d9ba5bd8d15da20a000000000000000000090ea7559cda848d97575cb9696c8e33ba7f38d18d5e2f8422837c354aec147839fbc65c114e2c175cf077d6",
    "000000200ab3612eac08a31a8fb1d9b5397f897db8d26f6cd83a230000000000000000006f4888720ecbf980ff9c983a8e2e60ad329cc7b130916c2bf2300ea54e412a9ed6fcc65c114e2c17d4fbb885",
    "00000020d3e51560f77628a26a8fad01c88f98bd6c9e4bc8703b180000000000000000008e2c6e62a1f4d45dd03be1e6692df89a4e3b1223a4dbdfa94cca94c04c22049992fdc65c114e2c17463edb5e",
];

/// The complete proof for the mainnet funding transaction.
pub fn mainnet_funding_proof() -> TxInclusionProof {
    TxInclusionProof {
        version: decode_array(VERSION),
        tx_input_vector: hex::decode(TX_INPUT_VECTOR).unwrap(),
        tx_output_vector: hex::decode(TX_OUTPUT_VECTOR).unwrap(),
        tx_locktime: decode_array(TX_LOCKTIME),
        merkle_proof: hex::decode(MERKLE_PROOF.concat()).unwrap(),
        tx_index_in_block: TX_INDEX_IN_BLOCK,
        bitcoin_headers: hex::decode(BITCOIN_HEADERS.concat()).unwrap(),
    }
}

fn decode_array(encoded: &str) -> [u8; 4] {
    hex::decode(encoded).unwrap().try_into().unwrap()
}
