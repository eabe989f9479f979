//! An in-memory custody service.

use std::collections::BTreeMap;
use std::sync::Mutex;

use secp256k1::Message;
use secp256k1::SecretKey;
use secp256k1::SECP256K1;

use crate::custody::CustodyHandle;
use crate::custody::CustodyResponse;
use crate::custody::CustodyService;
use crate::custody::PublicKeyCoordinates;
use crate::error::Error;
use crate::keys::PublicKey;

/// What the custody service received when a group was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRequest {
    /// The lot size the group backs.
    pub lot_size: u64,
    /// The fee that was forwarded.
    pub fee: u64,
}

#[derive(Debug, Clone, Copy)]
enum PublishedKey {
    Secret(SecretKey),
    Coordinates(PublicKeyCoordinates),
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<CustodyHandle, GroupRequest>,
    published: Option<PublishedKey>,
    auto_sign: bool,
    bonded_value: u128,
    signature_requests: Vec<(CustodyHandle, [u8; 32])>,
    failure: Option<String>,
}

/// A custody service where every group shares one key that the test
/// controls.
///
/// Keys are not published and digests are not signed until the test says
/// so, which lets tests exercise the not-ready paths.
#[derive(Debug)]
pub struct TestCustody {
    open_fee: u64,
    state: Mutex<State>,
}

impl TestCustody {
    /// A custody service that quotes `open_fee` for a new group.
    pub fn new(open_fee: u64) -> Self {
        Self { open_fee, state: Mutex::new(State::default()) }
    }

    /// Publish the public key of `secret_key` for every group. Signature
    /// requests can then be answered with it.
    pub fn publish_secret_key(&self, secret_key: SecretKey) {
        self.state.lock().unwrap().published = Some(PublishedKey::Secret(secret_key));
    }

    /// Publish raw coordinates, which need not be a point on the curve.
    pub fn publish_coordinates(&self, x: [u8; 32], y: [u8; 32]) {
        self.state.lock().unwrap().published = Some(PublishedKey::Coordinates((x, y)));
    }

    /// Answer signature requests straight away.
    pub fn set_auto_sign(&self, auto_sign: bool) {
        self.state.lock().unwrap().auto_sign = auto_sign;
    }

    /// Set the value of every group's bonds.
    pub fn set_bonded_value(&self, bonded_value: u128) {
        self.state.lock().unwrap().bonded_value = bonded_value;
    }

    /// Reject the next fallible request with the given message.
    pub fn fail_next(&self, message: &str) {
        self.state.lock().unwrap().failure = Some(message.to_string());
    }

    /// Every group requested so far.
    pub fn groups(&self) -> Vec<(CustodyHandle, GroupRequest)> {
        let state = self.state.lock().unwrap();
        state.groups.iter().map(|(handle, request)| (*handle, *request)).collect()
    }

    /// The fees forwarded with each group request, oldest first.
    pub fn fees_received(&self) -> Vec<u64> {
        self.groups().into_iter().map(|(_, request)| request.fee).collect()
    }

    /// Every signature request, oldest first.
    pub fn signature_requests(&self) -> Vec<(CustodyHandle, [u8; 32])> {
        self.state.lock().unwrap().signature_requests.clone()
    }

    /// Sign `digest` with the published secret key.
    ///
    /// # Panics
    ///
    /// Panics unless a secret key was published.
    pub fn sign(&self, digest: [u8; 32]) -> [u8; 64] {
        let state = self.state.lock().unwrap();
        let Some(PublishedKey::Secret(secret_key)) = state.published else {
            panic!("no secret key was published");
        };
        sign_digest(&secret_key, digest)
    }

    fn check_failure(state: &mut State) -> Result<(), Error> {
        match state.failure.take() {
            Some(message) => Err(Error::Custody(message)),
            None => Ok(()),
        }
    }

    fn check_group(state: &State, handle: CustodyHandle) -> Result<(), Error> {
        if state.groups.contains_key(&handle) {
            return Ok(());
        }
        Err(Error::Custody(format!("unknown group {handle}")))
    }
}

fn sign_digest(secret_key: &SecretKey, digest: [u8; 32]) -> [u8; 64] {
    SECP256K1
        .sign_ecdsa(&Message::from_digest(digest), secret_key)
        .serialize_compact()
}

impl CustodyService for TestCustody {
    fn open_fee(&self) -> u64 {
        self.open_fee
    }

    fn request_signer(&self, lot_size: u64, fee: u64) -> Result<CustodyHandle, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;

        let handle = CustodyHandle(state.groups.len() as u64 + 1);
        state.groups.insert(handle, GroupRequest { lot_size, fee });
        Ok(handle)
    }

    fn public_key(&self, handle: CustodyHandle) -> Result<CustodyResponse<PublicKeyCoordinates>, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        Self::check_group(&state, handle)?;

        let coordinates = match state.published {
            None => return Ok(CustodyResponse::NotReady),
            Some(PublishedKey::Secret(secret_key)) => {
                PublicKey::from(&secret_key.public_key(SECP256K1)).coordinates()
            }
            Some(PublishedKey::Coordinates(coordinates)) => coordinates,
        };
        Ok(CustodyResponse::Ready(coordinates))
    }

    fn request_signature(&self, handle: CustodyHandle, digest: [u8; 32]) -> Result<CustodyResponse<[u8; 64]>, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        Self::check_group(&state, handle)?;
        state.signature_requests.push((handle, digest));

        match state.published {
            Some(PublishedKey::Secret(secret_key)) if state.auto_sign => {
                Ok(CustodyResponse::Ready(sign_digest(&secret_key, digest)))
            }
            _ => Ok(CustodyResponse::NotReady),
        }
    }

    fn bonded_value(&self, handle: CustodyHandle) -> Result<u128, Error> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&mut state)?;
        Self::check_group(&state, handle)?;
        Ok(state.bonded_value)
    }
}
