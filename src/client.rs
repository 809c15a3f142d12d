//! The client façade (§4.6): a thin orchestrator binding the pure core to
//! an injected chain client. No retries, no rate limiting, no caching —
//! the chain client is expected to provide its own idempotency.

use rand::{CryptoRng, RngCore};
use tracing::{debug, info, instrument};

use crate::codec;
use crate::curve::{self, Felt};
use crate::error::{Error, Result};
use crate::hash;
use crate::scanner;
use crate::stealth::{self, StealthAddressResult};
use crate::types::{Announcement, Call, MetaAddress, RawEvent, ScanSkipReason, StealthKeys, StealthPayment};

/// Flat, validated configuration for a `Client` (§9 redesign flag: an
/// enumerated struct rather than a duck-typed options object).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub registry_address: Felt,
    pub stealth_account_class_hash: Felt,
    pub chain_tag: String,
}

/// The injected transport (§1's "abstract chain client"). Implementations
/// own retries, batching, and network I/O; the core only ever sees
/// `Vec<Felt>` and `RawEvent` values.
pub trait ChainClient {
    type ChainError: std::fmt::Display;

    fn call(
        &self,
        address: Felt,
        selector: &str,
        calldata: &[Felt],
    ) -> std::result::Result<Vec<Felt>, Self::ChainError>;
    fn get_events(
        &self,
        address: Felt,
        from_block: u64,
        to_block: u64,
    ) -> std::result::Result<Vec<RawEvent>, Self::ChainError>;
    fn execute(&self, account: Felt, calls: &[Call]) -> std::result::Result<Felt, Self::ChainError>;
}

/// Withdrawal amount for `deploy_and_withdraw`: a fixed amount, or the
/// account's entire balance read at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawAmount {
    Exact(u128),
    All,
}

fn u256_halves(amount: u128) -> (Felt, Felt) {
    (Felt::from(amount), Felt::ZERO)
}

fn chain_err<E: std::fmt::Display>(e: E) -> Error {
    Error::ChainError(e.to_string())
}

/// The client façade. Generic over its chain transport so hosts can swap
/// in a live RPC client or a deterministic test double.
pub struct Client<C: ChainClient> {
    chain: C,
    config: ClientConfig,
}

impl<C: ChainClient> Client<C> {
    pub fn new(chain: C, config: ClientConfig) -> Self {
        Client { chain, config }
    }

    /// Submit `register_keys(K_spend, K_view)` to the registry on behalf
    /// of `account`.
    #[instrument(skip(self, keys))]
    pub fn register(&self, account: Felt, keys: &StealthKeys) -> Result<Felt> {
        let call = Call {
            target: self.config.registry_address,
            selector: "register_keys".to_string(),
            calldata: vec![keys.spending.public_key, keys.viewing.public_key],
        };
        let tx = self
            .chain
            .execute(account, std::slice::from_ref(&call))
            .map_err(chain_err)?;
        info!(?account, "registered stealth keys");
        Ok(tx)
    }

    /// Look up a registrant's meta-address; `None` if the registry reads
    /// back `(0, 0)` ("not registered" is not an error, §4.8).
    pub fn get_meta_address(&self, addr: Felt) -> Result<Option<MetaAddress>> {
        let result = self
            .chain
            .call(self.config.registry_address, "get_meta_address", &[addr])
            .map_err(chain_err)?;
        let [spending_pubkey, viewing_pubkey] = result[..] else {
            return Err(Error::ChainError(
                "get_meta_address returned an unexpected number of fields".to_string(),
            ));
        };
        if spending_pubkey == Felt::ZERO || viewing_pubkey == Felt::ZERO {
            return Ok(None);
        }
        Ok(Some(MetaAddress {
            chain_tag: self.config.chain_tag.clone(),
            spending_pubkey,
            viewing_pubkey,
        }))
    }

    pub fn is_registered(&self, addr: Felt) -> Result<bool> {
        Ok(self.get_meta_address(addr)?.is_some())
    }

    /// Pure delegation to the core (§4.3); does not touch the chain.
    pub fn generate_stealth_address<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        meta: &MetaAddress,
    ) -> Result<StealthAddressResult> {
        stealth::generate_stealth_address(rng, meta, self.config.stealth_account_class_hash)
    }

    /// Build the `[transfer, announce]` call pair for a single payment.
    /// `extra_metadata` is appended after the default `[token, amount]`
    /// prefix.
    pub fn build_send_calls(
        &self,
        token: Felt,
        amount: u128,
        stealth: &StealthAddressResult,
        extra_metadata: &[Felt],
    ) -> [Call; 2] {
        let (amount_low, amount_high) = u256_halves(amount);
        let transfer = Call {
            target: token,
            selector: "transfer".to_string(),
            calldata: vec![stealth.stealth_address, amount_low, amount_high],
        };

        let mut metadata = vec![token, amount_low];
        metadata.extend_from_slice(extra_metadata);
        let announce = Call {
            target: self.config.registry_address,
            selector: "announce".to_string(),
            calldata: {
                let mut calldata = vec![
                    stealth.stealth_address,
                    stealth.ephemeral_pubkey,
                    Felt::from(stealth.view_tag),
                ];
                calldata.push(Felt::from(metadata.len() as u64));
                calldata.extend(metadata);
                calldata
            },
        };

        [transfer, announce]
    }

    /// Generate a stealth address per recipient and concatenate the
    /// resulting `[transfer, announce]` pairs into a single multicall, in
    /// order (§4.6, scenario S5). `_account` names the sender; it plays no
    /// role in call construction, only in execution.
    pub fn batch_send<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        _account: Felt,
        payments: &[(MetaAddress, Felt, u128)],
    ) -> Result<(Vec<Call>, Vec<StealthAddressResult>)> {
        let mut calls = Vec::with_capacity(payments.len() * 2);
        let mut generated = Vec::with_capacity(payments.len());
        for (meta, token, amount) in payments {
            let stealth = self.generate_stealth_address(rng, meta)?;
            calls.extend(self.build_send_calls(*token, *amount, &stealth, &[]));
            generated.push(stealth);
        }
        Ok((calls, generated))
    }

    /// Parse one raw event's data record into an `Announcement`, per
    /// §6.2's `[stealth_addr, caller_addr, ephemeral_pub, view_tag,
    /// metadata_len, metadata…]` layout. Returns `None` (with a skip
    /// reason) on malformation instead of failing the batch (§4.8).
    fn parse_announcement(event: &RawEvent) -> std::result::Result<Announcement, ScanSkipReason> {
        if event.data.len() < 4 {
            return Err(ScanSkipReason::TooFewFields);
        }
        let stealth_address = event.data[0];
        let ephemeral_pubkey = event.data[2];
        let view_tag_felt = event.data[3];
        let view_tag_bytes = view_tag_felt.to_bytes_be();
        let view_tag = view_tag_bytes[31];

        let metadata = if event.data.len() >= 5 {
            let metadata_len_felt = event.data[4];
            let len_bytes = metadata_len_felt.to_bytes_be();
            let metadata_len = u64::from_be_bytes(len_bytes[24..32].try_into().unwrap()) as usize;
            let available = &event.data[5..];
            if metadata_len > available.len() {
                return Err(ScanSkipReason::MetadataLenOverflow);
            }
            available[..metadata_len].to_vec()
        } else {
            Vec::new()
        };

        Ok(Announcement {
            stealth_address,
            ephemeral_pubkey,
            view_tag,
            metadata,
            block_number: event.block_number,
            tx_hash: event.tx_hash,
        })
    }

    /// Page through `announce` events in `[from_block, to_block]` and parse
    /// each into an `Announcement`, skipping malformed events.
    #[instrument(skip(self, on_skip))]
    pub fn fetch_announcements(
        &self,
        from_block: u64,
        to_block: u64,
        mut on_skip: Option<&mut dyn FnMut(ScanSkipReason)>,
    ) -> Result<Vec<Announcement>> {
        let events = self
            .chain
            .get_events(self.config.registry_address, from_block, to_block)
            .map_err(chain_err)?;

        let mut announcements = Vec::with_capacity(events.len());
        for event in &events {
            match Self::parse_announcement(event) {
                Ok(announcement) => announcements.push(announcement),
                Err(reason) => {
                    if let Some(cb) = on_skip.as_deref_mut() {
                        cb(reason);
                    }
                }
            }
        }
        debug!(
            from_block,
            to_block,
            fetched = events.len(),
            parsed = announcements.len(),
            "fetched announcements"
        );
        Ok(announcements)
    }

    /// Compose `fetch_announcements` then the full scan (§4.4).
    #[instrument(skip(self, keys))]
    pub fn scan(
        &self,
        keys: &StealthKeys,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<StealthPayment>> {
        let announcements = self.fetch_announcements(from_block, to_block, None)?;
        let payments = scanner::scan_announcements(
            &announcements,
            keys.viewing.private_key,
            keys.spending.public_key,
            keys.spending.private_key,
            self.config.stealth_account_class_hash,
        )?;
        info!(matched = payments.len(), "scan complete");
        Ok(payments)
    }

    /// Compute the stealth address for spending key `p`, deploy it
    /// counterfactually if it doesn't exist yet, then withdraw.
    #[instrument(skip(self, p))]
    pub fn deploy_and_withdraw(
        &self,
        p: Felt,
        destination: Felt,
        token: Felt,
        amount: WithdrawAmount,
    ) -> Result<Felt> {
        let pubkey = curve::derive_pub(p)?;
        let stealth_address =
            stealth::contract_address(pubkey, self.config.stealth_account_class_hash, pubkey);

        if !self.account_is_deployed(stealth_address)? {
            let deploy = Call {
                target: stealth_address,
                selector: "__deploy__".to_string(),
                calldata: vec![
                    self.config.stealth_account_class_hash,
                    pubkey,
                    pubkey,
                ],
            };
            self.chain
                .execute(stealth_address, std::slice::from_ref(&deploy))
                .map_err(chain_err)?;
            info!(?stealth_address, "deployed stealth account");
        }

        let withdraw_amount = match amount {
            WithdrawAmount::Exact(amount) => amount,
            WithdrawAmount::All => self.token_balance(stealth_address, token)?,
        };
        let (amount_low, amount_high) = u256_halves(withdraw_amount);
        let transfer = Call {
            target: token,
            selector: "transfer".to_string(),
            calldata: vec![destination, amount_low, amount_high],
        };
        let tx = self
            .chain
            .execute(stealth_address, std::slice::from_ref(&transfer))
            .map_err(chain_err)?;
        info!(?stealth_address, ?destination, amount = %withdraw_amount, "withdrew funds");
        Ok(tx)
    }

    fn account_is_deployed(&self, address: Felt) -> Result<bool> {
        match self.chain.call(address, "is_registered", &[]) {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    fn token_balance(&self, account: Felt, token: Felt) -> Result<u128> {
        let result = self
            .chain
            .call(token, "balanceOf", &[account])
            .map_err(chain_err)?;
        let [low, _high] = result[..] else {
            return Err(Error::ChainError(
                "balanceOf returned an unexpected number of fields".to_string(),
            ));
        };
        let bytes = low.to_bytes_be();
        Ok(u128::from_be_bytes(bytes[16..32].try_into().unwrap()))
    }
}

/// Round-trip an `Announcement` back into the wire data record used by
/// `parse_announcement`, for tests that need to synthesize a `RawEvent`.
pub fn encode_announcement_data(announcement: &Announcement, caller: Felt) -> Vec<Felt> {
    let mut data = vec![
        announcement.stealth_address,
        caller,
        announcement.ephemeral_pubkey,
        Felt::from(announcement.view_tag),
        Felt::from(announcement.metadata.len() as u64),
    ];
    data.extend(announcement.metadata.iter().copied());
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stealth::generate_stealth_address;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct MockError(String);
    impl std::fmt::Display for MockError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    struct MockChain {
        registry: RefCell<HashMap<Felt, (Felt, Felt)>>,
        events: RefCell<Vec<RawEvent>>,
        executed: RefCell<Vec<(Felt, Vec<Call>)>>,
        deployed: RefCell<std::collections::HashSet<Felt>>,
        balances: RefCell<HashMap<Felt, u128>>,
    }

    impl MockChain {
        fn new() -> Self {
            MockChain {
                registry: RefCell::new(HashMap::new()),
                events: RefCell::new(Vec::new()),
                executed: RefCell::new(Vec::new()),
                deployed: RefCell::new(std::collections::HashSet::new()),
                balances: RefCell::new(HashMap::new()),
            }
        }
    }

    impl ChainClient for MockChain {
        type ChainError = MockError;

        fn call(
            &self,
            address: Felt,
            selector: &str,
            calldata: &[Felt],
        ) -> std::result::Result<Vec<Felt>, MockError> {
            match selector {
                "get_meta_address" => {
                    let addr = calldata[0];
                    let (s, v) = self
                        .registry
                        .borrow()
                        .get(&addr)
                        .copied()
                        .unwrap_or((Felt::ZERO, Felt::ZERO));
                    Ok(vec![s, v])
                }
                "is_registered" => {
                    if self.deployed.borrow().contains(&address) {
                        Ok(vec![Felt::from(1u64)])
                    } else {
                        Err(MockError("not deployed".to_string()))
                    }
                }
                "balanceOf" => {
                    let balance = self.balances.borrow().get(&address).copied().unwrap_or(0);
                    Ok(vec![Felt::from(balance), Felt::ZERO])
                }
                other => Err(MockError(format!("unknown selector {other}"))),
            }
        }

        fn get_events(
            &self,
            _address: Felt,
            _from_block: u64,
            _to_block: u64,
        ) -> std::result::Result<Vec<RawEvent>, MockError> {
            Ok(self.events.borrow().clone())
        }

        fn execute(&self, account: Felt, calls: &[Call]) -> std::result::Result<Felt, MockError> {
            for call in calls {
                if call.selector == "register_keys" {
                    self.registry
                        .borrow_mut()
                        .insert(account, (call.calldata[0], call.calldata[1]));
                }
                if call.selector == "__deploy__" {
                    self.deployed.borrow_mut().insert(account);
                }
            }
            self.executed.borrow_mut().push((account, calls.to_vec()));
            Ok(Felt::from(self.executed.borrow().len() as u64))
        }
    }

    fn class_hash() -> Felt {
        Felt::from(0x777u64)
    }

    fn config() -> ClientConfig {
        ClientConfig {
            registry_address: Felt::from(0xde9u64),
            stealth_account_class_hash: class_hash(),
            chain_tag: "starknet".to_string(),
        }
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let chain = MockChain::new();
        let client = Client::new(chain, config());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let keys = StealthKeys::generate(&mut rng).unwrap();
        let account = Felt::from(0xa11ceu64);

        client.register(account, &keys).unwrap();
        assert!(client.is_registered(account).unwrap());
        let meta = client.get_meta_address(account).unwrap().unwrap();
        assert_eq!(meta.spending_pubkey, keys.spending.public_key);
        assert_eq!(meta.viewing_pubkey, keys.viewing.public_key);
    }

    #[test]
    fn unregistered_account_reads_none() {
        let chain = MockChain::new();
        let client = Client::new(chain, config());
        assert_eq!(client.get_meta_address(Felt::from(42u64)).unwrap(), None);
        assert!(!client.is_registered(Felt::from(42u64)).unwrap());
    }

    #[test]
    fn build_send_calls_produces_transfer_then_announce() {
        let chain = MockChain::new();
        let client = Client::new(chain, config());
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let keys = StealthKeys::generate(&mut rng).unwrap();
        let meta = keys.meta_address("starknet");
        let stealth = generate_stealth_address(&mut rng, &meta, class_hash()).unwrap();

        let [transfer, announce] = client.build_send_calls(Felt::from(0x1u64), 1000, &stealth, &[]);
        assert_eq!(transfer.selector, "transfer");
        assert_eq!(transfer.calldata[0], stealth.stealth_address);
        assert_eq!(announce.selector, "announce");
        assert_eq!(announce.calldata[0], stealth.stealth_address);
    }

    #[test]
    fn batch_send_concatenates_in_order() {
        let chain = MockChain::new();
        let client = Client::new(chain, config());
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let keys_a = StealthKeys::generate(&mut rng).unwrap();
        let keys_b = StealthKeys::generate(&mut rng).unwrap();
        let keys_c = StealthKeys::generate(&mut rng).unwrap();
        let token = Felt::from(0x1u64);
        let account = Felt::from(0xacc0u64);

        let payments = [
            (keys_a.meta_address("starknet"), token, 1000u128),
            (keys_b.meta_address("starknet"), token, 2000u128),
            (keys_c.meta_address("starknet"), token, 500u128),
        ];
        let (calls, generated) = client.batch_send(&mut rng, account, &payments).unwrap();
        assert_eq!(calls.len(), 6);
        let selectors: Vec<_> = calls.iter().map(|c| c.selector.as_str()).collect();
        assert_eq!(
            selectors,
            ["transfer", "announce", "transfer", "announce", "transfer", "announce"]
        );
        let addresses: std::collections::HashSet<_> =
            generated.iter().map(|s| s.stealth_address).collect();
        assert_eq!(addresses.len(), 3);
    }

    #[test]
    fn fetch_announcements_skips_malformed_events() {
        let chain = MockChain::new();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let keys = StealthKeys::generate(&mut rng).unwrap();
        let meta = keys.meta_address("starknet");
        let sent = generate_stealth_address(&mut rng, &meta, class_hash()).unwrap();

        let well_formed = Announcement {
            stealth_address: sent.stealth_address,
            ephemeral_pubkey: sent.ephemeral_pubkey,
            view_tag: sent.view_tag,
            metadata: vec![Felt::from(1u64), Felt::from(2u64)],
            block_number: Some(10),
            tx_hash: None,
        };
        let good_event = RawEvent {
            keys: vec![sent.stealth_address],
            data: encode_announcement_data(&well_formed, Felt::from(0xca11eru64)),
            block_number: Some(10),
            tx_hash: None,
        };
        let too_few = RawEvent {
            keys: vec![],
            data: vec![Felt::from(1u64), Felt::from(2u64)],
            block_number: Some(11),
            tx_hash: None,
        };
        let overflowed_len = RawEvent {
            keys: vec![],
            data: vec![
                Felt::from(1u64),
                Felt::from(2u64),
                Felt::from(3u64),
                Felt::from(4u64),
                Felt::from(99u64),
            ],
            block_number: Some(12),
            tx_hash: None,
        };
        chain
            .events
            .borrow_mut()
            .extend([good_event, too_few, overflowed_len]);

        let client = Client::new(chain, config());
        let mut skipped = Vec::new();
        let announcements = client
            .fetch_announcements(0, 100, Some(&mut |reason| skipped.push(reason)))
            .unwrap();

        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].stealth_address, sent.stealth_address);
        assert_eq!(skipped.len(), 2);
        assert!(skipped.contains(&ScanSkipReason::TooFewFields));
        assert!(skipped.contains(&ScanSkipReason::MetadataLenOverflow));
    }

    #[test]
    fn deploy_and_withdraw_deploys_once_then_transfers() {
        let chain = MockChain::new();
        let token = Felt::from(0x7070u64);
        let p = Felt::from(99u64);
        let pubkey = curve::derive_pub(p).unwrap();
        let stealth_address = stealth::contract_address(pubkey, class_hash(), pubkey);
        chain.balances.borrow_mut().insert(stealth_address, 500);

        let client = Client::new(chain, config());
        let destination = Felt::from(0xd357u64);

        client
            .deploy_and_withdraw(p, destination, token, WithdrawAmount::All)
            .unwrap();

        assert!(client.account_is_deployed(stealth_address).unwrap());
    }
}
