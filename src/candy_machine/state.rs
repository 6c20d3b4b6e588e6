//! Candy machine v2 account layout and the decoded sale snapshot

use borsh::{BorshDeserialize, BorshSerialize};
use serde::Serialize;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

/// Anchor discriminator of the `CandyMachine` account
pub fn account_discriminator() -> [u8; 8] {
    anchor_discriminator("account:CandyMachine")
}

pub(crate) fn anchor_discriminator(preimage: &str) -> [u8; 8] {
    let digest = Sha256::digest(preimage.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

// On-chain layout. Config lines and the mint bitmask follow these fields in
// the account and are never decoded here.

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct CandyMachineAccount {
    pub authority: [u8; 32],
    pub wallet: [u8; 32],
    pub token_mint: Option<[u8; 32]>,
    pub items_redeemed: u64,
    pub data: CandyMachineData,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct CandyMachineData {
    pub uuid: String,
    pub price: u64,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub max_supply: u64,
    pub is_mutable: bool,
    pub retain_authority: bool,
    pub go_live_date: Option<i64>,
    pub end_settings: Option<EndSettings>,
    pub creators: Vec<Creator>,
    pub hidden_settings: Option<HiddenSettings>,
    pub whitelist_mint_settings: Option<WhitelistMintSettingsData>,
    pub items_available: u64,
    pub gatekeeper: Option<GatekeeperConfigData>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndSettingType {
    Date,
    Amount,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndSettings {
    pub end_setting_type: EndSettingType,
    pub number: u64,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct Creator {
    pub address: [u8; 32],
    pub verified: bool,
    pub share: u8,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct HiddenSettings {
    pub name: String,
    pub uri: String,
    pub hash: [u8; 32],
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WhitelistMintMode {
    BurnEveryTime,
    NeverBurn,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct WhitelistMintSettingsData {
    pub mode: WhitelistMintMode,
    pub mint: [u8; 32],
    pub presale: bool,
    pub discount_price: Option<u64>,
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct GatekeeperConfigData {
    pub gatekeeper_network: [u8; 32],
    pub expire_on_use: bool,
}

/// Capability-gate descriptor required by the sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GatekeeperConfig {
    #[serde(serialize_with = "serialize_pubkey")]
    pub gatekeeper_network: Pubkey,
    pub expire_on_use: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WhitelistMintSettings {
    pub mode: WhitelistMintMode,
    #[serde(serialize_with = "serialize_pubkey")]
    pub mint: Pubkey,
    pub presale: bool,
    pub discount_price: Option<u64>,
}

/// Immutable snapshot of a candy machine at fetch time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleState {
    #[serde(serialize_with = "serialize_pubkey")]
    pub address: Pubkey,
    #[serde(serialize_with = "serialize_pubkey")]
    pub authority: Pubkey,
    /// Funds destination (the machine's `wallet`)
    #[serde(serialize_with = "serialize_pubkey")]
    pub treasury: Pubkey,
    #[serde(serialize_with = "serialize_opt_pubkey")]
    pub token_mint: Option<Pubkey>,
    pub is_active: bool,
    pub is_sold_out: bool,
    pub is_presale: bool,
    pub gatekeeper: Option<GatekeeperConfig>,
    pub price: u64,
    pub items_available: u64,
    pub items_redeemed: u64,
    pub items_remaining: u64,
    pub go_live_date: Option<i64>,
    pub end_settings: Option<EndSettings>,
    pub whitelist_mint_settings: Option<WhitelistMintSettings>,
    pub has_hidden_settings: bool,
    pub retain_authority: bool,
}

impl SaleState {
    /// Derive the sale snapshot at unix time `now`.
    ///
    /// `start_date_seed` stands in for the go-live date when the account has none.
    pub fn from_account(
        address: Pubkey,
        account: &CandyMachineAccount,
        now: i64,
        start_date_seed: Option<i64>,
    ) -> Self {
        let data = &account.data;
        let items_available = data.items_available;
        let items_redeemed = account.items_redeemed;
        let items_remaining = items_available.saturating_sub(items_redeemed);
        let is_sold_out = items_remaining == 0;

        let go_live_date = data.go_live_date.or(start_date_seed);

        let whitelist_mint_settings =
            data.whitelist_mint_settings
                .as_ref()
                .map(|w| WhitelistMintSettings {
                    mode: w.mode,
                    mint: Pubkey::new_from_array(w.mint),
                    presale: w.presale,
                    discount_price: w.discount_price,
                });

        let is_presale = whitelist_mint_settings
            .as_ref()
            .is_some_and(|w| w.presale)
            && go_live_date.is_none_or(|date| date > now);

        let started = is_presale || go_live_date.is_some_and(|date| date < now);
        let not_ended = match data.end_settings {
            Some(EndSettings {
                end_setting_type: EndSettingType::Date,
                number,
            }) => i64::try_from(number).map_or(true, |end| end > now),
            Some(EndSettings {
                end_setting_type: EndSettingType::Amount,
                number,
            }) => items_redeemed < number,
            None => true,
        };

        Self {
            address,
            authority: Pubkey::new_from_array(account.authority),
            treasury: Pubkey::new_from_array(account.wallet),
            token_mint: account.token_mint.map(Pubkey::new_from_array),
            is_active: started && not_ended && !is_sold_out,
            is_sold_out,
            is_presale,
            gatekeeper: data.gatekeeper.as_ref().map(|g| GatekeeperConfig {
                gatekeeper_network: Pubkey::new_from_array(g.gatekeeper_network),
                expire_on_use: g.expire_on_use,
            }),
            price: data.price,
            items_available,
            items_redeemed,
            items_remaining,
            go_live_date,
            end_settings: data.end_settings,
            whitelist_mint_settings,
            has_hidden_settings: data.hidden_settings.is_some(),
            retain_authority: data.retain_authority,
        }
    }

    /// Price the buyer pays, after any whitelist discount
    pub fn effective_price(&self) -> u64 {
        self.whitelist_mint_settings
            .as_ref()
            .and_then(|w| w.discount_price)
            .unwrap_or(self.price)
    }
}

fn serialize_pubkey<S: serde::Serializer>(key: &Pubkey, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&key.to_string())
}

fn serialize_opt_pubkey<S: serde::Serializer>(
    key: &Option<Pubkey>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match key {
        Some(key) => s.serialize_some(&key.to_string()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::candy_machine_account;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_live_sale_is_active() {
        let account = candy_machine_account(100, 40, Some(NOW - 60));
        let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
        assert!(state.is_active);
        assert!(!state.is_sold_out);
        assert_eq!(state.items_remaining, 60);
    }

    #[test]
    fn test_future_go_live_is_inactive() {
        let account = candy_machine_account(100, 0, Some(NOW + 3600));
        let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
        assert!(!state.is_active);
        assert!(!state.is_presale);
    }

    #[test]
    fn test_start_date_seed_used_when_go_live_missing() {
        let account = candy_machine_account(10, 0, None);
        let before = SaleState::from_account(Pubkey::new_unique(), &account, NOW, Some(NOW + 5));
        assert!(!before.is_active);
        let after = SaleState::from_account(Pubkey::new_unique(), &account, NOW, Some(NOW - 5));
        assert!(after.is_active);
        assert_eq!(after.go_live_date, Some(NOW - 5));
    }

    #[test]
    fn test_presale_whitelist_is_active_before_go_live() {
        let mut account = candy_machine_account(10, 0, Some(NOW + 3600));
        account.data.whitelist_mint_settings = Some(WhitelistMintSettingsData {
            mode: WhitelistMintMode::BurnEveryTime,
            mint: [7u8; 32],
            presale: true,
            discount_price: Some(5),
        });
        let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
        assert!(state.is_presale);
        assert!(state.is_active);
        assert_eq!(state.effective_price(), 5);
    }

    #[test]
    fn test_end_settings_close_the_sale() {
        let mut account = candy_machine_account(10, 3, Some(NOW - 60));
        account.data.end_settings = Some(EndSettings {
            end_setting_type: EndSettingType::Amount,
            number: 3,
        });
        let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
        assert!(!state.is_active);
        assert!(!state.is_sold_out);

        account.data.end_settings = Some(EndSettings {
            end_setting_type: EndSettingType::Date,
            number: (NOW - 1) as u64,
        });
        let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
        assert!(!state.is_active);
    }

    #[test]
    fn test_over_redeemed_account_saturates() {
        let account = candy_machine_account(5, 9, Some(NOW - 60));
        let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
        assert_eq!(state.items_remaining, 0);
        assert!(state.is_sold_out);
        assert!(!state.is_active);
    }

    proptest! {
        #[test]
        fn prop_sold_out_iff_nothing_remaining(
            available in 0u64..10_000,
            redeemed in 0u64..12_000,
            go_live in proptest::option::of(NOW - 10_000..NOW + 10_000),
        ) {
            let account = candy_machine_account(available, redeemed, go_live);
            let state = SaleState::from_account(Pubkey::new_unique(), &account, NOW, None);
            prop_assert!(state.items_remaining <= state.items_available);
            prop_assert_eq!(state.is_sold_out, state.items_remaining == 0);
            prop_assert!(!(state.is_sold_out && state.is_active));
        }
    }
}
