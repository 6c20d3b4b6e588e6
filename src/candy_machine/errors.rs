/// Anchor offsets user-defined program errors by this amount
pub const ANCHOR_ERROR_OFFSET: u32 = 6000;

/// Messages of the candy machine v2 program errors, in declaration order
const CANDY_ERROR_MESSAGES: &[&str] = &[
    "Account does not have correct owner!",
    "Account is not initialized!",
    "Mint Mismatch!",
    "Index greater than length!",
    "Numerical overflow error!",
    "Can only provide up to 4 creators to candy machine (because candy machine is one)!",
    "Uuid must be exactly of 6 length",
    "Not enough tokens to pay for this minting",
    "Not enough SOL to pay for this minting",
    "Token transfer failed",
    "Candy machine is empty!",
    "Candy machine is not live!",
    "Configs that are using hidden uris do not have config lines, they have a single hash representing hashed order",
    "Cannot change number of lines unless is a hidden config",
    "Derived key invalid",
    "Public key mismatch",
    "No whitelist token present",
    "Token burn failed",
    "Missing gateway app when required",
    "Missing gateway token when required",
    "Invalid gateway token expire time",
    "Missing gateway network expire feature when required",
    "Unable to find an unused config line near your random number index",
    "Invalid string",
    "Suspicious transaction detected",
    "Cannot Switch to Hidden Settings after items available is greater than 0",
    "Incorrect SlotHashes PubKey",
    "Incorrect collection NFT authority",
    "Collection PDA address is invalid",
    "Provided mint account doesn't match collection PDA mint",
    "Slot hashes Sysvar is empty",
    "The metadata account has data in it, and this must be empty to mint a new NFT",
    "Missing set collection during mint IX for Candy Machine with collection set",
    "Can't change collection settings after items have begun to be minted",
    "Retain authority must be true for Candy Machines with a collection set",
    "Error within Gateway program",
    "Can't change freeze settings after items have begun to be minted. You can only disable.",
    "Can't change authority while collection is enabled. Disable collection first.",
    "Can't change token while freeze is enabled. Disable freeze first.",
    "Cannot thaw NFT unless all NFTs are minted or Candy Machine authority enables thawing",
    "The number of remaining accounts passed in doesn't match the Candy Machine settings",
    "FreezePDA ATA needs to be passed in if token mint is enabled.",
    "Incorrect freeze ATA address.",
    "FreezePDA doesn't belong to this Candy Machine.",
    "Freeze time can't be longer than MAX_FREEZE_TIME.",
    "Can't withdraw Candy Machine while freeze is active. Disable freeze first.",
    "Can't withdraw Candy Machine while frozen funds need to be redeemed. Unlock funds first.",
    "Missing required remaining accounts for remove_freeze with token mint.",
    "Can't withdraw SPL Token from freeze PDA into itself",
    "Can't unlock funds while NFTs are still frozen. Run thaw on all NFTs first.",
    "Setting a sized collection requires the collection metadata to be mutable.",
    "Cannot remove Hidden Settings.",
    "Invalid Metadata Account",
];

/// Human message the program attaches to a custom error code
pub fn program_error_message(code: u32) -> Option<&'static str> {
    let index = code.checked_sub(ANCHOR_ERROR_OFFSET)?;
    CANDY_ERROR_MESSAGES.get(index as usize).copied()
}
