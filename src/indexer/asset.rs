//! Collection constants and the decoding helpers indexers share.

use crate::error::{Error, Result};
use bech32::{Bech32, Hrp};

/// Minting policy of the Mek collection.
pub const MEK_POLICY_ID: &str = "ffa56051fda3d106a96f09c3d209d4bf24a117406fb813fb8b4548e3";

/// Header byte of a mainnet stake address.
const MAINNET_STAKE_HEADER: u8 = 0xe1;

/// Header byte of a testnet stake address.
const TESTNET_STAKE_HEADER: u8 = 0xe0;

/// Header byte followed by a 28-byte credential.
const STAKE_ADDRESS_HEX_LEN: usize = 58;

/// Canonical token id: policy id followed by the hex asset name.
#[must_use]
pub fn token_id(policy_id: &str, asset_name_hex: &str) -> String {
    format!("{policy_id}{asset_name_hex}")
}

/// Decode a hex asset name keeping printable ASCII only.
#[must_use]
pub fn printable_label(asset_name_hex: &str) -> Option<String> {
    let bytes = hex::decode(asset_name_hex).ok()?;
    Some(
        bytes
            .into_iter()
            .filter(|b| (32..=126).contains(b))
            .map(char::from)
            .collect(),
    )
}

/// Decode a hex asset name as UTF-8, replacing invalid sequences.
#[must_use]
pub fn utf8_label(asset_name_hex: &str) -> Option<String> {
    let bytes = hex::decode(asset_name_hex).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Sequence number embedded in a label, e.g. `Mekanism1234` -> 1234.
///
/// All digits in the label are concatenated, matching how the collection
/// names its assets.
#[must_use]
pub fn sequence_from_label(label: &str) -> Option<u32> {
    let digits: String = label.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Bring a wallet stake key into bech32 `stake1...` form.
///
/// Bech32 input passes through. Raw 29-byte hex keys (as wallets expose
/// them) are encoded with the prefix matching their network header.
///
/// # Errors
///
/// Returns [`Error::Address`] for anything that is neither.
pub fn normalize_stake_address(identity: &str) -> Result<String> {
    let identity = identity.trim();
    if identity.starts_with("stake") {
        return Ok(identity.to_string());
    }

    let clean = identity.trim_start_matches("0x");
    if clean.len() != STAKE_ADDRESS_HEX_LEN {
        return Err(Error::Address(format!(
            "expected {STAKE_ADDRESS_HEX_LEN} hex chars, got {}",
            clean.len()
        )));
    }

    let bytes = hex::decode(clean).map_err(|e| Error::Address(format!("not hex: {e}")))?;
    let prefix = match bytes.first() {
        Some(&MAINNET_STAKE_HEADER) => "stake",
        Some(&TESTNET_STAKE_HEADER) => "stake_test",
        Some(other) => {
            return Err(Error::Address(format!("unknown network byte 0x{other:02x}")));
        }
        None => return Err(Error::Address("empty address".to_string())),
    };

    let hrp = Hrp::parse(prefix).map_err(|e| Error::Address(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, &bytes).map_err(|e| Error::Address(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_label_drops_control_bytes() {
        // "Mek" + 0x00 + "12"
        assert_eq!(printable_label("4d656b003132").as_deref(), Some("Mek12"));
        assert!(printable_label("zz").is_none());
    }

    #[test]
    fn test_utf8_label() {
        assert_eq!(
            utf8_label("4d656b616e69736d31323334").as_deref(),
            Some("Mekanism1234")
        );
    }

    #[test]
    fn test_sequence_from_label() {
        assert_eq!(sequence_from_label("Mekanism1234"), Some(1234));
        assert_eq!(sequence_from_label("Mek #0042"), Some(42));
        assert_eq!(sequence_from_label("Mekanism"), None);
    }

    #[test]
    fn test_token_id_concatenates() {
        assert_eq!(token_id("aa", "bb"), "aabb");
    }

    #[test]
    fn test_bech32_passthrough() {
        let addr = "stake1uyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zygppv7wd";
        assert_eq!(normalize_stake_address(addr).unwrap(), addr);
    }

    #[test]
    fn test_mainnet_hex_to_bech32() {
        let hex_addr = format!("e1{}", "11".repeat(28));
        assert_eq!(
            normalize_stake_address(&hex_addr).unwrap(),
            "stake1uyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zygppv7wd"
        );
    }

    #[test]
    fn test_testnet_hex_to_bech32() {
        let hex_addr = format!("0xe0{}", "ab".repeat(28));
        assert_eq!(
            normalize_stake_address(&hex_addr).unwrap(),
            "stake_test1uz46h2at4w46h2at4w46h2at4w46h2at4w46h2at4w46h2cwudutw"
        );
    }

    #[test]
    fn test_rejects_unknown_header_and_bad_length() {
        let bad_header = format!("e2{}", "11".repeat(28));
        assert!(matches!(
            normalize_stake_address(&bad_header),
            Err(Error::Address(_))
        ));
        assert!(normalize_stake_address("e111").is_err());
    }
}
