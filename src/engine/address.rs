use bech32::{Bech32m, Hrp};
use rand::Rng;
use thiserror::Error;

/// Length of the key hash carried by an address.
pub const ADDRESS_PAYLOAD_LEN: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
	#[error("bech32 decoding failed: {0}")]
	Decode(String),
	#[error("bech32 encoding failed: {0}")]
	Encode(String),
	#[error("unexpected prefix '{found}', expected '{expected}'")]
	WrongNetwork { expected: String, found: String },
	#[error("payload must be 20 bytes, got {0}")]
	PayloadLength(usize),
}

/// A bech32m wallet address: human readable network prefix plus key hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAddress {
	pub hrp: String,
	pub payload: Vec<u8>,
}

impl WalletAddress {
	pub fn decode(encoded: &str) -> Result<Self, AddressError> {
		let (hrp, payload) =
			bech32::decode(encoded).map_err(|e| AddressError::Decode(e.to_string()))?;
		if payload.len() != ADDRESS_PAYLOAD_LEN {
			return Err(AddressError::PayloadLength(payload.len()));
		}
		Ok(Self {
			hrp: hrp.as_str().to_string(),
			payload,
		})
	}

	/// Decode and require the given network prefix.
	pub fn decode_for_network(encoded: &str, hrp: &str) -> Result<Self, AddressError> {
		let address = Self::decode(encoded)?;
		if address.hrp != hrp {
			return Err(AddressError::WrongNetwork {
				expected: hrp.to_string(),
				found: address.hrp,
			});
		}
		Ok(address)
	}

	pub fn encode(&self) -> Result<String, AddressError> {
		let hrp = Hrp::parse(&self.hrp).map_err(|e| AddressError::Encode(e.to_string()))?;
		bech32::encode::<Bech32m>(hrp, &self.payload).map_err(|e| AddressError::Encode(e.to_string()))
	}

	/// Fresh address with a random key hash.
	pub fn random(hrp: &str) -> Self {
		let mut payload = [0u8; ADDRESS_PAYLOAD_LEN];
		rand::rng().fill(&mut payload);
		Self {
			hrp: hrp.to_string(),
			payload: payload.to_vec(),
		}
	}
}
