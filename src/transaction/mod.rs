/// Validation, build, fee confirmation and commit of outgoing payments
pub mod pipeline;

pub use pipeline::{
	AcceptAnyFee, FeeConfirmer, PaymentRequest, SendError, SendOutcome, SendPipeline,
	available_balance,
};
