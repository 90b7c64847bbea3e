use crate::engine::{Amount, COIN_DECIMALS};

/// Render base units as a fixed-point coin amount, e.g. `-1.500000`.
pub fn format_amount(amount: Amount) -> String {
    let scale = 10i64.pow(COIN_DECIMALS);
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale as u64,
        abs % scale as u64,
        width = COIN_DECIMALS as usize
    )
}
