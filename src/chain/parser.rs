// Parser port: turns one raw transaction into at most one swap event.
// Pure, no I/O. The production implementation walks the parsed-instruction
// JSON the RPC source hands over; raw byte decoding happens upstream.

use crate::chain::source::RawTransaction;
use crate::models::SwapEvent;
use serde_json::Value;

pub trait SwapParser: Send + Sync {
    /// Returns None for transactions irrelevant to the tracked program.
    fn parse(&self, tx: &RawTransaction) -> Option<SwapEvent>;
}

/// Extracts swap events from `jsonParsed`-encoded transactions: the first
/// instruction owned by the tracked program whose parsed type is "swap"
/// yields the event.
pub struct JsonSwapParser {
    program_id: String,
}

impl JsonSwapParser {
    pub fn new(program_id: &str) -> Self {
        Self {
            program_id: program_id.to_string(),
        }
    }

    fn instructions<'a>(payload: &'a Value) -> Option<&'a Vec<Value>> {
        payload
            .get("transaction")?
            .get("message")?
            .get("instructions")?
            .as_array()
    }

    fn amount(info: &Value, key: &str) -> Option<u128> {
        // Amounts arrive as decimal strings; tolerate plain numbers too
        match info.get(key)? {
            Value::String(s) => s.parse::<u128>().ok(),
            Value::Number(n) => n.as_u64().map(u128::from),
            _ => None,
        }
    }

    fn event_from_instruction(&self, tx: &RawTransaction, instr: &Value) -> Option<SwapEvent> {
        let program_id = instr.get("programId")?.as_str()?;
        if program_id != self.program_id {
            return None;
        }

        let parsed = instr.get("parsed")?;
        if parsed.get("type")?.as_str()? != "swap" {
            return None;
        }

        let info = parsed.get("info")?;

        Some(SwapEvent {
            signature: tx.signature.clone(),
            user_pubkey: info.get("user")?.as_str()?.to_string(),
            token_in: info.get("tokenIn")?.as_str()?.to_string(),
            token_out: info.get("tokenOut")?.as_str()?.to_string(),
            amount_in: Self::amount(info, "amountIn")?,
            amount_out: Self::amount(info, "amountOut")?,
            slot: tx.slot,
            block_time: tx.block_time.unwrap_or(0),
            route: info
                .get("route")
                .and_then(|r| r.as_str())
                .map(|r| r.to_string()),
            raw: Some(instr.clone()),
        })
    }
}

impl SwapParser for JsonSwapParser {
    fn parse(&self, tx: &RawTransaction) -> Option<SwapEvent> {
        let instructions = Self::instructions(&tx.payload)?;

        instructions
            .iter()
            .find_map(|instr| self.event_from_instruction(tx, instr))
    }
}
