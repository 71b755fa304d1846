use crate::chain::parser::{JsonSwapParser, SwapParser};
use crate::chain::source::RawTransaction;
use crate::validation::{validate_signature, validate_solana_address};
use serde_json::{json, Value};

const PROGRAM: &str = "SwapProg11111111111111111111111111111111111";

fn swap_payload(program: &str, amount_in: &str) -> Value {
    json!({
        "transaction": {
            "message": {
                "instructions": [
                    {
                        "programId": "ComputeBudget111111111111111111111111111111",
                        "parsed": { "type": "setComputeUnitLimit", "info": {} }
                    },
                    {
                        "programId": program,
                        "parsed": {
                            "type": "swap",
                            "info": {
                                "user": "9ii1FEiWSgDzXAbwj2oTmJXzkfCw78mnHwPQv9WQ5iTn",
                                "tokenIn": "So11111111111111111111111111111111111111112",
                                "tokenOut": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                                "amountIn": amount_in,
                                "amountOut": "250000",
                                "route": "orca"
                            }
                        }
                    }
                ]
            }
        }
    })
}

fn raw(payload: Value) -> RawTransaction {
    RawTransaction {
        signature: "sigP".to_string(),
        slot: 123,
        block_time: Some(1_700_000_123),
        payload,
    }
}

#[test]
fn parses_a_swap_instruction() {
    let parser = JsonSwapParser::new(PROGRAM);
    let event = parser
        .parse(&raw(swap_payload(PROGRAM, "1500000000")))
        .expect("expected a swap event");

    assert_eq!(event.signature, "sigP");
    assert_eq!(event.user_pubkey, "9ii1FEiWSgDzXAbwj2oTmJXzkfCw78mnHwPQv9WQ5iTn");
    assert_eq!(event.amount_in, 1_500_000_000);
    assert_eq!(event.amount_out, 250_000);
    assert_eq!(event.slot, 123);
    assert_eq!(event.block_time, 1_700_000_123);
    assert_eq!(event.route.as_deref(), Some("orca"));
    assert!(event.raw.is_some());
}

#[test]
fn amounts_larger_than_u64_survive() {
    let parser = JsonSwapParser::new(PROGRAM);

    // 2^65: representable as a decimal string, not as u64 or f64 exactly
    let event = parser
        .parse(&raw(swap_payload(PROGRAM, "36893488147419103232")))
        .expect("expected a swap event");

    assert_eq!(event.amount_in, 36_893_488_147_419_103_232u128);
}

#[test]
fn other_programs_are_ignored() {
    let parser = JsonSwapParser::new(PROGRAM);
    let other = swap_payload("OtherProg1111111111111111111111111111111111", "5");
    assert!(parser.parse(&raw(other)).is_none());
}

#[test]
fn non_swap_instructions_are_ignored() {
    let parser = JsonSwapParser::new(PROGRAM);
    let mut payload = swap_payload(PROGRAM, "5");
    payload["transaction"]["message"]["instructions"][1]["parsed"]["type"] =
        json!("addLiquidity");
    assert!(parser.parse(&raw(payload)).is_none());
}

#[test]
fn malformed_payload_yields_nothing() {
    let parser = JsonSwapParser::new(PROGRAM);
    assert!(parser.parse(&raw(json!({ "meta": null }))).is_none());

    let mut payload = swap_payload(PROGRAM, "5");
    payload["transaction"]["message"]["instructions"][1]["parsed"]["info"] = json!({});
    assert!(parser.parse(&raw(payload)).is_none());
}

#[test]
fn numeric_amounts_are_tolerated() {
    let parser = JsonSwapParser::new(PROGRAM);
    let mut payload = swap_payload(PROGRAM, "5");
    payload["transaction"]["message"]["instructions"][1]["parsed"]["info"]["amountIn"] =
        json!(987654321u64);
    let event = parser.parse(&raw(payload)).expect("expected a swap event");
    assert_eq!(event.amount_in, 987_654_321);
}

#[test]
fn address_and_signature_validation() {
    let address = bs58::encode([7u8; 32]).into_string();
    assert!(validate_solana_address(&address).is_ok());
    assert!(validate_solana_address("").is_err());
    assert!(validate_solana_address("not-base58-0OIl").is_err());
    assert!(validate_solana_address(&bs58::encode([7u8; 16]).into_string()).is_err());

    let signature = bs58::encode([9u8; 64]).into_string();
    assert!(validate_signature(&signature).is_ok());
    assert!(validate_signature(&address).is_err());
}
