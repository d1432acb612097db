//! Helpers that answer common questions from a normalized state.

use bp_ao::ProcessState;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    pub already_claimed: bool,
    pub available: bool,
    pub sold_out: bool,
    pub claimed_count: u64,
    pub total_supply: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_supply: Option<u64>,
    pub claimed: u64,
    pub remaining: Option<u64>,
}

/// Claim status of `wallet` (or its `profile`) for a claimable asset.
///
/// The claims table is authoritative. Without one, a positive balance counts as a claim.
pub fn claim_status(state: &ProcessState, wallet: &str, profile: Option<&str>) -> ClaimStatus {
    let holders: Vec<&str> = std::iter::once(wallet).chain(profile).collect();
    let total_supply = state.field("TotalSupply").and_then(as_u64);

    let (already_claimed, claimed_count) = match state.field("Claims") {
        Some(claims) => (holders.iter().any(|h| claimed_by(claims, h)), claims_len(claims)),
        None => {
            let balances = state.field("Balances");
            let claimed = holders.iter().any(|h| balance(state, h).is_some_and(|b| b > 0));
            let count = balances
                .and_then(Value::as_object)
                .map(|b| b.values().filter(|v| as_u128(v).is_some_and(|n| n > 0)).count() as u64)
                .unwrap_or(0);
            (claimed, count)
        }
    };

    let sold_out = total_supply.is_some_and(|total| claimed_count >= total);
    ClaimStatus { already_claimed, available: !already_claimed && !sold_out, sold_out, claimed_count, total_supply }
}

/// Balance of `address`, accepting numeric and string amounts.
pub fn balance(state: &ProcessState, address: &str) -> Option<u128> {
    state.field("Balances")?.get(address).and_then(as_u128)
}

pub fn stats(state: &ProcessState) -> Stats {
    let explicit = state.field("Stats");
    let total_supply = explicit
        .and_then(|s| s.get("TotalSupply").or_else(|| s.get("totalSupply")))
        .and_then(as_u64)
        .or_else(|| state.field("TotalSupply").and_then(as_u64));
    let claimed = explicit
        .and_then(|s| s.get("Claimed").or_else(|| s.get("claimed")))
        .and_then(as_u64)
        .unwrap_or_else(|| state.field("Claims").map(claims_len).unwrap_or(0));

    Stats { total_supply, claimed, remaining: total_supply.map(|total| total.saturating_sub(claimed)) }
}

fn claimed_by(claims: &Value, holder: &str) -> bool {
    match claims {
        Value::Object(map) => map.get(holder).is_some_and(truthy),
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(holder)),
        _ => false,
    }
}

fn claims_len(claims: &Value) -> u64 {
    match claims {
        Value::Object(map) => map.values().filter(|v| truthy(v)).count() as u64,
        Value::Array(items) => items.len() as u64,
        _ => 0,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "false",
        _ => true,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    as_u128(value).and_then(|n| u64::try_from(n).ok())
}

fn as_u128(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn state(value: Value) -> ProcessState {
        ProcessState(value)
    }

    #[rstest]
    #[case::claimed_by_wallet(json!({ "Claims": { "w": true }, "TotalSupply": 10 }), None, true, false)]
    #[case::claimed_by_profile(json!({ "Claims": { "p": 1712000000 } }), Some("p"), true, false)]
    #[case::not_claimed(json!({ "Claims": { "x": true }, "TotalSupply": "10" }), None, false, false)]
    #[case::sold_out(json!({ "Claims": ["a", "b"], "TotalSupply": 2 }), None, false, true)]
    #[case::balance_heuristic(json!({ "Balances": { "w": "1" }, "TotalSupply": 5 }), None, true, false)]
    #[case::claims_beat_balances(json!({ "Claims": {}, "Balances": { "w": "1" } }), None, false, false)]
    fn claim_status_cases(
        #[case] raw: Value,
        #[case] profile: Option<&str>,
        #[case] already_claimed: bool,
        #[case] sold_out: bool,
    ) {
        let status = claim_status(&state(raw), "w", profile);
        assert_eq!(status.already_claimed, already_claimed);
        assert_eq!(status.sold_out, sold_out);
        assert_eq!(status.available, !already_claimed && !sold_out);
    }

    #[test]
    fn balances_accept_numbers_and_strings() {
        let s = state(json!({ "Balances": { "a": 5, "b": "340282366920938463463374607431768211455", "c": "x" } }));
        assert_eq!(balance(&s, "a"), Some(5));
        assert_eq!(balance(&s, "b"), Some(u128::MAX));
        assert_eq!(balance(&s, "c"), None);
        assert_eq!(balance(&s, "missing"), None);
    }

    #[test]
    fn stats_prefers_explicit_table() {
        let explicit = state(json!({ "Stats": { "TotalSupply": 100, "Claimed": 40 }, "Claims": { "a": true } }));
        assert_eq!(stats(&explicit), Stats { total_supply: Some(100), claimed: 40, remaining: Some(60) });

        let derived = state(json!({ "Claims": { "a": true, "b": false }, "TotalSupply": "3" }));
        assert_eq!(stats(&derived), Stats { total_supply: Some(3), claimed: 1, remaining: Some(2) });
    }
}
