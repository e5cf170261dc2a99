//! JSON output helpers.

use anyhow::Result;
use runshape_core::RouteError;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

/// `{"error": <kind>, "reason": <message>}` for a failed generation.
pub fn error_json(err: &RouteError) -> serde_json::Value {
    serde_json::json!({
        "error": err.kind(),
        "reason": err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_json_carries_kind_and_reason() {
        let value = error_json(&RouteError::NoCandidatesSucceeded { tried: 4 });
        assert_eq!(value["error"], "no_candidates_succeeded");
        assert_eq!(value["reason"], "could not find a suitable route; tried 4 shapes");
    }
}
