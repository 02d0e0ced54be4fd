//! Parsing helpers for Eastmoney's JavaScript payloads.
//!
//! Eastmoney serves data as JavaScript assignments (`var r = [...];`) rather than
//! JSON documents, so the array literal is sliced out first and then deserialized
//! with path-aware error reporting.

use anyhow::Result;

/// Locate the array literal assigned to `var_name` (e.g. `Data_netWorthTrend`).
///
/// Scans bracket depth while skipping over string literals, so brackets inside
/// fund names do not terminate the slice early.
pub fn extract_js_array<'a>(body: &'a str, var_name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    let assign_start = loop {
        let idx = body[search_from..].find(var_name)? + search_from;
        let after = body[idx + var_name.len()..].trim_start();
        let standalone = body[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        // Reject partial hits like `Data_netWorthTrendX` or the `r` in `var`.
        if standalone && after.starts_with('=') {
            break idx + var_name.len();
        }
        search_from = idx + var_name.len();
    };

    let open = body[assign_start..].find('[')? + assign_start;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in body[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[open..=open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Attempt to parse JSON and, on failure, include a contextual snippet of the
/// line where the error occurred along with the serde path and type mismatch.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner_err = err.inner();
            let (line, column) = (inner_err.line(), inner_err.column());
            let path = err.path().to_string();

            let msg = inner_err.to_string();
            let loc = format!(" at line {line} column {column}");
            let msg_without_loc = msg.strip_suffix(&loc).unwrap_or(&msg);

            let mut final_err = String::new();
            if !path.is_empty() && path != "." {
                final_err.push_str(&format!("at path '{path}': "));
            }
            final_err.push_str(&format!(
                "{} (line {line} col {column})\n{}",
                describe_mismatch(msg_without_loc),
                error_snippet(body, line, column, 24)
            ));

            Err(anyhow::anyhow!(final_err))
        }
    }
}

/// Rewrite "invalid type: X, expected Y" as "expected Y, got X".
fn describe_mismatch(error_msg: &str) -> String {
    if let Some(rest) = error_msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    error_msg.to_string()
}

/// Character-based snippet around `column` (1-based); payloads are full of CJK
/// text, so byte slicing is not safe here.
fn error_snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target_line = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target_line.is_empty() {
        return "(empty line)".to_string();
    }

    // serde_json reports byte columns; map to a char index.
    let byte_idx = column.saturating_sub(1).min(target_line.len());
    let error_idx = target_line
        .char_indices()
        .take_while(|(i, _)| *i < byte_idx)
        .count();

    let half_len = context_len / 2;
    let start = error_idx.saturating_sub(half_len);
    let slice: String = target_line.chars().skip(start).take(context_len).collect();
    let indicator = " ".repeat(error_idx - start) + "^";

    format!("...{slice}...\n   {indicator}")
}
