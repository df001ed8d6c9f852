//! Comparison of transaction outputs against expected results

use crate::CheckError;
use simchain_core::{LogEntry, TxExpect, VmOutput};

fn hex_list(items: &[Vec<u8>]) -> String {
    let items: Vec<String> = items.iter().map(|item| format!("0x{}", hex::encode(item))).collect();
    format!("[{}]", items.join(", "))
}

fn log_line(log: &LogEntry) -> String {
    format!(
        "{{identifier: {}, address: {}, topics: {}, data: 0x{}}}",
        String::from_utf8_lossy(&log.identifier),
        log.address,
        hex_list(&log.topics),
        hex::encode(&log.data)
    )
}

fn mismatch(tx_id: &str, field: &'static str, expected: String, actual: String) -> CheckError {
    CheckError {
        tx_id: tx_id.to_string(),
        field,
        expected,
        actual,
    }
}

/// Check a realized output against the expectation of a step.
///
/// Fields left as `None` are not checked; gas only when `check_gas` is set.
pub fn check_tx_results(
    tx_id: &str,
    expect: &TxExpect,
    check_gas: bool,
    output: &VmOutput,
) -> Result<(), CheckError> {
    if let Some(status) = expect.status {
        if status != output.return_code {
            return Err(mismatch(
                tx_id,
                "status",
                status.to_string(),
                format!("{} ({})", output.return_code, output.return_message),
            ));
        }
    }

    if let Some(message) = &expect.message {
        if *message != output.return_message {
            return Err(mismatch(
                tx_id,
                "message",
                message.clone(),
                output.return_message.clone(),
            ));
        }
    }

    if let Some(out) = &expect.out {
        if *out != output.return_data {
            return Err(mismatch(tx_id, "out", hex_list(out), hex_list(&output.return_data)));
        }
    }

    if check_gas {
        if let Some(gas) = expect.gas {
            if gas != output.gas_remaining {
                return Err(mismatch(
                    tx_id,
                    "gas",
                    gas.to_string(),
                    output.gas_remaining.to_string(),
                ));
            }
        }
    }

    if let Some(refund) = &expect.refund {
        if *refund != output.gas_refund {
            return Err(mismatch(
                tx_id,
                "refund",
                refund.to_string(),
                output.gas_refund.to_string(),
            ));
        }
    }

    if let Some(logs) = &expect.logs {
        if logs.len() != output.logs.len() {
            return Err(mismatch(
                tx_id,
                "logs",
                format!("{} entries", logs.len()),
                format!("{} entries", output.logs.len()),
            ));
        }
        for (expected, actual) in logs.iter().zip(&output.logs) {
            if expected != actual {
                return Err(mismatch(tx_id, "logs", log_line(expected), log_line(actual)));
            }
        }
    }

    Ok(())
}
