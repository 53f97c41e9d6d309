// Stdin JSON-lines telemetry source
use crate::application::telemetry_source::{ExternalPayload, TelemetrySource};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Reads one JSON payload per line. Malformed lines are logged and skipped.
pub struct LineTelemetrySource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl LineTelemetrySource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> LineTelemetrySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

/// Parse one line. Only a top-level JSON object is a payload; serde would
/// otherwise map a bare array positionally onto the fields.
pub fn parse_payload(line: &str) -> Result<ExternalPayload> {
    let value: serde_json::Value = serde_json::from_str(line).context("Failed to parse telemetry payload")?;
    if !value.is_object() {
        bail!("Failed to parse telemetry payload: expected a JSON object");
    }
    serde_json::from_value(value).context("Failed to parse telemetry payload")
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> TelemetrySource for LineTelemetrySource<R> {
    async fn next_payload(&mut self) -> Result<Option<ExternalPayload>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("Failed to read telemetry input")?
            else {
                return Ok(None);
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_payload(line) {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) => {
                    tracing::warn!(line = self.line_no, error = %format!("{:#}", e), "skipping malformed telemetry line");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_payloads_and_skips_garbage() {
        let input = b"{\"generation\": 3.5}\n\nnot json\n[1, 2]\n{\"converter\": {\"outputVoltage\": 25.1}}\n";
        let mut source = LineTelemetrySource::new(BufReader::new(&input[..]));

        let first = source.next_payload().await.unwrap().unwrap();
        assert_eq!(first.generation, Some(3.5));

        let second = source.next_payload().await.unwrap().unwrap();
        assert_eq!(second.converter.unwrap().output_voltage, Some(25.1));
        assert_eq!(source.line_no, 5);

        assert!(source.next_payload().await.unwrap().is_none());
    }

    #[test]
    fn test_parse_payload_error_has_context() {
        for line in ["[1, 2]", "not json", "42", "null"] {
            let err = parse_payload(line).unwrap_err();
            assert!(err.to_string().contains("telemetry payload"), "{}: {}", line, err);
        }
    }

    #[test]
    fn test_array_line_is_not_a_payload() {
        assert!(parse_payload("[1, 2]").is_err());
        let payload = parse_payload(r#"{"generation": 1.0, "consumption": 2.0}"#).unwrap();
        assert_eq!(payload.generation, Some(1.0));
        assert_eq!(payload.consumption, Some(2.0));
    }
}
