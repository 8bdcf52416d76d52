//! Human-in-the-loop input.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

const PROMPT: &str = "Human input: ";

/// Reads a line from a human and frames it as a `HUMAN:` transcript segment,
/// ready to go into a `chat_history` prompt variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanAgent;

impl HumanAgent {
    pub fn new() -> Self {
        Self
    }

    /// Prompt on stdout and read one line from stdin.
    pub async fn execute(&self) -> anyhow::Result<String> {
        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.execute_with(&mut stdin, &mut stdout).await
    }

    /// Write the prompt to `writer`, leaving the cursor on the same line,
    /// then read the answer from `reader`.
    pub async fn execute_with<R, W>(&self, reader: &mut R, writer: &mut W) -> anyhow::Result<String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer.write_all(PROMPT.as_bytes()).await?;
        writer.flush().await?;
        self.execute_from(reader).await
    }

    /// Read one line from `reader`.
    pub async fn execute_from<R>(&self, reader: &mut R) -> anyhow::Result<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await.map_err(|e| {
            error!("Error capturing human input: {}", e);
            anyhow::Error::from(e)
        })?;
        if read == 0 {
            error!("Error capturing human input: end of input");
            anyhow::bail!("No human input: end of input");
        }

        let content = line.trim_end_matches(['\r', '\n']);
        let formatted = format!("HUMAN: {}\n", content);
        info!("Captured human input: {}", formatted.trim());
        Ok(formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_one_line() {
        let mock = tokio_test::io::Builder::new()
            .read(b"what is rust?\r\nsecond line\n")
            .build();
        let mut reader = BufReader::new(mock);

        let out = HumanAgent::new().execute_from(&mut reader).await.unwrap();
        assert_eq!(out, "HUMAN: what is rust?\n");
    }

    #[tokio::test]
    async fn prompt_stays_on_input_line() {
        let mut reader = BufReader::new(tokio_test::io::Builder::new().read(b"yes\n").build());
        let mut writer = tokio_test::io::Builder::new().write(b"Human input: ").build();

        let out = HumanAgent::new()
            .execute_with(&mut reader, &mut writer)
            .await
            .unwrap();
        assert_eq!(out, "HUMAN: yes\n");
    }

    #[tokio::test]
    async fn end_of_input_is_an_error() {
        let mock = tokio_test::io::Builder::new().build();
        let mut reader = BufReader::new(mock);

        let err = HumanAgent::new().execute_from(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("end of input"));
    }

    #[tokio::test]
    async fn read_errors_propagate() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::Other, "tty gone"))
            .build();
        let mut reader = BufReader::new(mock);

        let err = HumanAgent::new().execute_from(&mut reader).await.unwrap_err();
        assert_eq!(err.to_string(), "tty gone");
    }
}
