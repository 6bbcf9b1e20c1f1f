//! JSON-lines bridge between an external radio client and the server.
//!
//! Inbound: one [`InboundEvent`] JSON object per line, either a decoded
//! [`MeshPacket`](super::MeshPacket) or a relayed JS8Call report. Unparseable
//! lines are logged and skipped so a single bad line never stalls the stream.
//! Outbound: one [`OutgoingMessage`] JSON object per line, flushed per message.

use anyhow::Result;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{InboundEvent, OutgoingMessage};
use crate::logutil::escape_log;

/// Read events from `reader` until EOF or until the receiving side hangs up.
/// Returns the number of events forwarded.
pub async fn read_events<R>(reader: R, tx: mpsc::UnboundedSender<InboundEvent>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0usize;
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<InboundEvent>(trimmed) {
            Ok(event) => {
                if tx.send(event).is_err() {
                    debug!("packet receiver closed; stopping stdio reader");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("Skipping unparseable bridge line '{}': {}", escape_log(trimmed), e),
        }
    }
    Ok(forwarded)
}

/// Write every outgoing message to `writer` until the channel closes.
pub async fn write_outgoing<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<OutgoingMessage>,
) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0usize;
    while let Some(msg) = rx.recv().await {
        let mut line = serde_json::to_string(&msg)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}

/// Spawn the stdin reader task.
pub fn spawn_stdin_reader(tx: mpsc::UnboundedSender<InboundEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        match read_events(reader, tx).await {
            Ok(n) => debug!("stdin closed after {} events", n),
            Err(e) => warn!("stdin reader stopped: {}", e),
        }
    })
}

/// Spawn the stdout writer task.
pub fn spawn_stdout_writer(rx: mpsc::UnboundedReceiver<OutgoingMessage>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match write_outgoing(tokio::io::stdout(), rx).await {
            Ok(n) => debug!("stdout writer finished after {} messages", n),
            Err(e) => warn!("stdout writer stopped: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_from(event: Option<InboundEvent>) -> Option<u32> {
        match event {
            Some(InboundEvent::Packet(p)) => p.from,
            _ => None,
        }
    }

    #[tokio::test]
    async fn reader_skips_garbage_lines() {
        let input: &[u8] = concat!(
            r#"{"from":1,"to":2,"decoded":{"portnum":"TEXT_MESSAGE_APP","text":"m"}}"#,
            "\nnot json\n\n",
            r#"{"js8":{"sender":"K1ABC","receiver":"@HB","text":"hi"}}"#,
            "\n",
            r#"{"from":3}"#,
            "\n"
        )
        .as_bytes();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let n = read_events(input, tx).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(packet_from(rx.recv().await), Some(1));
        match rx.recv().await {
            Some(InboundEvent::Js8 { js8 }) => assert_eq!(js8.sender, "K1ABC"),
            other => panic!("expected js8 report, got {:?}", other),
        }
        assert_eq!(packet_from(rx.recv().await), Some(3));
    }

    #[tokio::test]
    async fn writer_emits_one_json_line_per_message() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(OutgoingMessage::direct(5, 0, "hello")).unwrap();
        tx.send(OutgoingMessage::broadcast(0, "all")).unwrap();
        drop(tx);
        let mut buf: Vec<u8> = Vec::new();
        let n = write_outgoing(&mut buf, rx).await.unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], r#"{"to":5,"channel":0,"text":"hello"}"#);
        assert_eq!(lines[1], r#"{"to":null,"channel":0,"text":"all"}"#);
    }
}
