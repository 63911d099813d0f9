//! Duplex channel over a byte stream pair, such as a child process's stdio.
//!
//! Each message is one line of JSON. Floats use serde_json's round-trip
//! formatting, so an `f64` arrives bit-identical.

use std::io::{self, BufRead, BufReader, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::SyncError;

/// The endpoint a worker process uses to talk to its parent.
pub type StdioEndpoint = StreamEndpoint<io::StdinLock<'static>, io::Stdout>;

/// A message endpoint reading from `R` and writing to `W`.
#[derive(Debug)]
pub struct StreamEndpoint<R, W: Write> {
    reader: Option<BufReader<R>>,
    writer: Option<W>,
    line: String,
}

impl StreamEndpoint<io::StdinLock<'static>, io::Stdout> {
    /// Wraps the current process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> StdioEndpoint {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: Read, W: Write> StreamEndpoint<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            writer: Some(writer),
            line: String::new(),
        }
    }

    /// Writes one message and flushes it.
    ///
    /// # Errors
    ///
    /// [`SyncError::ChannelClosed`] when this end is closed or the reader on
    /// the other side has gone away; [`SyncError::Codec`] or
    /// [`SyncError::Io`] for other failures.
    pub fn send<T: Serialize>(&mut self, message: &T) -> Result<(), SyncError> {
        let writer = self.writer.as_mut().ok_or(SyncError::ChannelClosed)?;
        let mut frame = serde_json::to_vec(message)?;
        frame.push(b'\n');
        writer
            .write_all(&frame)
            .and_then(|()| writer.flush())
            .map_err(closed_or_io)
    }

    /// Reads the next message, blocking until a full line arrives.
    ///
    /// # Errors
    ///
    /// [`SyncError::ChannelClosed`] at end of stream or after
    /// [`StreamEndpoint::close`]; [`SyncError::Codec`] for a malformed line.
    pub fn receive<T: DeserializeOwned>(&mut self) -> Result<T, SyncError> {
        let reader = self.reader.as_mut().ok_or(SyncError::ChannelClosed)?;
        self.line.clear();
        let read = reader.read_line(&mut self.line).map_err(closed_or_io)?;
        if read == 0 {
            return Err(SyncError::ChannelClosed);
        }
        Ok(serde_json::from_str(self.line.trim_end())?)
    }

    /// Flushes and drops the writer so the peer sees end of stream.
    ///
    /// # Errors
    ///
    /// [`SyncError::Io`] when the final flush fails.
    pub fn close_write(&mut self) -> Result<(), SyncError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(closed_or_io)?;
        }
        Ok(())
    }

    /// Closes both directions. Idempotent.
    ///
    /// # Errors
    ///
    /// As for [`StreamEndpoint::close_write`].
    pub fn close(&mut self) -> Result<(), SyncError> {
        self.reader = None;
        self.close_write()
    }

    /// Gives back the writer, flushed, leaving this end closed for writing.
    #[must_use]
    pub fn into_writer(mut self) -> Option<W> {
        let mut writer = self.writer.take()?;
        writer.flush().ok()?;
        Some(writer)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}

impl<R, W: Write> Drop for StreamEndpoint<R, W> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

fn closed_or_io(err: io::Error) -> SyncError {
    match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset => SyncError::ChannelClosed,
        _ => SyncError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Cursor;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        label: String,
        value: Option<f64>,
    }

    #[test]
    fn frames_are_newline_delimited_json() {
        let mut endpoint = StreamEndpoint::new(io::empty(), Vec::new());
        endpoint.send(&Sample { label: "a".into(), value: None }).unwrap();
        endpoint.send(&1u8).unwrap();
        let written = endpoint.writer.take().unwrap();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "{\"label\":\"a\",\"value\":null}\n1\n"
        );
    }

    #[test]
    fn reads_frames_until_end_of_stream() {
        let input = Cursor::new("{\"label\":\"x\",\"value\":0.1}\n{\"label\":\"y\",\"value\":null}\n");
        let mut endpoint = StreamEndpoint::new(input, io::sink());
        let first: Sample = endpoint.receive().unwrap();
        assert_eq!(first.value.map(f64::to_bits), Some(0.1f64.to_bits()));
        let second: Sample = endpoint.receive().unwrap();
        assert_eq!(second.value, None);
        assert!(matches!(
            endpoint.receive::<Sample>(),
            Err(SyncError::ChannelClosed)
        ));
    }

    #[test]
    fn malformed_frame_is_a_codec_error() {
        let mut endpoint = StreamEndpoint::new(Cursor::new("not json\n"), io::sink());
        assert!(matches!(endpoint.receive::<u8>(), Err(SyncError::Codec(_))));
    }

    #[test]
    fn closed_endpoint_refuses_traffic() {
        let mut endpoint = StreamEndpoint::new(Cursor::new("1\n"), Vec::new());
        endpoint.close().unwrap();
        endpoint.close().unwrap();
        assert!(endpoint.is_closed());
        assert!(matches!(endpoint.send(&1u8), Err(SyncError::ChannelClosed)));
        assert!(matches!(endpoint.receive::<u8>(), Err(SyncError::ChannelClosed)));
    }
}
