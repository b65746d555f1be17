//! A single IPC client connection.
//!
//! Bytes are read in fixed-size chunks and appended to a receive buffer;
//! complete lines are then cut off the front with [`Connection::next_line`].
//! A trailing partial line stays buffered until the rest of it arrives.

use calloop::RegistrationToken;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

/// Bytes requested from the socket per read.
pub const READ_CHUNK: usize = 4096;

/// Outcome of [`Connection::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// New bytes were appended to the buffer.
    Data,
    /// Nothing to read right now.
    WouldBlock,
    /// The peer hung up or the read failed.
    Closed,
    /// The buffer grew past its ceiling without a complete line.
    Overflow,
}

/// One connected client.
#[derive(Debug)]
pub struct Connection {
    stream: UnixStream,
    recv_buf: Vec<u8>,
    max_recv_buf: usize,
    subscribed: bool,
    token: Option<RegistrationToken>,
}

impl Connection {
    /// Wrap an accepted stream, switching it to non-blocking mode.
    pub fn new(stream: UnixStream, max_recv_buf: usize) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            recv_buf: Vec::new(),
            max_recv_buf,
            subscribed: false,
            token: None,
        })
    }

    pub fn stream(&self) -> &UnixStream {
        &self.stream
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Opt into event delivery.  There is no way back.
    pub fn subscribe(&mut self) {
        self.subscribed = true;
    }

    pub fn token(&self) -> Option<RegistrationToken> {
        self.token
    }

    pub fn set_token(&mut self, token: RegistrationToken) {
        self.token = Some(token);
    }

    /// Number of bytes waiting for a newline.
    pub fn buffered(&self) -> usize {
        self.recv_buf.len()
    }

    /// Read one chunk from the socket into the buffer.
    pub fn fill(&mut self) -> ReadStatus {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return ReadStatus::Closed,
                Ok(n) => {
                    self.recv_buf.extend_from_slice(&chunk[..n]);
                    if self.recv_buf.len() > self.max_recv_buf {
                        return ReadStatus::Overflow;
                    }
                    return ReadStatus::Data;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadStatus::WouldBlock,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("client read failed: {}", e);
                    return ReadStatus::Closed;
                }
            }
        }
    }

    /// Take the next complete line off the buffer, without its `\n`.
    ///
    /// Lines are handed out as raw bytes; decoding is up to the caller.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.recv_buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.recv_buf.drain(..=end).collect();
        line.truncate(end);
        Some(line)
    }

    /// Write `data` in full.
    ///
    /// The socket is non-blocking, so a peer that stops reading eventually
    /// makes this fail with `WouldBlock`; the caller treats that like any
    /// other write error.
    pub fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)
    }

    /// Shut the socket down in both directions.
    ///
    /// Other handles to the same socket (the event loop's clone) see the
    /// hang-up as well.
    pub fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
