//! Bounded byte-channel `Read`/`Write` adapter (§5).
//!
//! The core has no async runtime: a producer thread streaming bytes off
//! the wire and a consumer thread rewriting them overlap via a bounded
//! `std::sync::mpsc` channel instead of cooperative tasks. `ChannelWriter`
//! and `ChannelReader` let both sides keep using plain `Read`/`Write`.

use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

pub struct ChannelWriter {
    tx: SyncSender<Vec<u8>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "reader side dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0), // writer side dropped: EOF
            }
        }

        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Create a bounded byte pipe. `capacity` is the number of in-flight
/// chunks the channel will buffer before `write` blocks.
pub fn byte_pipe(capacity: usize) -> (ChannelWriter, ChannelReader) {
    let (tx, rx) = sync_channel(capacity);
    (
        ChannelWriter { tx },
        ChannelReader {
            rx,
            pending: Vec::new(),
            pos: 0,
        },
    )
}
