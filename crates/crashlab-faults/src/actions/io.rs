//! I/O, parsing and lifetime faults

use std::hint::black_box;

use chrono::NaiveDate;
use crashlab_core::domain::FaultError;
use tracing::info;

use super::OrRaise;
use crate::catalog::FaultArgs;
use crate::context::FaultContext;

/// A byte stream that refuses reads once disposed
#[derive(Debug)]
pub struct DisposableBuffer {
    data: Option<Vec<u8>>,
    position: usize,
}

impl DisposableBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            position: 0,
        }
    }

    /// Frees the backing storage. Disposing twice is a no-op.
    pub fn dispose(&mut self) {
        self.data = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.data.is_none()
    }

    /// Reads the next byte, `None` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>, FaultError> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| FaultError::Disposed("DisposableBuffer".to_string()))?;
        let byte = data.get(self.position).copied();
        if byte.is_some() {
            self.position += 1;
        }
        Ok(byte)
    }
}

pub(crate) fn file_write_denied(ctx: &FaultContext, _args: &FaultArgs) {
    let path = ctx.faults().denied_path();
    std::fs::write(&path, "test").or_raise();
    info!(path = %path.display(), "Protected path accepted the write");
}

pub(crate) fn json_parse_error(_ctx: &FaultContext, _args: &FaultArgs) {
    let date = NaiveDate::parse_from_str(black_box("not-a-date"), "%Y-%m-%d").or_raise();
    info!(%date, "Parsed date");
}

pub(crate) fn use_after_dispose(_ctx: &FaultContext, _args: &FaultArgs) {
    let mut buffer = DisposableBuffer::new(vec![1, 2, 3]);
    buffer.dispose();
    let byte = buffer.read_byte().or_raise();
    info!(?byte, "Read from buffer");
}
