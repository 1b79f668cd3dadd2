//! Bounds-checked cursor over PDU bytes

use atsms_core::CodecError;

pub(crate) struct PduReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PduReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn read_u8(&mut self, field: &str) -> Result<u8, CodecError> {
        let byte = *self.data.get(self.offset).ok_or_else(|| {
            CodecError::malformed(self.offset, format!("missing {}", field))
        })?;
        self.offset += 1;
        Ok(byte)
    }

    pub(crate) fn read_bytes(&mut self, len: usize, field: &str) -> Result<&'a [u8], CodecError> {
        let end = self.offset.checked_add(len).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(CodecError::malformed(
                self.offset,
                format!(
                    "{} needs {} bytes, only {} left",
                    field,
                    len,
                    self.data.len() - self.offset
                ),
            ));
        };
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }
}
