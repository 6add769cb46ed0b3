//! Streaming `multipart/form-data` extractor for the upload route.
//!
//! The request body is fed in arbitrary slices as it is read from the
//! socket; the bytes of the first part that carries a `filename` are handed
//! to a callback as soon as they are known not to belong to the closing
//! delimiter. Only `delimiter.len() - 1` bytes are ever held back, so a
//! ringtone never has to fit in RAM.

/// Longest part header block accepted.
const MAX_HEADER_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the first delimiter.
    Preamble,
    /// Just past a delimiter: `\r\n` starts a part, `--` ends the body.
    AfterDelimiter,
    Headers,
    Body { is_file: bool },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    HeadersTooLong,
    Malformed,
}

pub struct MultipartExtractor {
    delimiter: Vec<u8>,
    state: State,
    buf: Vec<u8>,
    file_seen: bool,
    emitted: u32,
}

impl MultipartExtractor {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            delimiter,
            state: State::Preamble,
            // The first delimiter has no leading CRLF; pretend it does.
            buf: b"\r\n".to_vec(),
            file_seen: false,
            emitted: 0,
        }
    }

    /// Consume `data`, passing file payload bytes to `out`.
    pub fn feed(&mut self, data: &[u8], out: &mut impl FnMut(&[u8])) -> Result<(), MultipartError> {
        if self.state == State::Done {
            return Ok(());
        }
        self.buf.extend_from_slice(data);

        loop {
            match self.state {
                State::Preamble => match find(&self.buf, &self.delimiter) {
                    Some(pos) => {
                        self.buf.drain(..pos + self.delimiter.len());
                        self.state = State::AfterDelimiter;
                    }
                    None => {
                        self.keep_tail();
                        return Ok(());
                    }
                },

                State::AfterDelimiter => {
                    if self.buf.len() < 2 {
                        return Ok(());
                    }
                    match &self.buf[..2] {
                        b"--" => {
                            self.state = State::Done;
                            self.buf.clear();
                            return Ok(());
                        }
                        b"\r\n" => {
                            self.buf.drain(..2);
                            self.state = State::Headers;
                        }
                        _ => return Err(MultipartError::Malformed),
                    }
                }

                State::Headers => match find(&self.buf, b"\r\n\r\n") {
                    Some(pos) => {
                        let headers = String::from_utf8_lossy(&self.buf[..pos]).to_ascii_lowercase();
                        let is_file = !self.file_seen && headers.contains("filename=");
                        self.file_seen |= is_file;
                        self.buf.drain(..pos + 4);
                        self.state = State::Body { is_file };
                    }
                    None if self.buf.len() > MAX_HEADER_BYTES => {
                        return Err(MultipartError::HeadersTooLong);
                    }
                    None => return Ok(()),
                },

                State::Body { is_file } => match find(&self.buf, &self.delimiter) {
                    Some(pos) => {
                        if is_file {
                            self.emit(pos, out);
                        }
                        self.buf.drain(..pos + self.delimiter.len());
                        self.state = State::AfterDelimiter;
                    }
                    None => {
                        let safe = self.buf.len().saturating_sub(self.delimiter.len() - 1);
                        if is_file {
                            self.emit(safe, out);
                        }
                        self.buf.drain(..safe);
                        return Ok(());
                    }
                },

                State::Done => return Ok(()),
            }
        }
    }

    /// The closing delimiter has been seen.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// A part with a filename was found.
    pub fn found_file(&self) -> bool {
        self.file_seen
    }

    /// File payload bytes passed to the callback so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    fn emit(&mut self, len: usize, out: &mut impl FnMut(&[u8])) {
        if len > 0 {
            out(&self.buf[..len]);
            self.emitted += len as u32;
        }
    }

    fn keep_tail(&mut self) {
        let keep = self.delimiter.len() - 1;
        if self.buf.len() > keep {
            self.buf.drain(..self.buf.len() - keep);
        }
    }
}

/// Extract the boundary parameter from a `Content-Type` header value.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    let (mime, params) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params.split(';').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty() && value.len() <= 70).then_some(value)
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
