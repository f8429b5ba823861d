use crate::code::Code;

/// Accumulates outgoing lines.
///
/// Lines are started with [`Buffer::ok`], [`Buffer::err`] and
/// [`Buffer::push`], and the whole batch is sent to a connection in one
/// write.
#[derive(Debug, Default)]
pub struct Buffer {
    buf: String,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Starts an `OK` reply line for the given request.
    pub fn ok<'a>(&'a mut self, req_id: &str) -> MessageBuffer<'a> {
        MessageBuffer::with(&mut self.buf, "OK", req_id)
    }

    /// Appends a complete `ERR` reply line.
    pub fn err(&mut self, req_id: &str, code: Code, reason: &str) {
        self.buf.push_str("ERR ");
        self.buf.push_str(req_id);
        self.buf.push(' ');
        self.buf.push_str(&code.to_string());
        self.buf.push(' ');
        self.buf.push_str(reason);
        self.buf.push_str("\r\n");
    }

    /// Starts a `PUSH` line with the given subject.
    pub fn push<'a>(&'a mut self, subject: &str) -> MessageBuffer<'a> {
        MessageBuffer::with(&mut self.buf, "PUSH", subject)
    }

    pub fn build(self) -> String {
        self.buf
    }
}

/// Builds one line inside a [`Buffer`].
///
/// The line terminator is appended when the `MessageBuffer` is dropped.
pub struct MessageBuffer<'a> {
    buf: &'a mut String,
}

impl<'a> MessageBuffer<'a> {
    fn with(buf: &'a mut String, kind: &str, head: &str) -> MessageBuffer<'a> {
        buf.push_str(kind);
        buf.push(' ');
        buf.push_str(head);
        MessageBuffer { buf }
    }

    /// Appends a `key=value` field.
    ///
    /// `value` must not contain spaces, the field separator.
    pub fn field(self, key: &str, value: &str) -> MessageBuffer<'a> {
        self.buf.push(' ');
        self.buf.push_str(key);
        self.buf.push('=');
        self.buf.push_str(value);
        self
    }

    /// Appends ` key=` and hands out the value slot, for values that are
    /// cheaper to write in place than to allocate first.
    pub fn raw_field(&mut self, key: &str) -> &mut String {
        self.buf.push(' ');
        self.buf.push_str(key);
        self.buf.push('=');
        &mut *self.buf
    }
}

impl Drop for MessageBuffer<'_> {
    fn drop(&mut self) {
        self.buf.push_str("\r\n");
    }
}

/// A [`Buffer`] bound to one request's `req_id`.
#[derive(Debug)]
pub struct ReplyBuffer {
    buf: Buffer,
    req_id: String,
}

impl ReplyBuffer {
    pub fn new(req_id: &str) -> ReplyBuffer {
        ReplyBuffer {
            buf: Buffer::new(),
            req_id: req_id.to_owned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Starts the `OK` reply line.
    pub fn ok(&mut self) -> MessageBuffer<'_> {
        self.buf.ok(&self.req_id)
    }

    /// Appends the `ERR` reply line.
    pub fn err(&mut self, code: Code, reason: &str) {
        self.buf.err(&self.req_id, code, reason);
    }

    pub fn build(self) -> String {
        self.buf.build()
    }
}
