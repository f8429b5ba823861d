use crate::Command;

/// Number of distinct `key=value` pairs tracked per message.
///
/// No command takes more than four keys; the headroom absorbs clients that
/// send extra keys, which are ignored.
pub const PARAMS_LENGTH: usize = 12;

/// A tokenized request line.
///
/// `Message`s are borrowed views over the line they were parsed from.
#[derive(Clone, Copy, Debug)]
pub struct Message<'a> {
    /// The parsed verb, or the raw token when it is not a known command.
    pub verb: Result<Command, &'a str>,
    /// Client-chosen request identifier, echoed verbatim in the reply.
    pub req_id: &'a str,
    params: [(&'a str, &'a str); PARAMS_LENGTH],
    num_params: usize,
}

impl<'a> Message<'a> {
    /// Tokenizes one line (without its CRLF terminator).
    ///
    /// Returns `None` when the line doesn't even have the `verb req_id`
    /// prefix that a reply could be correlated to.  Tokens without a `=` are
    /// skipped; duplicate keys keep the last value.
    pub fn parse(line: &'a str) -> Option<Message<'a>> {
        let mut tokens = line.split_ascii_whitespace();
        let verb = tokens.next()?;
        let req_id = tokens.next()?;

        let mut params = [("", ""); PARAMS_LENGTH];
        let mut num_params = 0;
        for token in tokens {
            let (key, value) = match token.split_once('=') {
                Some(key_value) => key_value,
                None => continue,
            };
            if key.is_empty() {
                continue;
            }
            if let Some(prev) = params[..num_params].iter_mut().find(|(k, _)| *k == key) {
                prev.1 = value;
            } else if num_params < PARAMS_LENGTH {
                params[num_params] = (key, value);
                num_params += 1;
            }
        }

        Some(Message {
            verb: Command::parse(verb).ok_or(verb),
            req_id,
            params,
            num_params,
        })
    }

    /// Returns the value bound to `key`, if any.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.params[..self.num_params]
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, value)| value)
    }
}
