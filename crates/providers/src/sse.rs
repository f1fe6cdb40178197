//! Blocking SSE framing shared by provider adapters.
//!
//! The body is read line by line so multi-byte UTF-8 sequences are never
//! split across chunk boundaries. An event ends at a blank line; only its
//! `data:` lines are kept (joined with `\n` when an event carries several).

use std::io::BufRead;

use ts_domain::error::Result;

/// Iterator over the `data:` payloads of an SSE body.
pub(crate) struct SseDataReader<R> {
    reader: R,
    line: String,
    finished: bool,
}

impl<R: BufRead> SseDataReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for SseDataReader<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut data: Vec<String> = Vec::new();
        loop {
            self.line.clear();
            let read = match self.reader.read_line(&mut self.line) {
                Ok(n) => n,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            };

            // EOF flushes a trailing event with no blank-line terminator.
            if read == 0 {
                self.finished = true;
                return if data.is_empty() {
                    None
                } else {
                    Some(Ok(data.join("\n")))
                };
            }

            let line = self.line.trim();
            if line.is_empty() {
                if data.is_empty() {
                    continue;
                }
                return Some(Ok(data.join("\n")));
            }
            if let Some(payload) = line.strip_prefix("data:") {
                let payload = payload.trim();
                if !payload.is_empty() {
                    data.push(payload.to_string());
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(body: &str) -> Vec<String> {
        SseDataReader::new(body.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn single_complete_event() {
        let lines = collect("event: message\ndata: {\"hello\":\"world\"}\n\n");
        assert_eq!(lines, vec!["{\"hello\":\"world\"}"]);
    }

    #[test]
    fn multiple_events() {
        assert_eq!(collect("data: first\n\ndata: second\n\n"), vec!["first", "second"]);
    }

    #[test]
    fn trailing_event_without_terminator_is_flushed() {
        assert_eq!(collect("data: complete\n\ndata: partial"), vec!["complete", "partial"]);
    }

    #[test]
    fn empty_body() {
        assert!(collect("").is_empty());
    }

    #[test]
    fn skips_empty_data_lines() {
        assert!(collect("data: \n\n").is_empty());
    }

    #[test]
    fn ignores_non_data_lines() {
        let lines = collect("event: ping\nid: 42\nretry: 5000\ndata: payload\n\n");
        assert_eq!(lines, vec!["payload"]);
    }

    #[test]
    fn handles_crlf_and_whitespace() {
        let lines = collect("data:   {\"key\":\"val\"}  \r\n\r\n");
        assert_eq!(lines, vec!["{\"key\":\"val\"}"]);
    }

    #[test]
    fn multibyte_text_survives_small_buffers() {
        let body = "data: {\"t\":\"日本語\"}\n\n";
        let reader = std::io::BufReader::with_capacity(3, body.as_bytes());
        let lines: Vec<String> = SseDataReader::new(reader).map(|r| r.unwrap()).collect();
        assert_eq!(lines, vec!["{\"t\":\"日本語\"}"]);
    }
}
