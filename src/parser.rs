//! Request framing: one client buffer in, command tokens out.
//!
//! The recognized form is the length-prefixed array, `*<N>\r\n` followed by
//! N bulk strings (`$<len>\r\n<bytes>\r\n`). Anything that does not open
//! with `*` is treated as an inline command typed by a human and split on
//! whitespace. Malformed headers never raise: the parser stops and hands
//! back whatever tokens it has, and the dispatcher reports the arity error.

pub fn parse_command(input: &[u8]) -> Vec<String> {
    let mut tokens = Vec::new();
    if input.is_empty() {
        return tokens;
    }

    if input[0] != b'*' {
        return String::from_utf8_lossy(input)
            .split_ascii_whitespace()
            .map(|t| t.to_string())
            .collect();
    }

    let mut pos = 1;    // skip '*'
    let count = match read_header(input, &mut pos) {
        Some(n) => n,
        None => return tokens,
    };

    for _ in 0..count {
        if pos >= input.len() || input[pos] != b'$' {
            break;      // format error
        }
        pos += 1;       // skip '$'

        let len = match read_header(input, &mut pos) {
            Some(n) => n,
            None => break,
        };
        if pos + len > input.len() {
            break;      // declared length overruns the buffer
        }
        tokens.push(String::from_utf8_lossy(&input[pos..pos + len]).into_owned());
        pos += len + 2;     // skip token and CRLF
    }
    tokens
}

/// Reads a decimal header terminated by CRLF, advancing `pos` past the
/// terminator. None when the digits are missing or malformed.
fn read_header(input: &[u8], pos: &mut usize) -> Option<usize> {
    let crlf = find_crlf(input, *pos)?;
    let n = std::str::from_utf8(&input[*pos..crlf]).ok()?.parse().ok()?;
    *pos = crlf + 2;
    Some(n)
}

fn find_crlf(input: &[u8], from: usize) -> Option<usize> {
    input[from..].windows(2).position(|w| w == b"\r\n").map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<String> {
        parse_command(input)
    }

    #[test]
    fn array_frame_test() {
        assert_eq!(tokens(b"*1\r\n$4\r\nPING\r\n"), vec!["PING"]);
        assert_eq!(
            tokens(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"),
            vec!["SET", "foo", "bar"]
        );
    }

    #[test]
    fn bulk_preserves_whitespace_test() {
        // the length prefix makes embedded whitespace legal
        assert_eq!(
            tokens(b"*2\r\n$4\r\nECHO\r\n$5\r\na b\tc\r\n"),
            vec!["ECHO", "a b\tc"]
        );
        assert_eq!(tokens(b"*2\r\n$3\r\nGET\r\n$0\r\n\r\n"), vec!["GET", ""]);
    }

    #[test]
    fn inline_fallback_test() {
        assert_eq!(tokens(b"SET foo bar\n"), vec!["SET", "foo", "bar"]);
        assert_eq!(tokens(b"  GET\t missing \r\n"), vec!["GET", "missing"]);
    }

    #[test]
    fn empty_input_test() {
        assert!(tokens(b"").is_empty());
        assert!(tokens(b"   \r\n").is_empty());
    }

    #[test]
    fn malformed_count_test() {
        assert!(tokens(b"*x\r\n$4\r\nPING\r\n").is_empty());
        assert!(tokens(b"*2").is_empty());
        assert!(tokens(b"*-1\r\n").is_empty());
    }

    #[test]
    fn malformed_element_returns_prefix_test() {
        // second element has a broken length header
        assert_eq!(tokens(b"*2\r\n$3\r\nGET\r\n$x\r\nfoo\r\n"), vec!["GET"]);
        // second element missing entirely
        assert_eq!(tokens(b"*2\r\n$3\r\nGET\r\n"), vec!["GET"]);
        // element does not open with '$'
        assert_eq!(tokens(b"*2\r\n$3\r\nGET\r\n:1\r\n"), vec!["GET"]);
    }

    #[test]
    fn overrun_length_test() {
        assert_eq!(tokens(b"*2\r\n$3\r\nGET\r\n$100\r\nfoo\r\n"), vec!["GET"]);
    }

    #[test]
    fn trailing_bytes_ignored_test() {
        assert_eq!(tokens(b"*1\r\n$4\r\nPING\r\nleftover junk"), vec!["PING"]);
    }
}
