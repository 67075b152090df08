///
/// Reply grammar.
///
/// Every reply is one of five shapes, each line terminated by CRLF:
/// simple string (`+`), error (`-`), integer (`:`), bulk string (`$`,
/// with `$-1` for absence) and array (`*`) of bulk strings.


/// Shared constant replies.
pub static OK: &str = "+OK\r\n";
pub static PONG: &str = "+PONG\r\n";
pub static NULL_BULK: &str = "$-1\r\n";
pub static EMPTY_MULTI_BULK: &str = "*0\r\n";

pub fn simple(body: &str) -> String {
    format!("+{}\r\n", body)
}

pub fn error(reason: &str) -> String {
    format!("-Error: {}\r\n", reason)
}

pub fn integer(n: i64) -> String {
    format!(":{}\r\n", n)
}

/// Length counts bytes, not characters.
pub fn bulk(s: &str) -> String {
    format!("${}\r\n{}\r\n", s.len(), s)
}

pub fn multi_bulk(items: &[String]) -> String {
    let mut out = format!("*{}\r\n", items.len());
    for item in items {
        out.push_str(&bulk(item));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_test() {
        assert_eq!(simple("PONG"), "+PONG\r\n");
        assert_eq!(error("Unknown command"), "-Error: Unknown command\r\n");
        assert_eq!(integer(42), ":42\r\n");
        assert_eq!(integer(-1), ":-1\r\n");
        assert_eq!(bulk("bar"), "$3\r\nbar\r\n");
        assert_eq!(bulk(""), "$0\r\n\r\n");
    }

    #[test]
    fn bulk_len_counts_bytes_test() {
        // two characters, four bytes
        assert_eq!(bulk("éé"), "$4\r\néé\r\n");
    }

    #[test]
    fn multi_bulk_test() {
        let items = vec!["a".to_string(), "bc".to_string()];
        assert_eq!(multi_bulk(&items), "*2\r\n$1\r\na\r\n$2\r\nbc\r\n");
        assert_eq!(multi_bulk(&[]), EMPTY_MULTI_BULK);
    }
}
