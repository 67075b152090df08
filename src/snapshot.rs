use std::{collections::{HashMap, VecDeque}, fs::{remove_file, rename, File}, io::{self, BufRead, BufReader, BufWriter, Write}, path::Path, process::id, time::Instant};
use crate::db::{Database, Object, Store};


///
/// Snapshot codec: the whole store round-trips through a text file, one
/// record per LF-terminated line, dispatched on a leading type tag:
///
///   K <key> <value>
///   L <key> <item1> <item2> ...
///   H <key> <field1>:<value1> <field2>:<value2> ...
///
/// Whitespace separates fields and a colon separates hash pairs, so those
/// characters (and the backslash) are escaped per field on the way out and
/// reversed on the way in. Files written without escaping still load.
///


impl Database {
    /// Point-in-time dump under the engine lock. Writes a temp file next to
    /// the target and renames it into place, so a crash mid-write never
    /// clobbers the last good snapshot.
    pub fn dump(&self, filename: &str) -> io::Result<()> {
        let mut store = self.store.lock().unwrap();

        // a snapshot never carries keys already past their deadline
        let now = Instant::now();
        let dead: Vec<String> = store.expires.iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dead {
            store.dict.remove(key);
            store.expires.remove(key);
        }

        let temp = Path::new(filename).with_file_name(format!("temp-{}.mdb", id()));
        match write_records(&store, &temp) {
            Ok(_) => rename(&temp, filename),
            Err(e) => {
                let _ = remove_file(&temp);
                Err(e)
            },
        }
    }

    /// Replaces the whole store with the file's records. A failure to open
    /// leaves the store untouched; once reading starts, the keyspaces and
    /// the expiry index are cleared first. Malformed lines and unknown tags
    /// are skipped.
    pub fn load(&self, filename: &str) -> io::Result<()> {
        let file = File::open(filename)?;
        let mut store = self.store.lock().unwrap();
        store.dict.clear();
        store.expires.clear();

        for line in BufReader::new(file).lines() {
            let line = line?;
            let mut fields = line.split_ascii_whitespace();
            let tag = match fields.next() {
                Some(t) => t,
                None => continue,
            };
            match tag {
                "K" => {
                    if let (Some(key), Some(value)) = (fields.next(), fields.next()) {
                        store.dict.insert(unescape(key), Object::String(unescape(value)));
                    }
                },
                "L" => {
                    if let Some(key) = fields.next() {
                        let items: VecDeque<String> = fields.map(unescape).collect();
                        store.dict.insert(unescape(key), Object::List(items));
                    }
                },
                "H" => {
                    if let Some(key) = fields.next() {
                        let mut hash = HashMap::new();
                        for pair in fields {
                            // the separator is the first colon
                            if let Some((field, value)) = pair.split_once(':') {
                                hash.insert(unescape(field), unescape(value));
                            }
                        }
                        store.dict.insert(unescape(key), Object::Hash(hash));
                    }
                },
                _ => {},    // unknown tag
            }
        }
        Ok(())
    }
}

// scalars, then lists, then hashes
fn write_records(store: &Store, temp: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(temp)?);
    for (key, obj) in &store.dict {
        if let Object::String(value) = obj {
            writeln!(writer, "K {} {}", escape(key), escape(value))?;
        }
    }
    for (key, obj) in &store.dict {
        if let Object::List(items) = obj {
            write!(writer, "L {}", escape(key))?;
            for item in items {
                write!(writer, " {}", escape(item))?;
            }
            writeln!(writer)?;
        }
    }
    for (key, obj) in &store.dict {
        if let Object::Hash(hash) = obj {
            write!(writer, "H {}", escape(key))?;
            for (field, value) in hash {
                write!(writer, " {}:{}", escape(field), escape(value))?;
            }
            writeln!(writer)?;
        }
    }
    writer.flush()
}

fn escape(field: &str) -> String {
    if field.is_empty() {
        return "\\e".to_string();
    }
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ' ' => out.push_str("\\s"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('s') => out.push(' '),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            Some('e') => {},
            // not a sequence we write; keep it verbatim
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;
    use tempfile::tempdir;
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn escape_round_trip_test() {
        for raw in ["plain", "a b", "a:b", "a\\b", "tab\there", "nl\nhere", "cr\rhere", "", "\\s", "mixed \\ : \t"] {
            let escaped = escape(raw);
            assert!(!escaped.is_empty());
            assert!(!escaped.contains(' ') && !escaped.contains(':') && !escaped.contains('\n'));
            assert_eq!(unescape(&escaped), raw);
        }
        // sequences we never write pass through verbatim
        assert_eq!(unescape("a\\qb"), "a\\qb");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn dump_load_round_trip_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.myrdb");
        let path = path.to_str().unwrap();

        let db = Database::new();
        db.set("foo", "bar");
        db.set("spaced", "a b:c\\d");
        db.set("empty", "");
        db.rpush("l", &strings(&["x", "y y", "z:z"])).unwrap();
        db.rpush("emptylist", &strings(&["a"])).unwrap();
        db.lpop("emptylist").unwrap();
        db.hset("h", "f1", "v 1").unwrap();
        db.hset("h", "f:2", "v2").unwrap();
        db.dump(path).unwrap();

        let fresh = Database::new();
        fresh.load(path).unwrap();
        assert_eq!(fresh.get("foo"), Ok(Some("bar".to_string())));
        assert_eq!(fresh.get("spaced"), Ok(Some("a b:c\\d".to_string())));
        assert_eq!(fresh.get("empty"), Ok(Some("".to_string())));
        assert_eq!(fresh.lrange("l", 0, -1), Ok(Some(strings(&["x", "y y", "z:z"]))));
        assert_eq!(fresh.key_type("emptylist"), "list");
        assert_eq!(fresh.llen("emptylist"), Ok(Some(0)));
        assert_eq!(fresh.hget("h", "f1"), Ok(Some("v 1".to_string())));
        assert_eq!(fresh.hget("h", "f:2"), Ok(Some("v2".to_string())));
        assert_eq!(fresh.hlen("h"), Ok(2));
    }

    #[test]
    fn load_missing_file_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.myrdb");

        let db = Database::new();
        db.set("keep", "me");
        assert!(db.load(path.to_str().unwrap()).is_err());
        // open failure leaves the store untouched
        assert_eq!(db.get("keep"), Ok(Some("me".to_string())));
    }

    #[test]
    fn load_replaces_state_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.myrdb");
        fs::write(&path, "K fresh value\n").unwrap();

        let db = Database::new();
        db.set("stale", "gone");
        db.expire("stale", 100);
        db.load(path.to_str().unwrap()).unwrap();
        assert_eq!(db.get("stale"), Ok(None));
        assert_eq!(db.get("fresh"), Ok(Some("value".to_string())));
        // the expiry index is cleared along with the keyspaces
        assert_eq!(db.counts(), (1, 0));
    }

    #[test]
    fn load_skips_junk_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.myrdb");
        fs::write(
            &path,
            "X mystery record\nK short\n\nK good value\nL l a b\nH h f:v nocolon\n",
        )
        .unwrap();

        let db = Database::new();
        db.load(path.to_str().unwrap()).unwrap();
        assert_eq!(db.get("good"), Ok(Some("value".to_string())));
        assert_eq!(db.get("short"), Ok(None));
        assert_eq!(db.lrange("l", 0, -1), Ok(Some(strings(&["a", "b"]))));
        // the pair without a colon is dropped, the well-formed one kept
        assert_eq!(db.hlen("h"), Ok(1));
        assert_eq!(db.hget("h", "f"), Ok(Some("v".to_string())));
    }

    #[test]
    fn load_unescaped_legacy_file_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.myrdb");
        fs::write(&path, "K foo bar\nL l a b c\nH h f1:v1 f2:v2\n").unwrap();

        let db = Database::new();
        db.load(path.to_str().unwrap()).unwrap();
        assert_eq!(db.get("foo"), Ok(Some("bar".to_string())));
        assert_eq!(db.lrange("l", 0, -1), Ok(Some(strings(&["a", "b", "c"]))));
        assert_eq!(db.hget("h", "f2"), Ok(Some("v2".to_string())));
    }

    #[test]
    fn dump_skips_expired_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.myrdb");
        let path = path.to_str().unwrap();

        let db = Database::new();
        db.set("live", "v");
        db.set("dead", "v");
        db.expire("dead", 0);
        db.dump(path).unwrap();

        let fresh = Database::new();
        fresh.load(path).unwrap();
        assert_eq!(fresh.get("live"), Ok(Some("v".to_string())));
        assert_eq!(fresh.get("dead"), Ok(None));
    }
}
