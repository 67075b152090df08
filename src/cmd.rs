use std::collections::HashMap;
use once_cell::sync::Lazy;
use crate::{db::{Database, DbError}, parser::parse_command, reply::{self, NULL_BULK, OK, PONG}};


///
/// Command dispatch: verb table, arity checks, reply encoding.
///


type CommandProc = fn(&Database, &[String]) -> String;

pub struct Command {
    name: &'static str,
    proc: CommandProc,
    arity: usize,               // minimum token count, verb included
    usage: &'static str,        // names the missing arguments on underflow
}

/// Command Table
static CMD_TABLE: Lazy<HashMap<&'static str, Command>> = Lazy::new(|| {
    HashMap::from([
        ("PING", Command { name: "PING", proc: ping_command, arity: 1, usage: "" }),
        ("ECHO", Command { name: "ECHO", proc: echo_command, arity: 2, usage: "a message" }),
        ("DEV", Command { name: "DEV", proc: dev_command, arity: 1, usage: "" }),
        ("FLUSHALL", Command { name: "FLUSHALL", proc: flushall_command, arity: 1, usage: "" }),

        ("SET", Command { name: "SET", proc: set_command, arity: 3, usage: "key and value" }),
        ("GET", Command { name: "GET", proc: get_command, arity: 2, usage: "key" }),
        ("KEYS", Command { name: "KEYS", proc: keys_command, arity: 1, usage: "" }),
        ("TYPE", Command { name: "TYPE", proc: type_command, arity: 2, usage: "key" }),
        ("DEL", Command { name: "DEL", proc: del_command, arity: 2, usage: "key" }),
        ("DELETE", Command { name: "DEL", proc: del_command, arity: 2, usage: "key" }),
        ("UNLINK", Command { name: "DEL", proc: del_command, arity: 2, usage: "key" }),
        ("EXPIRE", Command { name: "EXPIRE", proc: expire_command, arity: 3, usage: "key and time in seconds" }),
        ("RENAME", Command { name: "RENAME", proc: rename_command, arity: 3, usage: "old key name and new key name" }),

        ("LPUSH", Command { name: "LPUSH", proc: lpush_command, arity: 3, usage: "key and value" }),
        ("RPUSH", Command { name: "RPUSH", proc: rpush_command, arity: 3, usage: "key and value" }),
        ("LPOP", Command { name: "LPOP", proc: lpop_command, arity: 2, usage: "key" }),
        ("RPOP", Command { name: "RPOP", proc: rpop_command, arity: 2, usage: "key" }),
        ("LRANGE", Command { name: "LRANGE", proc: lrange_command, arity: 4, usage: "key, start and stop" }),
        ("LLEN", Command { name: "LLEN", proc: llen_command, arity: 2, usage: "key" }),
        ("LREM", Command { name: "LREM", proc: lrem_command, arity: 4, usage: "key, count and value" }),
        ("LINDEX", Command { name: "LINDEX", proc: lindex_command, arity: 3, usage: "key and index" }),
        ("LSET", Command { name: "LSET", proc: lset_command, arity: 4, usage: "key, index and value" }),

        ("HSET", Command { name: "HSET", proc: hset_command, arity: 4, usage: "key, field and value" }),
        ("HGET", Command { name: "HGET", proc: hget_command, arity: 3, usage: "key and field" }),
        ("HDEL", Command { name: "HDEL", proc: hdel_command, arity: 3, usage: "key and field" }),
        ("HGETALL", Command { name: "HGETALL", proc: hgetall_command, arity: 2, usage: "key" }),
        ("HKEYS", Command { name: "HKEYS", proc: hkeys_command, arity: 2, usage: "key" }),
        ("HVALS", Command { name: "HVALS", proc: hvals_command, arity: 2, usage: "key" }),
        ("HLEN", Command { name: "HLEN", proc: hlen_command, arity: 2, usage: "key" }),
        ("HEXISTS", Command { name: "HEXISTS", proc: hexists_command, arity: 3, usage: "key and field" }),
        ("HMSET", Command { name: "HMSET", proc: hmset_command, arity: 4, usage: "key and field-value pairs" }),
    ])
});

/// One request buffer in, one reply out.
pub fn process_command(db: &Database, input: &[u8]) -> String {
    let tokens = parse_command(input);
    execute(db, &tokens)
}

pub fn execute(db: &Database, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return reply::error("Empty command");
    }
    let verb = tokens[0].to_ascii_uppercase();
    match CMD_TABLE.get(verb.as_str()) {
        Some(cmd) => {
            if tokens.len() < cmd.arity {
                return reply::error(&format!("{} requires {}", cmd.name, cmd.usage));
            }
            (cmd.proc)(db, tokens)
        },
        None => reply::error("Unknown command"),
    }
}

// engine type mismatches surface as a plain error reply
fn fail(err: DbError) -> String {
    reply::error(&err.to_string())
}

fn ping_command(_db: &Database, _tokens: &[String]) -> String {
    PONG.to_string()
}

fn echo_command(_db: &Database, tokens: &[String]) -> String {
    reply::simple(&tokens[1])
}

fn dev_command(_db: &Database, _tokens: &[String]) -> String {
    reply::simple(concat!("memds ", env!("CARGO_PKG_VERSION")))
}

fn flushall_command(db: &Database, _tokens: &[String]) -> String {
    db.flush_all();
    OK.to_string()
}

fn set_command(db: &Database, tokens: &[String]) -> String {
    db.set(&tokens[1], &tokens[2]);
    OK.to_string()
}

fn get_command(db: &Database, tokens: &[String]) -> String {
    match db.get(&tokens[1]) {
        Ok(Some(value)) => reply::bulk(&value),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn keys_command(db: &Database, _tokens: &[String]) -> String {
    reply::multi_bulk(&db.keys())
}

fn type_command(db: &Database, tokens: &[String]) -> String {
    reply::simple(db.key_type(&tokens[1]))
}

fn del_command(db: &Database, tokens: &[String]) -> String {
    reply::integer(db.del(&tokens[1]) as i64)
}

fn expire_command(db: &Database, tokens: &[String]) -> String {
    let seconds = match tokens[2].parse::<i64>() {
        Ok(s) => s,
        Err(_) => return reply::error("Failed to set expire"),
    };
    if db.expire(&tokens[1], seconds) {
        OK.to_string()
    } else {
        reply::error("Failed to set expire")
    }
}

fn rename_command(db: &Database, tokens: &[String]) -> String {
    if db.rename(&tokens[1], &tokens[2]) {
        OK.to_string()
    } else {
        reply::error("Failed to rename key")
    }
}

fn lpush_command(db: &Database, tokens: &[String]) -> String {
    match db.lpush(&tokens[1], &tokens[2..]) {
        Ok(len) => reply::integer(len as i64),
        Err(e) => fail(e),
    }
}

fn rpush_command(db: &Database, tokens: &[String]) -> String {
    match db.rpush(&tokens[1], &tokens[2..]) {
        Ok(len) => reply::integer(len as i64),
        Err(e) => fail(e),
    }
}

fn lpop_command(db: &Database, tokens: &[String]) -> String {
    match db.lpop(&tokens[1]) {
        Ok(Some(value)) => reply::bulk(&value),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn rpop_command(db: &Database, tokens: &[String]) -> String {
    match db.rpop(&tokens[1]) {
        Ok(Some(value)) => reply::bulk(&value),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn lrange_command(db: &Database, tokens: &[String]) -> String {
    let (start, stop) = match (tokens[2].parse::<i64>(), tokens[3].parse::<i64>()) {
        (Ok(s), Ok(e)) => (s, e),
        // non-numeric bounds read as absence
        _ => return NULL_BULK.to_string(),
    };
    match db.lrange(&tokens[1], start, stop) {
        Ok(Some(values)) => reply::multi_bulk(&values),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn llen_command(db: &Database, tokens: &[String]) -> String {
    match db.llen(&tokens[1]) {
        Ok(Some(len)) => reply::integer(len as i64),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn lrem_command(db: &Database, tokens: &[String]) -> String {
    let count = match tokens[2].parse::<i64>() {
        Ok(c) => c,
        Err(_) => return reply::error("Invalid count value"),
    };
    match db.lrem(&tokens[1], &tokens[3], count) {
        Ok(removed) => reply::integer(removed),
        Err(e) => fail(e),
    }
}

fn lindex_command(db: &Database, tokens: &[String]) -> String {
    let index = match tokens[2].parse::<i64>() {
        Ok(i) => i,
        Err(_) => return reply::error("Invalid index value"),
    };
    match db.lindex(&tokens[1], index) {
        Ok(Some(value)) => reply::bulk(&value),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn lset_command(db: &Database, tokens: &[String]) -> String {
    let index = match tokens[2].parse::<i64>() {
        Ok(i) => i,
        Err(_) => return reply::error("Invalid index value"),
    };
    match db.lset(&tokens[1], index, &tokens[3]) {
        Ok(true) => OK.to_string(),
        Ok(false) => reply::error("Failed to set list element"),
        Err(e) => fail(e),
    }
}

fn hset_command(db: &Database, tokens: &[String]) -> String {
    match db.hset(&tokens[1], &tokens[2], &tokens[3]) {
        Ok(()) => OK.to_string(),
        Err(e) => fail(e),
    }
}

fn hget_command(db: &Database, tokens: &[String]) -> String {
    match db.hget(&tokens[1], &tokens[2]) {
        Ok(Some(value)) => reply::bulk(&value),
        Ok(None) => NULL_BULK.to_string(),
        Err(e) => fail(e),
    }
}

fn hdel_command(db: &Database, tokens: &[String]) -> String {
    match db.hdel(&tokens[1], &tokens[2]) {
        Ok(removed) => reply::integer(removed as i64),
        Err(e) => fail(e),
    }
}

fn hgetall_command(db: &Database, tokens: &[String]) -> String {
    match db.hgetall(&tokens[1]) {
        Ok(pairs) => {
            // each field-value pair counts as two elements
            let mut items = Vec::with_capacity(pairs.len() * 2);
            for (field, value) in pairs {
                items.push(field);
                items.push(value);
            }
            reply::multi_bulk(&items)
        },
        Err(e) => fail(e),
    }
}

fn hkeys_command(db: &Database, tokens: &[String]) -> String {
    match db.hkeys(&tokens[1]) {
        Ok(fields) => reply::multi_bulk(&fields),
        Err(e) => fail(e),
    }
}

fn hvals_command(db: &Database, tokens: &[String]) -> String {
    match db.hvals(&tokens[1]) {
        Ok(values) => reply::multi_bulk(&values),
        Err(e) => fail(e),
    }
}

fn hlen_command(db: &Database, tokens: &[String]) -> String {
    match db.hlen(&tokens[1]) {
        Ok(len) => reply::integer(len as i64),
        Err(e) => fail(e),
    }
}

fn hexists_command(db: &Database, tokens: &[String]) -> String {
    match db.hexists(&tokens[1], &tokens[2]) {
        Ok(exists) => reply::integer(exists as i64),
        Err(e) => fail(e),
    }
}

fn hmset_command(db: &Database, tokens: &[String]) -> String {
    // key plus a full field-value tail means an even token count
    if tokens.len() % 2 != 0 {
        return reply::error("HMSET requires key and field-value pairs");
    }
    let pairs: Vec<(String, String)> = tokens[2..]
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    match db.hmset(&tokens[1], &pairs) {
        Ok(()) => OK.to_string(),
        Err(e) => fail(e),
    }
}
