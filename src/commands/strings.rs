//! String commands.

use super::table::{CommandSpec, CommandTable, ReplyKind};
use super::{is_keyword, parse_integer, CommandError, CommandResult, Output};
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::storage::{now_millis, Keyspace};
use bytes::{Bytes, BytesMut};

pub(super) fn register(table: &mut CommandTable) {
    table.register(CommandSpec::keyspace("get", 1, get));
    table.register(CommandSpec::keyspace("set", 2, set).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("setnx", 2, setnx));
    table.register(CommandSpec::keyspace("setex", 3, setex).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("psetex", 3, psetex).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("getset", 2, getset));
    table.register(CommandSpec::keyspace("mget", 1, mget));
    table.register(CommandSpec::keyspace("mset", 2, mset).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("msetnx", 2, msetnx));
    table.register(CommandSpec::keyspace("append", 2, append));
    table.register(CommandSpec::keyspace("strlen", 1, strlen));
    table.register(CommandSpec::keyspace("incr", 1, incr));
    table.register(CommandSpec::keyspace("incrby", 2, incrby));
    table.register(CommandSpec::keyspace("decr", 1, decr));
    table.register(CommandSpec::keyspace("decrby", 2, decrby));
    table.register(CommandSpec::keyspace("getrange", 3, getrange));
    table.register(CommandSpec::keyspace("setrange", 3, setrange));
}

fn get(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(db.get_string(&args[0])?.into())
}

/// `SET key value [NX|XX] [EX seconds|PX milliseconds]`
///
/// Options are fully validated before anything is written.
fn set(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let (key, value) = (&args[0], &args[1]);
    let mut nx = false;
    let mut xx = false;
    let mut ttl_ms: Option<i64> = None;

    let mut i = 2;
    while i < args.len() {
        let opt = &args[i];
        if is_keyword(opt, "NX") {
            nx = true;
        } else if is_keyword(opt, "XX") {
            xx = true;
        } else if is_keyword(opt, "EX") || is_keyword(opt, "PX") {
            let raw = args.get(i + 1).ok_or(CommandError::Syntax)?;
            if ttl_ms.is_some() {
                return Err(CommandError::Syntax);
            }
            let amount = parse_integer(raw)?;
            if amount <= 0 {
                return Err(CommandError::InvalidExpireTime("set"));
            }
            let ms = if is_keyword(opt, "EX") {
                amount
                    .checked_mul(1000)
                    .ok_or(CommandError::InvalidExpireTime("set"))?
            } else {
                amount
            };
            ttl_ms = Some(ms);
            i += 1;
        } else {
            return Err(CommandError::Syntax);
        }
        i += 1;
    }

    if nx && xx {
        return Err(CommandError::Syntax);
    }

    let exists = db.has(key);
    if (nx && exists) || (xx && !exists) {
        return Ok(Output::Nil);
    }

    db.set_string(key.clone(), value.clone());
    if let Some(ms) = ttl_ms {
        db.set_timeout(key, Some(now_millis().saturating_add(ms)));
    }
    Ok(Output::Bool(true))
}

fn setnx(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if db.has(&args[0]) {
        return Ok(Output::Bool(false));
    }
    db.set_string(args[0].clone(), args[1].clone());
    Ok(Output::Bool(true))
}

fn set_with_ttl(
    db: &mut Keyspace,
    args: &[Bytes],
    unit_ms: i64,
    command: &'static str,
) -> CommandResult {
    let amount = parse_integer(&args[1])?;
    if amount <= 0 {
        return Err(CommandError::InvalidExpireTime(command));
    }
    let ms = amount
        .checked_mul(unit_ms)
        .ok_or(CommandError::InvalidExpireTime(command))?;

    db.set_string(args[0].clone(), args[2].clone());
    db.set_timeout(&args[0], Some(now_millis().saturating_add(ms)));
    Ok(Output::Bool(true))
}

fn setex(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    set_with_ttl(db, args, 1000, "setex")
}

fn psetex(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    set_with_ttl(db, args, 1, "psetex")
}

fn getset(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let old = db.get_string(&args[0])?;
    db.set_string(args[0].clone(), args[1].clone());
    Ok(old.into())
}

/// Keys that are missing or hold a list come back as nil.
fn mget(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(Output::Array(
        args.iter()
            .map(|key| db.get_string(key).ok().flatten().into())
            .collect(),
    ))
}

fn mset(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if args.len() % 2 != 0 {
        return Err(CommandError::WrongArity("mset".to_string()));
    }
    for pair in args.chunks_exact(2) {
        db.set_string(pair[0].clone(), pair[1].clone());
    }
    Ok(Output::Bool(true))
}

fn msetnx(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if args.len() % 2 != 0 {
        return Err(CommandError::WrongArity("msetnx".to_string()));
    }
    if args.chunks_exact(2).any(|pair| db.has(&pair[0])) {
        return Ok(Output::Bool(false));
    }
    for pair in args.chunks_exact(2) {
        db.set_string(pair[0].clone(), pair[1].clone());
    }
    Ok(Output::Bool(true))
}

fn append(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let current = db.get_string(&args[0])?.unwrap_or_default();
    let mut joined = BytesMut::with_capacity(current.len() + args[1].len());
    joined.extend_from_slice(&current);
    joined.extend_from_slice(&args[1]);
    let len = joined.len();
    db.replace_string(args[0].clone(), joined.freeze());
    Ok(len.into())
}

fn strlen(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(db.get_string(&args[0])?.map_or(0, |s| s.len()).into())
}

/// Adds `delta` to the integer stored at `key` (absent counts as 0).
///
/// The result is written with `set_string`, which clears any expiration.
fn incr_by(db: &mut Keyspace, key: &Bytes, delta: i64) -> CommandResult {
    let current = match db.get_string(key)? {
        Some(value) => parse_integer(&value)?,
        None => 0,
    };
    let next = current.checked_add(delta).ok_or(CommandError::Overflow)?;
    db.set_string(key.clone(), Bytes::from(next.to_string()));
    Ok(Output::Int(next))
}

fn incr(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    incr_by(db, &args[0], 1)
}

fn incrby(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let delta = parse_integer(&args[1])?;
    incr_by(db, &args[0], delta)
}

fn decr(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    incr_by(db, &args[0], -1)
}

fn decrby(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let delta = parse_integer(&args[1])?
        .checked_neg()
        .ok_or(CommandError::Overflow)?;
    incr_by(db, &args[0], delta)
}

/// `GETRANGE key start end`, both offsets inclusive, negatives count from the end.
fn getrange(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let start = parse_integer(&args[1])?;
    let end = parse_integer(&args[2])?;
    let value = db.get_string(&args[0])?.unwrap_or_default();

    let taken = if end > 0 || (end < 0 && start < 0) {
        let len = end.saturating_sub(start).saturating_add(1);
        if len <= 0 {
            Bytes::new()
        } else {
            substring(&value, start, Some(len))
        }
    } else if end == 0 {
        // A zero end leaves an empty span whatever the start.
        Bytes::new()
    } else if end == -1 {
        substring(&value, start, None)
    } else {
        // start >= 0, end < -1: drop the last |end + 1| bytes.
        substring(&value, start, Some(end + 1))
    };
    Ok(Output::Str(taken))
}

/// Slice of `s` starting at `start` (negative counts from the end).
///
/// A non-negative `len` takes at most that many bytes, a negative `len` stops
/// that many bytes before the end, and `None` takes the rest.
fn substring(s: &Bytes, start: i64, len: Option<i64>) -> Bytes {
    let n = s.len() as i64;
    let begin = if start < 0 { (n + start).max(0) } else { start };
    if begin >= n {
        return Bytes::new();
    }
    let stop = match len {
        None => n,
        Some(l) if l >= 0 => begin.saturating_add(l).min(n),
        Some(l) => n + l,
    };
    if stop <= begin {
        return Bytes::new();
    }
    s.slice(begin as usize..stop as usize)
}

/// `SETRANGE key offset value`: overwrite starting at `offset`, zero-padding
/// the gap when the string is shorter. The expiration is kept.
fn setrange(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let offset = parse_integer(&args[1])?;
    if offset < 0 {
        return Err(CommandError::OffsetOutOfRange);
    }
    let patch = &args[2];
    let current = db.get_string(&args[0])?.unwrap_or_default();

    if patch.is_empty() {
        return Ok(current.len().into());
    }

    let offset = offset as usize;
    let end = offset
        .checked_add(patch.len())
        .filter(|&end| end <= MAX_BULK_SIZE)
        .ok_or(CommandError::StringTooLong)?;

    let mut buf = BytesMut::from(&current[..]);
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[offset..end].copy_from_slice(patch);
    let len = buf.len();
    db.replace_string(args[0].clone(), buf.freeze());
    Ok(len.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from(p.to_string())).collect()
    }

    fn str_of(output: Output) -> Bytes {
        match output {
            Output::Str(s) => s,
            other => panic!("expected a string, got {:?}", other),
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut db = Keyspace::new(0);
        assert_eq!(set(&mut db, &args(&["k", "v"])), Ok(Output::Bool(true)));
        assert_eq!(get(&mut db, &args(&["k"])), Ok(Output::str("v")));
        assert_eq!(get(&mut db, &args(&["missing"])), Ok(Output::Nil));
    }

    #[test]
    fn test_set_nx_xx() {
        let mut db = Keyspace::new(0);
        assert_eq!(set(&mut db, &args(&["k", "1", "XX"])), Ok(Output::Nil));
        assert_eq!(set(&mut db, &args(&["k", "1", "nx"])), Ok(Output::Bool(true)));
        assert_eq!(set(&mut db, &args(&["k", "2", "NX"])), Ok(Output::Nil));
        assert_eq!(set(&mut db, &args(&["k", "3", "XX"])), Ok(Output::Bool(true)));
        assert_eq!(get(&mut db, &args(&["k"])), Ok(Output::str("3")));
    }

    #[test]
    fn test_set_with_expiry() {
        let mut db = Keyspace::new(0);
        set(&mut db, &args(&["k", "v", "EX", "100"])).unwrap();
        let deadline = db.timeout(b"k").unwrap();
        assert!(deadline > now_millis() + 99_000);

        set(&mut db, &args(&["p", "v", "px", "1500"])).unwrap();
        assert!(db.timeout(b"p").unwrap() <= now_millis() + 1500);

        // A plain SET clears the expiration.
        set(&mut db, &args(&["k", "w"])).unwrap();
        assert_eq!(db.timeout(b"k"), None);
    }

    #[test]
    fn test_set_option_errors() {
        let mut db = Keyspace::new(0);
        assert_eq!(set(&mut db, &args(&["k", "v", "EX"])), Err(CommandError::Syntax));
        assert_eq!(set(&mut db, &args(&["k", "v", "EX", "abc"])), Err(CommandError::NotAnInteger));
        assert_eq!(
            set(&mut db, &args(&["k", "v", "PX", "0"])),
            Err(CommandError::InvalidExpireTime("set"))
        );
        assert_eq!(set(&mut db, &args(&["k", "v", "NX", "XX"])), Err(CommandError::Syntax));
        assert_eq!(
            set(&mut db, &args(&["k", "v", "EX", "1", "PX", "1"])),
            Err(CommandError::Syntax)
        );
        assert_eq!(set(&mut db, &args(&["k", "v", "KEEPTTL"])), Err(CommandError::Syntax));
        assert!(!db.has(b"k"));
        assert_eq!(
            CommandError::InvalidExpireTime("set").to_string(),
            "ERR invalid expire time in 'set' command"
        );
    }

    #[test]
    fn test_setex_psetex() {
        let mut db = Keyspace::new(0);
        assert_eq!(setex(&mut db, &args(&["k", "10", "v"])), Ok(Output::Bool(true)));
        assert!(db.timeout(b"k").is_some());
        assert_eq!(
            setex(&mut db, &args(&["k", "-1", "v"])),
            Err(CommandError::InvalidExpireTime("setex"))
        );
        assert_eq!(
            psetex(&mut db, &args(&["k", "0", "v"])),
            Err(CommandError::InvalidExpireTime("psetex"))
        );
    }

    #[test]
    fn test_setnx_and_getset() {
        let mut db = Keyspace::new(0);
        assert_eq!(setnx(&mut db, &args(&["k", "a"])), Ok(Output::Bool(true)));
        assert_eq!(setnx(&mut db, &args(&["k", "b"])), Ok(Output::Bool(false)));
        assert_eq!(getset(&mut db, &args(&["k", "c"])), Ok(Output::str("a")));
        assert_eq!(getset(&mut db, &args(&["new", "c"])), Ok(Output::Nil));
    }

    #[test]
    fn test_mget_mset() {
        let mut db = Keyspace::new(0);
        assert_eq!(mset(&mut db, &args(&["a", "1", "b", "2"])), Ok(Output::Bool(true)));
        db.get_or_create_list(&Bytes::from("l")).unwrap().push_back(Bytes::from("x"));

        assert_eq!(
            mget(&mut db, &args(&["a", "missing", "l", "b"])),
            Ok(Output::Array(vec![Output::str("1"), Output::Nil, Output::Nil, Output::str("2")]))
        );
        assert_eq!(
            mset(&mut db, &args(&["a", "1", "b"])),
            Err(CommandError::WrongArity("mset".to_string()))
        );
    }

    #[test]
    fn test_msetnx_is_all_or_nothing() {
        let mut db = Keyspace::new(0);
        db.set_string(Bytes::from("b"), Bytes::from("old"));
        assert_eq!(msetnx(&mut db, &args(&["a", "1", "b", "2"])), Ok(Output::Bool(false)));
        assert!(!db.has(b"a"));
        assert_eq!(msetnx(&mut db, &args(&["a", "1", "c", "3"])), Ok(Output::Bool(true)));
        assert!(db.has(b"c"));
    }

    #[test]
    fn test_append_and_strlen() {
        let mut db = Keyspace::new(0);
        assert_eq!(append(&mut db, &args(&["k", "Hello"])), Ok(Output::Int(5)));
        db.set_timeout(b"k", Some(now_millis() + 60_000));
        assert_eq!(append(&mut db, &args(&["k", " World"])), Ok(Output::Int(11)));
        assert_eq!(strlen(&mut db, &args(&["k"])), Ok(Output::Int(11)));
        assert_eq!(strlen(&mut db, &args(&["missing"])), Ok(Output::Int(0)));
        assert!(db.timeout(b"k").is_some());
    }

    #[test]
    fn test_append_to_list_leaves_it_alone() {
        let mut db = Keyspace::new(0);
        db.get_or_create_list(&Bytes::from("l")).unwrap().push_back(Bytes::from("a"));
        assert_eq!(append(&mut db, &args(&["l", "x"])), Err(CommandError::WrongType));
        assert_eq!(db.list(b"l").unwrap().unwrap().len(), 1);
        assert_eq!(db.key_type(b"l"), "list");
    }

    #[test]
    fn test_incr_family() {
        let mut db = Keyspace::new(0);
        assert_eq!(incr(&mut db, &args(&["n"])), Ok(Output::Int(1)));
        assert_eq!(incrby(&mut db, &args(&["n", "10"])), Ok(Output::Int(11)));
        assert_eq!(decr(&mut db, &args(&["n"])), Ok(Output::Int(10)));
        assert_eq!(decrby(&mut db, &args(&["n", "15"])), Ok(Output::Int(-5)));
        assert_eq!(get(&mut db, &args(&["n"])), Ok(Output::str("-5")));
    }

    #[test]
    fn test_incr_errors() {
        let mut db = Keyspace::new(0);
        db.set_string(Bytes::from("s"), Bytes::from("abc"));
        assert_eq!(incr(&mut db, &args(&["s"])), Err(CommandError::NotAnInteger));
        db.set_string(Bytes::from("p"), Bytes::from(" 1"));
        assert_eq!(incr(&mut db, &args(&["p"])), Err(CommandError::NotAnInteger));

        db.set_string(Bytes::from("max"), Bytes::from(i64::MAX.to_string()));
        assert_eq!(incr(&mut db, &args(&["max"])), Err(CommandError::Overflow));
        assert_eq!(
            decrby(&mut db, &args(&["x", "-9223372036854775808"])),
            Err(CommandError::Overflow)
        );
        assert_eq!(incrby(&mut db, &args(&["x", "1.5"])), Err(CommandError::NotAnInteger));
    }

    #[test]
    fn test_incr_clears_expiration() {
        let mut db = Keyspace::new(0);
        setex(&mut db, &args(&["n", "100", "1"])).unwrap();
        incr(&mut db, &args(&["n"])).unwrap();
        assert_eq!(db.timeout(b"n"), None);
    }

    #[test]
    fn test_getrange() {
        let mut db = Keyspace::new(0);
        db.set_string(Bytes::from("s"), Bytes::from("This is a string"));
        let range = |db: &mut Keyspace, start: &str, end: &str| {
            str_of(getrange(db, &args(&["s", start, end])).unwrap())
        };

        assert_eq!(range(&mut db, "0", "3"), "This");
        assert_eq!(range(&mut db, "-3", "-1"), "ing");
        assert_eq!(range(&mut db, "0", "-1"), "This is a string");
        assert_eq!(range(&mut db, "5", "-1"), "is a string");
        assert_eq!(range(&mut db, "0", "-3"), "This is a stri");
        assert_eq!(range(&mut db, "10", "100"), "string");
        assert_eq!(range(&mut db, "100", "200"), "");
        assert_eq!(range(&mut db, "0", "0"), "");
        assert_eq!(range(&mut db, "-3", "0"), "");
        assert_eq!(range(&mut db, "0", "1"), "Th");
        assert_eq!(range(&mut db, "5", "2"), "");
        assert_eq!(range(&mut db, "-1", "-3"), "");
        assert_eq!(
            str_of(getrange(&mut db, &args(&["missing", "0", "-1"])).unwrap()),
            ""
        );
    }

    #[test]
    fn test_setrange() {
        let mut db = Keyspace::new(0);
        assert_eq!(setrange(&mut db, &args(&["k", "6", "world"])), Ok(Output::Int(11)));
        assert_eq!(get(&mut db, &args(&["k"])), Ok(Output::str(&b"\0\0\0\0\0\0world"[..])));

        db.set_string(Bytes::from("h"), Bytes::from("hello world"));
        assert_eq!(setrange(&mut db, &args(&["h", "6", "there"])), Ok(Output::Int(11)));
        assert_eq!(get(&mut db, &args(&["h"])), Ok(Output::str("hello there")));
        assert_eq!(setrange(&mut db, &args(&["h", "6", "world!"])), Ok(Output::Int(12)));
        assert_eq!(get(&mut db, &args(&["h"])), Ok(Output::str("hello world!")));

        assert_eq!(
            setrange(&mut db, &args(&["h", "-1", "x"])),
            Err(CommandError::OffsetOutOfRange)
        );
        assert_eq!(setrange(&mut db, &args(&["none", "3", ""])), Ok(Output::Int(0)));
        assert!(!db.has(b"none"));
        assert_eq!(
            setrange(&mut db, &args(&["h", "536870912", "x"])),
            Err(CommandError::StringTooLong)
        );
    }
}
