//! Generic key commands, expiration commands and `SORT`.

use super::table::{CommandSpec, CommandTable, ReplyKind};
use super::{is_keyword, parse_integer, CommandError, CommandResult, Output};
use crate::storage::{now_millis, GlobPattern, Keyspace};
use bytes::{Bytes, BytesMut};
use std::cmp::Ordering;
use std::collections::HashMap;

pub(super) fn register(table: &mut CommandTable) {
    table.register(CommandSpec::keyspace("keys", 1, keys));
    table.register(CommandSpec::keyspace("randomkey", 0, randomkey));
    table.register(CommandSpec::keyspace("exists", 1, exists));
    table.register(CommandSpec::keyspace("del", 1, del));
    table.register(CommandSpec::keyspace("type", 1, key_type).replies(ReplyKind::Status));
    table.register(CommandSpec::keyspace("rename", 2, rename).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("renamenx", 2, renamenx));
    table.register(CommandSpec::keyspace("expire", 2, expire));
    table.register(CommandSpec::keyspace("expireat", 2, expireat));
    table.register(CommandSpec::keyspace("pexpire", 2, pexpire));
    table.register(CommandSpec::keyspace("pexpireat", 2, pexpireat));
    table.register(CommandSpec::keyspace("ttl", 1, ttl));
    table.register(CommandSpec::keyspace("pttl", 1, pttl));
    table.register(CommandSpec::keyspace("persist", 1, persist));
    table.register(CommandSpec::keyspace("sort", 1, sort));
}

fn keys(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let pattern = GlobPattern::new(&args[0]);
    let matched: Vec<Bytes> = db
        .all_keys()
        .into_iter()
        .filter(|key| pattern.matches(key))
        .collect();
    Ok(matched.into())
}

fn randomkey(db: &mut Keyspace, _args: &[Bytes]) -> CommandResult {
    Ok(db.random_key().into())
}

/// Number of the given keys that exist (a key named twice counts twice).
fn exists(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(args.iter().filter(|key| db.has(key)).count().into())
}

fn del(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let mut deleted = 0usize;
    for key in args {
        if db.has(key) {
            db.unset(key);
            deleted += 1;
        }
    }
    Ok(deleted.into())
}

fn key_type(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(Output::str(db.key_type(&args[0])))
}

fn check_rename(db: &mut Keyspace, from: &Bytes, to: &Bytes) -> CommandResult<()> {
    if from == to {
        return Err(CommandError::SameObject);
    }
    if !db.has(from) {
        return Err(CommandError::NoSuchKey);
    }
    Ok(())
}

fn rename(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    check_rename(db, &args[0], &args[1])?;
    db.rename(&args[0], args[1].clone());
    Ok(Output::Bool(true))
}

fn renamenx(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    check_rename(db, &args[0], &args[1])?;
    if db.has(&args[1]) {
        return Ok(Output::Bool(false));
    }
    db.rename(&args[0], args[1].clone());
    Ok(Output::Bool(true))
}

/// Sets an absolute deadline (unix ms) on an existing key.
fn expire_at(db: &mut Keyspace, key: &Bytes, deadline: i64) -> CommandResult {
    if !db.has(key) {
        return Ok(Output::Bool(false));
    }
    db.set_timeout(key, Some(deadline));
    Ok(Output::Bool(true))
}

fn expire(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let secs = parse_integer(&args[1])?;
    expire_at(db, &args[0], now_millis().saturating_add(secs.saturating_mul(1000)))
}

fn expireat(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let timestamp = parse_integer(&args[1])?;
    expire_at(db, &args[0], timestamp.saturating_mul(1000))
}

fn pexpire(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let ms = parse_integer(&args[1])?;
    expire_at(db, &args[0], now_millis().saturating_add(ms))
}

fn pexpireat(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let deadline = parse_integer(&args[1])?;
    expire_at(db, &args[0], deadline)
}

/// Remaining lifetime in milliseconds: -2 for a missing key, -1 without a
/// deadline, never below 0 otherwise.
fn remaining_ms(db: &mut Keyspace, key: &[u8]) -> i64 {
    if !db.has(key) {
        return -2;
    }
    match db.timeout(key) {
        Some(deadline) => (deadline - now_millis()).max(0),
        None => -1,
    }
}

fn ttl(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let ms = remaining_ms(db, &args[0]);
    Ok(Output::Int(if ms > 0 { ms / 1000 } else { ms }))
}

fn pttl(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(Output::Int(remaining_ms(db, &args[0])))
}

fn persist(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if !db.has(&args[0]) || db.timeout(&args[0]).is_none() {
        return Ok(Output::Bool(false));
    }
    db.set_timeout(&args[0], None);
    Ok(Output::Bool(true))
}

/// Parsed `SORT` options.
#[derive(Debug, Default)]
struct SortOptions {
    by: Option<Bytes>,
    limit: Option<(i64, i64)>,
    get: Vec<Bytes>,
    desc: bool,
    alpha: bool,
    store: Option<Bytes>,
}

impl SortOptions {
    fn parse(args: &[Bytes]) -> CommandResult<Self> {
        fn value<'a>(args: &'a [Bytes], i: &mut usize) -> CommandResult<&'a Bytes> {
            *i += 1;
            args.get(*i).ok_or(CommandError::Syntax)
        }

        let mut options = SortOptions::default();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if is_keyword(arg, "BY") {
                options.by = Some(value(args, &mut i)?.clone());
            } else if is_keyword(arg, "LIMIT") {
                let offset = parse_integer(value(args, &mut i)?)?;
                let count = parse_integer(value(args, &mut i)?)?;
                options.limit = Some((offset, count));
            } else if is_keyword(arg, "GET") {
                options.get.push(value(args, &mut i)?.clone());
            } else if is_keyword(arg, "ASC") {
                options.desc = false;
            } else if is_keyword(arg, "DESC") {
                options.desc = true;
            } else if is_keyword(arg, "ALPHA") {
                options.alpha = true;
            } else if is_keyword(arg, "STORE") {
                options.store = Some(value(args, &mut i)?.clone());
            } else {
                return Err(CommandError::Syntax);
            }
            i += 1;
        }
        Ok(options)
    }
}

/// Replaces every `*` in `pattern` with `element`.
fn substitute(pattern: &[u8], element: &[u8]) -> Bytes {
    let mut key = BytesMut::with_capacity(pattern.len() + element.len());
    for &b in pattern {
        if b == b'*' {
            key.extend_from_slice(element);
        } else {
            key.extend_from_slice(&[b]);
        }
    }
    key.freeze()
}

/// Scores print in plain decimal form only within `[MIN_PLAIN_SCORE, MAX_PLAIN_SCORE)`.
const MIN_PLAIN_SCORE: f64 = 1e-4;
const MAX_PLAIN_SCORE: f64 = 1e14;

/// Significant digits a score keeps when printed.
const SCORE_DIGITS: usize = 14;

/// Parses an element as a score; it must print back exactly as written.
///
/// Scores print with at most 14 significant digits and switch to exponent
/// form outside the plain range, so elements such as `1e20` written out in
/// full, or with a 15th significant digit, never round-trip.
fn parse_score(element: &[u8]) -> CommandResult<f64> {
    std::str::from_utf8(element)
        .ok()
        .filter(|s| significant_digits(s) <= SCORE_DIGITS)
        .and_then(|s| {
            s.parse::<f64>().ok().filter(|f| {
                f.is_finite()
                    && (*f == 0.0 || (MIN_PLAIN_SCORE..MAX_PLAIN_SCORE).contains(&f.abs()))
                    && f.to_string() == s
            })
        })
        .ok_or(CommandError::NotADouble)
}

fn significant_digits(s: &str) -> usize {
    s.bytes()
        .filter(u8::is_ascii_digit)
        .skip_while(|&b| b == b'0')
        .count()
}

/// Window of `len` items selected by `LIMIT offset count`.
///
/// A negative offset counts from the end; a negative count stops that many
/// items before the end.
fn limit_window(len: usize, offset: i64, count: i64) -> std::ops::Range<usize> {
    let n = len as i64;
    let start = if offset < 0 { (n + offset).max(0) } else { offset.min(n) };
    let end = if count < 0 {
        n + count
    } else {
        start.saturating_add(count).min(n)
    };
    start as usize..end.max(start) as usize
}

/// `SORT key [BY pattern] [LIMIT offset count] [GET pattern ...]`
/// `[ASC|DESC] [ALPHA] [STORE destination]`
///
/// Elements sort numerically unless `ALPHA` is given. `BY pattern` sorts by
/// the string values of the keys obtained by substituting each element for
/// `*` (the element itself when the lookup is missing); a pattern without
/// `*` leaves the list in stored order. `GET #` yields the element, any
/// other `GET pattern` the value of the substituted key (nil when missing).
fn sort(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let mut elements: Vec<Bytes> = match db.list(&args[0])? {
        Some(list) => list.iter().cloned().collect(),
        None => Vec::new(),
    };
    let options = SortOptions::parse(&args[1..])?;

    match &options.by {
        Some(pattern) if !pattern.contains(&b'*') => {}
        Some(pattern) => {
            let mut weights: HashMap<Bytes, Bytes> = HashMap::with_capacity(elements.len());
            for element in &elements {
                if !weights.contains_key(element) {
                    let weight = db
                        .get_string(&substitute(pattern, element))?
                        .unwrap_or_else(|| element.clone());
                    weights.insert(element.clone(), weight);
                }
            }
            elements.sort_by(|a, b| weights[a].cmp(&weights[b]));
        }
        None if options.alpha => elements.sort(),
        None => {
            let mut scored = elements
                .into_iter()
                .map(|e| parse_score(&e).map(|score| (score, e)))
                .collect::<CommandResult<Vec<_>>>()?;
            scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            elements = scored.into_iter().map(|(_, e)| e).collect();
        }
    }

    if options.desc {
        elements.reverse();
    }
    if let Some((offset, count)) = options.limit {
        let window = limit_window(elements.len(), offset, count);
        elements = elements[window].to_vec();
    }

    let result: Vec<Option<Bytes>> = if options.get.is_empty() {
        elements.into_iter().map(Some).collect()
    } else {
        let mut out = Vec::with_capacity(elements.len() * options.get.len());
        for element in &elements {
            for pattern in &options.get {
                if pattern.as_ref() == b"#" {
                    out.push(Some(element.clone()));
                } else {
                    out.push(db.get_string(&substitute(pattern, element))?);
                }
            }
        }
        out
    };

    match options.store {
        Some(destination) => {
            db.unset(&destination);
            if result.is_empty() {
                return Ok(Output::Int(0));
            }
            let list = db.get_or_create_list(&destination)?;
            list.extend(result.into_iter().map(Option::unwrap_or_default));
            Ok(list.len().into())
        }
        None => Ok(Output::Array(result.into_iter().map(Output::from).collect())),
    }
}
