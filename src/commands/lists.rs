//! List commands.
//!
//! Lists never exist empty: every command that can remove the last element
//! deletes the key along with it.

use super::table::{CommandSpec, CommandTable, ReplyKind};
use super::{parse_integer, CommandError, CommandResult, Output};
use crate::storage::{Keyspace, ListEnd};
use bytes::Bytes;

pub(super) fn register(table: &mut CommandTable) {
    table.register(CommandSpec::keyspace("lpush", 2, lpush));
    table.register(CommandSpec::keyspace("rpush", 2, rpush));
    table.register(CommandSpec::keyspace("lpushx", 2, lpushx));
    table.register(CommandSpec::keyspace("rpushx", 2, rpushx));
    table.register(CommandSpec::keyspace("lpop", 1, lpop));
    table.register(CommandSpec::keyspace("rpop", 1, rpop));
    table.register(CommandSpec::keyspace("rpoplpush", 2, rpoplpush));
    table.register(CommandSpec::keyspace("llen", 1, llen));
    table.register(CommandSpec::keyspace("lindex", 2, lindex));
    table.register(CommandSpec::keyspace("lrange", 3, lrange));
    table.register(CommandSpec::keyspace("lset", 3, lset).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("lrem", 3, lrem));
}

fn push(db: &mut Keyspace, key: &Bytes, values: &[Bytes], end: ListEnd) -> CommandResult {
    let list = db.get_or_create_list(key)?;
    for value in values {
        match end {
            ListEnd::Head => list.push_front(value.clone()),
            ListEnd::Tail => list.push_back(value.clone()),
        }
    }
    Ok(list.len().into())
}

fn lpush(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    push(db, &args[0], &args[1..], ListEnd::Head)
}

fn rpush(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    push(db, &args[0], &args[1..], ListEnd::Tail)
}

fn lpushx(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if !db.has(&args[0]) {
        return Ok(Output::Int(0));
    }
    push(db, &args[0], &args[1..], ListEnd::Head)
}

fn rpushx(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    if !db.has(&args[0]) {
        return Ok(Output::Int(0));
    }
    push(db, &args[0], &args[1..], ListEnd::Tail)
}

fn lpop(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(db.pop_list(&args[0], ListEnd::Head)?.into())
}

fn rpop(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(db.pop_list(&args[0], ListEnd::Tail)?.into())
}

/// Pops the tail of `source` and pushes it onto the head of `destination`.
///
/// Both keys are type-checked before either is touched.
fn rpoplpush(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let (source, destination) = (&args[0], &args[1]);
    if db.list(source)?.is_none() {
        return Ok(Output::Nil);
    }
    db.list(destination)?;

    let Some(value) = db.pop_list(source, ListEnd::Tail)? else {
        return Ok(Output::Nil);
    };
    db.get_or_create_list(destination)?.push_front(value.clone());
    Ok(Output::Str(value))
}

fn llen(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    Ok(db.list(&args[0])?.map_or(0, |list| list.len()).into())
}

/// Resolves a possibly negative index against `len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn lindex(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let Some(list) = db.list(&args[0])? else {
        return Ok(Output::Nil);
    };
    if list.is_empty() {
        return Ok(Output::Nil);
    }
    let index = parse_integer(&args[1])?;
    Ok(resolve_index(index, list.len())
        .and_then(|i| list.get(i).cloned())
        .into())
}

/// `LRANGE key start stop`, both inclusive; out-of-range bounds are clamped.
fn lrange(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let start = parse_integer(&args[1])?;
    let stop = parse_integer(&args[2])?;
    let Some(list) = db.list(&args[0])? else {
        return Ok(Output::Array(Vec::new()));
    };

    let len = list.len() as i64;
    let start = if start < 0 { start + len } else { start };
    let mut stop = if stop < 0 { stop + len } else { stop };
    if stop >= len {
        stop = len - 1;
    }
    if stop < 0 || start > stop {
        return Ok(Output::Array(Vec::new()));
    }
    let start = start.max(0) as usize;

    Ok(Output::Array(
        list.range(start..=stop as usize)
            .cloned()
            .map(Output::Str)
            .collect(),
    ))
}

fn lset(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let index = parse_integer(&args[1])?;
    let list = db.list_mut(&args[0])?.ok_or(CommandError::NoSuchKey)?;
    let slot = resolve_index(index, list.len())
        .and_then(|i| list.get_mut(i))
        .ok_or(CommandError::IndexOutOfRange)?;
    *slot = args[2].clone();
    Ok(Output::Bool(true))
}

/// `LREM key count value`: removes up to `count` matches from the head
/// (`count > 0`), from the tail (`count < 0`) or all of them (`count == 0`).
fn lrem(db: &mut Keyspace, args: &[Bytes]) -> CommandResult {
    let count = parse_integer(&args[1])?;
    let value = &args[2];
    let Some(list) = db.list_mut(&args[0])? else {
        return Ok(Output::Int(0));
    };

    let mut removed = 0usize;
    if count >= 0 {
        let limit = if count == 0 { usize::MAX } else { count as usize };
        list.retain(|item| {
            if removed < limit && item == value {
                removed += 1;
                false
            } else {
                true
            }
        });
    } else {
        let limit = count.unsigned_abs() as usize;
        let mut i = list.len();
        while i > 0 && removed < limit {
            i -= 1;
            if list[i] == *value {
                list.remove(i);
                removed += 1;
            }
        }
    }

    if list.is_empty() {
        db.unset(&args[0]);
    }
    Ok(removed.into())
}
