//! Server commands: `CLIENT`, `CONFIG`, `DBSIZE`, `FLUSHDB`, `FLUSHALL`,
//! `TIME`, `INFO`, `COMMAND` and `SHUTDOWN`.

use super::table::{CommandSpec, CommandTable, ReplyKind};
use super::{is_keyword, CommandContext, CommandError, CommandResult, Output};
use crate::server::is_valid_client_name;
use crate::storage::Keyspace;
use bytes::Bytes;
use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(super) fn register(table: &mut CommandTable) {
    table.register(CommandSpec::session("client", 1, client).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::session("config", 1, config).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::keyspace("dbsize", 0, dbsize));
    table.register(CommandSpec::keyspace("flushdb", 0, flushdb).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::session("flushall", 0, flushall).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::session("time", 0, time));
    table.register(CommandSpec::session("info", 0, info));
    table.register(CommandSpec::session("command", 0, command));
    table.register(CommandSpec::session("shutdown", 0, shutdown));
}

/// `CLIENT LIST | KILL ip:port | GETNAME | SETNAME name`
fn client(ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
    let sub = &args[0];
    match args.len() {
        1 if is_keyword(sub, "LIST") => {
            let mut out = String::new();
            for client in ctx.server.clients().list() {
                out.push_str(&client.describe());
                out.push('\n');
            }
            Ok(Output::str(out))
        }
        2 if is_keyword(sub, "KILL") => {
            let target = ctx
                .server
                .clients()
                .find_by_addr(&args[1])
                .ok_or(CommandError::NoSuchClient)?;
            target.kill();
            Ok(Output::Bool(true))
        }
        1 if is_keyword(sub, "GETNAME") => Ok(ctx.session.client().name().into()),
        2 if is_keyword(sub, "SETNAME") => {
            if !is_valid_client_name(&args[1]) {
                return Err(CommandError::InvalidClientName);
            }
            ctx.session.client().set_name(args[1].clone());
            Ok(Output::Bool(true))
        }
        _ => Err(CommandError::ClientSyntax),
    }
}

/// `CONFIG GET pattern | SET name value`
fn config(ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
    let sub = &args[0];
    if is_keyword(sub, "GET") {
        if args.len() != 2 {
            return Err(CommandError::ConfigArity("get"));
        }
        let pairs = ctx.server.config().matching(&args[1]);
        Ok(Output::Array(
            pairs
                .into_iter()
                .flat_map(|(name, value)| [Output::str(name), Output::str(value)])
                .collect(),
        ))
    } else if is_keyword(sub, "SET") {
        if args.len() != 3 {
            return Err(CommandError::ConfigArity("set"));
        }
        let name = std::str::from_utf8(&args[1]).map_err(|_| CommandError::Syntax)?;
        let value = std::str::from_utf8(&args[2]).map_err(|_| CommandError::Syntax)?;
        ctx.server.config().set(name, value)?;
        Ok(Output::Bool(true))
    } else {
        Err(CommandError::ConfigSubcommand)
    }
}

fn dbsize(db: &mut Keyspace, _args: &[Bytes]) -> CommandResult {
    Ok(db.count().into())
}

fn flushdb(db: &mut Keyspace, _args: &[Bytes]) -> CommandResult {
    db.reset();
    Ok(Output::Bool(true))
}

fn flushall(ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    ctx.server.databases().for_each(Keyspace::reset);
    Ok(Output::Bool(true))
}

/// `[unix seconds, microseconds]`
fn time(_ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    Ok(Output::Array(vec![
        Output::str(now.as_secs().to_string()),
        Output::str(now.subsec_micros().to_string()),
    ]))
}

fn info(ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    let server = ctx.server;
    let uptime = server.uptime().as_secs();

    let mut out = String::with_capacity(512);
    let _ = write!(
        out,
        "# Server\r\n\
         tidekv_version:{}\r\n\
         os:{}\r\n\
         arch_bits:{}\r\n\
         process_id:{}\r\n\
         uptime_in_seconds:{}\r\n\
         uptime_in_days:{}\r\n\
         \r\n\
         # Clients\r\n\
         connected_clients:{}\r\n\
         \r\n\
         # Stats\r\n\
         total_connections_received:{}\r\n\
         total_commands_processed:{}\r\n\
         \r\n\
         # Keyspace\r\n",
        crate::VERSION,
        std::env::consts::OS,
        usize::BITS,
        std::process::id(),
        uptime,
        uptime / 86_400,
        server.clients().len(),
        server.stats().total_connections(),
        server.stats().total_commands(),
    );

    server.databases().for_each(|db| {
        let keys = db.count();
        if keys > 0 {
            let _ = write!(out, "db{}:keys={},expires={}\r\n", db.id(), keys, db.expires_count());
        }
    });

    Ok(Output::str(out))
}

fn command(ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    let names = ctx.server.dispatcher().table().names();
    Ok(Output::Array(names.into_iter().map(Output::str).collect()))
}

/// Closes every connection and stops the server. Nothing is replied.
fn shutdown(ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    ctx.server.shutdown();
    Ok(Output::NoReply)
}
