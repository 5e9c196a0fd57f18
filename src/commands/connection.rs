//! Connection commands: `PING`, `ECHO`, `SELECT`, `AUTH`, `QUIT`.

use super::table::{CommandSpec, CommandTable, ReplyKind};
use super::{parse_integer, CommandContext, CommandError, CommandResult, Output};
use crate::protocol::Reply;
use bytes::Bytes;

pub(super) fn register(table: &mut CommandTable) {
    table.register(CommandSpec::session("ping", 0, ping).replies(ReplyKind::Status));
    table.register(CommandSpec::session("echo", 1, echo));
    table.register(CommandSpec::session("select", 1, select).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::session("auth", 1, auth).replies(ReplyKind::OkOnTrue));
    table.register(CommandSpec::session("quit", 0, quit));
}

fn ping(_ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    Ok(Output::str("PONG"))
}

fn echo(_ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
    Ok(Output::Str(args[0].clone()))
}

fn select(ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
    let index = parse_integer(&args[0])
        .ok()
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i < ctx.server.databases().len())
        .ok_or(CommandError::InvalidDbIndex)?;
    ctx.session.select(index);
    Ok(Output::Bool(true))
}

fn auth(ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
    let Some(password) = ctx.server.config().requirepass() else {
        return Err(CommandError::NoPasswordSet);
    };
    if password.as_bytes() != args[0].as_ref() {
        return Err(CommandError::InvalidPassword);
    }
    ctx.session.authenticate();
    Ok(Output::Bool(true))
}

/// Writes `+OK` itself, then asks the connection to close.
fn quit(ctx: &mut CommandContext<'_>, _args: &[Bytes]) -> CommandResult {
    ctx.session.write(Reply::ok());
    ctx.session.close();
    Ok(Output::NoReply)
}

#[cfg(test)]
mod tests {
    use crate::protocol::{Reply, Request};
    use crate::server::{Server, ServerOptions, Session};
    use bytes::Bytes;
    use std::net::SocketAddr;

    fn run(server: &Server, session: &mut Session, parts: &[&str]) -> Option<Reply> {
        let parts = parts.iter().map(|p| Bytes::from(p.to_string())).collect();
        let request = Request::from_parts(parts).unwrap();
        server.execute(session, &request)
    }

    fn open(server: &Server) -> Session {
        server.open_session(SocketAddr::from(([127, 0, 0, 1], 7000)), -1)
    }

    #[test]
    fn test_ping_echo() {
        let server = Server::default();
        let mut session = open(&server);
        assert_eq!(run(&server, &mut session, &["PING"]), Some(Reply::status("PONG")));
        assert_eq!(run(&server, &mut session, &["PING", "hello"]), Some(Reply::status("PONG")));
        assert_eq!(run(&server, &mut session, &["ECHO", "hello"]), Some(Reply::bulk("hello")));
    }

    #[test]
    fn test_select_bounds() {
        let server = Server::default();
        let mut session = open(&server);
        assert_eq!(run(&server, &mut session, &["SELECT", "15"]), Some(Reply::ok()));
        assert_eq!(session.db(), 15);

        for bad in ["16", "-1", "one", "01"] {
            assert_eq!(
                run(&server, &mut session, &["SELECT", bad]),
                Some(Reply::error("ERR invalid DB index"))
            );
        }
        assert_eq!(session.db(), 15);
    }

    #[test]
    fn test_auth() {
        let server = Server::default();
        let mut session = open(&server);
        assert_eq!(
            run(&server, &mut session, &["AUTH", "pw"]),
            Some(Reply::error("ERR Client sent AUTH, but no password is set"))
        );

        let server = Server::new(ServerOptions {
            requirepass: "pw".to_string(),
            ..Default::default()
        });
        let mut session = open(&server);
        assert_eq!(
            run(&server, &mut session, &["AUTH", "nope"]),
            Some(Reply::error("ERR invalid password"))
        );
        assert!(!session.is_authenticated());
        assert_eq!(run(&server, &mut session, &["AUTH", "pw"]), Some(Reply::ok()));
        assert_eq!(run(&server, &mut session, &["PING"]), Some(Reply::status("PONG")));
    }

    #[test]
    fn test_quit_writes_ok_and_closes() {
        let server = Server::default();
        let mut session = open(&server);
        assert_eq!(run(&server, &mut session, &["QUIT"]), None);
        assert!(session.is_closing());
        assert_eq!(session.take_outbox(), vec![Reply::ok()]);
    }
}
