//! Request dispatch.
//!
//! Every request goes through the same steps, in order:
//!
//! 1. record activity on the client (`last_active`, `cmd=` in `CLIENT LIST`)
//! 2. reject anything but `AUTH` on an unauthenticated session
//! 3. look the lowercased name up in the command table
//! 4. check the minimum argument count
//! 5. run the handler and map its [`Output`] onto a [`Reply`]
//!
//! A handler error becomes an error reply; the connection stays open.

use super::table::{CommandTable, Handler, ReplyKind};
use super::{CommandContext, CommandError, CommandResult, Output};
use crate::protocol::{Reply, Request};
use crate::server::{Server, Session};
use bytes::Bytes;
use tracing::debug;

/// Routes requests to their handlers.
#[derive(Debug)]
pub struct Dispatcher {
    table: CommandTable,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            table: CommandTable::with_builtin_commands(),
        }
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Runs `request` for `session`. `None` means no reply is to be written.
    pub fn dispatch(
        &self,
        server: &Server,
        session: &mut Session,
        request: &Request,
    ) -> Option<Reply> {
        let name = request.command_name();
        session.client().touch(&name);
        server.stats().command_processed();

        debug!(
            db = session.db(),
            client = %session.client().addr(),
            command = %name,
            args = request.args.len(),
            "Request"
        );

        match self.run(server, session, &name, &request.args) {
            Ok((output, kind)) => output.into_reply(kind),
            Err(err) => {
                debug!(
                    client = %session.client().addr(),
                    command = %name,
                    error = %err,
                    "Command failed"
                );
                Some(Reply::Error(err.to_string()))
            }
        }
    }

    fn run(
        &self,
        server: &Server,
        session: &mut Session,
        name: &str,
        args: &[Bytes],
    ) -> CommandResult<(Output, ReplyKind)> {
        if !session.is_authenticated() && name != "auth" {
            return Err(CommandError::NotPermitted);
        }

        let spec = self
            .table
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        if args.len() < spec.arity {
            return Err(CommandError::WrongArity(name.to_string()));
        }

        let output = match spec.handler {
            Handler::Keyspace(handler) => {
                let mut db = server
                    .databases()
                    .lock(session.db())
                    .ok_or(CommandError::InvalidDbIndex)?;
                handler(&mut db, args)?
            }
            Handler::Session(handler) => handler(&mut CommandContext { server, session }, args)?,
        };

        Ok((output, spec.reply))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
