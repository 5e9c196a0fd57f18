use crate::server::ConfigError;
use crate::storage::StorageError;
use thiserror::Error;

/// A command failure. The `Display` text is exactly what follows `-` on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR syntax error")]
    Syntax,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpireTime(&'static str),

    #[error("ERR offset is out of range")]
    OffsetOutOfRange,

    #[error("ERR string exceeds maximum allowed size (512MB)")]
    StringTooLong,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR source and destination objects are the same")]
    SameObject,

    #[error("ERR One or more scores can't be converted into double")]
    NotADouble,

    #[error("ERR operation not permitted")]
    NotPermitted,

    #[error("ERR Client sent AUTH, but no password is set")]
    NoPasswordSet,

    #[error("ERR invalid password")]
    InvalidPassword,

    #[error("ERR invalid DB index")]
    InvalidDbIndex,

    #[error("ERR No such client")]
    NoSuchClient,

    #[error("ERR Client names cannot contain spaces, newlines or special characters.")]
    InvalidClientName,

    #[error("ERR Syntax error, try CLIENT (LIST | KILL ip:port | GETNAME | SETNAME connection-name)")]
    ClientSyntax,

    #[error("ERR Wrong number of arguments for CONFIG {0}")]
    ConfigArity(&'static str),

    #[error("ERR CONFIG subcommand must be one of GET, SET")]
    ConfigSubcommand,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::WrongType => CommandError::WrongType,
        }
    }
}

pub type CommandResult<T = super::Output> = Result<T, CommandError>;
