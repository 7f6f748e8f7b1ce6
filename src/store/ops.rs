use crate::commands::CommandError;

/// Upper bound on an accepted TTL, in seconds. Generous for any real
/// deadline while keeping the expiration arithmetic within `SystemTime`
/// range.
pub const MAX_TTL_SECS: u64 = 60 * 60 * 24 * 365 * 100;

/// A structured operation descriptor.
///
/// Every keyspace mutation or read the Command Executor can issue is parsed
/// into one of these before it touches the store. Transactions queue the
/// descriptors themselves, which makes a queued batch inspectable and lets
/// commit validate and roll back instead of blindly invoking callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set {
        key: String,
        value: String,
        ttl_secs: Option<u64>,
    },
    Get {
        key: String,
    },
    Delete {
        key: String,
    },
    ListAppend {
        key: String,
        item: String,
    },
    ListItems {
        key: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
    SetRemove {
        key: String,
        member: String,
    },
    SetMembers {
        key: String,
    },
    HashSet {
        key: String,
        field: String,
        value: String,
    },
    HashGet {
        key: String,
        field: String,
    },
}

impl StoreOp {
    /// Parses an upper-cased command name and its arguments into a descriptor.
    ///
    /// Fails with `UnknownCommand` for names outside the store surface and
    /// `WrongArguments` for a recognized name with the wrong arity, without
    /// touching the store.
    pub fn parse(name: &str, args: &[String]) -> Result<Self, CommandError> {
        match name {
            "SET" => match args {
                [key, value] => Ok(StoreOp::Set {
                    key: key.clone(),
                    value: value.clone(),
                    ttl_secs: None,
                }),
                [key, value, ttl] => {
                    let ttl_secs = ttl
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs <= MAX_TTL_SECS)
                        .ok_or_else(|| CommandError::InvalidTtl(ttl.clone()))?;
                    Ok(StoreOp::Set {
                        key: key.clone(),
                        value: value.clone(),
                        ttl_secs: Some(ttl_secs),
                    })
                }
                _ => Err(CommandError::WrongArguments("SET")),
            },
            "GET" => match args {
                [key] => Ok(StoreOp::Get { key: key.clone() }),
                _ => Err(CommandError::WrongArguments("GET")),
            },
            "DELETE" => match args {
                [key] => Ok(StoreOp::Delete { key: key.clone() }),
                _ => Err(CommandError::WrongArguments("DELETE")),
            },
            "RPUSH" => match args {
                [key, item] => Ok(StoreOp::ListAppend {
                    key: key.clone(),
                    item: item.clone(),
                }),
                _ => Err(CommandError::WrongArguments("RPUSH")),
            },
            "LRANGE" => match args {
                [key] => Ok(StoreOp::ListItems { key: key.clone() }),
                _ => Err(CommandError::WrongArguments("LRANGE")),
            },
            "SADD" => match args {
                [key, member] => Ok(StoreOp::SetAdd {
                    key: key.clone(),
                    member: member.clone(),
                }),
                _ => Err(CommandError::WrongArguments("SADD")),
            },
            "SREM" => match args {
                [key, member] => Ok(StoreOp::SetRemove {
                    key: key.clone(),
                    member: member.clone(),
                }),
                _ => Err(CommandError::WrongArguments("SREM")),
            },
            "SMEMBERS" => match args {
                [key] => Ok(StoreOp::SetMembers { key: key.clone() }),
                _ => Err(CommandError::WrongArguments("SMEMBERS")),
            },
            "HSET" => match args {
                [key, field, value] => Ok(StoreOp::HashSet {
                    key: key.clone(),
                    field: field.clone(),
                    value: value.clone(),
                }),
                _ => Err(CommandError::WrongArguments("HSET")),
            },
            "HGET" => match args {
                [key, field] => Ok(StoreOp::HashGet {
                    key: key.clone(),
                    field: field.clone(),
                }),
                _ => Err(CommandError::WrongArguments("HGET")),
            },
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// The outcome of one store operation, still untyped with respect to the wire.
///
/// The Command Executor owns the rendering: `Done` becomes `OK`, `Missing`
/// becomes `nil`, the rest become literal text.
#[derive(Debug, Clone, PartialEq)]
pub enum OpReply {
    Done,
    Missing,
    Text(String),
    Items(Vec<String>),
}
