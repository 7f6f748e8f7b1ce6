//! Translation from decoded commands to store calls and textual replies.
//!
//! The executor is the only place that maps outcomes and failures onto the
//! wire vocabulary: `OK`, a literal value, `nil`, or `ERROR: <reason>`. It
//! never propagates an error to the connection loop; every failure becomes an
//! `ERROR` reply so one bad command cannot end the session.

use std::sync::Arc;

use crate::commands::CommandError;
use crate::pubsub::PubSubHub;
use crate::session::Session;
use crate::store::{OpReply, Store, StoreOp};

pub struct Executor {
    store: Arc<Store>,
    hub: Arc<PubSubHub>,
}

impl Executor {
    pub fn new(store: Arc<Store>, hub: Arc<PubSubHub>) -> Self {
        Self { store, hub }
    }

    /// Executes one decoded command (name plus arguments) for `session` and
    /// returns the reply line. Command names are case-insensitive.
    pub async fn execute(&self, parts: &[String], session: &mut Session) -> String {
        let Some(name) = parts.first() else {
            return render_error(&CommandError::EmptyCommand);
        };
        let name = name.to_uppercase();
        let args = &parts[1..];

        match name.as_str() {
            "MULTI" => {
                session.transaction.begin();
                "OK".to_string()
            }
            "EXEC" => self.exec_transaction(session).await,
            "DISCARD" => match session.transaction.discard() {
                Ok(()) => "OK".to_string(),
                Err(e) => render_error(&e.into()),
            },
            "SUBSCRIBE" => match args {
                [channel] => {
                    let count = self.hub.subscribe(channel, session.subscriber()).await;
                    format!("subscribed {} {}", channel, count)
                }
                _ => render_error(&CommandError::WrongArguments("SUBSCRIBE")),
            },
            "PUBLISH" => match args {
                [channel, message @ ..] if !message.is_empty() => {
                    let count = self.hub.publish(channel, &message.join(" ")).await;
                    count.to_string()
                }
                _ => render_error(&CommandError::WrongArguments("PUBLISH")),
            },
            "PING" => "PONG".to_string(),
            // The connection loop closes the session after this reply.
            "QUIT" => "OK".to_string(),
            _ => self.execute_store_op(&name, args, session).await,
        }
    }

    /// Parses a store operation and either queues it (mid-transaction) or
    /// applies it immediately.
    async fn execute_store_op(&self, name: &str, args: &[String], session: &mut Session) -> String {
        let op = match StoreOp::parse(name, args) {
            Ok(op) => op,
            Err(e) => {
                // A malformed command inside a transaction poisons the batch;
                // the later EXEC reports the abort.
                if session.transaction.is_collecting() {
                    session.transaction.fail();
                }
                return render_error(&e);
            }
        };

        if session.transaction.is_collecting() {
            session.transaction.queue(op);
            return "QUEUED".to_string();
        }

        match self.store.apply(&op).await {
            Ok(reply) => render_reply(&reply),
            Err(e) => render_error(&e.into()),
        }
    }

    async fn exec_transaction(&self, session: &mut Session) -> String {
        let ops = match session.transaction.take() {
            Ok(ops) => ops,
            Err(e) => return render_error(&e.into()),
        };

        if ops.is_empty() {
            return "OK".to_string();
        }

        match self.store.run_batch(&ops).await {
            Ok(replies) => replies
                .iter()
                .map(render_reply)
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => render_error(&e.into()),
        }
    }
}

fn render_reply(reply: &OpReply) -> String {
    match reply {
        OpReply::Done => "OK".to_string(),
        OpReply::Missing => "nil".to_string(),
        OpReply::Text(text) => text.clone(),
        OpReply::Items(items) => items.join(" "),
    }
}

fn render_error(error: &CommandError) -> String {
    format!("ERROR: {}", error)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::Session;

    fn executor() -> Executor {
        Executor::new(Arc::new(Store::new()), Arc::new(PubSubHub::new()))
    }

    fn parts(command: &str) -> Vec<String> {
        command.split_whitespace().map(str::to_string).collect()
    }

    async fn run(executor: &Executor, session: &mut Session, command: &str) -> String {
        executor.execute(&parts(command), session).await
    }

    #[tokio::test]
    async fn set_get_delete_scenario() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "SET foo bar").await, "OK");
        assert_eq!(run(&executor, &mut session, "GET foo").await, "bar");
        assert_eq!(run(&executor, &mut session, "DELETE foo").await, "OK");
        assert_eq!(run(&executor, &mut session, "GET foo").await, "nil");
    }

    #[tokio::test]
    async fn command_names_are_case_insensitive() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "set foo bar").await, "OK");
        assert_eq!(run(&executor, &mut session, "GeT foo").await, "bar");
    }

    #[tokio::test]
    async fn unknown_command_is_an_error_reply() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(
            run(&executor, &mut session, "FOO bar").await,
            "ERROR: Unknown command"
        );
    }

    #[tokio::test]
    async fn wrong_arity_is_an_error_reply() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(
            run(&executor, &mut session, "GET").await,
            "ERROR: wrong number of arguments for 'GET'"
        );
        assert_eq!(
            run(&executor, &mut session, "SET onlykey").await,
            "ERROR: wrong number of arguments for 'SET'"
        );
    }

    #[tokio::test]
    async fn delete_of_missing_key_replies_ok() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "DELETE missingkey").await, "OK");
    }

    #[tokio::test]
    async fn set_with_ttl_expires() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "SET foo bar 1").await, "OK");
        assert_eq!(run(&executor, &mut session, "GET foo").await, "bar");

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(run(&executor, &mut session, "GET foo").await, "nil");
    }

    #[tokio::test]
    async fn invalid_ttl_is_an_error_reply() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(
            run(&executor, &mut session, "SET foo bar soon").await,
            "ERROR: invalid ttl 'soon': expected seconds"
        );
    }

    #[tokio::test]
    async fn oversized_ttl_is_an_error_reply_not_a_panic() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        // A TTL that parses as u64 but would overflow the expiration
        // arithmetic must come back as a reply, with the session intact.
        let command = format!("SET foo bar {}", u64::MAX);
        assert_eq!(
            run(&executor, &mut session, &command).await,
            format!("ERROR: invalid ttl '{}': expected seconds", u64::MAX)
        );
        assert_eq!(run(&executor, &mut session, "GET foo").await, "nil");
        assert_eq!(run(&executor, &mut session, "PING").await, "PONG");
    }

    #[tokio::test]
    async fn type_mismatch_is_rendered_not_raised() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        run(&executor, &mut session, "SET k text").await;
        assert_eq!(
            run(&executor, &mut session, "SADD k member").await,
            "ERROR: key holds a string value, not a set"
        );
        // The session keeps working and the value is untouched.
        assert_eq!(run(&executor, &mut session, "GET k").await, "text");
    }

    #[tokio::test]
    async fn hash_commands_round_trip() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "HSET user name alice").await, "OK");
        assert_eq!(run(&executor, &mut session, "HGET user name").await, "alice");
        assert_eq!(run(&executor, &mut session, "HGET user missing").await, "nil");
    }

    #[tokio::test]
    async fn transaction_queues_then_commits() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "MULTI").await, "OK");
        assert_eq!(run(&executor, &mut session, "SET a 1").await, "QUEUED");
        assert_eq!(run(&executor, &mut session, "SET b 2").await, "QUEUED");

        // Nothing is applied while collecting.
        let (mut other, _other_rx) = Session::detached("client-2");
        assert_eq!(run(&executor, &mut other, "GET a").await, "nil");

        assert_eq!(run(&executor, &mut session, "EXEC").await, "OK\nOK");
        assert_eq!(run(&executor, &mut other, "GET a").await, "1");
        assert_eq!(run(&executor, &mut other, "GET b").await, "2");
    }

    #[tokio::test]
    async fn discard_drops_queued_operations() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        run(&executor, &mut session, "MULTI").await;
        run(&executor, &mut session, "SET a 1").await;
        assert_eq!(run(&executor, &mut session, "DISCARD").await, "OK");
        assert_eq!(run(&executor, &mut session, "GET a").await, "nil");
    }

    #[tokio::test]
    async fn exec_without_multi_is_an_error() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(
            run(&executor, &mut session, "EXEC").await,
            "ERROR: EXEC without MULTI"
        );
        assert_eq!(
            run(&executor, &mut session, "DISCARD").await,
            "ERROR: DISCARD without MULTI"
        );
    }

    #[tokio::test]
    async fn malformed_command_poisons_the_batch() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        run(&executor, &mut session, "MULTI").await;
        assert_eq!(run(&executor, &mut session, "SET a 1").await, "QUEUED");
        assert_eq!(
            run(&executor, &mut session, "BOGUS x").await,
            "ERROR: Unknown command"
        );
        assert_eq!(
            run(&executor, &mut session, "EXEC").await,
            "ERROR: transaction aborted because of previous errors"
        );
        // Nothing from the poisoned batch was applied.
        assert_eq!(run(&executor, &mut session, "GET a").await, "nil");
    }

    #[tokio::test]
    async fn infeasible_batch_rolls_back() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        run(&executor, &mut session, "SET keep old").await;
        run(&executor, &mut session, "MULTI").await;
        run(&executor, &mut session, "SET keep new").await;
        run(&executor, &mut session, "RPUSH missing item").await;

        let reply = run(&executor, &mut session, "EXEC").await;
        assert_eq!(reply, "ERROR: transaction aborted: key not found");
        assert_eq!(run(&executor, &mut session, "GET keep").await, "old");
    }

    #[tokio::test]
    async fn subscribe_and_publish_flow() {
        let executor = executor();
        let (mut subscriber, mut push_rx) = Session::detached("subscriber");
        let (mut publisher, _pub_rx) = Session::detached("publisher");

        assert_eq!(
            run(&executor, &mut subscriber, "SUBSCRIBE news").await,
            "subscribed news 1"
        );
        assert_eq!(
            run(&executor, &mut publisher, "PUBLISH news hello world").await,
            "1"
        );
        assert_eq!(push_rx.recv().await.unwrap(), "message news hello world");

        // No subscribers on an unrelated channel.
        assert_eq!(run(&executor, &mut publisher, "PUBLISH other hi").await, "0");
    }

    #[tokio::test]
    async fn ping_and_quit_replies() {
        let executor = executor();
        let (mut session, _rx) = Session::detached("client-1");

        assert_eq!(run(&executor, &mut session, "PING").await, "PONG");
        assert_eq!(run(&executor, &mut session, "QUIT").await, "OK");
    }
}
