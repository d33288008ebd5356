//! Drives one request/response exchange against the completion endpoint,
//! and the interactive loop built on top of it.
//!
//! A thread is saved and made active only after the endpoint answers. On a
//! transport failure the user's just-appended message stays in the in-memory
//! thread but never reaches disk, even though it was already sent over the
//! wire.

use std::io::{BufRead, Write};

use crate::active::ActiveThread;
use crate::api::ApiClient;
use crate::error::Result;
use crate::thread::{Message, Thread, ThreadStore};

/// How a completed (non-failed) exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The endpoint returned at least one choice; its content was appended
    /// to the thread as an assistant message.
    Answered(String),
    /// The endpoint answered with zero choices. The user message stands in
    /// the thread unanswered.
    NoContent,
}

/// Perform one exchange: append the user query to the in-memory thread,
/// send the whole history, and on success append the first choice.
///
/// On error the thread still holds the appended user message; deciding
/// whether that partial state reaches disk is the caller's business (it
/// does not, today).
pub async fn run_exchange(
    client: &ApiClient,
    thread: &mut Thread,
    query: &str,
) -> Result<ExchangeOutcome> {
    thread.push(Message::user(query));

    match client.complete(&thread.messages).await? {
        Some(content) => {
            thread.push(Message::assistant(&content));
            Ok(ExchangeOutcome::Answered(content))
        }
        None => Ok(ExchangeOutcome::NoContent),
    }
}

/// Persist the thread and repoint the active marker at it. Called only
/// after an exchange completed, including the zero-choices case.
pub fn commit(store: &ThreadStore, active: &ActiveThread, thread: &Thread) -> Result<()> {
    store.save(thread)?;
    active.set(&thread.id)
}

/// The interactive loop: one exchange per line of input until `/exit`.
///
/// Blank lines re-prompt without consuming a turn. A failed exchange is
/// printed and the loop continues; nothing is persisted for that turn.
pub async fn run_interactive<R: BufRead, W: Write>(
    client: &ApiClient,
    store: &ThreadStore,
    active: &ActiveThread,
    thread: &mut Thread,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("/exit") {
            break;
        }

        match run_exchange(client, thread, query).await {
            Ok(outcome) => {
                match &outcome {
                    ExchangeOutcome::Answered(content) => writeln!(output, "{}", content)?,
                    ExchangeOutcome::NoContent => {
                        writeln!(output, "(the model returned no completion)")?
                    }
                }
                if let Err(e) = commit(store, active, thread) {
                    eprintln!("ERROR: {}", e);
                }
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ColloquyError;
    use crate::paths::StoragePaths;
    use crate::thread::Role;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn fixtures(root: &std::path::Path) -> (ThreadStore, ActiveThread) {
        let paths = StoragePaths::new(root);
        (ThreadStore::new(paths.clone()), ActiveThread::new(paths))
    }

    fn one_choice_body(content: &str) -> String {
        format!(r#"{{"choices":[{{"message":{{"content":"{}"}}}}]}}"#, content)
    }

    #[tokio::test]
    async fn exchange_appends_user_then_assistant() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(one_choice_body("hello back"))
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, _) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        let outcome = run_exchange(&client, &mut thread, "hi").await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Answered("hello back".to_string()));
        assert_eq!(thread.messages.len(), 2);
        assert_eq!(thread.messages[0], Message::user("hi"));
        assert_eq!(thread.messages[1], Message::assistant("hello back"));
    }

    #[tokio::test]
    async fn zero_choices_grows_the_thread_by_exactly_one() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, _) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        let outcome = run_exchange(&client, &mut thread, "hi").await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::NoContent);
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn failed_exchange_keeps_the_user_message_in_memory() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body(r#"{"error":{"code":500,"message":"upstream exploded"}}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, _) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        let err = run_exchange(&client, &mut thread, "hi").await.unwrap_err();

        assert!(matches!(err, ColloquyError::Api { status: 500, .. }));
        assert_eq!(thread.messages, vec![Message::user("hi")]);
    }

    #[test]
    fn commit_saves_and_repoints() {
        let dir = tempdir().unwrap();
        let (store, active) = fixtures(dir.path());
        let mut thread = store.create();
        thread.push(Message::user("hi"));

        commit(&store, &active, &thread).unwrap();

        assert_eq!(store.load(&thread.id).unwrap(), thread);
        assert_eq!(active.get().unwrap(), Some(thread.id.clone()));
    }

    #[tokio::test]
    async fn interactive_loop_exits_without_an_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, active) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        // Blank lines re-prompt; /EXIT is case-insensitive.
        let mut input = Cursor::new(b"\n   \n/EXIT\n".to_vec());
        let mut output = Vec::new();
        run_interactive(&client, &store, &active, &mut thread, &mut input, &mut output)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(thread.messages.is_empty());
        assert_eq!(active.get().unwrap(), None);
    }

    #[tokio::test]
    async fn interactive_loop_persists_each_successful_turn() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(one_choice_body("answer"))
            .expect(2)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, active) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        let mut input = Cursor::new(b"one\ntwo\n/exit\n".to_vec());
        let mut output = Vec::new();
        run_interactive(&client, &store, &active, &mut thread, &mut input, &mut output)
            .await
            .unwrap();

        let on_disk = store.load(&thread.id).unwrap();
        assert_eq!(on_disk.messages.len(), 4);
        assert_eq!(active.get().unwrap(), Some(thread.id.clone()));

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("answer"));
    }

    #[tokio::test]
    async fn interactive_loop_survives_a_failed_turn() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, active) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        let mut input = Cursor::new(b"doomed\n/exit\n".to_vec());
        let mut output = Vec::new();
        run_interactive(&client, &store, &active, &mut thread, &mut input, &mut output)
            .await
            .unwrap();

        // The failed turn is never persisted.
        assert!(matches!(
            store.load(&thread.id),
            Err(ColloquyError::ThreadNotFound(_))
        ));
        assert_eq!(active.get().unwrap(), None);
    }

    #[tokio::test]
    async fn interactive_loop_ends_at_eof() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(one_choice_body("answer"))
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let (store, active) = fixtures(dir.path());
        let client = ApiClient::new(server.url(), "test-key", "test-model", false);
        let mut thread = store.create();

        // No /exit; the input just runs dry after one turn.
        let mut input = Cursor::new(b"only\n".to_vec());
        let mut output = Vec::new();
        run_interactive(&client, &store, &active, &mut thread, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(store.load(&thread.id).unwrap().messages.len(), 2);
    }
}
