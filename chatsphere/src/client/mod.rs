//! Chat client: session bookkeeping, persistence and rendering.
//!
//! `ChatManager` owns the active conversation. Every change is written through
//! to the [`SessionStore`] immediately. A chat that never receives a user
//! message is dropped from the index as soon as the user moves on (new chat,
//! switch, or reload), so the recent-chats list only holds real conversations.

pub mod api;
pub mod render;
pub mod store;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    has_user_message, ChatMessage, ChatSession, ChatSummary, MessageRole, NEW_CHAT_TITLE,
};

use api::AskClient;
use render::Renderer;
use store::{chat_key, SessionStore, StoreError, INDEX_KEY, USER_NAME_KEY};

/// Characters of the first user message kept as the chat title.
pub const TITLE_MAX_CHARS: usize = 30;

/// Shown in place of a reply when the proxy call fails.
pub const ERROR_REPLY: &str = "Oops! Something went wrong. Please try again.";

/// Name used in the greeting when the user gives none.
pub const DEFAULT_USER_NAME: &str = "Guest";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no chat with id {0}")]
    UnknownChat(String),
    #[error("id prefix {0} matches more than one chat")]
    AmbiguousChat(String),
}

/// Opening assistant message of every new chat.
pub fn greeting_for(name: &str) -> String {
    format!("Hello {name}! How can I assist you today?")
}

/// Title for a chat whose first user message is `message`.
pub fn derive_title(message: &str) -> String {
    let flat = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= TITLE_MAX_CHARS {
        return flat;
    }
    let prefix: String = flat.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", prefix.trim_end())
}

/// Stored greeting name, if the user has set one.
pub fn load_user_name<S: SessionStore>(store: &S) -> Result<Option<String>, StoreError> {
    Ok(store
        .get(USER_NAME_KEY)?
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty()))
}

/// Store the greeting name, falling back to [`DEFAULT_USER_NAME`] when blank.
pub fn save_user_name<S: SessionStore>(store: &mut S, name: &str) -> Result<String, StoreError> {
    let name = match name.trim() {
        "" => DEFAULT_USER_NAME,
        trimmed => trimmed,
    };
    store.set(USER_NAME_KEY, name)?;
    Ok(name.to_string())
}

/// Owns the active chat and keeps the store in step with it.
pub struct ChatManager<S: SessionStore> {
    store: S,
    current_id: String,
    history: Vec<ChatMessage>,
    greeting: String,
}

impl<S: SessionStore> ChatManager<S> {
    /// Load state from `store`, drop chats that never got a user message and
    /// start a fresh chat.
    pub fn open(store: S, greeting: impl Into<String>) -> Result<Self, ChatError> {
        let mut manager = Self {
            store,
            current_id: String::new(),
            history: Vec::new(),
            greeting: greeting.into(),
        };
        manager.prune_unused()?;
        manager.start_new_chat()?;
        Ok(manager)
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    #[cfg(test)]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Title of the active chat.
    pub fn current_title(&self) -> Result<String, ChatError> {
        Ok(self
            .load_index()?
            .into_iter()
            .find(|entry| entry.id == self.current_id)
            .map_or_else(|| NEW_CHAT_TITLE.to_string(), |entry| entry.title))
    }

    /// Start a new chat seeded with the greeting and make it current.
    pub fn start_new_chat(&mut self) -> Result<&str, ChatError> {
        self.retire_current()?;

        let id = Uuid::now_v7().to_string();
        self.history = vec![ChatMessage::assistant(self.greeting.clone())];
        write_json(&mut self.store, &chat_key(&id), &self.history)?;

        let mut index = self.load_index()?;
        index.retain(|entry| entry.id != id);
        index.insert(0, ChatSummary::new(id.clone()));
        write_json(&mut self.store, INDEX_KEY, &index)?;

        tracing::debug!(chat = %id, "started new chat");
        self.current_id = id;
        Ok(self.current_id.as_str())
    }

    /// Make `id` the active chat.
    pub fn switch_chat(&mut self, id: &str) -> Result<(), ChatError> {
        if id == self.current_id {
            return Ok(());
        }
        if !self.load_index()?.iter().any(|entry| entry.id == id) {
            return Err(ChatError::UnknownChat(id.to_string()));
        }

        self.retire_current()?;
        self.history = self.load_messages(id)?;
        self.current_id = id.to_string();
        tracing::debug!(chat = %id, messages = self.history.len(), "switched chat");
        Ok(())
    }

    /// Remove a chat and its messages. Deleting the active chat starts a new
    /// one. Returns whether the chat was indexed.
    pub fn delete_chat(&mut self, id: &str) -> Result<bool, ChatError> {
        let mut index = self.load_index()?;
        let before = index.len();
        index.retain(|entry| entry.id != id);
        let existed = index.len() != before;
        if existed {
            write_json(&mut self.store, INDEX_KEY, &index)?;
        }
        self.store.remove(&chat_key(id))?;

        if id == self.current_id {
            self.current_id.clear();
            self.history.clear();
            self.start_new_chat()?;
        }

        tracing::debug!(chat = %id, existed, "deleted chat");
        Ok(existed)
    }

    /// Index entries for chats with at least one user message, most recent first.
    pub fn recent_chats(&self) -> Result<Vec<ChatSummary>, ChatError> {
        let mut recent = Vec::new();
        for entry in self.load_index()? {
            if has_user_message(&self.messages_of(&entry.id)?) {
                recent.push(entry);
            }
        }
        Ok(recent)
    }

    /// Expand a full id or a unique id prefix to the indexed chat id.
    pub fn resolve_id(&self, prefix: &str) -> Result<String, ChatError> {
        let index = self.load_index()?;
        if index.iter().any(|entry| entry.id == prefix) {
            return Ok(prefix.to_string());
        }

        let mut matches = index.into_iter().filter(|entry| entry.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(entry), None) if !prefix.is_empty() => Ok(entry.id),
            (Some(_), _) => Err(ChatError::AmbiguousChat(prefix.to_string())),
            (None, _) => Err(ChatError::UnknownChat(prefix.to_string())),
        }
    }

    /// A full chat by id, if indexed.
    pub fn session(&self, id: &str) -> Result<Option<ChatSession>, ChatError> {
        let Some(entry) = self.load_index()?.into_iter().find(|entry| entry.id == id) else {
            return Ok(None);
        };
        Ok(Some(ChatSession {
            messages: self.messages_of(id)?,
            id: entry.id,
            title: entry.title,
        }))
    }

    /// Append a user message. The first one names the chat; every one moves
    /// the chat to the front of the index.
    pub fn push_user_message(&mut self, text: &str) -> Result<(), ChatError> {
        self.history.push(ChatMessage::user(text));
        write_json(&mut self.store, &chat_key(&self.current_id), &self.history)?;

        let first_turn = self
            .history
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
            == 1;

        let mut index = self.load_index()?;
        let position = index.iter().position(|entry| entry.id == self.current_id);
        let mut entry = match position {
            Some(pos) => index.remove(pos),
            None => ChatSummary::new(self.current_id.clone()),
        };
        if first_turn || entry.title == NEW_CHAT_TITLE {
            entry.title = derive_title(text);
        }
        index.insert(0, entry);
        write_json(&mut self.store, INDEX_KEY, &index)?;
        Ok(())
    }

    pub fn push_assistant_message(&mut self, text: &str) -> Result<(), ChatError> {
        self.history.push(ChatMessage::assistant(text));
        write_json(&mut self.store, &chat_key(&self.current_id), &self.history)?;
        Ok(())
    }

    /// Redraw the active chat from scratch.
    pub fn render_history<R: Renderer>(&self, renderer: &mut R) {
        renderer.clear();
        for message in &self.history {
            renderer.show_message(message);
        }
    }

    /// Run one user turn: record the message, ask the proxy with the prior
    /// conversation, then record the reply or a fixed error bubble.
    pub async fn send<R: Renderer>(
        &mut self,
        text: &str,
        client: &AskClient,
        renderer: &mut R,
    ) -> Result<(), ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let prior = self.history.clone();
        self.push_user_message(text)?;
        renderer.show_message(&ChatMessage::user(text));

        renderer.show_typing();
        let outcome = client.ask(text, &prior).await;
        renderer.hide_typing();

        let (reply, creator) = match outcome {
            Ok(response) if !response.reply.trim().is_empty() => {
                (response.reply, response.display_info)
            }
            Ok(_) => {
                tracing::warn!("server reply had no text");
                (ERROR_REPLY.to_string(), None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ask request failed");
                (ERROR_REPLY.to_string(), None)
            }
        };

        self.push_assistant_message(&reply)?;
        renderer.show_message(&ChatMessage::assistant(reply));
        if let Some(creator) = creator {
            renderer.show_creator_card(&creator);
        }
        Ok(())
    }

    /// Persist the outgoing chat, or discard it if the user never spoke in it.
    fn retire_current(&mut self) -> Result<(), ChatError> {
        if self.current_id.is_empty() {
            return Ok(());
        }

        if has_user_message(&self.history) {
            write_json(&mut self.store, &chat_key(&self.current_id), &self.history)?;
        } else {
            let mut index = self.load_index()?;
            index.retain(|entry| entry.id != self.current_id);
            write_json(&mut self.store, INDEX_KEY, &index)?;
            self.store.remove(&chat_key(&self.current_id))?;
            tracing::debug!(chat = %self.current_id, "pruned unused chat");
        }
        Ok(())
    }

    /// Drop every indexed chat, other than the active one, with no user message.
    fn prune_unused(&mut self) -> Result<(), ChatError> {
        let index = self.load_index()?;
        let mut kept = Vec::with_capacity(index.len());
        let mut pruned = Vec::new();

        for entry in index {
            if entry.id == self.current_id || has_user_message(&self.load_messages(&entry.id)?) {
                kept.push(entry);
            } else {
                pruned.push(entry.id);
            }
        }

        if !pruned.is_empty() {
            for id in &pruned {
                self.store.remove(&chat_key(id))?;
            }
            write_json(&mut self.store, INDEX_KEY, &kept)?;
            tracing::debug!(count = pruned.len(), "pruned unused chats");
        }
        Ok(())
    }

    /// Messages of `id`, using the in-memory copy for the active chat.
    fn messages_of(&self, id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        if id == self.current_id {
            Ok(self.history.clone())
        } else {
            self.load_messages(id)
        }
    }

    fn load_index(&self) -> Result<Vec<ChatSummary>, ChatError> {
        Ok(read_json(&self.store, INDEX_KEY)?)
    }

    fn load_messages(&self, id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(read_json(&self.store, &chat_key(id))?)
    }
}

/// Read a JSON list, treating missing or corrupt data as empty.
fn read_json<S: SessionStore, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Vec<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(values) => Ok(values),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding corrupt stored data");
            Ok(Vec::new())
        }
    }
}

fn write_json<S: SessionStore, T: Serialize>(
    store: &mut S,
    key: &str,
    values: &[T],
) -> Result<(), StoreError> {
    // Serializing plain structs of strings cannot fail.
    let raw = serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string());
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreatorInfo;
    use serde_json::json;
    use store::MemoryStore;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GREETING: &str = "Hello Tester! How can I assist you today?";

    #[derive(Debug, Default)]
    struct RecordingRenderer {
        events: Vec<String>,
    }

    impl Renderer for RecordingRenderer {
        fn clear(&mut self) {
            self.events.push("clear".to_string());
        }

        fn show_message(&mut self, message: &ChatMessage) {
            self.events
                .push(format!("{}: {}", message.role, message.content));
        }

        fn show_typing(&mut self) {
            self.events.push("typing".to_string());
        }

        fn hide_typing(&mut self) {
            self.events.push("typing done".to_string());
        }

        fn show_creator_card(&mut self, creator: &CreatorInfo) {
            self.events.push(format!("card: {}", creator.name));
        }
    }

    fn manager() -> ChatManager<MemoryStore> {
        ChatManager::open(MemoryStore::new(), GREETING).unwrap()
    }

    fn index_ids(manager: &ChatManager<MemoryStore>) -> Vec<String> {
        manager
            .load_index()
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect()
    }

    #[test]
    fn test_open_starts_seeded_chat() {
        let manager = manager();
        assert_eq!(manager.history(), &[ChatMessage::assistant(GREETING)]);
        assert_eq!(index_ids(&manager), vec![manager.current_id().to_string()]);
        assert_eq!(manager.current_title().unwrap(), NEW_CHAT_TITLE);
        assert!(manager.recent_chats().unwrap().is_empty());
    }

    #[test]
    fn test_new_chat_prunes_unused_previous() {
        let mut manager = manager();
        let first = manager.current_id().to_string();
        manager.start_new_chat().unwrap();

        assert_ne!(manager.current_id(), first);
        assert_eq!(index_ids(&manager), vec![manager.current_id().to_string()]);
        assert_eq!(manager.store().get(&chat_key(&first)).unwrap(), None);
    }

    #[test]
    fn test_new_chat_keeps_active_previous() {
        let mut manager = manager();
        let first = manager.current_id().to_string();
        manager.push_user_message("hello").unwrap();
        manager.start_new_chat().unwrap();

        assert_eq!(
            index_ids(&manager),
            vec![manager.current_id().to_string(), first.clone()]
        );
        let recent = manager.recent_chats().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, first);
        assert_eq!(recent[0].title, "hello");
    }

    #[test]
    fn test_title_derivation() {
        assert_eq!(derive_title("  short   question "), "short question");
        let long = "How do I bake sourdough bread at home without a starter?";
        let title = derive_title(long);
        assert_eq!(title, "How do I bake sourdough bread...");
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn test_first_user_message_names_chat() {
        let mut manager = manager();
        manager.push_user_message("What is Rust?").unwrap();
        manager.push_assistant_message("A language.").unwrap();
        manager.push_user_message("Tell me more").unwrap();
        assert_eq!(manager.current_title().unwrap(), "What is Rust?");
    }

    #[test]
    fn test_user_turn_moves_chat_to_front() {
        let mut manager = manager();
        let older = manager.current_id().to_string();
        manager.push_user_message("first chat").unwrap();
        manager.start_new_chat().unwrap();
        let newer = manager.current_id().to_string();
        manager.push_user_message("second chat").unwrap();

        manager.switch_chat(&older).unwrap();
        manager.push_user_message("back again").unwrap();

        assert_eq!(index_ids(&manager), vec![older, newer]);
    }

    #[test]
    fn test_switch_round_trips_messages() {
        let mut manager = manager();
        let first = manager.current_id().to_string();
        manager.push_user_message("ping").unwrap();
        manager.push_assistant_message("**pong**\n1. one").unwrap();
        let expected = manager.history().to_vec();

        manager.start_new_chat().unwrap();
        manager.push_user_message("other").unwrap();
        manager.switch_chat(&first).unwrap();

        assert_eq!(manager.history(), expected.as_slice());
    }

    #[test]
    fn test_switch_prunes_unused_current() {
        let mut manager = manager();
        let first = manager.current_id().to_string();
        manager.push_user_message("keep me").unwrap();
        manager.start_new_chat().unwrap();
        let empty = manager.current_id().to_string();

        manager.switch_chat(&first).unwrap();

        assert_eq!(index_ids(&manager), vec![first]);
        assert_eq!(manager.store().get(&chat_key(&empty)).unwrap(), None);
    }

    #[test]
    fn test_switch_unknown_chat() {
        let mut manager = manager();
        let current = manager.current_id().to_string();
        assert!(matches!(
            manager.switch_chat("missing"),
            Err(ChatError::UnknownChat(_))
        ));
        assert_eq!(manager.current_id(), current);
    }

    #[test]
    fn test_resolve_id_by_prefix() {
        let mut manager = manager();
        let id = manager.current_id().to_string();
        manager.push_user_message("hello").unwrap();

        assert_eq!(manager.resolve_id(&id).unwrap(), id);
        assert_eq!(manager.resolve_id(&id[..id.len() - 4]).unwrap(), id);
        assert!(matches!(
            manager.resolve_id("zzz"),
            Err(ChatError::UnknownChat(_))
        ));

        manager.start_new_chat().unwrap();
        manager.push_user_message("again").unwrap();
        assert!(matches!(
            manager.resolve_id(""),
            Err(ChatError::AmbiguousChat(_))
        ));
    }

    #[test]
    fn test_reload_prunes_unused_chats() {
        let mut manager = manager();
        let kept = manager.current_id().to_string();
        manager.push_user_message("keep").unwrap();
        manager.start_new_chat().unwrap();
        let unused = manager.current_id().to_string();

        let reopened = ChatManager::open(manager.into_store(), GREETING).unwrap();
        let ids = index_ids(&reopened);

        assert!(ids.contains(&kept));
        assert!(!ids.contains(&unused));
        assert_eq!(ids[0], reopened.current_id());
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_delete_only_chat_starts_new_one() {
        let mut manager = manager();
        let only = manager.current_id().to_string();
        manager.push_user_message("short lived").unwrap();

        assert!(manager.delete_chat(&only).unwrap());

        assert_ne!(manager.current_id(), only);
        assert_eq!(index_ids(&manager), vec![manager.current_id().to_string()]);
        assert_eq!(manager.history(), &[ChatMessage::assistant(GREETING)]);
        assert_eq!(manager.store().get(&chat_key(&only)).unwrap(), None);
    }

    #[test]
    fn test_delete_inactive_chat() {
        let mut manager = manager();
        let first = manager.current_id().to_string();
        manager.push_user_message("old").unwrap();
        manager.start_new_chat().unwrap();
        let current = manager.current_id().to_string();

        assert!(manager.delete_chat(&first).unwrap());
        assert!(!manager.delete_chat(&first).unwrap());
        assert_eq!(manager.current_id(), current);
        assert_eq!(index_ids(&manager), vec![current]);
    }

    #[test]
    fn test_corrupt_storage_treated_as_empty() {
        let mut store = MemoryStore::new();
        store.set(INDEX_KEY, "{not json").unwrap();
        let mut manager = ChatManager::open(store, GREETING).unwrap();
        assert_eq!(index_ids(&manager).len(), 1);

        let first = manager.current_id().to_string();
        manager.push_user_message("hi").unwrap();
        manager.start_new_chat().unwrap();
        let mut store = manager.into_store();
        store.set(&chat_key(&first), "[oops").unwrap();

        let manager = ChatManager::open(store, GREETING).unwrap();
        assert!(!index_ids(&manager).contains(&first));
    }

    #[test]
    fn test_user_name_storage() {
        let mut store = MemoryStore::new();
        assert_eq!(load_user_name(&store).unwrap(), None);
        assert_eq!(save_user_name(&mut store, "   ").unwrap(), DEFAULT_USER_NAME);
        assert_eq!(save_user_name(&mut store, " Ada ").unwrap(), "Ada");
        assert_eq!(load_user_name(&store).unwrap().as_deref(), Some("Ada"));
        assert_eq!(greeting_for("Ada"), "Hello Ada! How can I assist you today?");
    }

    #[tokio::test]
    async fn test_send_records_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "message": "hello",
                "history": [{"role": "assistant", "content": GREETING}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "Hi there"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut manager = manager();
        let mut renderer = RecordingRenderer::default();
        let client = AskClient::new(&server.uri());

        manager.send("  hello ", &client, &mut renderer).await.unwrap();

        assert_eq!(
            renderer.events,
            vec!["user: hello", "typing", "typing done", "assistant: Hi there"]
        );
        let stored = manager.load_messages(manager.current_id()).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2], ChatMessage::assistant("Hi there"));
        assert_eq!(manager.current_title().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_send_failure_shows_error_bubble() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "down"})))
            .mount(&server)
            .await;

        let mut manager = manager();
        let mut renderer = RecordingRenderer::default();
        let client = AskClient::new(&server.uri());

        manager.send("hello", &client, &mut renderer).await.unwrap();

        let last = manager.history().last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, ERROR_REPLY);
    }

    #[tokio::test]
    async fn test_send_shows_creator_card() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": "I was created by Someone, a Developer.",
                "displayInfo": {"name": "Someone", "role": "Developer", "image": "a.jpg", "bio": "Bio"}
            })))
            .mount(&server)
            .await;

        let mut manager = manager();
        let mut renderer = RecordingRenderer::default();
        let client = AskClient::new(&server.uri());

        manager.send("who made you", &client, &mut renderer).await.unwrap();
        assert_eq!(renderer.events.last().unwrap(), "card: Someone");
    }

    #[tokio::test]
    async fn test_blank_send_is_ignored() {
        let mut manager = manager();
        let mut renderer = RecordingRenderer::default();
        let client = AskClient::new("http://127.0.0.1:9");

        manager.send("   ", &client, &mut renderer).await.unwrap();
        assert!(renderer.events.is_empty());
        assert_eq!(manager.history().len(), 1);
    }

    #[test]
    fn test_render_history() {
        let mut manager = manager();
        manager.push_user_message("hi").unwrap();
        let mut renderer = RecordingRenderer::default();
        manager.render_history(&mut renderer);
        assert_eq!(
            renderer.events,
            vec!["clear".to_string(), format!("assistant: {GREETING}"), "user: hi".to_string()]
        );
    }
}
