use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::APP_NAME;
use crate::models::{Message, Role};
use crate::providers::{AssistantReply, AssistantService, TransportError};
use crate::services::chat::SendTicket;
use crate::services::export::export_to_markdown;
use crate::services::{SelectedFile, SendOutcome, Session};

type PendingReply =
    Pin<Box<dyn Future<Output = (SendTicket, Result<AssistantReply, TransportError>)> + Send>>;

const HELP: &str = "\
Commands:
  /new                     start a new conversation
  /list                    list conversations
  /select <n|id>           switch conversation
  /rename <n|id> <title>   rename a conversation
  /delete <n|id>           delete a conversation
  /clear                   leave the current conversation
  /attach <path>           stage a file for the next message
  /detach <n|id>           remove a staged file
  /staged                  list staged files
  /sidebar                 show or hide the conversation list
  /export                  print the current conversation as Markdown
  /health                  check the assistant service
  /quit                    exit
Anything else is sent as a message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMsg {
    NewChat,
    ListConversations,
    ConversationSelected(String),
    RenameConversation(String, String), // target, new_title
    DeleteConversation(String),
    ClearCurrent,
    Attach(PathBuf),
    Detach(String),
    ShowStaged,
    ToggleSidebar,
    ExportConversation,
    CheckHealth,
    Help,
    Quit,
    SendMessage(String),
    Invalid(String),
}

impl AppMsg {
    /// Parse one input line. Blank lines produce nothing.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return Some(AppMsg::SendMessage(line.to_string()));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        let msg = match (name, rest) {
            ("new", _) => AppMsg::NewChat,
            ("list", _) => AppMsg::ListConversations,
            ("clear", _) => AppMsg::ClearCurrent,
            ("staged", _) => AppMsg::ShowStaged,
            ("sidebar", _) => AppMsg::ToggleSidebar,
            ("export", _) => AppMsg::ExportConversation,
            ("health", _) => AppMsg::CheckHealth,
            ("help", _) => AppMsg::Help,
            ("quit" | "exit", _) => AppMsg::Quit,
            ("select", target) if !target.is_empty() => {
                AppMsg::ConversationSelected(target.to_string())
            }
            ("delete", target) if !target.is_empty() => {
                AppMsg::DeleteConversation(target.to_string())
            }
            ("attach", path) if !path.is_empty() => AppMsg::Attach(PathBuf::from(path)),
            ("detach", target) if !target.is_empty() => AppMsg::Detach(target.to_string()),
            ("select", _) => AppMsg::Invalid("Usage: /select <n|id>".to_string()),
            ("delete", _) => AppMsg::Invalid("Usage: /delete <n|id>".to_string()),
            ("attach", _) => AppMsg::Invalid("Usage: /attach <path>".to_string()),
            ("detach", _) => AppMsg::Invalid("Usage: /detach <n|id>".to_string()),
            ("rename", args) => match args.split_once(char::is_whitespace) {
                Some((target, title)) => {
                    AppMsg::RenameConversation(target.to_string(), title.trim().to_string())
                }
                None => AppMsg::Invalid("Usage: /rename <n|id> <title>".to_string()),
            },
            _ => AppMsg::Invalid(format!("Unknown command: /{}. Try /help", name)),
        };
        Some(msg)
    }
}

/// Terminal front-end: reads commands, drives the session, prints results.
pub struct App {
    session: Session,
    service: Arc<dyn AssistantService>,
    pending: Option<PendingReply>,
}

impl App {
    pub fn new(session: Session, service: Arc<dyn AssistantService>) -> Self {
        Self {
            session,
            service,
            pending: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{} - type /help for commands", APP_NAME);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                (ticket, result) = next_reply(&mut self.pending) => {
                    self.pending = None;
                    self.finish_send(ticket, result);
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let Some(msg) = AppMsg::parse(&line) else {
                        continue;
                    };
                    if msg == AppMsg::Quit {
                        break;
                    }
                    self.update(msg).await;
                }
            }
        }

        if self.pending.is_some() {
            println!("Waiting for the pending reply...");
            let (ticket, result) = next_reply(&mut self.pending).await;
            self.pending = None;
            self.finish_send(ticket, result);
        }

        let released = self.session.teardown();
        tracing::debug!("Exiting, {} preview(s) released at teardown", released);
        Ok(())
    }

    async fn update(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::NewChat => {
                let id = self.session.create_new();
                println!("Started conversation {}", id);
                self.show_sidebar();
            }
            AppMsg::ListConversations => self.print_conversations(),
            AppMsg::ConversationSelected(target) => match self.resolve_conversation(&target) {
                Some(id) if self.session.select(&id) => {
                    self.print_transcript();
                    self.show_sidebar();
                }
                _ => println!("No conversation {}", target),
            },
            AppMsg::RenameConversation(target, title) => {
                let renamed = self
                    .resolve_conversation(&target)
                    .is_some_and(|id| self.session.rename(&id, &title));
                if renamed {
                    self.show_sidebar();
                } else {
                    println!("Nothing renamed");
                }
            }
            AppMsg::DeleteConversation(target) => {
                let deleted = self
                    .resolve_conversation(&target)
                    .is_some_and(|id| self.session.delete(&id));
                if deleted {
                    self.show_sidebar();
                } else {
                    println!("No conversation {}", target);
                }
            }
            AppMsg::ClearCurrent => {
                self.session.clear_current();
                println!("No conversation selected");
            }
            AppMsg::Attach(path) => match SelectedFile::from_path(&path).await {
                Ok(file) => match self.session.stage(file) {
                    Ok(id) => println!("Staged {} ({})", path.display(), id),
                    Err(e) => println!("{}", e),
                },
                Err(e) => {
                    tracing::error!("{:#}", e);
                    println!("Could not attach {}: {:#}", path.display(), e);
                }
            },
            AppMsg::Detach(target) => {
                let id = self.resolve_staged(&target);
                if !self.session.unstage(&id) {
                    println!("No staged file {}", target);
                }
            }
            AppMsg::ShowStaged => self.print_staged(),
            AppMsg::ToggleSidebar => {
                if self.session.toggle_sidebar() {
                    self.print_conversations();
                } else {
                    println!("Conversation list hidden");
                }
            }
            AppMsg::ExportConversation => match self.session.current_conversation() {
                Some(conversation) => {
                    println!("{}", export_to_markdown(conversation, self.session.messages()))
                }
                None => println!("No conversation selected"),
            },
            AppMsg::CheckHealth => match self.service.health().await {
                Ok(health) => println!(
                    "Service is {} ({})",
                    health.status,
                    health.environment.as_deref().unwrap_or("unknown environment")
                ),
                Err(e) => println!("Service unreachable: {}", e),
            },
            AppMsg::Help => println!("{}", HELP),
            AppMsg::Quit => {}
            AppMsg::SendMessage(text) => self.start_send(&text),
            AppMsg::Invalid(reason) => println!("{}", reason),
        }
    }

    fn start_send(&mut self, text: &str) {
        if self.session.is_loading() {
            println!("Still waiting for the previous reply");
            return;
        }
        let Some(in_flight) = self.session.begin_send(text) else {
            return;
        };
        let service = Arc::clone(&self.service);
        self.pending = Some(Box::pin(async move {
            in_flight.dispatch(&*service).await
        }));
    }

    fn finish_send(&mut self, ticket: SendTicket, result: Result<AssistantReply, TransportError>) {
        let outcome = self.session.complete_send(ticket, result);
        let elsewhere = match &outcome {
            SendOutcome::Settled {
                conversation_id: Some(id),
                ..
            } if self.session.current_conversation().map(|c| c.id.as_str()) != Some(id.as_str()) => {
                Some(id.clone())
            }
            _ => None,
        };
        match elsewhere {
            Some(id) => println!("(reply saved to conversation {})", id),
            None => {
                if let Some(reply) = self.session.messages().last() {
                    print_message(reply);
                }
            }
        }
        if let SendOutcome::Settled {
            title: Some(title), ..
        } = outcome
        {
            println!("(conversation titled \"{}\")", title);
            self.show_sidebar();
        }
    }

    /// Accept either a 1-based position from `/list` or a conversation id.
    fn resolve_conversation(&self, target: &str) -> Option<String> {
        let conversations = self.session.conversations();
        if let Ok(n) = target.parse::<usize>() {
            if let Some(conversation) = n.checked_sub(1).and_then(|i| conversations.get(i)) {
                return Some(conversation.id.clone());
            }
        }
        conversations
            .iter()
            .find(|c| c.id == target)
            .map(|c| c.id.clone())
    }

    fn resolve_staged(&self, target: &str) -> String {
        let staged = self.session.attachments().staged();
        target
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| staged.get(i))
            .map(|a| a.id.clone())
            .unwrap_or_else(|| target.to_string())
    }

    fn show_sidebar(&self) {
        if self.session.sidebar_open() {
            self.print_conversations();
        }
    }

    fn print_conversations(&self) {
        let conversations = self.session.conversations();
        if conversations.is_empty() {
            println!("No conversations yet");
            return;
        }
        let current = self.session.current_conversation().map(|c| c.id.as_str());
        for (i, conversation) in conversations.iter().enumerate() {
            let marker = if Some(conversation.id.as_str()) == current {
                '*'
            } else {
                ' '
            };
            println!(
                "{} {:>2}. {}  [{}]",
                marker,
                i + 1,
                conversation.title,
                conversation.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    fn print_staged(&self) {
        let staged = self.session.attachments().staged();
        if staged.is_empty() {
            println!("Nothing staged");
            return;
        }
        let registry = self.session.preview_registry();
        for (i, attachment) in staged.iter().enumerate() {
            let preview = attachment
                .preview_url()
                .and_then(|url| registry.data_url(url))
                .map(|data_url| format!(" [preview, {} chars]", data_url.len()))
                .unwrap_or_default();
            println!(
                "{:>2}. {} ({}, {} bytes){}",
                i + 1,
                attachment.name,
                attachment.media_type,
                attachment.size,
                preview
            );
        }
    }

    fn print_transcript(&self) {
        for message in self.session.messages() {
            print_message(message);
        }
    }
}

async fn next_reply(
    pending: &mut Option<PendingReply>,
) -> (SendTicket, Result<AssistantReply, TransportError>) {
    match pending.as_mut() {
        Some(reply) => reply.await,
        None => std::future::pending().await,
    }
}

fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant if message.error => "assistant (error)",
        Role::Assistant => "assistant",
    };
    println!("[{}] {}", label, message.content);
    for file in &message.files {
        println!(
            "    attached {} ({} bytes){}",
            file.name,
            file.size,
            if file.is_image() { ", image" } else { "" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent_verbatim() {
        assert_eq!(
            AppMsg::parse("  hello /there "),
            Some(AppMsg::SendMessage("  hello /there ".to_string()))
        );
        assert_eq!(AppMsg::parse("   "), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(AppMsg::parse("/new"), Some(AppMsg::NewChat));
        assert_eq!(AppMsg::parse("/exit"), Some(AppMsg::Quit));
        assert_eq!(
            AppMsg::parse("/select 2"),
            Some(AppMsg::ConversationSelected("2".to_string()))
        );
        assert_eq!(
            AppMsg::parse("/rename 1   Budget  review "),
            Some(AppMsg::RenameConversation(
                "1".to_string(),
                "Budget  review".to_string()
            ))
        );
        assert_eq!(
            AppMsg::parse("/attach ./my file.png"),
            Some(AppMsg::Attach(PathBuf::from("./my file.png")))
        );
    }

    #[test]
    fn test_bad_commands() {
        assert!(matches!(AppMsg::parse("/rename 1"), Some(AppMsg::Invalid(_))));
        assert!(matches!(AppMsg::parse("/select"), Some(AppMsg::Invalid(_))));
        assert!(matches!(AppMsg::parse("/frobnicate"), Some(AppMsg::Invalid(_))));
    }

    #[test]
    fn test_missing_arguments_show_usage() {
        for (line, usage) in [
            ("/select", "Usage: /select <n|id>"),
            ("/delete  ", "Usage: /delete <n|id>"),
            ("/attach", "Usage: /attach <path>"),
            ("/detach", "Usage: /detach <n|id>"),
        ] {
            assert_eq!(AppMsg::parse(line), Some(AppMsg::Invalid(usage.to_string())));
        }
    }
}
