use uuid::Uuid;

use super::attachments::DrainedAttachments;
use super::conversation::derive_title;
use super::message_log::ProvisionalEntry;
use super::session::Session;
use crate::models::{Conversation, Message};
use crate::providers::{AssistantReply, AssistantService, OutboundMessage, TransportError};

pub const APOLOGY: &str = "Sorry, I encountered an error processing your request. Please try again.";
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response received.";

/// How a send ended, for callers that want more than the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Settled {
        /// Conversation the reply was recorded under.
        conversation_id: Option<String>,
        /// A conversation was created (or adopted) because none was current at send time.
        created: bool,
        /// Title given to a conversation by this exchange, if any.
        title: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// What `complete_send` needs to know about the state at send time.
#[derive(Debug)]
pub struct SendTicket {
    user_entry: ProvisionalEntry,
    user_message: Message,
    content: String,
    file_count: usize,
    had_conversation: bool,
    fresh_conversation: bool,
}

impl SendTicket {
    #[cfg(test)]
    pub fn user_message_id(&self) -> &str {
        self.user_entry.message_id()
    }

    fn derived_title(&self) -> String {
        derive_title(&self.content, self.file_count)
    }
}

/// A built request waiting to go out. Holds no borrow of the session, so the
/// session stays usable while the request is pending.
#[derive(Debug)]
pub struct InFlightSend {
    request: OutboundMessage,
    ticket: SendTicket,
}

impl InFlightSend {
    #[cfg(test)]
    pub fn request(&self) -> &OutboundMessage {
        &self.request
    }

    /// Issue the request exactly once.
    pub async fn dispatch<S>(self, service: &S) -> (SendTicket, Result<AssistantReply, TransportError>)
    where
        S: AssistantService + ?Sized,
    {
        let result = service.send_message(self.request).await;
        (self.ticket, result)
    }
}

/// Text recorded for the user's side of an exchange.
pub fn user_message_content(trimmed: &str, file_count: usize) -> String {
    if trimmed.is_empty() {
        format!("Sent {} file(s)", file_count)
    } else {
        trimmed.to_string()
    }
}

pub fn build_request(
    trimmed: &str,
    conversation_id: Option<&str>,
    attachments: &DrainedAttachments,
) -> OutboundMessage {
    OutboundMessage {
        message: trimmed.to_string(),
        conversation_id: conversation_id.unwrap_or_default().to_string(),
        files: attachments.to_outbound(),
    }
}

impl Session {
    /// Start a send: record the user message, raise the loading flag and build
    /// the request from the staged attachments.
    ///
    /// Returns `None` without touching state when there is nothing to send or a
    /// send is already pending.
    pub fn begin_send(&mut self, content: &str) -> Option<InFlightSend> {
        if self.loading {
            tracing::warn!("Ignoring send while a reply is still pending");
            return None;
        }

        let trimmed = content.trim();
        if trimmed.is_empty() && self.attachments.is_empty() {
            return None;
        }

        let had_conversation = self.store.current().is_some();
        let fresh_conversation = self
            .store
            .current()
            .is_some_and(|c| c.has_default_title())
            && self.log.is_empty();

        let drained = self.attachments.drain_for_send();
        let file_count = drained.len();

        let user_msg = Message::user(
            user_message_content(trimmed, file_count),
            drained.summaries(),
        );
        let user_entry = self.log.append_provisional(user_msg.clone());
        self.loading = true;

        let request = build_request(trimmed, self.store.current_id(), &drained);
        let released = drained.release();

        tracing::debug!(
            "Sending message to {} with {} file(s), released {} preview(s)",
            if request.conversation_id.is_empty() {
                "<new conversation>"
            } else {
                request.conversation_id.as_str()
            },
            file_count,
            released
        );

        Some(InFlightSend {
            request,
            ticket: SendTicket {
                user_entry,
                user_message: user_msg,
                content: trimmed.to_string(),
                file_count,
                had_conversation,
                fresh_conversation,
            },
        })
    }

    /// Apply the result of a send. The current conversation is looked up
    /// again here since it may have changed while the request was pending.
    pub fn complete_send(
        &mut self,
        ticket: SendTicket,
        result: Result<AssistantReply, TransportError>,
    ) -> SendOutcome {
        self.log.confirm(&ticket.user_entry);

        let outcome = match result {
            Ok(reply) => self.settle(&ticket, reply),
            Err(e) => {
                tracing::error!("Message dispatch failed: {}", e);
                self.log.append(Message::assistant_error(APOLOGY.to_string()));
                SendOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.loading = false;
        outcome
    }

    /// Run a whole send round trip. Callers that need the session while the
    /// request is pending use `begin_send`/`complete_send` directly.
    pub async fn send<S>(&mut self, service: &S, content: &str) -> Option<SendOutcome>
    where
        S: AssistantService + ?Sized,
    {
        let in_flight = self.begin_send(content)?;
        let (ticket, result) = in_flight.dispatch(service).await;
        Some(self.complete_send(ticket, result))
    }

    fn settle(&mut self, ticket: &SendTicket, reply: AssistantReply) -> SendOutcome {
        let content = reply
            .response
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string());
        let reply_msg = Message::assistant(content);

        if !ticket.had_conversation {
            let id = reply
                .conversation_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let title = ticket.derived_title();
            let conversation = Conversation::new(id.clone(), title.clone());

            let on_screen = self.store.current().is_none()
                && self.log.messages().iter().any(|m| m.id == ticket.user_message.id);
            let inserted = if on_screen {
                self.log.append(reply_msg);
                tracing::info!("Conversation {} started by first reply", id);
                self.adopt_conversation(conversation)
            } else {
                tracing::info!(
                    "Conversation {} started while another view was open, recorded in the background",
                    id
                );
                self.record_exchange(conversation, vec![ticket.user_message.clone(), reply_msg])
            };

            let title = if inserted {
                Some(title)
            } else {
                self.retitle_if_default(&id, title)
            };
            return SendOutcome::Settled {
                conversation_id: Some(id),
                created: true,
                title,
            };
        }

        self.log.append(reply_msg);
        let title = match self.store.current_id().map(str::to_string) {
            Some(id) if ticket.fresh_conversation => self.retitle_if_default(&id, ticket.derived_title()),
            _ => None,
        };

        SendOutcome::Settled {
            conversation_id: self.store.current_id().map(str::to_string),
            created: false,
            title,
        }
    }

    fn retitle_if_default(&mut self, id: &str, title: String) -> Option<String> {
        if !self.store.get(id)?.has_default_title() {
            return None;
        }
        if self.store.rename(id, &title) {
            Some(title)
        } else {
            None
        }
    }
}
