//! Interactive loop and inbound relay.
//!
//! A [`Session`] owns every piece of mutable chat state: the thread name
//! cache, the active thread and what the next typed line means. Terminal
//! lines and event deliveries are both handled from [`Session::run`], one at
//! a time, so the state needs no locking.

use std::io::{self, Write};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::messenger::{Delivery, Event, Messenger};
use crate::names::{NameCache, UNNAMED_GROUP};
use crate::output;

const SWITCH_COMMAND: &str = "switch";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("terminal io error: {0}")]
    Io(#[from] io::Error),
}

/// What the next terminal line is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    InitialThread,
    SwitchThread,
    Chatting,
}

pub struct Session<M> {
    messenger: Option<M>,
    names: NameCache,
    active_thread: Option<String>,
    mode: InputMode,
}

impl<M: Messenger> Session<M> {
    pub fn new(messenger: Option<M>) -> Self {
        Self {
            messenger,
            names: NameCache::new(),
            active_thread: None,
            mode: InputMode::InitialThread,
        }
    }

    pub fn names(&self) -> &NameCache {
        &self.names
    }

    /// Seed the name cache with the group threads the account already has.
    pub async fn prefetch_thread_names(&mut self, limit: usize) {
        let Some(messenger) = self.messenger.as_ref() else {
            return;
        };
        match messenger.get_thread_list(limit).await {
            Ok(threads) => {
                for thread in threads.into_iter().filter(|thread| thread.is_group) {
                    self.names.remember(&thread.thread_id, thread.name);
                }
                debug!(cached = self.names.len(), "thread names prefetched");
            }
            Err(error) => error!(%error, "error fetching thread list"),
        }
    }

    /// Drive the terminal and the event subscription until the input closes.
    pub async fn run<R, W>(
        &mut self,
        input: R,
        mut events: Option<mpsc::Receiver<Delivery>>,
        out: &mut W,
    ) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        self.prompt(out)?;

        loop {
            tokio::select! {
                biased;

                delivery = next_delivery(&mut events) => match delivery {
                    Some(delivery) => self.handle_delivery(delivery, out).await?,
                    None => {
                        warn!("event stream ended; incoming messages will no longer be shown");
                        events = None;
                    }
                },
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line, out).await?,
                    None => {
                        writeln!(out)?;
                        writeln!(out, "{}", output::farewell_line())?;
                        out.flush()?;
                        return Ok(());
                    }
                },
            }
        }
    }

    pub async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<(), SessionError> {
        match self.mode {
            InputMode::InitialThread | InputMode::SwitchThread => {
                let thread_id = line.trim();
                if !thread_id.is_empty() {
                    let name = self.resolve_thread_name(thread_id).await;
                    self.active_thread = Some(thread_id.to_string());
                    self.mode = InputMode::Chatting;
                    writeln!(out, "{}", output::chatting_in_banner(&name))?;
                }
            }
            InputMode::Chatting => {
                if is_switch_command(line) {
                    self.mode = InputMode::SwitchThread;
                } else {
                    self.send(line).await;
                }
            }
        }
        self.prompt(out)
    }

    pub async fn handle_delivery<W: Write>(
        &mut self,
        delivery: Delivery,
        out: &mut W,
    ) -> Result<(), SessionError> {
        let event = match delivery {
            Ok(event) => event,
            Err(error) => {
                error!(%error, "error listening for messages");
                return Ok(());
            }
        };
        if !event.is_group_message() {
            return Ok(());
        }

        let line = self.format_inbound(&event).await;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }

    async fn format_inbound(&self, event: &Event) -> String {
        let sender = self.sender_name(&event.sender_id).await;
        let thread = self.names.display_name(&event.thread_id);
        output::inbound_line(thread, &sender, event.body.as_deref())
    }

    async fn sender_name(&self, sender_id: &str) -> String {
        let Some(messenger) = self.messenger.as_ref() else {
            return output::UNKNOWN_SENDER.to_string();
        };
        match messenger.get_user_info(sender_id).await {
            Ok(mut users) => match users
                .remove(sender_id)
                .and_then(|user| user.name)
                .filter(|name| !name.is_empty())
            {
                Some(name) => name,
                None => {
                    warn!(%sender_id, "sender missing from user info");
                    output::UNKNOWN_SENDER.to_string()
                }
            },
            Err(error) => {
                warn!(%sender_id, %error, "error fetching sender name");
                output::UNKNOWN_SENDER.to_string()
            }
        }
    }

    async fn resolve_thread_name(&mut self, thread_id: &str) -> String {
        if let Some(name) = self.names.get(thread_id) {
            return name.to_string();
        }
        let Some(messenger) = self.messenger.as_ref() else {
            return UNNAMED_GROUP.to_string();
        };
        match messenger.get_thread_info(thread_id).await {
            Ok(info) => self.names.remember(thread_id, info.name).to_string(),
            Err(error) => {
                warn!(%thread_id, %error, "error fetching thread info");
                UNNAMED_GROUP.to_string()
            }
        }
    }

    async fn send(&self, text: &str) {
        let Some(messenger) = self.messenger.as_ref() else {
            error!("messenger not initialized; message not sent");
            return;
        };
        let Some(thread_id) = self.active_thread.as_deref() else {
            error!("no group chat selected; message not sent");
            return;
        };
        if let Err(error) = messenger.send_message(text, thread_id).await {
            error!(%thread_id, %error, "error sending message");
        }
    }

    fn prompt<W: Write>(&self, out: &mut W) -> Result<(), SessionError> {
        match self.mode {
            InputMode::InitialThread => write!(out, "{}", output::INITIAL_THREAD_QUESTION)?,
            InputMode::SwitchThread => write!(out, "{}", output::SWITCH_THREAD_QUESTION)?,
            InputMode::Chatting => write!(out, "{}", output::message_prompt())?,
        }
        out.flush()?;
        Ok(())
    }
}

fn is_switch_command(line: &str) -> bool {
    line.eq_ignore_ascii_case(SWITCH_COMMAND)
}

async fn next_delivery(events: &mut Option<mpsc::Receiver<Delivery>>) -> Option<Delivery> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}
