//! Command handlers. Each returns `anyhow::Result` and prints to stdout.

use std::time::Duration;

use anyhow::Context;
use fret_chat::events::ChatEvent;
use fret_chat::session::ChatSession;
use fret_client::orders::{OrderScope, StatusDraft};
use fret_core::chat::{ChatStore, MessageKind, ReceiveOutcome};
use fret_core::shipment::Visibility;
use fret_core::types::DbId;
use tokio::sync::broadcast;

use crate::args::{ChatCommand, Command};
use crate::render;
use crate::state::AppState;

/// How long `chat send` waits for the server echo.
const SEND_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Track { tracking_number } => track(state, &tracking_number).await,
        Command::Orders { all } => orders(state, all).await,
        Command::UpdateStatus {
            order_id,
            status,
            location,
            comment,
            internal,
            bl_number,
            bsc_number,
            photos,
            uploaded,
        } => {
            let draft = StatusDraft {
                status,
                location,
                comment,
                visibility: if internal {
                    Visibility::Internal
                } else {
                    Visibility::Public
                },
                bl_number,
                bsc_number,
                photos,
                uploaded,
            };
            update_status(state, order_id, draft).await
        }
        Command::Statuses => {
            print!("{}", render::status_table());
            Ok(())
        }
        Command::Chat(command) => chat(state, command).await,
    }
}

async fn track(state: &AppState, tracking_number: &str) -> anyhow::Result<()> {
    let order = state.orders.track(tracking_number).await?;
    print!("{}", render::order_dashboard(&order, state.role()));
    Ok(())
}

async fn orders(state: &AppState, all: bool) -> anyhow::Result<()> {
    let scope = if all { OrderScope::All } else { OrderScope::Mine };
    let orders = state.orders.refresh(scope).await?;
    print!("{}", render::order_list(&orders, state.role()));
    Ok(())
}

async fn update_status(state: &AppState, order_id: DbId, draft: StatusDraft) -> anyhow::Result<()> {
    if !state.role().is_logistics_staff() {
        anyhow::bail!("Seuls les agents et administrateurs peuvent modifier un statut");
    }

    // Load the current copy so regressions can be flagged.
    if let Err(e) = state.orders.refresh(OrderScope::All).await {
        tracing::warn!(error = %e, "Could not load current orders before update");
    }

    match state.orders.update_status(order_id, draft).await {
        Ok(order) => {
            println!("Statut mis à jour.");
            print!("{}", render::order_dashboard(&order, state.role()));
            Ok(())
        }
        Err(err) => {
            if !err.draft.uploaded.is_empty() {
                eprintln!("Photos déjà envoyées (réutilisables avec --uploaded-url):");
                for url in &err.draft.uploaded {
                    eprintln!("  {url}");
                }
            }
            Err(err.source.into())
        }
    }
}

async fn chat(state: &AppState, command: ChatCommand) -> anyhow::Result<()> {
    let mut store = ChatStore::new(state.user_id()?);
    store.set_conversations(state.api.conversations().await?);

    match command {
        ChatCommand::Conversations => {
            print!("{}", render::conversation_list(&store));
            Ok(())
        }
        ChatCommand::History { conversation_id } => {
            history(state, &mut store, conversation_id).await
        }
        ChatCommand::Users => {
            for user in state.api.chat_users().await? {
                println!("#{} {} ({})", user.id, user.name, user.role.as_deref().unwrap_or("-"));
            }
            Ok(())
        }
        ChatCommand::Start { user_id } => {
            let conversation = state.api.initiate_conversation(user_id).await?;
            let id = conversation.id;
            store.upsert_conversation(conversation);
            println!("Conversation #{id}");
            print!("{}", render::conversation_list(&store));
            Ok(())
        }
        ChatCommand::Send {
            conversation_id,
            text,
        } => send(state, &mut store, conversation_id, text.join(" ")).await,
        ChatCommand::Listen => listen(state, &mut store).await,
    }
}

async fn history(state: &AppState, store: &mut ChatStore, conversation_id: DbId) -> anyhow::Result<()> {
    let messages = state.api.messages(conversation_id).await?;
    store.set_history(conversation_id, messages);
    store.open(conversation_id)?;
    state.api.mark_read(conversation_id).await?;

    for message in store.messages(conversation_id) {
        println!("{}", render::message_line(message, store.me()));
    }
    Ok(())
}

async fn send(
    state: &AppState,
    store: &mut ChatStore,
    conversation_id: DbId,
    content: String,
) -> anyhow::Result<()> {
    let content = content.trim().to_string();
    if content.is_empty() {
        anyhow::bail!("Le message est vide");
    }
    store.open(conversation_id)?;

    let session = ChatSession::start(state.chat_client(), state.session_config());
    let mut events = session.subscribe();

    session.join_room(conversation_id).await?;
    let message = store.compose(conversation_id, content, MessageKind::Text, chrono::Utc::now());
    session.send_message(&message).await?;
    println!("{}", render::message_line(&message, store.me()));

    let confirmed = tokio::time::timeout(SEND_CONFIRM_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(ChatEvent::MessageReceived(incoming)) => {
                    if store.receive(incoming) == ReceiveOutcome::Confirmed {
                        return true;
                    }
                }
                Ok(ChatEvent::ConnectRejected { reason }) => {
                    eprintln!("Connexion refusée: {reason}");
                    return false;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);

    session.shutdown().await;

    if confirmed {
        println!("Message envoyé.");
        Ok(())
    } else {
        anyhow::bail!("Le message n'a pas été confirmé par le serveur")
    }
}

async fn listen(state: &AppState, store: &mut ChatStore) -> anyhow::Result<()> {
    let session = ChatSession::start(state.chat_client(), state.session_config());
    let mut events = session.subscribe();

    let rooms: Vec<DbId> = store.conversations().iter().map(|c| c.id).collect();
    for conversation_id in &rooms {
        session.join_room(*conversation_id).await?;
    }
    tracing::info!(rooms = rooms.len(), "Listening for chat messages");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            event = events.recv() => match event {
                Ok(ChatEvent::MessageReceived(message)) => {
                    let line = render::message_line(&message, store.me());
                    if store.receive(message) == ReceiveOutcome::Appended {
                        println!("{line}  [non lus: {}]", store.total_unread());
                    }
                }
                Ok(ChatEvent::StateChanged(conn_state)) => println!("{}", render::connection_state(conn_state)),
                Ok(ChatEvent::ConnectRejected { reason }) => eprintln!("Connexion refusée: {reason}"),
                Ok(ChatEvent::EmitDropped) => eprintln!("File d'envoi pleine, message le plus ancien abandonné"),
                Ok(ChatEvent::Unhandled { name, .. }) => tracing::debug!(event = %name, "Ignoring chat event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Chat event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

