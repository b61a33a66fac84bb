use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fret_core::roles::Role;
use fret_core::status::ShipmentStatus;
use fret_core::types::DbId;

#[derive(Parser, Debug)]
#[command(name = "fret", author, version, about = "Freight shipment tracking and chat")]
pub struct Cli {
    /// Dashboard role, overriding `FRET_ROLE`.
    #[arg(long, global = true)]
    pub role: Option<Role>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the timeline of a shipment by tracking number.
    Track { tracking_number: String },

    /// List orders. `--all` lists every order (staff).
    Orders {
        #[arg(long)]
        all: bool,
    },

    /// Record a new status on an order.
    UpdateStatus {
        order_id: DbId,
        /// Wire code, e.g. `EN_MER`.
        status: ShipmentStatus,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// Hide the event from client dashboards.
        #[arg(long)]
        internal: bool,
        /// Bill of lading number.
        #[arg(long = "bl")]
        bl_number: Option<String>,
        #[arg(long = "bsc")]
        bsc_number: Option<String>,
        /// Proof photo to upload; repeatable.
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
        /// URL of a photo uploaded by an earlier failed attempt; repeatable.
        #[arg(long = "uploaded-url")]
        uploaded: Vec<String>,
    },

    /// List every status code with its phase and client title.
    Statuses,

    #[command(subcommand)]
    Chat(ChatCommand),
}

#[derive(Subcommand, Debug)]
pub enum ChatCommand {
    /// List conversations, most recent first.
    Conversations,

    /// Show a conversation's messages and mark it read.
    History { conversation_id: DbId },

    /// List users you can start a conversation with.
    Users,

    /// Open (or reuse) a conversation with another user.
    Start { user_id: DbId },

    /// Send a text message.
    Send {
        conversation_id: DbId,
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Stay connected and print incoming messages until Ctrl-C.
    Listen,
}
