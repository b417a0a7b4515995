//! # ClipHub CLI (`cliphub`)
//!
//! Local driver over the ClipHub core: manage cards and clips in a vault
//! database, simulate an OS share intent, and edit the share preference.
//!
//! ## Usage
//!
//! ```bash
//! cliphub --db ./cliphub.sqlite3 <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cliphub cards [--all]` | List cards in pin-priority order |
//! | `cliphub create [TITLE]` | Create a card |
//! | `cliphub pin ID` / `archive ID` / `rename ID TITLE` | Mutate a card |
//! | `cliphub clips ID` | List clips of a card, newest first |
//! | `cliphub add ID TEXT` / `remove ID CLIP` | Add or remove a clip |
//! | `cliphub share TEXT [--active ID]` | Capture and route shared text |
//! | `cliphub open ID` | Record a card as last opened |
//! | `cliphub prefs [--behavior B]` | Show or set the share behavior |
//! | `cliphub ping` | Print core linkage info |

use clap::{Parser, Subcommand};
use cliphub_core::db::open_db;
use cliphub_core::{
    default_log_level, init_logging, CaptureOutcome, Card, CardId, CardStore, ClipId,
    NavigationState, PrefsRepository, RouteOutcome, ShareBehavior, ShareChannel, ShareIntent,
    SharePrefs, ShareRouter, ShareToSave, SqliteCardRepository, SqliteClipRepository,
    SqlitePrefsRepository, StoreError, SystemClock,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_DB_FILE_NAME: &str = "cliphub.sqlite3";

/// ClipHub: a local clip and note vault.
#[derive(Parser)]
#[command(name = "cliphub", version, about = "ClipHub: a local clip and note vault")]
struct Cli {
    /// Vault database file. Defaults to `<temp_dir>/cliphub.sqlite3`.
    #[arg(long, global = true, env = "CLIPHUB_DB_PATH")]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true, env = "CLIPHUB_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level (`trace|debug|info|warn|error`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cards in pin-priority order.
    Cards {
        /// Include archived cards.
        #[arg(long)]
        all: bool,
    },
    /// Create a card. Blank titles become `Untitled`.
    Create { title: Option<String> },
    /// Toggle the pinned flag of a card.
    Pin { card_id: CardId },
    /// Archive a card.
    Archive { card_id: CardId },
    /// Rename a card.
    Rename { card_id: CardId, title: String },
    /// List clips of a card, newest first.
    Clips { card_id: CardId },
    /// Add a clip to a card.
    Add { card_id: CardId, text: String },
    /// Remove a clip from a card.
    Remove { card_id: CardId, clip_id: ClipId },
    /// Capture text as an OS share and route it into the vault.
    Share {
        text: String,
        /// Card shown by the active detail view.
        #[arg(long)]
        active: Option<CardId>,
    },
    /// Record a card as the last opened one.
    Open { card_id: CardId },
    /// Show or set the share preference.
    Prefs {
        /// One of `new`, `append_current`, `append_last`.
        #[arg(long, value_parser = parse_behavior)]
        behavior: Option<ShareBehavior>,
    },
    /// Print core linkage info.
    Ping,
}

type VaultStore<'conn> = CardStore<SqliteCardRepository<'conn>, SqliteClipRepository<'conn>>;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    if let Commands::Ping = cli.command {
        println!("cliphub_core ping={}", cliphub_core::ping());
        println!("cliphub_core version={}", cliphub_core::core_version());
        return Ok(());
    }

    let db_path = cli
        .db
        .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
    let conn = open_db(&db_path).map_err(|err| format!("vault DB open failed: {err}"))?;
    let card_repo = SqliteCardRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let clip_repo = SqliteClipRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let prefs_repo = SqlitePrefsRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let mut store = CardStore::new(card_repo, clip_repo, Arc::new(SystemClock));
    store.load_all().map_err(|err| err.to_string())?;
    info!(
        "event=cli_command module=cli status=start db_path={}",
        db_path.display()
    );

    match cli.command {
        Commands::Cards { all } => {
            let cards: Vec<&Card> = if all {
                store.cards().iter().collect()
            } else {
                store.visible_cards().collect()
            };
            for card in cards {
                println!("{}", format_card(card));
            }
        }
        Commands::Create { title } => {
            let id = store.create_card(title.as_deref()).map_err(to_message)?;
            println!("{id}");
        }
        Commands::Pin { card_id } => {
            require_card(&store, card_id)?;
            store.toggle_pin(card_id).map_err(to_message)?;
        }
        Commands::Archive { card_id } => {
            require_card(&store, card_id)?;
            store.archive_card(card_id).map_err(to_message)?;
        }
        Commands::Rename { card_id, title } => {
            require_card(&store, card_id)?;
            store.rename_card(card_id, &title).map_err(to_message)?;
        }
        Commands::Clips { card_id } => {
            require_card(&store, card_id)?;
            for clip in store.load_clips(card_id).map_err(to_message)? {
                println!("{}\t{}\t{}", clip.id, clip.kind.as_str(), clip.text);
            }
        }
        Commands::Add { card_id, text } => {
            require_card(&store, card_id)?;
            match store.add_clip_item(card_id, &text) {
                Ok(Some(clip)) => println!("{}", clip.id),
                Ok(None) => return Err("clip text is blank".to_string()),
                Err(StoreError::StaleCardRecency { clip_id, .. }) => {
                    eprintln!("warning: clip saved but card order may be stale");
                    println!("{clip_id}");
                }
                Err(err) => return Err(err.to_string()),
            }
        }
        Commands::Remove { card_id, clip_id } => {
            require_card(&store, card_id)?;
            store.load_clips(card_id).map_err(to_message)?;
            if !store.remove_clip_item(card_id, clip_id).map_err(to_message)? {
                return Err(format!("clip not found: {clip_id}"));
            }
        }
        Commands::Share { text, active } => {
            share(&mut store, &prefs_repo, text, active)?;
        }
        Commands::Open { card_id } => {
            require_card(&store, card_id)?;
            let mut prefs = prefs_repo.load_prefs().map_err(|err| err.to_string())?;
            prefs.last_opened_card_id = Some(card_id);
            prefs_repo
                .save_prefs(&prefs)
                .map_err(|err| err.to_string())?;
        }
        Commands::Prefs { behavior } => {
            let mut prefs = prefs_repo.load_prefs().map_err(|err| err.to_string())?;
            if let Some(behavior) = behavior {
                prefs.share_behavior = behavior;
                prefs_repo
                    .save_prefs(&prefs)
                    .map_err(|err| err.to_string())?;
            }
            println!("{}", format_prefs(&prefs));
        }
        Commands::Ping => {}
    }
    Ok(())
}

/// Runs one share through the same capture and wiring path the app uses.
fn share(
    store: &mut VaultStore<'_>,
    prefs_repo: &SqlitePrefsRepository<'_>,
    text: String,
    active: Option<CardId>,
) -> Result<(), String> {
    let channel = Arc::new(ShareChannel::new());
    let captured = channel.handle_intent(&ShareIntent::send_text(text));
    if captured != CaptureOutcome::Accepted {
        println!("capture={}", captured.as_str());
        return Ok(());
    }

    let prefs = prefs_repo.load_prefs().map_err(|err| err.to_string())?;
    let mut wiring = ShareToSave::new(
        Arc::clone(&channel),
        ShareRouter::new(Arc::new(SystemClock)),
    );
    wiring.wire();

    let mut nav = NavigationState {
        active_card: active,
        opened: Vec::new(),
    };
    for delivery in wiring.drain(&mut nav, &prefs, store) {
        match delivery.result.map_err(|err| format!("share failed: {err}"))? {
            RouteOutcome::Saved {
                card_id,
                clip_id,
                target,
            } => println!("saved card={card_id} clip={clip_id} target={}", target.as_str()),
            RouteOutcome::DuplicateSuppressed => println!("duplicate"),
            RouteOutcome::Blank => println!("blank"),
        }
    }

    if let Some(opened) = nav.opened.last().copied() {
        let mut current = prefs_repo.load_prefs().map_err(|err| err.to_string())?;
        current.last_opened_card_id = Some(opened);
        prefs_repo
            .save_prefs(&current)
            .map_err(|err| err.to_string())?;
    }
    Ok(())
}

fn require_card(store: &VaultStore<'_>, card_id: CardId) -> Result<(), String> {
    match store.get_card(card_id) {
        Some(_) => Ok(()),
        None => Err(format!("card not found: {card_id}")),
    }
}

fn to_message(err: StoreError) -> String {
    err.to_string()
}

fn parse_behavior(value: &str) -> Result<ShareBehavior, String> {
    ShareBehavior::parse(value).ok_or_else(|| {
        format!("unsupported behavior `{value}`; expected new|append_current|append_last")
    })
}

fn format_card(card: &Card) -> String {
    let pin = if card.pinned { "P" } else { "-" };
    let archived = if card.archived { "A" } else { "-" };
    format!("{}\t{pin}{archived}\t{}", card.id, card.title)
}

fn format_prefs(prefs: &SharePrefs) -> String {
    let last_opened = prefs
        .last_opened_card_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "share_behavior={} last_opened={last_opened}",
        prefs.share_behavior.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::{format_card, format_prefs, parse_behavior, Cli, Commands};
    use clap::{CommandFactory, Parser};
    use cliphub_core::{Card, ShareBehavior, SharePrefs};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn share_command_parses_active_card() {
        let cli = Cli::try_parse_from([
            "cliphub",
            "share",
            "hello",
            "--active",
            "6f1c7c1e-8d52-4c1e-9d2b-0d6b2f1e0a11",
        ])
        .unwrap();
        match cli.command {
            Commands::Share { text, active } => {
                assert_eq!(text, "hello");
                assert!(active.is_some());
            }
            _ => panic!("expected share command"),
        }
    }

    #[test]
    fn malformed_card_id_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["cliphub", "pin", "nope"]).is_err());
    }

    #[test]
    fn behavior_parser_accepts_stored_names_only() {
        assert_eq!(
            parse_behavior("append_last").unwrap(),
            ShareBehavior::AppendLastOpened
        );
        assert!(parse_behavior("sometimes").is_err());
    }

    #[test]
    fn card_and_prefs_lines_are_tab_and_key_value_formatted() {
        let mut card = Card::new(Some("Inbox"), 1);
        card.pinned = true;
        assert!(format_card(&card).ends_with("\tP-\tInbox"));
        assert_eq!(
            format_prefs(&SharePrefs::default()),
            "share_behavior=append_current last_opened=none"
        );
    }
}
