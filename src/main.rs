//! `mssqe` binary entry point: logging setup, config/account resolution, and
//! dispatch of the internal command surface (spec §6) onto [`Engine`].

use clap::Parser;

use driftbox::cli::{
    build_compose_request, build_free_text, build_structured_filter, search_scope, store_op, uids, Cli, Commands,
};
use driftbox::config::{self, AccountStoreDocument};
use driftbox::domain::Account;
use driftbox::error::Result;
use driftbox::query::MatchOptions;
use driftbox::services::{SendMode, SendOutcome};
use driftbox::Engine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {}
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_root = config::resolve_from_cwd()?;
    let mut doc = config::store::load(&config_root)?;

    driftbox::license::load(&config_root.dir)?;

    if let Commands::Activate { email } = &cli.command {
        config::store::activate(&mut doc, email)?;
        config::store::save(&config_root, &doc)?;
        println!("activated {email}");
        return Ok(());
    }

    let account = resolve_account(&doc, cli.account.as_deref())?;
    let engine = Engine::new(config_root.dir.clone());

    match cli.command {
        Commands::Activate { .. } => unreachable!("handled above"),

        Commands::Sync { folder } => {
            let folder = folder.map(driftbox::domain::FolderName::from);
            let fetched = engine.sync(&account, folder).await?;
            println!("fetched {fetched} new message(s)");
        }

        Commands::Read { folder, uid } => {
            let folder = Commands::folder_name(Some(&folder));
            let message = engine
                .read(&account, &folder, driftbox::domain::Uid(uid))
                .await?;
            print_message(&message);
        }

        Commands::Search {
            query,
            folder,
            from,
            to,
            subject,
            since,
            min_size,
            max_size,
            unread,
            live,
            no_fuzzy,
            case_sensitive,
        } => {
            let filter = build_structured_filter(
                folder.as_deref(),
                from.as_deref(),
                to.as_deref(),
                subject.as_deref(),
                since.as_deref(),
                min_size.as_deref(),
                max_size.as_deref(),
                unread,
            );
            let free_text = build_free_text(query.as_deref())?;
            let scope_folder = Commands::folder_name(folder.as_deref());
            let match_options = MatchOptions {
                case_sensitive,
                fuzzy: !no_fuzzy,
                ..MatchOptions::default()
            };

            let results = engine
                .search(
                    &account,
                    &scope_folder,
                    &filter,
                    free_text.as_ref(),
                    search_scope(live),
                    &match_options,
                )
                .await?;

            for message in &results {
                print_message_summary(message);
            }
            println!("{} message(s)", results.len());
        }

        Commands::Mark {
            folder,
            uids: raw_uids,
            flag,
            remove,
        } => {
            let folder = Commands::folder_name(Some(&folder));
            let applied = engine
                .mark(&account, &folder, &uids(&raw_uids), flag.into(), store_op(remove))
                .await?;
            println!("applied to {applied} message(s)");
        }

        Commands::Delete {
            folder,
            uids: raw_uids,
        } => {
            let folder = Commands::folder_name(Some(&folder));
            let expunged = engine.delete(&account, &folder, &uids(&raw_uids)).await?;
            println!("expunged {expunged} message(s)");
        }

        Commands::Send {
            to,
            cc,
            bcc,
            subject,
            body,
            draft,
            edit_uid,
        } => {
            let request = build_compose_request(&to, &cc, &bcc, &subject, &body);
            let mode = if draft { SendMode::Draft } else { SendMode::Send };
            let edit_uid = edit_uid.map(driftbox::domain::Uid);
            let outcome = engine.send(&account, request, mode, edit_uid, None, true).await?;
            match outcome {
                SendOutcome::Sent => println!("sent"),
                SendOutcome::Drafted(uid) => println!("drafted as UID {uid}"),
            }
        }

        Commands::SendDrafts { dir } => {
            let summary = engine.send_drafts(&dir, &account, None).await?;
            println!("sent: {}, failed: {}", summary.sent, summary.failed);
        }
    }

    Ok(())
}

fn resolve_account(doc: &AccountStoreDocument, selector: Option<&str>) -> Result<Account> {
    let stored = match selector {
        Some(selector) => config::store::resolve(doc, selector)?,
        None => config::store::active(doc)?,
    };
    Ok(Account::from(stored.clone()))
}

fn print_message(message: &driftbox::domain::Message) {
    println!(
        "UID {} | {} | {} | {}",
        message.uid,
        message.from.display(),
        message.subject.as_deref().unwrap_or("(no subject)"),
        message.date.to_rfc3339(),
    );
    if let Some(body) = &message.body_text {
        println!("{body}");
    }
    for attachment in &message.attachments {
        println!("  attachment: {} ({} bytes)", attachment.filename, attachment.size_bytes);
    }
}

fn print_message_summary(message: &driftbox::domain::Message) {
    println!(
        "UID {:<8} {} | {} | {}",
        message.uid.0,
        message.date.format("%Y-%m-%d"),
        message.from.display(),
        message.subject.as_deref().unwrap_or("(no subject)"),
    );
}
