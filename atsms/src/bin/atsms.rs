use anyhow::{bail, Context};
use atsms::client::{ConnectionBuilder, Phone};
use atsms::config::{AppConfig, DEFAULT_BAUD_RATE};
use atsms::pdu::SubmitOptions;
use atsms::{ConnectionDescriptor, SmsFilter, Storage};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "atsms", about = "Send and read SMS through a phone's AT command interface")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// "host:port" of an RFCOMM stream bridge
    #[arg(long, conflicts_with = "serial")]
    tcp: Option<String>,

    /// Bound RFCOMM tty, e.g. /dev/rfcomm0
    #[arg(long)]
    serial: Option<String>,

    #[arg(long)]
    baud_rate: Option<u32>,

    /// Silence in milliseconds that ends a response
    #[arg(long)]
    drain_timeout_ms: Option<u64>,

    /// Attempts for listings that answer empty
    #[arg(long)]
    retries: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Send in PDU mode, split into several segments if needed
    Send {
        number: String,
        text: String,
        #[arg(long, default_value_t = false)]
        status_report: bool,
        /// Relative validity period in minutes
        #[arg(long)]
        validity_minutes: Option<u64>,
        /// Service center overriding the SIM's
        #[arg(long)]
        smsc: Option<String>,
    },
    /// Send in TEXT mode
    SendText { number: String, text: String },
    /// List messages in PDU mode, reassembling concatenated ones
    List {
        #[arg(long, default_value = "ALL", value_parser = parse_filter)]
        filter: SmsFilter,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// List messages in TEXT mode
    ListText {
        #[arg(long, default_value = "ALL", value_parser = parse_filter)]
        filter: SmsFilter,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// Read one message by index
    Read {
        index: u32,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// Delete one message by index
    Delete {
        index: u32,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// Store a message as received and unread
    Store {
        number: String,
        text: String,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// Store an unsent draft
    Draft {
        number: String,
        text: String,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// Send a stored message
    SendStored {
        index: u32,
        /// Recipient overriding the stored one
        #[arg(long)]
        number: Option<String>,
        #[arg(long, default_value = "SM")]
        storage: Storage,
    },
    /// Show the service center address
    Smsc,
    /// Show manufacturer, model, revision, IMEI and IMSI
    Identity,
    /// Show the current message format
    Mode,
    /// Show the message storages and their occupation
    Storage,
    /// Phonebook pass-through
    Phonebook {
        #[command(subcommand)]
        action: PhonebookAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum PhonebookAction {
    /// Show the selected phonebook storage
    Status,
    /// Read entries
    Read {
        #[arg(long, default_value = "SM")]
        storage: String,
        #[arg(long, default_value_t = 1)]
        start: u32,
        /// Last index; the storage capacity when omitted
        #[arg(long)]
        stop: Option<u32>,
    },
    /// Add an entry, or overwrite the one at --index
    Write {
        number: String,
        label: String,
        #[arg(long, default_value = "SM")]
        storage: String,
        #[arg(long)]
        index: Option<u32>,
    },
}

fn parse_filter(value: &str) -> Result<SmsFilter, String> {
    SmsFilter::from_field(value).ok_or_else(|| {
        format!(
            "unknown filter {:?}, expected one of ALL, REC UNREAD, REC READ, STO UNSENT, STO SENT or 0-4",
            value
        )
    })
}

fn build_phone(cli: &Cli) -> anyhow::Result<Phone> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => AppConfig::default(),
    };

    let descriptor = match (&cli.tcp, &cli.serial) {
        (Some(address), _) => ConnectionDescriptor::Tcp {
            address: address.clone(),
        },
        (None, Some(port_name)) => ConnectionDescriptor::Serial {
            port_name: port_name.clone(),
            baud_rate: cli
                .baud_rate
                .or(config.endpoint.baud_rate)
                .unwrap_or(DEFAULT_BAUD_RATE),
        },
        (None, None) => match config.endpoint.descriptor()? {
            Some(descriptor) => descriptor,
            None => bail!("no endpoint: pass --tcp or --serial, or set [endpoint] in --config"),
        },
    };

    let mut builder = ConnectionBuilder::new()
        .descriptor(descriptor)
        .config(config.session);
    if let Some(retries) = cli.retries {
        builder = builder.list_retries(retries);
    }
    if let Some(ms) = cli.drain_timeout_ms {
        builder = builder.drain_timeout(Duration::from_millis(ms));
    }
    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let phone = build_phone(&cli)?;

    let stop = phone.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, restoring device state");
            stop.cancel();
        }
    });

    run(&phone, cli.command).await
}

async fn run(phone: &Phone, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Send {
            number,
            text,
            status_report,
            validity_minutes,
            smsc,
        } => {
            let mut options = SubmitOptions::default();
            if status_report {
                options = options.with_status_report();
            }
            if let Some(minutes) = validity_minutes {
                options = options.with_validity(Duration::from_secs(minutes * 60));
            }
            if let Some(smsc) = smsc {
                options = options.with_smsc(smsc);
            }
            for receipt in phone.send_sms(&number, &text, &options).await? {
                println!(
                    "segment {}/{}: reference {}",
                    receipt.sequence,
                    receipt.total,
                    display_reference(receipt.message_reference)
                );
            }
        }
        Command::SendText { number, text } => {
            let reference = phone.send_sms_text(&number, &text).await?;
            println!("reference {}", display_reference(reference));
        }
        Command::List { filter, storage } => {
            let outcome = phone.list_messages(filter, storage).await?;
            for message in &outcome.messages {
                let timestamp = message
                    .timestamp
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let slots: Vec<String> = message.slots.iter().map(u32::to_string).collect();
                println!(
                    "[{}] {} {} {} {}",
                    slots.join(","),
                    message.filter.map_or("-", |f| f.label()),
                    message.number,
                    timestamp,
                    message.kind
                );
                if !message.complete {
                    println!("  (incomplete, missing parts {:?})", message.missing);
                }
                println!("  {}", message.text);
            }
            for failure in &outcome.decode_errors {
                eprintln!("record {:?}: {}", failure.slot, failure.error);
            }
            for failure in &outcome.integrity_errors {
                eprintln!("{}", failure);
            }
        }
        Command::ListText { filter, storage } => {
            for message in phone.list_messages_text(filter, storage).await? {
                println!(
                    "[{}] {} {} {}",
                    message.slot.map_or_else(|| "-".to_string(), |s| s.to_string()),
                    message.status.map_or("-", |f| f.label()),
                    message.number,
                    message.timestamp.as_deref().unwrap_or("-")
                );
                println!("  {}", message.text);
            }
        }
        Command::Read { index, storage } => match phone.get_sms(index, storage).await? {
            Some(record) => {
                println!("{} {} {}", record.kind, record.number, record.encoding);
                if let Some(timestamp) = record.timestamp {
                    println!("  {}", timestamp);
                }
                if let Some(report) = &record.status_report {
                    println!(
                        "  status report for reference {}: status 0x{:02X}",
                        report.message_reference, report.status
                    );
                }
                println!("  {}", record.text);
            }
            None => println!("no message at {} in {}", index, storage),
        },
        Command::Delete { index, storage } => {
            phone.delete_sms(index, storage).await?;
            println!("deleted {} from {}", index, storage);
        }
        Command::Store {
            number,
            text,
            storage,
        } => {
            let index = phone.store_sms(&number, &text, storage).await?;
            println!("stored at {} in {}", index, storage);
        }
        Command::Draft {
            number,
            text,
            storage,
        } => {
            let index = phone.store_draft_sms(&number, &text, storage).await?;
            println!("draft stored at {} in {}", index, storage);
        }
        Command::SendStored {
            index,
            number,
            storage,
        } => {
            let reference = phone
                .send_from_storage(index, number.as_deref(), storage)
                .await?;
            println!("reference {}", display_reference(reference));
        }
        Command::Smsc => match phone.service_center().await? {
            Some(center) => println!(
                "{} (type {})",
                center.number,
                center
                    .type_of_address
                    .map_or_else(|| "-".to_string(), |t| t.to_string())
            ),
            None => println!("no service center configured"),
        },
        Command::Identity => {
            for (query, answer) in phone.identities().await? {
                println!("{:>14}: {}", query.label(), answer.as_deref().unwrap_or("-"));
            }
        }
        Command::Mode => println!("{}", phone.mode().await?),
        Command::Storage => {
            let status = phone.storage_status().await?;
            for (slot, usage) in [
                ("read", status.read),
                ("write", status.write),
                ("receive", status.receive),
            ] {
                println!("{:>8}: {} {}/{}", slot, usage.storage, usage.used, usage.total);
            }
        }
        Command::Phonebook { action } => run_phonebook(phone, action).await?,
    }
    Ok(())
}

async fn run_phonebook(phone: &Phone, action: PhonebookAction) -> anyhow::Result<()> {
    match action {
        PhonebookAction::Status => {
            let status = phone.phonebook_status().await?;
            println!(
                "{} {}/{}",
                status.storage,
                status.used.map_or_else(|| "-".to_string(), |u| u.to_string()),
                status.total.map_or_else(|| "-".to_string(), |t| t.to_string())
            );
        }
        PhonebookAction::Read {
            storage,
            start,
            stop,
        } => {
            for entry in phone.read_phonebook(&storage, start, stop).await? {
                println!("{:>4} {:<20} {}", entry.index, entry.number, entry.label);
            }
        }
        PhonebookAction::Write {
            number,
            label,
            storage,
            index,
        } => {
            phone.write_phonebook(&storage, index, &number, &label).await?;
            println!("written to {}", storage);
        }
    }
    Ok(())
}

fn display_reference(reference: Option<u8>) -> String {
    reference.map_or_else(|| "-".to_string(), |r| r.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter("all"), Ok(SmsFilter::All));
        assert_eq!(parse_filter("REC UNREAD"), Ok(SmsFilter::ReceivedUnread));
        assert_eq!(parse_filter("3"), Ok(SmsFilter::StoredSent));
        assert!(parse_filter("inbox").is_err());
    }

    #[test]
    fn test_cli_list_defaults() {
        let cli = Cli::try_parse_from(["atsms", "--tcp", "127.0.0.1:5000", "list"]).unwrap();
        match cli.command {
            Command::List { filter, storage } => {
                assert_eq!(filter, SmsFilter::All);
                assert_eq!(storage, Storage::Sim);
            }
            other => panic!("unexpected command {:?}", other),
        }
        let phone = build_phone(&Cli::try_parse_from(["atsms", "--serial", "/dev/rfcomm0", "mode"]).unwrap())
            .unwrap();
        assert_eq!(
            phone.connector(),
            &ConnectionDescriptor::Serial {
                port_name: "/dev/rfcomm0".to_string(),
                baud_rate: DEFAULT_BAUD_RATE
            }
        );
    }

    #[test]
    fn test_cli_requires_endpoint() {
        let cli = Cli::try_parse_from(["atsms", "smsc"]).unwrap();
        assert!(build_phone(&cli).is_err());
    }
}
