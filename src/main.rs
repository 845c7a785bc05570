//! mudlink - a terminal MUD client
//!
//! Connects to a game server over TCP, answers telnet terminal-type
//! negotiation, and runs the alias/variable/trigger automation pipeline on
//! both directions of the stream. Inbound content is written straight to the
//! terminal, which renders the ANSI styling natively; the markup renderer in
//! the library is for embedders with their own display widget.
//!
//! # Quick Start
//!
//! ```text
//! mudlink mud.example.org 4000
//! ```
//!
//! # Input
//!
//! Lines are sent as commands after alias and variable resolution. A line
//! that matches a keybinding word (`Numpad8` by default sends `north`) is
//! replaced by its bound commands first. A few local commands are handled
//! client-side:
//!
//! | Command | Action |
//! |---------|--------|
//! | /history | Show recent commands |
//! | /quit | Disconnect and exit |

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossterm::style::Stylize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mudlink::history::CommandHistory;
use mudlink::session::{NullScriptHost, Session};
use mudlink::settings::Settings;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client configuration from the command line
struct ClientConfig {
    host: String,
    port: u16,
}

fn print_version() {
    eprintln!("mudlink {}", VERSION);
}

fn print_help() {
    eprintln!("mudlink {} - a terminal MUD client", VERSION);
    eprintln!();
    eprintln!("Usage: mudlink [OPTIONS] <host> <port>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Client commands:");
    eprintln!("  /history              Show recent commands");
    eprintln!("  /quit                 Disconnect and exit");
    eprintln!();
    eprintln!("Aliases, variables, triggers and keybindings are read from");
    eprintln!("~/.mudlink/settings.toml; a default set is used when the");
    eprintln!("file is missing. Keybinding words typed as a line (such as");
    eprintln!("Numpad8) send their bound commands.");
}

fn parse_args() -> Result<ClientConfig, String> {
    let mut host = None;
    let mut port = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {}", other));
            }
            other => {
                if host.is_none() {
                    host = Some(other.to_string());
                } else if port.is_none() {
                    port = Some(
                        other
                            .parse::<u16>()
                            .map_err(|_| format!("invalid port: {}", other))?,
                    );
                } else {
                    return Err(format!("unexpected argument: {}", other));
                }
            }
        }
    }

    match (host, port) {
        (Some(host), Some(port)) => Ok(ClientConfig { host, port }),
        _ => Err("expected <host> and <port>".to_string()),
    }
}

fn init_logging() {
    let home = std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(std::path::PathBuf::from);

    let log_path = home
        .map(|h| h.join(".mudlink").join("mudlink.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("mudlink.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let config = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("mudlink {} starting", VERSION);

    run_client(config)
}

fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let settings = Settings::load();
    let addr = format!("{}:{}", config.host, config.port);

    println!("{}", format!("Connecting to {}...", addr).dark_grey());
    let stream =
        TcpStream::connect(&addr).with_context(|| format!("failed to connect to {}", addr))?;
    let mut writer = stream.try_clone().context("failed to clone connection")?;
    println!("{}", "Connected.".green());
    info!("connected to {}", addr);

    // Reader thread feeds raw chunks to the main loop over a channel, the
    // same shape as a PTY reader: the loop never blocks on the socket.
    let (net_tx, net_rx) = mpsc::channel::<Vec<u8>>();
    let mut reader = stream;
    thread::spawn(move || {
        let mut buffer = vec![0u8; 4096];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if net_tx.send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Stdin lines on their own thread so the loop can poll both sides.
    let (input_tx, input_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if input_tx.send(line.trim_end().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut session = Session::new();
    let mut history = CommandHistory::new();
    let mut host = NullScriptHost;

    loop {
        let mut idle = true;

        // Drain inbound chunks; one full pass per chunk.
        loop {
            match net_rx.try_recv() {
                Ok(chunk) => {
                    idle = false;
                    let inbound = session.receive(&chunk, &settings, &mut host);
                    if !inbound.response.is_empty() {
                        writer.write_all(&inbound.response)?;
                        writer.flush()?;
                    }
                    let stdout = std::io::stdout();
                    let mut out = stdout.lock();
                    out.write_all(inbound.text.as_bytes())?;
                    out.flush()?;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    println!();
                    println!("{}", "Connection closed by server.".red());
                    info!("connection closed");
                    return Ok(());
                }
            }

            // Trigger text actions fire only after their chunk's pass.
            for command in session.pending_commands(&settings) {
                info!("trigger send: {}", command);
                send_command(&mut writer, &command)?;
            }
        }

        match input_rx.try_recv() {
            Ok(line) => {
                idle = false;
                match line.trim() {
                    "/quit" => {
                        println!("{}", "Goodbye.".dark_grey());
                        info!("user quit");
                        return Ok(());
                    }
                    "/history" => {
                        for entry in history.entries() {
                            println!("  {}", entry);
                        }
                    }
                    _ => {
                        history.push(&line);
                        // Keybinding words resolve before the alias path.
                        let input = settings.keybinding(line.trim()).unwrap_or(line.as_str());
                        let resolved = session.submit(input, &settings);
                        println!("{}", format!("> {}", resolved).dark_grey());
                        send_command(&mut writer, &resolved)?;
                    }
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                info!("stdin closed");
                return Ok(());
            }
        }

        if idle {
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Write one resolved command line to the server
fn send_command(writer: &mut TcpStream, command: &str) -> anyhow::Result<()> {
    writer
        .write_all(command.as_bytes())
        .context("failed to send command")?;
    writer.write_all(b"\r\n").context("failed to send command")?;
    writer.flush().context("failed to send command")?;
    Ok(())
}
