//! Peripheral emulator CLI - run a machine description from the command line.
//!
//! Usage:
//!   sim [machine.json] [--attach DEV=path]... [--ticks N] [--boot DEV]
//!
//! Examples:
//!   sim                                  # Default machine, idle until Ctrl-E
//!   sim machine.json                     # Load a machine description
//!   sim --attach DK0=rt11.dsk --boot DK  # Attach a disk image and boot from it
//!   sim --ticks 5000000 --trace          # Bounded run with scheduler tracing

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::{info, warn};
use tokio::sync::{mpsc as tokio_mpsc, oneshot};

use sim_core::config::AttachEntry;
use sim_core::devices::TerminalHandle;
use sim_core::{Console, HostMediaStore, Machine, MachineConfig, Scheduler, SimResult};

/// Minicomputer peripheral emulator
#[derive(Parser, Debug)]
#[command(name = "sim")]
#[command(about = "Run the peripheral scheduling core against an idle processor")]
struct Args {
    /// Machine description (JSON)
    config: Option<PathBuf>,

    /// Attach media to a unit, as DEV=path or DEVn=path (repeatable)
    #[arg(short, long, value_parser = parse_attach)]
    attach: Vec<AttachEntry>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Boot from unit 0 of this device
    #[arg(long)]
    boot: Option<String>,

    /// Enable scheduler tracing
    #[arg(short, long)]
    trace: bool,
}

/// Split `DK1=disk.img` into device `DK`, unit 1 and the path.
fn parse_attach(arg: &str) -> Result<AttachEntry, String> {
    let (unit_name, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected DEV=path, got '{arg}'"))?;
    if path.is_empty() {
        return Err(format!("missing path in '{arg}'"));
    }
    let digits = unit_name
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    let (device, number) = unit_name.split_at(unit_name.len() - digits);
    if device.is_empty() {
        return Err(format!("missing device name in '{arg}'"));
    }
    let unit = match number {
        "" => 0,
        n => n.parse().map_err(|e| format!("bad unit number in '{arg}': {e}"))?,
    };
    Ok(AttachEntry {
        device: device.to_ascii_uppercase(),
        unit,
        path: path.to_string(),
    })
}

/// Channel-based console fed by the terminal input task.
struct ChannelConsole {
    key_rx: mpsc::Receiver<u8>,
    key_buffer: Vec<u8>,
}

impl ChannelConsole {
    fn new(key_rx: mpsc::Receiver<u8>) -> Self {
        Self {
            key_rx,
            key_buffer: Vec::new(),
        }
    }

    fn fill(&mut self) {
        while let Ok(ch) = self.key_rx.try_recv() {
            self.key_buffer.push(ch);
        }
    }
}

impl Console for ChannelConsole {
    fn write(&mut self, ch: u8) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        match ch {
            0x0D => {
                let _ = handle.write_all(b"\r");
            }
            0x0A => {
                let _ = handle.write_all(b"\n");
            }
            0x08 | 0x7F => {
                let _ = handle.write_all(b"\x08 \x08");
            }
            _ => {
                let _ = handle.write_all(&[ch]);
            }
        }
        let _ = handle.flush();
    }

    fn get_key(&mut self) -> Option<u8> {
        self.fill();
        if self.key_buffer.is_empty() {
            return None;
        }
        Some(self.key_buffer.remove(0))
    }
}

/// Translate crossterm key events to terminal character codes.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                return Some(upper as u8 - 64); // Ctrl+A=1, Ctrl+E=5, etc.
            }
        }
    }

    match code {
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(13),
        KeyCode::Backspace => Some(0x7F),
        KeyCode::Tab => Some(9),
        KeyCode::Esc => Some(27),
        _ => None,
    }
}

/// Echo every character typed on TTI back out through TTO.
fn echo_stream(term: TerminalHandle) -> impl FnMut(&mut Scheduler) -> SimResult<()> {
    move |sched: &mut Scheduler| {
        if let Some(ch) = term.read_char() {
            term.put_char(sched, ch);
            if ch == 0x0D {
                term.put_char(sched, 0x0A);
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.trace { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let mut config = match &args.config {
        Some(path) => MachineConfig::from_path(path).map_err(|e| {
            eprintln!("Failed to load {}: {}", path.display(), e);
            e
        })?,
        None => MachineConfig::default(),
    };
    config.attach.extend(args.attach.iter().cloned());
    if args.ticks.is_some() {
        config.run_ticks = args.ticks;
    }
    if args.boot.is_some() {
        config.boot = args.boot.clone();
    }
    config.validate()?;

    // Create channel for keyboard input
    let (key_tx, key_rx) = mpsc::channel::<u8>();

    // Stop handle comes back from the simulation thread once the machine exists
    let (stop_tx, stop_rx) = oneshot::channel();

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = tokio_mpsc::channel::<()>(1);

    let console = ChannelConsole::new(key_rx);

    // Enable raw mode (gracefully handle non-TTY)
    let raw_mode_enabled = enable_raw_mode().is_ok();
    if raw_mode_enabled {
        eprint!("Type Ctrl-E to stop the simulation.\r\n");
    }

    // Machine state is single-threaded; build and run it on one blocking thread
    let sim_handle = tokio::task::spawn_blocking(move || {
        let console: Rc<RefCell<dyn Console>> = Rc::new(RefCell::new(console));
        let (mut machine, io) = Machine::build(&config, HostMediaStore::new(), console)?;
        let _ = stop_tx.send(machine.stop_handle());

        let mut stream = echo_stream(io.terminal);
        let result = machine.run(&mut stream, config.run_ticks);

        if let Err(e) = machine.detach_all() {
            warn!("Detach failed: {}", e);
        }
        result
    });

    // Ctrl-C from outside the terminal (non-TTY runs) stops the machine
    let stop_task = tokio::spawn(async move {
        if let Ok(stop) = stop_rx.await {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.request();
            }
        }
    });

    // Spawn terminal input reader
    let input_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    if !raw_mode_enabled {
                        continue;
                    }
                    if event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if let Some(ch) = translate_key(key_event.code, key_event.modifiers) {
                                if key_tx.send(ch).is_err() {
                                    break; // Channel closed
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    // Wait for the simulation to finish
    let result = sim_handle.await?;

    // Signal input handler to stop
    let _ = shutdown_tx.send(()).await;
    let _ = input_handle.await;
    stop_task.abort();

    if raw_mode_enabled {
        let _ = disable_raw_mode();
    }

    match result {
        Ok(exit) => {
            info!(
                "Simulation ended: {:?} after {} ticks (simulated time {})",
                exit.reason, exit.ticks, exit.elapsed
            );
        }
        Err(e) => {
            eprintln!("\nError: {} (status {})", e, e.code());
        }
    }

    Ok(())
}
