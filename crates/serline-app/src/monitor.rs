use crate::cli::{parse_input, Input};
use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use crossbeam_channel::{select, unbounded, Receiver};
use serline_core::{
    SendMode, SerialError, SerialEvent, SerialManager, SerialService, ServiceConfig, Snapshot,
    SystemBackend,
};
use std::io::{BufRead, Write};
use std::time::Duration;

pub fn list_ports() {
    let manager = SerialManager::system();
    if manager.ports().is_empty() {
        println!("no serial ports found");
        return;
    }
    for port in manager.ports() {
        println!("{:<20} {}", port.name, port.label);
    }
}

/// Pick the port to open: explicit choice first, then the first one found.
fn choose_port(settings: &Settings) -> Result<String> {
    if let Some(port) = &settings.port {
        return Ok(port.clone());
    }
    match SerialManager::system().ports().first() {
        Some(port) => {
            log::info!("no port given, using {} ({})", port.name, port.label);
            Ok(port.name.clone())
        }
        None => bail!("no serial ports found; pass --port"),
    }
}

pub fn run(settings: &Settings) -> Result<()> {
    let port = choose_port(settings)?;
    let mode = settings.send_mode;
    let config = ServiceConfig {
        poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
        encoding: settings.encoding,
    };

    let service = SerialService::spawn(SystemBackend, config).context("starting serial worker")?;
    service.open(port.as_str(), settings.baud_rate)?;
    wait_until_open(service.events())?;
    eprintln!(
        "connected to {port} at {} baud, sending as {}; :quit to exit",
        settings.baud_rate,
        match mode {
            SendMode::Text => "text",
            SendMode::Hex => "hex",
        }
    );

    let input = spawn_stdin_reader()?;
    let mut stdout = std::io::stdout().lock();

    loop {
        let step = select! {
            recv(service.events()) -> event => match event {
                Ok(event) => on_event(&service, &port, event, &mut stdout),
                Err(_) => Ok(false),
            },
            recv(input) -> line => match line {
                Ok(line) => on_input(&service, &line, mode, settings),
                Err(_) => Ok(false),
            },
        };
        if !step? {
            break;
        }
    }

    print_stats(&service.snapshot());
    Ok(())
}

/// Returns `false` once the monitor should stop.
fn on_event(
    service: &SerialService,
    port: &str,
    event: SerialEvent,
    out: &mut impl Write,
) -> Result<bool> {
    match event {
        SerialEvent::LineReceived(text) => {
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
        // Closing on a dead device is our policy; the core only reports.
        SerialEvent::Error(SerialError::Transport { kind, message }) if kind.is_fatal() => {
            eprintln!("error: {message}; closing {port}");
            service.close()?;
        }
        SerialEvent::Error(err) => eprintln!("error: {err}"),
        SerialEvent::ConnectionChanged(false) => return Ok(false),
        _ => {}
    }
    Ok(true)
}

fn on_input(
    service: &SerialService,
    line: &str,
    mode: SendMode,
    settings: &Settings,
) -> Result<bool> {
    match parse_input(line, mode, settings.line_ending) {
        Input::Send { payload, mode } => service.send(payload, mode)?,
        Input::Stats => print_stats(&service.snapshot()),
        Input::Quit => return Ok(false),
        Input::Unknown(name) => eprintln!("unknown command :{name}"),
    }
    Ok(true)
}

fn wait_until_open(events: &Receiver<SerialEvent>) -> Result<()> {
    let mut last_error = None;
    for event in events.iter() {
        match event {
            SerialEvent::Error(err) => last_error = Some(err),
            SerialEvent::ConnectionChanged(true) => return Ok(()),
            SerialEvent::ConnectionChanged(false) => break,
            _ => {}
        }
    }
    match last_error {
        Some(err) => Err(err.into()),
        None => bail!("port closed before it opened"),
    }
}

/// Lines from stdin on a channel; the channel disconnects at EOF.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("serline-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("starting stdin reader")?;
    Ok(rx)
}

fn print_stats(snapshot: &Snapshot) {
    eprintln!(
        "rx {} bytes, tx {} bytes, {} error(s)",
        snapshot.stats.rx_bytes, snapshot.stats.tx_bytes, snapshot.stats.errors
    );
}
