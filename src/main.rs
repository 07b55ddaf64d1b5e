//! Faderlink - physical sliders for desktop volumes

use anyhow::Result;
use clap::Parser;
use faderlink::config;
use faderlink::dispatch::{VolumeDispatcher, MAX_READING};
use faderlink::engine::Engine;
use faderlink::sessions;
use faderlink::transport::{self, SerialTransport};
use serialport::SerialPortType;
use tokio::sync::{broadcast, watch};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config: config_path } => {
            if config::ensure_config(&config_path)? {
                println!("Created a new mapping file at {:?}.", config_path);
                println!("Edit it to match your sliders and device, then restart.");
            }

            let directory = sessions::default_backend()?;
            let mut engine = Engine::new(&config_path, directory)?;

            let settings = engine.settings().clone();
            let port = transport::find_port(
                settings.device_name.as_deref(),
                settings.port.as_deref(),
            )?;

            println!("Starting faderlink...");
            println!("  Mapping file: {:?}", config_path);
            println!("  Sliders: {}", settings.slider_count);
            println!("  Port: {} @ {} baud", port, settings.baud_rate);
            println!("  Inverted: {}", settings.inverted);
            println!("  Bound targets: {}", engine.mapping().len());

            let mut transport =
                SerialTransport::new(port, settings.baud_rate, settings.slider_count);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            ctrlc::set_handler(move || {
                let _ = shutdown_tx.send(true);
            })?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(engine.run(&mut transport, shutdown_rx))?;
            println!("Stopped.");
        }

        Commands::Check { config: config_path } => {
            println!("Checking mapping file at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Mapping file is valid!");
                    println!("  Sliders: {}", cfg.settings.slider_count);
                    println!(
                        "  Device name: {}",
                        cfg.settings.device_name.as_deref().unwrap_or("(not set)")
                    );
                    println!(
                        "  Port: {}",
                        cfg.settings.port.as_deref().unwrap_or("(not set)")
                    );
                    println!("  Baudrate: {}", cfg.settings.baud_rate);
                    println!("  Inverted: {}", cfg.settings.inverted);
                    println!("  System in unmapped: {}", cfg.settings.system_in_unmapped);
                    for declaration in &cfg.declarations {
                        println!("    {} -> {}", declaration.index, declaration.target);
                    }
                }
                Err(e) => {
                    println!("Mapping file is invalid: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let path = "mapping.txt";
            if std::path::Path::new(path).exists() {
                println!("mapping.txt already exists. Not overwriting.");
            } else {
                std::fs::write(path, config::DEFAULT_MAPPING)?;
                println!("Created mapping.txt with an example mapping.");
            }
        }

        Commands::Ports => {
            let ports = serialport::available_ports()?;
            if ports.is_empty() {
                println!("No serial ports found.");
                return Ok(());
            }

            println!("Available serial ports:\n");
            for port in ports {
                print!("  {}", port.port_name);
                if let SerialPortType::UsbPort(info) = &port.port_type {
                    let product = info.product.as_deref().unwrap_or("unknown device");
                    print!(" ({product}");
                    if let Some(manufacturer) = info.manufacturer.as_deref() {
                        print!(", {manufacturer}");
                    }
                    print!(")");
                }
                println!();
            }
        }

        Commands::Monitor { config: config_path } => {
            let cfg = config::load_config(&config_path)?;
            let settings = cfg.settings;
            let port = transport::find_port(
                settings.device_name.as_deref(),
                settings.port.as_deref(),
            )?;

            println!(
                "Reading {} sliders from {} @ {} baud (Ctrl-C to stop)...\n",
                settings.slider_count, port, settings.baud_rate
            );

            let mut transport =
                SerialTransport::new(port, settings.baud_rate, settings.slider_count);
            let dispatcher = VolumeDispatcher::new(MAX_READING, settings.inverted);

            let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
            ctrlc::set_handler(move || {
                let _ = shutdown_tx.send(true);
            })?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let mut frames = transport.subscribe();
                transport.start()?;

                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        frame = frames.recv() => match frame {
                            Ok(frame) => {
                                let cells: Vec<String> = frame
                                    .readings
                                    .iter()
                                    .map(|&raw| {
                                        format!(
                                            "{raw:4} ({:3.0}%)",
                                            dispatcher.normalize(raw) * 100.0
                                        )
                                    })
                                    .collect();
                                println!("{}", cells.join("  "));
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }

                transport.stop();
                anyhow::Ok(())
            })?;
        }
    }

    Ok(())
}
