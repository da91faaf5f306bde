use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use q8_mirror::server::HttpServer;
use q8_mirror::session::SessionEvent;
use q8_mirror::{Config, Controller, SessionOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the adb executable
    #[arg(long, global = true)]
    adb: Option<PathBuf>,

    /// Path to the scrcpy executable
    #[arg(long, global = true)]
    scrcpy: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List attached devices
    Devices,
    /// Pair with a device over Wi-Fi using its pairing code
    Pair { address: String, port: u16, code: String },
    /// Connect to a device over TCP/IP
    Connect { address: String, port: u16 },
    /// Disconnect a TCP/IP device
    Disconnect { address: String, port: u16 },
    /// Restart the attached device's adb daemon in TCP/IP mode
    Wireless {
        #[arg(default_value = "5555")]
        port: u16,
    },
    /// Mirror a device until Ctrl-C or until scrcpy exits
    Mirror {
        /// Device serial or host:port
        #[arg(short, long, default_value = "")]
        serial: String,
        #[arg(long)]
        bit_rate: Option<String>,
        #[arg(long, default_value = "0")]
        max_size: u32,
        #[arg(long, default_value = "0")]
        max_fps: u32,
        #[arg(long)]
        turn_screen_off: bool,
        #[arg(long)]
        fullscreen: bool,
        #[arg(long)]
        stay_awake: bool,
        #[arg(long)]
        record: Option<String>,
        #[arg(long)]
        window_title: Option<String>,
        /// Extra arguments passed to scrcpy verbatim
        #[arg(last = true)]
        extra: Vec<String>,
    },
    /// Serve the HTTP/SSE API for the front end
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(adb) = args.adb {
        config.bridge_path = adb;
    }
    if let Some(scrcpy) = args.scrcpy {
        config.mirror_path = scrcpy;
    }

    let controller = Arc::new(Controller::new(&config));

    match args.command {
        Cmd::Devices => {
            for device in controller.list_devices().await? {
                println!("{}\t{}", device.id, device.state);
            }
        }
        Cmd::Pair { address, port, code } => {
            controller.pair(&address, port, &code).await?;
            println!("paired with {}:{}", address, port);
        }
        Cmd::Connect { address, port } => {
            controller.connect(&address, port).await?;
            println!("connected to {}:{}", address, port);
        }
        Cmd::Disconnect { address, port } => {
            controller.disconnect(&address, port).await?;
            println!("disconnected {}:{}", address, port);
        }
        Cmd::Wireless { port } => {
            controller.enable_wireless(port).await?;
            println!("device listening on port {}", port);
        }
        Cmd::Mirror {
            serial,
            bit_rate,
            max_size,
            max_fps,
            turn_screen_off,
            fullscreen,
            stay_awake,
            record,
            window_title,
            extra,
        } => {
            let options = SessionOptions {
                bit_rate,
                max_size,
                max_fps,
                turn_screen_off,
                fullscreen,
                stay_awake,
                record,
                window_title,
                extra_args: extra,
            };
            mirror(&controller, &serial, &options).await?;
        }
        Cmd::Serve { port } => {
            tracing::info!("Starting q8-mirror HTTP/SSE server v{}", env!("CARGO_PKG_VERSION"));
            let server = HttpServer::new(Arc::clone(&controller));
            let served = server.run(port.unwrap_or(config.listen_port)).await;
            if controller.session_status().running {
                controller.stop_session().await?;
            }
            served?;
        }
    }

    Ok(())
}

async fn mirror(controller: &Controller, serial: &str, options: &SessionOptions) -> anyhow::Result<()> {
    let mut events = controller.subscribe();
    controller.start_session(serial, options)?;

    let exited = async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Exited { code, .. }) => return code,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    };

    tokio::select! {
        code = exited => {
            tracing::info!(?code, "scrcpy exited");
        }
        _ = tokio::signal::ctrl_c() => {
            controller.stop_session().await?;
        }
    }

    Ok(())
}
