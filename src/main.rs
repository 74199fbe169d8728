use std::{
    error::Error,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand};
use proximity_alarm::{
    alarm::{stop_on_interaction, AlarmController, Audio},
    app::App,
    audio::{RodioAudio, Silence},
    communication::{self, Command as PortCommand},
    config::Config,
    host::{HostSettings, ENVIRONMENT_VAR},
    notification::select_presenter,
    position::{Geolocation, PositionWatcher},
    relay::{Relay, WindowClient, WindowRegistry},
    replay::{NoGeolocation, ReplayGeolocation},
    storage::{FileStore, Storage},
    terminal::{StaticPermissions, TerminalNotifier},
    worker::{Worker, WorkerRegistration},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// config file to use instead of the one in the config directory
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// serve the message port on stdin/stdout
    Run {
        /// JSON lines of recorded fixes to replay as the device position
        #[clap(long, short)]
        positions: Option<PathBuf>,
        #[clap(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// show the static asset host settings
    Host,
}

fn main() -> Result<(), Box<dyn Error>> {
    // stdout is the message port, so logs go to a file
    simple_file_logger::init_logger!("proximity_alarm").expect("couldn't initialize logger");

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    match args.command {
        Some(Command::Init { force }) => init(&config_path, force),
        Some(Command::Host) => host(&config_path),
        Some(Command::Run {
            positions,
            interval_ms,
        }) => run(&config_path, positions, Duration::from_millis(interval_ms)),
        None => run(&config_path, None, Duration::from_secs(1)),
    }
}

fn init(config_path: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    if config_path.exists() && !force {
        println!(
            "{} already exists, use --force to overwrite it",
            config_path.display()
        );
        return Ok(());
    }
    Config::new().save(config_path)?;
    std::fs::create_dir_all(Config::sounds_path())?;
    println!("wrote {}", config_path.display());
    Ok(())
}

fn host(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let config = Config::load_or_default(config_path)?;
    let environment = std::env::var(ENVIRONMENT_VAR).ok();
    let settings = HostSettings::load(
        &config.host.publish_dir()?,
        environment.as_deref(),
        &config.host,
    )?;
    if let Err(e) = settings.check() {
        log::warn!("{e}");
        eprintln!("warning: {e}");
    }
    println!("certificate: {}", settings.certificate_path().display());
    println!("listening on https://{}", settings.listen);
    Ok(())
}

fn run(
    config_path: &Path,
    positions: Option<PathBuf>,
    interval: Duration,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load_or_default(config_path)?;
    log::info!("starting with {config:?}");

    let (outbox, events) = communication::port();
    let writer = thread::spawn(move || {
        let mut stdout = BufWriter::new(io::stdout().lock());
        for event in events {
            if let Err(e) = communication::write_event(&mut stdout, &event)
                .and_then(|()| stdout.flush())
            {
                log::error!("couldn't write to message port: {e}");
                break;
            }
        }
    });

    let (port_tx, port) = crossbeam_channel::unbounded::<PortCommand>();
    thread::spawn(move || communication::forward_commands(io::stdin().lock(), &port_tx));
    let (internal_tx, internal) = crossbeam_channel::unbounded();

    let audio: Box<dyn Audio> = match RodioAudio::open(&config.sound.path, config.sound.volume) {
        Ok(audio) => Box::new(audio),
        Err(e) => {
            log::warn!("no alarm sound, {e}");
            Box::new(Silence::default())
        }
    };
    let geolocation: Box<dyn Geolocation> = match positions {
        Some(path) => Box::new(ReplayGeolocation::open(path, interval)?),
        None => {
            log::warn!("no position feed given, every position request will fail");
            Box::new(NoGeolocation::default())
        }
    };
    let store = FileStore::open(Config::storage_path())?;

    let window = "main";
    let windows = WindowRegistry::default();
    windows.register(WindowClient::new(window, internal_tx.clone()));
    let worker = Worker::new(
        WorkerRegistration::default(),
        Relay::new(windows).with_ack_timeout(config.relay.ack_timeout()),
    );

    let alarm = AlarmController::new(
        audio,
        Box::new(StaticPermissions::new(config.notifications)),
        select_presenter(TerminalNotifier, worker.registration().clone(), window),
        stop_on_interaction(internal_tx),
        outbox.clone(),
    )
    .with_title(config.title);
    let mut app = App::new(
        PositionWatcher::new(geolocation, outbox.clone()),
        alarm,
        Storage::new(store),
        outbox,
        config.watch,
    );
    app.run(&port, &internal);

    // the writer ends once every outbox is gone
    drop(app);
    drop(worker);
    if writer.join().is_err() {
        log::error!("message port writer panicked");
    }
    Ok(())
}
