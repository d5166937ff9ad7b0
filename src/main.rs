use std::error::Error;

use bpaf::{Bpaf, Parser};
use das_core::{CancelToken, RetryPolicy};
use dkb4q::consts::MAX_LED_ID;
use dkb4q::{ActiveEffect, ActiveKind, Discovery, IdleEffect, KeyState, Keyboard, Rgb};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::detection::{device_selector, DeviceSelector};

mod config;
mod cpu;
mod detection;
mod lock;

#[derive(Clone, Debug, Bpaf)]
enum KeySelection {
    Ids(
        /// Key to change, may be repeated
        #[bpaf(short('k'), long("key"), argument::<u8>("ID"), some("select at least one key or --all"))]
        Vec<u8>,
    ),
    /// Change every key
    #[bpaf(long("all"))]
    All,
}

impl KeySelection {
    fn ids(&self) -> Vec<u8> {
        match self {
            KeySelection::Ids(ids) => ids.clone(),
            KeySelection::All => (0..=MAX_LED_ID).collect(),
        }
    }
}

#[derive(Clone, Debug, Bpaf)]
struct SetArgs {
    #[bpaf(external(key_selection))]
    keys: KeySelection,
    /// Idle effect [ set-color, breathe, blink, color-cycle ]
    #[bpaf(short, long, argument("EFFECT"), fallback(IdleEffect::SetColor))]
    idle: IdleEffect,
    /// Idle color (hex: #RRGGBB or #RGB)
    #[bpaf(short, long, argument("HEX"), fallback(Rgb::new(0xFF, 0xFF, 0xFF)), display_fallback)]
    color: Rgb,
    /// Effect when pressed [ none, set-color, blink, breathe ]
    #[bpaf(short, long, argument("EFFECT"), fallback(ActiveKind::None))]
    active: ActiveKind,
    /// Color when pressed (hex: #RRGGBB or #RGB)
    #[bpaf(long, argument("HEX"), fallback(Rgb::BLACK), display_fallback)]
    active_color: Rgb,
    /// How long set-color lasts after a press
    #[bpaf(long, argument("DURATION"))]
    duration: Option<humantime::Duration>,
    /// How often blink blinks or breathe breathes
    #[bpaf(long, argument("N"))]
    cycles: Option<u8>,
    /// Length of one blink cycle
    #[bpaf(long, argument("DURATION"))]
    cycle_duration: Option<humantime::Duration>,
}

impl SetArgs {
    fn active_effect(&self) -> ActiveEffect {
        let mut effect = ActiveEffect::from_kind(self.active);
        if let Some(d) = &self.duration {
            effect = effect.with_duration(**d);
        }
        if let Some(n) = self.cycles {
            effect = effect.with_cycle_count(n);
        }
        if let Some(d) = &self.cycle_duration {
            effect = effect.with_cycle_duration(**d);
        }
        effect
    }

    fn states(&self) -> Vec<KeyState> {
        let active = self.active_effect();
        self.keys
            .ids()
            .into_iter()
            .map(|id| {
                KeyState::solid(id, self.color)
                    .idle(self.idle, self.color)
                    .active(active, self.active_color)
            })
            .collect()
    }
}

#[derive(Clone, Debug, Bpaf)]
enum Command {
    /// List connected keyboards
    #[bpaf(command)]
    List,
    /// Set the lighting of one or more keys
    #[bpaf(command, fallback_to_usage)]
    Set(#[bpaf(external(set_args))] SetArgs),
    /// Show cpu usage on the function keys until interrupted.
    /// Must not be run twice at once.
    #[bpaf(command)]
    Cpu {
        /// Sampling interval, overrides the config file
        #[bpaf(short, long, argument("DURATION"))]
        interval: Option<humantime::Duration>,
    },
}

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version, descr(env!("CARGO_PKG_DESCRIPTION")))]
struct Cli {
    /// Print protocol traffic
    #[bpaf(short, long)]
    verbose: bool,
    #[bpaf(external(device_selector))]
    device: DeviceSelector,
    #[bpaf(external(command))]
    command: Command,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancel the returned token on ctrl-c
fn cancel_on_interrupt() -> CancelToken {
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!("failed to install ctrl-c handler: {e}");
    }
    cancel
}

fn open(selector: &DeviceSelector, config: &Config) -> Result<Keyboard, Box<dyn Error>> {
    let discovery = Discovery::new()?;
    let device = selector.open(&discovery)?;
    Ok(Keyboard::with_device(device).with_retry(RetryPolicy::from(&config.retry)))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = cli().run();
    setup_logging(cli.verbose);

    match cli.command {
        Command::List => {
            let discovery = Discovery::new()?;
            let devices: Vec<_> = discovery.devices().collect();
            if devices.is_empty() {
                println!("no keyboards found");
            }
            for device in devices {
                println!("{device}");
            }
            Ok(())
        },
        Command::Set(args) => {
            let config = Config::load_or_create()?;
            let states = args.states();
            let mut keyboard = open(&cli.device, &config)?;
            let cancel = cancel_on_interrupt();
            keyboard.set_state(&states, &cancel)?;
            keyboard.close()?;
            println!("updated {} keys", states.len());
            Ok(())
        },
        Command::Cpu { interval } => {
            let _lock = lock::Lock::acquire()?;
            let config = Config::load_or_create()?;
            let colors = config.cpu_meter.colors()?;
            let interval = interval.map_or(config.cpu_meter.interval, Into::into);

            let mut keyboard = open(&cli.device, &config)?;
            let cancel = cancel_on_interrupt();
            cpu::run_meter(
                &mut keyboard,
                &config.cpu_meter.keys,
                colors,
                interval,
                &cancel,
            )?;
            info!("stopped cpu meter");
            Ok(())
        },
    }
}
