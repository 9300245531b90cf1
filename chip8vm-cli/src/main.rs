//! Entrypoint for CLI
use std::{env, error::Error, fs, time::Instant};

use chip8vm::{constants::*, prelude::*, Hz, IMPL_VERSION};
use log::{error, info, warn};

static USAGE: &str = r#"
usage: chip8vm run FILE [FRAMES] [--throttle]

commands:
    run     Run the target ROM file headless, then print the display

options:
    FRAMES      Number of 60 Hz frames to run (default 600)
    --throttle  Pace frames in real time instead of running flat out

environment:
    RUST_LOG    Log level, eg. debug or trace

examples:
    chip8vm run maze.rom
    chip8vm run breakout.rom 120 --throttle
"#;

const DEFAULT_FRAMES: u64 = 600;

fn run_bytecode(opts: RunOpts) -> Chip8Result<()> {
    let bytecode = fs::read(&opts.filepath)?;
    info!("running {} ({} bytes)", opts.filepath, bytecode.len());

    let mut vm = Chip8Vm::new(Chip8Conf {
        clock_frequency: Some(Hz(DEFAULT_CLOCK_FREQUENCY)),
        ..Default::default()
    });
    vm.load_bytecode(bytecode.as_slice())?;

    let mut clock = Clock::default();
    let start = Instant::now();
    let mut steps = 0_u64;

    'frames: for _ in 0..opts.frames {
        for _ in 0..vm.steps_per_frame() {
            match vm.step() {
                Ok(Flow::Unknown(opcode)) => {
                    warn!("unknown opcode {opcode:04X}, skipped");
                }
                // Nobody is pressing keys in headless mode.
                Ok(Flow::KeyWait) => {
                    info!("program is waiting for a key, stopping");
                    break 'frames;
                }
                Ok(_) => {}
                Err(err) => {
                    error!("{err}");
                    println!("{}", vm.dump_display()?);
                    return Err(err);
                }
            }
            steps += 1;
        }

        vm.timer_tick();

        if opts.throttle {
            clock.wait();
        }
    }

    println!(
        "{steps} steps in {}ms",
        start.elapsed().as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    match parse_args() {
        Some(Cmd::Run(opts)) => {
            if let Err(err) = run_bytecode(opts) {
                if err.fault().is_some() {
                    std::process::exit(1)
                }
                return Err(err.into());
            }
        }
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next()?.as_str() {
        "run" => {
            let filepath = consume_arg(&mut args)?;
            let mut opts = RunOpts {
                filepath,
                frames: DEFAULT_FRAMES,
                throttle: false,
            };
            for arg in args {
                match arg.as_str() {
                    "--throttle" => opts.throttle = true,
                    _ => opts.frames = arg.parse().ok()?,
                }
            }
            Some(Cmd::Run(opts))
        }
        _ => None,
    }
}

/// Consumes the next positional argument.
fn consume_arg(mut args: impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("Chip8 VM v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run(RunOpts),
}

struct RunOpts {
    filepath: String,
    frames: u64,
    throttle: bool,
}
