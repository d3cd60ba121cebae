use clap::Parser;
use dmg_emu_core::{
    apu::SAMPLE_RATE,
    cartridge::Cartridge,
    gameboy::GameBoy,
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
};
use log::info;
use std::{fs, path::Path, path::PathBuf, process};

#[derive(Parser)]
#[command(about = "Headless DMG emulator runner")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Write the generated audio to this WAV file
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Don't write battery-backed RAM back to disk on exit
    #[arg(long)]
    no_save: bool,
}

fn create_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path
        .parent()
        .and_then(|p| (!p.as_os_str().is_empty()).then_some(p))
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn save_screenshot(gb: &GameBoy, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut rgba = Vec::with_capacity(SCREEN_WIDTH * SCREEN_HEIGHT * 4);
    for pixel in gb.framebuffer() {
        rgba.extend_from_slice(&pixel.to_be_bytes());
    }
    let img = image::RgbaImage::from_raw(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, rgba)
        .ok_or("framebuffer size mismatch")?;
    create_parent_dir(path)?;
    img.save(path)?;
    info!("Saved screenshot to {}", path.display());
    Ok(())
}

fn run(args: Args, mut gb: GameBoy) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = match &args.wav {
        Some(path) => {
            let spec = hound::WavSpec {
                channels: 2,
                sample_rate: SAMPLE_RATE,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            create_parent_dir(path)?;
            Some(hound::WavWriter::create(path, spec)?)
        }
        None => None,
    };

    let mut write_result = Ok(());
    for _ in 0..args.frames {
        gb.run_frame_with(|block| {
            if write_result.is_err() {
                return;
            }
            if let Some(w) = writer.as_mut() {
                write_result = block.iter().try_for_each(|&s| w.write_sample(s));
            }
        });
    }
    write_result?;

    if let Some(w) = writer {
        w.finalize()?;
    }

    info!(
        "Ran {} frames ({} machine cycles)",
        args.frames, gb.cpu.cycles
    );

    if let Some(path) = &args.screenshot {
        save_screenshot(&gb, path)?;
    }

    if !args.no_save {
        gb.save_cart_ram();
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    info!("Starting emulator");

    let cart = match Cartridge::from_file(&args.rom) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            process::exit(1);
        }
    };

    let mut gb = GameBoy::new();
    gb.load_cart(cart);

    if let Err(e) = run(args, gb) {
        eprintln!("{e}");
        process::exit(1);
    }
}
