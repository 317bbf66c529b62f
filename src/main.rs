use dotmatrix::lcd::{SCREEN_H, SCREEN_W};
use dotmatrix::machine::Machine;
use dotmatrix::screen::Screen;

// One frame is 70224 cycles of the 4.194304 MHz clock, ~59.7 Hz.
const FRAME: std::time::Duration = std::time::Duration::from_nanos(16_742_706);

struct Window {
    window: minifb::Window,
    buffer: Vec<u32>,
}

impl Window {
    fn power_up(title: &str, scale: minifb::Scale) -> Result<Self, minifb::Error> {
        let mut option = minifb::WindowOptions::default();
        option.resize = true;
        option.scale = scale;
        let window = minifb::Window::new(title, SCREEN_W, SCREEN_H, option)?;
        Ok(Self { window, buffer: vec![0x00; SCREEN_W * SCREEN_H] })
    }
}

impl Screen for Window {
    // The core hands out RGBA palette words; minifb wants 0RGB.
    fn draw_pixel(&mut self, x: usize, y: usize, color: u32) {
        self.buffer[y * SCREEN_W + x] = color >> 8;
    }

    fn fill(&mut self, color: u32) {
        for px in self.buffer.iter_mut() {
            *px = color >> 8;
        }
    }

    fn present(&mut self) {
        self.window.update_with_buffer(self.buffer.as_slice(), SCREEN_W, SCREEN_H).unwrap();
    }
}

fn main() {
    rog::reg("dotmatrix");
    rog::reg("dotmatrix::cartridge");

    let mut rom = String::from("");
    let mut c_scale = 2;
    {
        let mut ap = argparse::ArgumentParser::new();
        ap.set_description("Game Boy emulator");
        ap.refer(&mut c_scale).add_option(
            &["-x", "--scale-factor"],
            argparse::Store,
            "Scale the video by a factor of 1, 2, 4, or 8",
        );
        ap.refer(&mut rom).add_argument("rom", argparse::Store, "Rom name");
        ap.parse_args_or_exit();
    }
    let scale = match c_scale {
        1 => minifb::Scale::X1,
        2 => minifb::Scale::X2,
        4 => minifb::Scale::X4,
        8 => minifb::Scale::X8,
        _ => {
            rog::println!("Supported scale: 1, 2, 4 or 8");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&rom, scale) {
        eprintln!("dotmatrix: {}", e);
        std::process::exit(1);
    }
}

fn run(rom: &str, scale: minifb::Scale) -> Result<(), Box<dyn std::error::Error>> {
    let rom = std::fs::read(rom)?;
    let mut machine = Machine::power_up(rom)?;
    let title = machine.bus.cartridge.title();
    let mut screen = Window::power_up(&format!("Game Boy - {}", title), scale)?;

    let mut clock = std::time::Instant::now();
    loop {
        if !screen.window.is_open() || screen.window.is_key_down(minifb::Key::Escape) {
            break;
        }

        machine.run_frame(&mut screen)?;

        // Pace emulation to the hardware frame rate.
        let elapsed = clock.elapsed();
        if elapsed < FRAME {
            std::thread::sleep(FRAME - elapsed);
        }
        clock = std::time::Instant::now();
    }
    Ok(())
}
